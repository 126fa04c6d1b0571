//! Aggregate sportsbook odds integration
//!
//! Fetches current H2H/totals offerings for a sport from The Odds API in
//! decimal format. One outbound call per sport per pass.

use crate::config::OddsConfig;
use crate::domain::Sport;
use crate::error::{EdgelineError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Odds for a single outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    /// Decimal odds
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
}

impl Outcome {
    /// Implied probability, 1 / decimal odds
    pub fn implied_probability(&self) -> f64 {
        if self.price > 0.0 {
            (1.0 / self.price).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Market odds (h2h, totals, spreads)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOdds {
    pub key: String,
    pub outcomes: Vec<Outcome>,
}

/// Bookmaker offerings for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmakerOdds {
    pub key: String,
    pub title: String,
    pub markets: Vec<MarketOdds>,
}

impl BookmakerOdds {
    pub fn market(&self, key: &str) -> Option<&MarketOdds> {
        self.markets.iter().find(|m| m.key == key)
    }
}

/// Game event with odds from multiple bookmakers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub bookmakers: Vec<BookmakerOdds>,
}

impl Game {
    /// Only games quoted by at least two bookmakers participate in consensus
    pub fn has_consensus_depth(&self) -> bool {
        self.bookmakers.len() >= 2
    }
}

/// The Odds API client
pub struct OddsApiClient {
    client: Client,
    config: OddsConfig,
}

impl OddsApiClient {
    pub fn new(config: OddsConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EdgelineError::MissingCredential("ODDS_API_KEY".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch current games with odds for one sport.
    ///
    /// `market_keys` is a comma-joined list such as `"h2h"` or `"h2h,totals"`.
    pub async fn fetch_games(&self, sport: Sport, market_keys: &[&str]) -> Result<Vec<Game>> {
        let url = format!("{}/sports/{}/odds", self.config.base_url, sport.api_key());
        let markets = market_keys.join(",");

        debug!(sport = sport.api_key(), %markets, "Fetching sportsbook odds");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.config.api_key.as_str()),
                ("regions", self.config.regions.as_str()),
                ("markets", markets.as_str()),
                ("oddsFormat", "decimal"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(EdgelineError::RateLimited(format!(
                    "odds API for {}: {}",
                    sport.api_key(),
                    text
                )));
            }
            return Err(EdgelineError::MarketDataUnavailable(format!(
                "odds API error {} for {}: {}",
                status,
                sport.api_key(),
                text
            )));
        }

        let games: Vec<Game> = response.json().await?;

        let with_depth = games.iter().filter(|g| g.has_consensus_depth()).count();
        info!(
            sport = sport.display_name(),
            games = games.len(),
            with_depth,
            "Fetched sportsbook games"
        );
        if with_depth < games.len() {
            warn!(
                sport = sport.api_key(),
                thin = games.len() - with_depth,
                "Games with fewer than 2 bookmakers excluded from consensus"
            );
        }

        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, price: f64) -> Outcome {
        Outcome {
            name: name.to_string(),
            price,
            point: None,
        }
    }

    #[test]
    fn test_implied_probability() {
        assert!((outcome("A", 2.0).implied_probability() - 0.5).abs() < 1e-9);
        assert!((outcome("A", 4.0).implied_probability() - 0.25).abs() < 1e-9);
        assert_eq!(outcome("A", 0.0).implied_probability(), 0.0);
    }

    #[test]
    fn test_consensus_depth() {
        let game = Game {
            id: "g1".to_string(),
            sport_key: "basketball_nba".to_string(),
            commence_time: Utc::now(),
            home_team: "Boston Celtics".to_string(),
            away_team: "Los Angeles Lakers".to_string(),
            bookmakers: vec![BookmakerOdds {
                key: "pinnacle".to_string(),
                title: "Pinnacle".to_string(),
                markets: vec![],
            }],
        };
        assert!(!game.has_consensus_depth());
    }

    #[test]
    fn test_game_response_parsing() {
        let raw = r#"[{
            "id": "abc123",
            "sport_key": "basketball_nba",
            "commence_time": "2026-02-01T00:10:00Z",
            "home_team": "Boston Celtics",
            "away_team": "Los Angeles Lakers",
            "bookmakers": [{
                "key": "pinnacle",
                "title": "Pinnacle",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Boston Celtics", "price": 1.87},
                        {"name": "Los Angeles Lakers", "price": 2.05}
                    ]
                }]
            }]
        }]"#;
        let games: Vec<Game> = serde_json::from_str(raw).unwrap();
        assert_eq!(games.len(), 1);
        let market = games[0].bookmakers[0].market("h2h").unwrap();
        assert_eq!(market.outcomes.len(), 2);
    }
}
