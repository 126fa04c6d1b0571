use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supported sports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    #[serde(rename = "basketball_nba")]
    Nba,
    #[serde(rename = "americanfootball_nfl")]
    Nfl,
    #[serde(rename = "icehockey_nhl")]
    Nhl,
    #[serde(rename = "baseball_mlb")]
    Mlb,
    #[serde(rename = "basketball_ncaab")]
    Ncaab,
    #[serde(rename = "americanfootball_ncaaf")]
    Ncaaf,
    #[serde(rename = "soccer_epl")]
    Epl,
    #[serde(rename = "soccer_uefa_champs_league")]
    ChampionsLeague,
    #[serde(rename = "soccer_usa_mls")]
    Mls,
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl Sport {
    /// The odds API sport endpoint key
    pub fn api_key(&self) -> &'static str {
        match self {
            Sport::Nba => "basketball_nba",
            Sport::Nfl => "americanfootball_nfl",
            Sport::Nhl => "icehockey_nhl",
            Sport::Mlb => "baseball_mlb",
            Sport::Ncaab => "basketball_ncaab",
            Sport::Ncaaf => "americanfootball_ncaaf",
            Sport::Epl => "soccer_epl",
            Sport::ChampionsLeague => "soccer_uefa_champs_league",
            Sport::Mls => "soccer_usa_mls",
            Sport::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sport::Nba => "NBA",
            Sport::Nfl => "NFL",
            Sport::Nhl => "NHL",
            Sport::Mlb => "MLB",
            Sport::Ncaab => "College Basketball",
            Sport::Ncaaf => "College Football",
            Sport::Epl => "Premier League",
            Sport::ChampionsLeague => "Champions League",
            Sport::Mls => "MLS",
            Sport::Unknown => "Unknown",
        }
    }

    /// Every sport the detector fetches sportsbook odds for
    pub fn supported() -> &'static [Sport] {
        &[
            Sport::Nba,
            Sport::Nfl,
            Sport::Nhl,
            Sport::Mlb,
            Sport::Ncaab,
            Sport::Ncaaf,
            Sport::Epl,
            Sport::ChampionsLeague,
            Sport::Mls,
        ]
    }

    pub fn is_soccer(&self) -> bool {
        matches!(self, Sport::Epl | Sport::ChampionsLeague | Sport::Mls)
    }
}

impl TryFrom<&str> for Sport {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Sport::supported()
            .iter()
            .copied()
            .find(|sp| sp.api_key() == s)
            .ok_or(())
    }
}

/// Exchange market classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    H2h,
    Total,
    Spread,
    PlayerProp,
    Futures,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::H2h => "h2h",
            MarketType::Total => "total",
            MarketType::Spread => "spread",
            MarketType::PlayerProp => "player_prop",
            MarketType::Futures => "futures",
        }
    }
}

impl TryFrom<&str> for MarketType {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "h2h" => Ok(MarketType::H2h),
            "total" => Ok(MarketType::Total),
            "spread" => Ok(MarketType::Spread),
            "player_prop" => Ok(MarketType::PlayerProp),
            "futures" => Ok(MarketType::Futures),
            _ => Err(()),
        }
    }
}

/// Escalation state of a watched market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringStatus {
    Idle,
    Watching,
    Triggered,
    Expired,
}

impl MonitoringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringStatus::Idle => "idle",
            MonitoringStatus::Watching => "watching",
            MonitoringStatus::Triggered => "triggered",
            MonitoringStatus::Expired => "expired",
        }
    }
}

impl TryFrom<&str> for MonitoringStatus {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "idle" => Ok(MonitoringStatus::Idle),
            "watching" => Ok(MonitoringStatus::Watching),
            "triggered" => Ok(MonitoringStatus::Triggered),
            "expired" => Ok(MonitoringStatus::Expired),
            _ => Err(()),
        }
    }
}

/// Where the cached market row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSource {
    Api,
    Firecrawl,
}

impl MarketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSource::Api => "api",
            MarketSource::Firecrawl => "firecrawl",
        }
    }
}

impl TryFrom<&str> for MarketSource {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "api" => Ok(MarketSource::Api),
            "firecrawl" => Ok(MarketSource::Firecrawl),
            _ => Err(()),
        }
    }
}

/// One exchange market under surveillance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedMarket {
    /// Stable exchange identifier, primary key
    pub condition_id: String,
    /// Usually "A vs B", optionally suffixed with " - ..."
    pub event_title: String,
    pub question: String,
    pub sport: Option<Sport>,
    pub market_type: MarketType,
    /// YES half of the binary contract; a market without it is not tradeable
    pub yes_token_id: Option<String>,
    pub cached_yes_price: Option<Decimal>,
    pub cached_volume: Option<Decimal>,
    pub event_start_time: Option<DateTime<Utc>>,
    pub monitoring_status: MonitoringStatus,
    pub active: bool,
    pub source: Option<MarketSource>,
}

impl WatchedMarket {
    /// Parse the event title as "<yesTeam> vs <noTeam>", dropping any
    /// " - ..." suffix on the NO half. Title order is the source of truth
    /// for YES/NO assignment.
    pub fn title_teams(&self) -> Option<(String, String)> {
        split_vs_title(&self.event_title)
    }

    pub fn is_tradeable(&self) -> bool {
        self.yes_token_id.is_some()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.event_start_time.map(|t| t <= now).unwrap_or(false)
    }

    pub fn cached_yes_price_f64(&self) -> Option<f64> {
        self.cached_yes_price.and_then(|p| p.to_f64())
    }

    pub fn cached_volume_f64(&self) -> Option<f64> {
        self.cached_volume.and_then(|v| v.to_f64())
    }
}

/// Split a "<a> vs <b>" title into its two halves
pub fn split_vs_title(title: &str) -> Option<(String, String)> {
    let lower = title.to_lowercase();
    let sep = [" vs. ", " vs "]
        .iter()
        .find_map(|s| lower.find(s).map(|idx| (idx, s.len())))?;
    let (idx, sep_len) = sep;

    let yes = title[..idx].trim();
    let mut no = title[idx + sep_len..].trim();
    // Drop trailing qualifiers like " - Moneyline" or " - Feb 2"
    if let Some(dash) = no.find(" - ") {
        no = no[..dash].trim();
    }
    let no = no.trim_end_matches('?').trim();

    if yes.is_empty() || no.is_empty() {
        return None;
    }
    Some((yes.to_string(), no.to_string()))
}
