//! Watch-set selection
//!
//! Builds the ordered working set for one pass from the persistent market
//! cache: the volume-filtered API set unioned with the scrape-discovered
//! set, deduplicated by condition id, with sport detection filled in for
//! rows the scanner left untagged.

use crate::adapters::store::DetectorStore;
use crate::config::LoaderConfig;
use crate::domain::WatchedMarket;
use crate::error::Result;
use crate::sports::detect_sport;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

/// Load the pass's watch set. Ordering is by event start ascending;
/// first-seen wins on duplicate condition ids across the two sets.
pub async fn load_watch_set(
    store: &dyn DetectorStore,
    config: &LoaderConfig,
    now: DateTime<Utc>,
) -> Result<Vec<WatchedMarket>> {
    let api_set = store
        .load_api_watch_set(
            now,
            config.horizon_hours,
            config.api_volume_floor,
            config.api_set_cap,
        )
        .await?;
    let scraped_set = store
        .load_scraped_watch_set(now, config.horizon_hours, config.scrape_set_cap)
        .await?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut markets: Vec<WatchedMarket> = Vec::with_capacity(api_set.len() + scraped_set.len());

    for market in api_set.into_iter().chain(scraped_set.into_iter()) {
        if seen.insert(market.condition_id.clone()) {
            markets.push(market);
        }
    }

    // Fill in sports the scanner could not classify; persist successes so
    // later passes skip detection
    for market in markets.iter_mut() {
        if market.sport.is_none() {
            let text = format!("{} {}", market.event_title, market.question);
            if let Some(sport) = detect_sport(&text) {
                debug!(
                    condition_id = %market.condition_id,
                    sport = sport.api_key(),
                    "Detected sport from event text"
                );
                market.sport = Some(sport);
                store.set_market_sport(&market.condition_id, sport).await?;
            }
        }
    }

    markets.sort_by_key(|m| m.event_start_time);

    info!(
        total = markets.len(),
        untagged = markets.iter().filter(|m| m.sport.is_none()).count(),
        "Watch set loaded"
    );
    Ok(markets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{MarketSource, MarketType, MonitoringStatus, Sport};
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn market(
        condition_id: &str,
        title: &str,
        source: Option<MarketSource>,
        volume: i64,
        start: DateTime<Utc>,
    ) -> WatchedMarket {
        WatchedMarket {
            condition_id: condition_id.to_string(),
            event_title: title.to_string(),
            question: title.to_string(),
            sport: Some(Sport::Nba),
            market_type: MarketType::H2h,
            yes_token_id: Some(format!("tok-{}", condition_id)),
            cached_yes_price: Some(Decimal::new(50, 2)),
            cached_volume: Some(Decimal::from(volume)),
            event_start_time: Some(start),
            monitoring_status: MonitoringStatus::Watching,
            active: true,
            source,
        }
    }

    #[tokio::test]
    async fn test_volume_floor_applies_to_api_set_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let start = now + Duration::hours(3);

        store
            .seed_market(market("api-low", "Lakers vs Celtics", Some(MarketSource::Api), 100, start))
            .await;
        store
            .seed_market(market("api-high", "Bulls vs Heat", Some(MarketSource::Api), 9000, start))
            .await;
        store
            .seed_market(market(
                "scrape-low",
                "Knicks vs Nets",
                Some(MarketSource::Firecrawl),
                100,
                start,
            ))
            .await;

        let config = LoaderConfig::default();
        let set = load_watch_set(&store, &config, now).await.unwrap();
        let ids: Vec<&str> = set.iter().map(|m| m.condition_id.as_str()).collect();

        assert!(ids.contains(&"api-high"));
        assert!(ids.contains(&"scrape-low"));
        assert!(!ids.contains(&"api-low"));
    }

    #[tokio::test]
    async fn test_dedup_first_seen_wins() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let start = now + Duration::hours(3);

        let mut api = market("dup", "Lakers vs Celtics", Some(MarketSource::Api), 9000, start);
        api.question = "api copy".to_string();
        let mut scraped = market("dup", "Lakers vs Celtics", Some(MarketSource::Firecrawl), 0, start);
        scraped.question = "scraped copy".to_string();

        // Memory store keys by condition_id; seed a market that satisfies
        // both set predicates to exercise the union path
        store.seed_market(api).await;
        let config = LoaderConfig::default();
        let set = load_watch_set(&store, &config, now).await.unwrap();
        assert_eq!(set.iter().filter(|m| m.condition_id == "dup").count(), 1);
        let _ = scraped;
    }

    #[tokio::test]
    async fn test_sport_detection_fills_and_persists() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let start = now + Duration::hours(3);

        let mut m = market("untagged", "Blackhawks vs Red Wings", Some(MarketSource::Api), 9000, start);
        m.sport = None;
        store.seed_market(m).await;

        let config = LoaderConfig::default();
        let set = load_watch_set(&store, &config, now).await.unwrap();
        assert_eq!(set[0].sport, Some(Sport::Nhl));

        let persisted = store.market("untagged").await.unwrap();
        assert_eq!(persisted.sport, Some(Sport::Nhl));
    }

    #[tokio::test]
    async fn test_ordering_by_event_start() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .seed_market(market(
                "later",
                "Bulls vs Heat",
                Some(MarketSource::Api),
                9000,
                now + Duration::hours(12),
            ))
            .await;
        store
            .seed_market(market(
                "sooner",
                "Lakers vs Celtics",
                Some(MarketSource::Api),
                9000,
                now + Duration::hours(1),
            ))
            .await;

        let config = LoaderConfig::default();
        let set = load_watch_set(&store, &config, now).await.unwrap();
        assert_eq!(set[0].condition_id, "sooner");
        assert_eq!(set[1].condition_id, "later");
    }

    #[tokio::test]
    async fn test_started_and_far_future_excluded() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .seed_market(market(
                "started",
                "Lakers vs Celtics",
                Some(MarketSource::Api),
                9000,
                now - Duration::minutes(5),
            ))
            .await;
        store
            .seed_market(market(
                "next-week",
                "Bulls vs Heat",
                Some(MarketSource::Api),
                9000,
                now + Duration::hours(30),
            ))
            .await;

        let config = LoaderConfig::default();
        let set = load_watch_set(&store, &config, now).await.unwrap();
        assert!(set.is_empty());
    }
}
