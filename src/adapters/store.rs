//! Persistence contract for the detection pipeline
//!
//! Pure CRUD over the market cache, the sharp-snapshot time series, event
//! watch rows, and signal rows. All reads are read-your-writes within a
//! pass; idempotence comes from upsert keys, not transactions.

use crate::domain::{
    EventWatchState, MonitoringStatus, SharpSnapshot, SignalOpportunity, Sport, WatchedMarket,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[async_trait]
pub trait DetectorStore: Send + Sync {
    // ==================== Market cache ====================

    /// API-sourced watch set: `source IN (api, NULL)`, volume at or above the
    /// floor, watching/triggered, active, event inside `(now, now + horizon]`.
    /// Ordered by event start ascending, capped.
    async fn load_api_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        volume_floor: f64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>>;

    /// Scrape-sourced watch set: `source = firecrawl`, no volume filter,
    /// same status/time constraints, own cap.
    async fn load_scraped_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>>;

    /// Single cached market row by primary key
    async fn get_market(&self, condition_id: &str) -> Result<Option<WatchedMarket>>;

    async fn update_market_cache_price(
        &self,
        condition_id: &str,
        yes_price: Decimal,
        volume: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_monitoring_status(
        &self,
        condition_id: &str,
        status: MonitoringStatus,
    ) -> Result<()>;

    /// Persist a sport detected from free text so later passes skip detection
    async fn set_market_sport(&self, condition_id: &str, sport: Sport) -> Result<()>;

    // ==================== Sharp snapshots ====================

    /// Append-only; duplicates on (event_key, outcome, bookmaker, captured_at)
    /// are ignored. Returns rows actually written.
    async fn insert_snapshots(&self, snapshots: &[SharpSnapshot]) -> Result<u64>;

    /// Snapshots for one series since `since`, ascending by capture time
    async fn snapshots_since(
        &self,
        event_key: &str,
        outcome: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SharpSnapshot>>;

    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    // ==================== Event watch state ====================

    async fn get_watch_state(&self, condition_id: &str) -> Result<Option<EventWatchState>>;

    async fn upsert_watch_state(&self, state: &EventWatchState) -> Result<()>;

    // ==================== Signals ====================

    /// Latest non-expired row for (event, outcome) — active, executed, or
    /// dismissed. Expired rows never block recreation.
    async fn find_signal(
        &self,
        event_name: &str,
        outcome: &str,
    ) -> Result<Option<SignalOpportunity>>;

    async fn active_signals_for_event(&self, event_name: &str) -> Result<Vec<SignalOpportunity>>;

    async fn list_active_signals(&self) -> Result<Vec<SignalOpportunity>>;

    async fn expire_signal(&self, id: Uuid) -> Result<()>;

    async fn insert_signal(&self, signal: &SignalOpportunity) -> Result<Uuid>;

    async fn update_signal(&self, signal: &SignalOpportunity) -> Result<()>;

    /// Stateless dashboard refresh: update price fields only
    async fn refresh_signal_price(
        &self,
        id: Uuid,
        price: f64,
        volume: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    // ==================== Health ====================

    async fn ping(&self) -> Result<()>;
}
