//! In-memory store
//!
//! Implements the full persistence contract over process memory. Used for
//! dry runs without a database and by the integration tests; behavior
//! mirrors the PostgreSQL adapter's keys and filters.

use crate::adapters::store::DetectorStore;
use crate::domain::{
    EventWatchState, MonitoringStatus, SharpSnapshot, SignalOpportunity, SignalStatus, Sport,
    WatchedMarket,
};
use crate::error::{EdgelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    markets: RwLock<HashMap<String, WatchedMarket>>,
    snapshots: RwLock<Vec<SharpSnapshot>>,
    watch_states: RwLock<HashMap<String, EventWatchState>>,
    signals: RwLock<Vec<SignalOpportunity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the market cache (scanner stand-in)
    pub async fn seed_market(&self, market: WatchedMarket) {
        self.markets
            .write()
            .await
            .insert(market.condition_id.clone(), market);
    }

    pub async fn seed_snapshot(&self, snapshot: SharpSnapshot) {
        self.snapshots.write().await.push(snapshot);
    }

    pub async fn market(&self, condition_id: &str) -> Option<WatchedMarket> {
        self.markets.read().await.get(condition_id).cloned()
    }

    pub async fn all_signals(&self) -> Vec<SignalOpportunity> {
        self.signals.read().await.clone()
    }

    fn in_window(
        market: &WatchedMarket,
        now: DateTime<Utc>,
        horizon_hours: i64,
    ) -> bool {
        match market.event_start_time {
            Some(start) => start > now && start <= now + Duration::hours(horizon_hours),
            None => false,
        }
    }

    fn is_watchable(market: &WatchedMarket) -> bool {
        market.active
            && matches!(
                market.monitoring_status,
                MonitoringStatus::Watching | MonitoringStatus::Triggered
            )
    }
}

#[async_trait]
impl DetectorStore for MemoryStore {
    async fn load_api_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        volume_floor: f64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>> {
        let markets = self.markets.read().await;
        let mut out: Vec<WatchedMarket> = markets
            .values()
            .filter(|m| {
                m.source.map(|s| s.as_str() == "api").unwrap_or(true)
                    && m.cached_volume
                        .and_then(|v| v.to_f64())
                        .map(|v| v >= volume_floor)
                        .unwrap_or(false)
                    && Self::is_watchable(m)
                    && Self::in_window(m, now, horizon_hours)
            })
            .cloned()
            .collect();
        out.sort_by_key(|m| m.event_start_time);
        out.truncate(cap.max(0) as usize);
        Ok(out)
    }

    async fn load_scraped_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>> {
        let markets = self.markets.read().await;
        let mut out: Vec<WatchedMarket> = markets
            .values()
            .filter(|m| {
                m.source.map(|s| s.as_str() == "firecrawl").unwrap_or(false)
                    && Self::is_watchable(m)
                    && Self::in_window(m, now, horizon_hours)
            })
            .cloned()
            .collect();
        out.sort_by_key(|m| m.event_start_time);
        out.truncate(cap.max(0) as usize);
        Ok(out)
    }

    async fn get_market(&self, condition_id: &str) -> Result<Option<WatchedMarket>> {
        Ok(self.markets.read().await.get(condition_id).cloned())
    }

    async fn update_market_cache_price(
        &self,
        condition_id: &str,
        yes_price: Decimal,
        volume: Option<Decimal>,
        _at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(market) = self.markets.write().await.get_mut(condition_id) {
            market.cached_yes_price = Some(yes_price);
            if volume.is_some() {
                market.cached_volume = volume;
            }
        }
        Ok(())
    }

    async fn set_monitoring_status(
        &self,
        condition_id: &str,
        status: MonitoringStatus,
    ) -> Result<()> {
        if let Some(market) = self.markets.write().await.get_mut(condition_id) {
            market.monitoring_status = status;
        }
        Ok(())
    }

    async fn set_market_sport(&self, condition_id: &str, sport: Sport) -> Result<()> {
        if let Some(market) = self.markets.write().await.get_mut(condition_id) {
            market.sport = Some(sport);
        }
        Ok(())
    }

    async fn insert_snapshots(&self, snapshots: &[SharpSnapshot]) -> Result<u64> {
        let mut store = self.snapshots.write().await;
        let mut written = 0u64;
        for snap in snapshots {
            let duplicate = store.iter().any(|s| {
                s.event_key == snap.event_key
                    && s.outcome == snap.outcome
                    && s.bookmaker == snap.bookmaker
                    && s.captured_at == snap.captured_at
            });
            if !duplicate {
                let mut owned = snap.clone();
                owned.id = Some(store.len() as i64 + 1);
                store.push(owned);
                written += 1;
            }
        }
        Ok(written)
    }

    async fn snapshots_since(
        &self,
        event_key: &str,
        outcome: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SharpSnapshot>> {
        let store = self.snapshots.read().await;
        let mut out: Vec<SharpSnapshot> = store
            .iter()
            .filter(|s| {
                s.event_key == event_key && s.outcome == outcome && s.captured_at >= since
            })
            .cloned()
            .collect();
        out.sort_by_key(|s| s.captured_at);
        Ok(out)
    }

    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut store = self.snapshots.write().await;
        let before = store.len();
        store.retain(|s| s.captured_at >= cutoff);
        Ok((before - store.len()) as u64)
    }

    async fn get_watch_state(&self, condition_id: &str) -> Result<Option<EventWatchState>> {
        Ok(self.watch_states.read().await.get(condition_id).cloned())
    }

    async fn upsert_watch_state(&self, state: &EventWatchState) -> Result<()> {
        self.watch_states
            .write()
            .await
            .insert(state.condition_id.clone(), state.clone());
        Ok(())
    }

    async fn find_signal(
        &self,
        event_name: &str,
        outcome: &str,
    ) -> Result<Option<SignalOpportunity>> {
        let signals = self.signals.read().await;
        Ok(signals
            .iter()
            .filter(|s| {
                s.event_name == event_name
                    && s.recommended_outcome == outcome
                    && s.status != SignalStatus::Expired
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn active_signals_for_event(&self, event_name: &str) -> Result<Vec<SignalOpportunity>> {
        let signals = self.signals.read().await;
        Ok(signals
            .iter()
            .filter(|s| s.event_name == event_name && s.status == SignalStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_active_signals(&self) -> Result<Vec<SignalOpportunity>> {
        let signals = self.signals.read().await;
        Ok(signals
            .iter()
            .filter(|s| s.status == SignalStatus::Active)
            .cloned()
            .collect())
    }

    async fn expire_signal(&self, id: Uuid) -> Result<()> {
        let mut signals = self.signals.write().await;
        for signal in signals.iter_mut() {
            if signal.id == Some(id) && signal.status == SignalStatus::Active {
                signal.status = SignalStatus::Expired;
                signal.updated_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn insert_signal(&self, signal: &SignalOpportunity) -> Result<Uuid> {
        let id = signal.id.unwrap_or_else(Uuid::new_v4);
        let mut owned = signal.clone();
        owned.id = Some(id);
        owned.created_at = Some(owned.created_at.unwrap_or_else(Utc::now));
        owned.updated_at = Some(Utc::now());
        self.signals.write().await.push(owned);
        Ok(id)
    }

    async fn update_signal(&self, signal: &SignalOpportunity) -> Result<()> {
        let id = signal
            .id
            .ok_or_else(|| EdgelineError::Validation("update_signal requires an id".into()))?;
        let mut signals = self.signals.write().await;
        for existing in signals.iter_mut() {
            if existing.id == Some(id) {
                let created_at = existing.created_at;
                *existing = signal.clone();
                existing.created_at = created_at;
                existing.updated_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(EdgelineError::Validation(format!(
            "signal {} not found",
            id
        )))
    }

    async fn refresh_signal_price(
        &self,
        id: Uuid,
        price: f64,
        volume: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut signals = self.signals.write().await;
        for signal in signals.iter_mut() {
            if signal.id == Some(id) {
                signal.polymarket_yes_price = Some(price);
                if volume.is_some() {
                    signal.polymarket_volume = volume;
                }
                signal.polymarket_updated_at = Some(at);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
