use crate::adapters::store::DetectorStore;
use crate::domain::{
    EventWatchState, MarketSource, MarketType, MonitoringStatus, SharpSnapshot, SignalFactors,
    SignalOpportunity, SignalSide, SignalStatus, SignalTier, Sport, Urgency, WatchState,
    WatchedMarket,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_market(row: &sqlx::postgres::PgRow) -> WatchedMarket {
        WatchedMarket {
            condition_id: row.get("condition_id"),
            event_title: row.get("event_title"),
            question: row.get("question"),
            sport: row
                .get::<Option<String>, _>("sport_code")
                .and_then(|s| Sport::try_from(s.as_str()).ok()),
            market_type: row
                .get::<String, _>("market_type")
                .as_str()
                .try_into()
                .unwrap_or(MarketType::H2h),
            yes_token_id: row.get("yes_token_id"),
            cached_yes_price: row.get("yes_price"),
            cached_volume: row.get("volume"),
            event_start_time: row.get("event_start_time"),
            monitoring_status: row
                .get::<String, _>("monitoring_status")
                .as_str()
                .try_into()
                .unwrap_or(MonitoringStatus::Idle),
            active: row.get::<String, _>("status") == "active",
            source: row
                .get::<Option<String>, _>("source")
                .and_then(|s| MarketSource::try_from(s.as_str()).ok()),
        }
    }

    fn row_to_snapshot(row: &sqlx::postgres::PgRow) -> SharpSnapshot {
        SharpSnapshot {
            id: Some(row.get("id")),
            event_key: row.get("event_key"),
            event_name: row.get("event_name"),
            outcome: row.get("outcome"),
            bookmaker: row.get("bookmaker"),
            implied_probability: row.get("implied_probability"),
            raw_odds: row.get("raw_odds"),
            captured_at: row.get("captured_at"),
        }
    }

    fn row_to_signal(row: &sqlx::postgres::PgRow) -> SignalOpportunity {
        let factors: Option<serde_json::Value> = row.get("signal_factors");
        SignalOpportunity {
            id: Some(row.get("id")),
            condition_id: row.get("condition_id"),
            event_name: row.get("event_name"),
            recommended_outcome: row.get("recommended_outcome"),
            side: row
                .get::<String, _>("side")
                .as_str()
                .try_into()
                .unwrap_or(SignalSide::Yes),
            polymarket_price: row.get("polymarket_price"),
            bookmaker_prob_fair: row.get("bookmaker_prob_fair"),
            edge_percent: row.get("edge_percent"),
            signal_strength: row.get("signal_strength"),
            signal_tier: row
                .get::<String, _>("signal_tier")
                .as_str()
                .try_into()
                .unwrap_or(SignalTier::Static),
            movement_confirmed: row.get("movement_confirmed"),
            movement_velocity: row.get("movement_velocity"),
            confidence_score: row.get("confidence_score"),
            urgency: row
                .get::<String, _>("urgency")
                .as_str()
                .try_into()
                .unwrap_or(Urgency::Normal),
            status: row
                .get::<String, _>("status")
                .as_str()
                .try_into()
                .unwrap_or(SignalStatus::Active),
            polymarket_yes_price: row.get("polymarket_yes_price"),
            polymarket_volume: row.get("polymarket_volume"),
            polymarket_updated_at: row.get("polymarket_updated_at"),
            event_start_time: row.get("event_start_time"),
            expires_at: row.get("expires_at"),
            signal_factors: factors
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_else(SignalFactors::default),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl DetectorStore for PostgresStore {
    async fn load_api_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        volume_floor: f64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>> {
        let horizon = now + Duration::hours(horizon_hours);
        let floor = Decimal::try_from(volume_floor).unwrap_or(Decimal::ZERO);

        let rows = sqlx::query(
            r#"
            SELECT condition_id, event_title, question, sport_code, market_type,
                   yes_token_id, yes_price, volume, event_start_time,
                   monitoring_status, status, source
            FROM polymarket_h2h_cache
            WHERE (source IS NULL OR source = 'api')
              AND volume >= $1
              AND monitoring_status IN ('watching', 'triggered')
              AND status = 'active'
              AND event_start_time > $2
              AND event_start_time <= $3
            ORDER BY event_start_time ASC
            LIMIT $4
            "#,
        )
        .bind(floor)
        .bind(now)
        .bind(horizon)
        .bind(cap)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_market).collect())
    }

    async fn load_scraped_watch_set(
        &self,
        now: DateTime<Utc>,
        horizon_hours: i64,
        cap: i64,
    ) -> Result<Vec<WatchedMarket>> {
        let horizon = now + Duration::hours(horizon_hours);

        let rows = sqlx::query(
            r#"
            SELECT condition_id, event_title, question, sport_code, market_type,
                   yes_token_id, yes_price, volume, event_start_time,
                   monitoring_status, status, source
            FROM polymarket_h2h_cache
            WHERE source = 'firecrawl'
              AND monitoring_status IN ('watching', 'triggered')
              AND status = 'active'
              AND event_start_time > $1
              AND event_start_time <= $2
            ORDER BY event_start_time ASC
            LIMIT $3
            "#,
        )
        .bind(now)
        .bind(horizon)
        .bind(cap)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_market).collect())
    }

    async fn get_market(&self, condition_id: &str) -> Result<Option<WatchedMarket>> {
        let row = sqlx::query(
            r#"
            SELECT condition_id, event_title, question, sport_code, market_type,
                   yes_token_id, yes_price, volume, event_start_time,
                   monitoring_status, status, source
            FROM polymarket_h2h_cache
            WHERE condition_id = $1
            "#,
        )
        .bind(condition_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::row_to_market(&r)))
    }

    async fn update_market_cache_price(
        &self,
        condition_id: &str,
        yes_price: Decimal,
        volume: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE polymarket_h2h_cache
            SET yes_price = $2,
                volume = COALESCE($3, volume),
                updated_at = $4
            WHERE condition_id = $1
            "#,
        )
        .bind(condition_id)
        .bind(yes_price)
        .bind(volume)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_monitoring_status(
        &self,
        condition_id: &str,
        status: MonitoringStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE polymarket_h2h_cache
            SET monitoring_status = $2, updated_at = NOW()
            WHERE condition_id = $1
            "#,
        )
        .bind(condition_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_market_sport(&self, condition_id: &str, sport: Sport) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE polymarket_h2h_cache
            SET sport_code = $2, updated_at = NOW()
            WHERE condition_id = $1
            "#,
        )
        .bind(condition_id)
        .bind(sport.api_key())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_snapshots(&self, snapshots: &[SharpSnapshot]) -> Result<u64> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for snap in snapshots {
            let result = sqlx::query(
                r#"
                INSERT INTO sharp_book_snapshots
                    (event_key, event_name, outcome, bookmaker,
                     implied_probability, raw_odds, captured_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (event_key, outcome, bookmaker, captured_at) DO NOTHING
                "#,
            )
            .bind(&snap.event_key)
            .bind(&snap.event_name)
            .bind(&snap.outcome)
            .bind(&snap.bookmaker)
            .bind(snap.implied_probability)
            .bind(snap.raw_odds)
            .bind(snap.captured_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Inserted {} sharp snapshots", written);
        Ok(written)
    }

    async fn snapshots_since(
        &self,
        event_key: &str,
        outcome: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SharpSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_key, event_name, outcome, bookmaker,
                   implied_probability, raw_odds, captured_at
            FROM sharp_book_snapshots
            WHERE event_key = $1 AND outcome = $2 AND captured_at >= $3
            ORDER BY captured_at ASC
            "#,
        )
        .bind(event_key)
        .bind(outcome)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_snapshot).collect())
    }

    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sharp_book_snapshots WHERE captured_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_watch_state(&self, condition_id: &str) -> Result<Option<EventWatchState>> {
        let row = sqlx::query(
            r#"
            SELECT polymarket_condition_id, watch_state, last_poly_refresh,
                   current_probability, polymarket_matched
            FROM event_watch_state
            WHERE polymarket_condition_id = $1
            "#,
        )
        .bind(condition_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EventWatchState {
            condition_id: r.get("polymarket_condition_id"),
            watch_state: r
                .get::<String, _>("watch_state")
                .as_str()
                .try_into()
                .unwrap_or(WatchState::Monitored),
            last_poly_refresh: r.get("last_poly_refresh"),
            current_probability: r.get("current_probability"),
            polymarket_matched: r.get("polymarket_matched"),
        }))
    }

    async fn upsert_watch_state(&self, state: &EventWatchState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_watch_state
                (polymarket_condition_id, watch_state, last_poly_refresh,
                 current_probability, polymarket_matched)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (polymarket_condition_id) DO UPDATE SET
                watch_state = EXCLUDED.watch_state,
                last_poly_refresh = EXCLUDED.last_poly_refresh,
                current_probability = EXCLUDED.current_probability,
                polymarket_matched = EXCLUDED.polymarket_matched
            "#,
        )
        .bind(&state.condition_id)
        .bind(state.watch_state.as_str())
        .bind(state.last_poly_refresh)
        .bind(state.current_probability)
        .bind(state.polymarket_matched)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_signal(
        &self,
        event_name: &str,
        outcome: &str,
    ) -> Result<Option<SignalOpportunity>> {
        let row = sqlx::query(
            r#"
            SELECT id, condition_id, event_name, recommended_outcome, side,
                   polymarket_price, bookmaker_prob_fair, edge_percent,
                   signal_strength, signal_tier, movement_confirmed,
                   movement_velocity, confidence_score, urgency, status,
                   polymarket_yes_price, polymarket_volume, polymarket_updated_at,
                   event_start_time, expires_at,
                   signal_factors, created_at, updated_at
            FROM signal_opportunities
            WHERE event_name = $1
              AND recommended_outcome = $2
              AND status IN ('active', 'executed', 'dismissed')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(event_name)
        .bind(outcome)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::row_to_signal(&r)))
    }

    async fn active_signals_for_event(&self, event_name: &str) -> Result<Vec<SignalOpportunity>> {
        let rows = sqlx::query(
            r#"
            SELECT id, condition_id, event_name, recommended_outcome, side,
                   polymarket_price, bookmaker_prob_fair, edge_percent,
                   signal_strength, signal_tier, movement_confirmed,
                   movement_velocity, confidence_score, urgency, status,
                   polymarket_yes_price, polymarket_volume, polymarket_updated_at,
                   event_start_time, expires_at,
                   signal_factors, created_at, updated_at
            FROM signal_opportunities
            WHERE event_name = $1 AND status = 'active'
            "#,
        )
        .bind(event_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_signal).collect())
    }

    async fn list_active_signals(&self) -> Result<Vec<SignalOpportunity>> {
        let rows = sqlx::query(
            r#"
            SELECT id, condition_id, event_name, recommended_outcome, side,
                   polymarket_price, bookmaker_prob_fair, edge_percent,
                   signal_strength, signal_tier, movement_confirmed,
                   movement_velocity, confidence_score, urgency, status,
                   polymarket_yes_price, polymarket_volume, polymarket_updated_at,
                   event_start_time, expires_at,
                   signal_factors, created_at, updated_at
            FROM signal_opportunities
            WHERE status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_signal).collect())
    }

    async fn expire_signal(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE signal_opportunities
            SET status = 'expired', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_signal(&self, signal: &SignalOpportunity) -> Result<Uuid> {
        let id = signal.id.unwrap_or_else(Uuid::new_v4);

        sqlx::query(
            r#"
            INSERT INTO signal_opportunities
                (id, condition_id, event_name, recommended_outcome, side,
                 polymarket_price, bookmaker_prob_fair, edge_percent,
                 signal_strength, signal_tier, movement_confirmed,
                 movement_velocity, confidence_score, urgency, status,
                 polymarket_volume, event_start_time, expires_at,
                 signal_factors, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&signal.condition_id)
        .bind(&signal.event_name)
        .bind(&signal.recommended_outcome)
        .bind(signal.side.as_str())
        .bind(signal.polymarket_price)
        .bind(signal.bookmaker_prob_fair)
        .bind(signal.edge_percent)
        .bind(signal.signal_strength)
        .bind(signal.signal_tier.as_str())
        .bind(signal.movement_confirmed)
        .bind(signal.movement_velocity)
        .bind(signal.confidence_score)
        .bind(signal.urgency.as_str())
        .bind(signal.status.as_str())
        .bind(signal.polymarket_volume)
        .bind(signal.event_start_time)
        .bind(signal.expires_at)
        .bind(signal.signal_factors.to_json())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_signal(&self, signal: &SignalOpportunity) -> Result<()> {
        let id = signal.id.ok_or_else(|| {
            crate::error::EdgelineError::Validation("update_signal requires an id".into())
        })?;

        sqlx::query(
            r#"
            UPDATE signal_opportunities
            SET side = $2,
                polymarket_price = $3,
                bookmaker_prob_fair = $4,
                edge_percent = $5,
                signal_strength = $6,
                signal_tier = $7,
                movement_confirmed = $8,
                movement_velocity = $9,
                confidence_score = $10,
                urgency = $11,
                polymarket_volume = $12,
                expires_at = $13,
                signal_factors = $14,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(signal.side.as_str())
        .bind(signal.polymarket_price)
        .bind(signal.bookmaker_prob_fair)
        .bind(signal.edge_percent)
        .bind(signal.signal_strength)
        .bind(signal.signal_tier.as_str())
        .bind(signal.movement_confirmed)
        .bind(signal.movement_velocity)
        .bind(signal.confidence_score)
        .bind(signal.urgency.as_str())
        .bind(signal.polymarket_volume)
        .bind(signal.expires_at)
        .bind(signal.signal_factors.to_json())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn refresh_signal_price(
        &self,
        id: Uuid,
        price: f64,
        volume: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE signal_opportunities
            SET polymarket_yes_price = $2,
                polymarket_volume = COALESCE($3, polymarket_volume),
                polymarket_updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(price)
        .bind(volume)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
