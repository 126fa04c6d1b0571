//! End-to-end decision-stage scenarios over the in-memory store
//!
//! Drives the signal builder the way a pass does: seeded cache rows,
//! seeded sharp snapshots, live exchange prices, consensus fair
//! probabilities, and asserts on the persisted signal rows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use edgeline::adapters::notifier::AlertNotifier;
use edgeline::adapters::{DetectorStore, MemoryStore};
use edgeline::config::{DetectorConfig, MovementConfig};
use edgeline::detector::matcher::MatchTier;
use edgeline::detector::signal_builder::{EvaluationInput, SignalBuilder, SkipReason, Verdict};
use edgeline::domain::{
    MarketSource, MarketType, MonitoringStatus, SharpSnapshot, SignalSide, SignalStatus,
    SignalTier, TriggerReason, WatchedMarket,
};
use rust_decimal::Decimal;
use std::sync::Mutex;

struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn send_sms(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn market(condition_id: &str, title: &str, start: DateTime<Utc>) -> WatchedMarket {
    WatchedMarket {
        condition_id: condition_id.to_string(),
        event_title: title.to_string(),
        question: format!("Will {}?", title),
        sport: Some(edgeline::domain::Sport::Nba),
        market_type: MarketType::H2h,
        yes_token_id: Some(format!("tok-{}", condition_id)),
        cached_yes_price: Some(Decimal::new(45, 2)),
        cached_volume: Some(Decimal::from(600_000)),
        event_start_time: Some(start),
        monitoring_status: MonitoringStatus::Watching,
        active: true,
        source: Some(MarketSource::Api),
    }
}

struct Harness {
    store: MemoryStore,
    notifier: RecordingNotifier,
    detector: DetectorConfig,
    movement: MovementConfig,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            notifier: RecordingNotifier::new(),
            detector: DetectorConfig::default(),
            movement: MovementConfig::default(),
        }
    }

    fn builder(&self) -> SignalBuilder<'_> {
        SignalBuilder {
            store: &self.store,
            notifier: &self.notifier,
            detector: &self.detector,
            movement: &self.movement,
        }
    }

    async fn seed_move(
        &self,
        event: &str,
        outcome: &str,
        book: &str,
        from: f64,
        to: f64,
        now: DateTime<Utc>,
    ) {
        let mut older = SharpSnapshot::new(event, outcome, book, 1.0 / from, now);
        older.captured_at = now - Duration::minutes(8);
        older.implied_probability = from;
        let mut newer = SharpSnapshot::new(event, outcome, book, 1.0 / to, now);
        newer.captured_at = now - Duration::minutes(1);
        newer.implied_probability = to;
        self.store.seed_snapshot(older).await;
        self.store.seed_snapshot(newer).await;
    }
}

fn input<'a>(
    m: &'a WatchedMarket,
    yes_label: &'a str,
    no_label: &'a str,
    yes_fair: f64,
    no_fair: f64,
    live_yes_price: f64,
) -> EvaluationInput<'a> {
    EvaluationInput {
        market: m,
        yes_label,
        no_label,
        yes_fair,
        no_fair,
        books_used: 5,
        live_yes_price,
        quote_is_live: true,
        spread: Some(0.004),
        match_tier: MatchTier::Direct,
    }
}

// Scenario: clean edge, no movement
#[tokio::test]
async fn clean_edge_without_movement_emits_strong_yes() {
    let h = Harness::new();
    let now = Utc::now();
    let m = market("c1", "Los Angeles Lakers vs Boston Celtics", now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    let verdict = h
        .builder()
        .evaluate(
            input(&m, "Los Angeles Lakers", "Boston Celtics", 0.55, 0.45, 0.45),
            now,
        )
        .await
        .unwrap();

    let Verdict::Emitted {
        tier,
        inserted,
        alerted,
        movement_confirmed,
    } = verdict
    else {
        panic!("expected emitted, got {:?}", verdict);
    };
    assert_eq!(tier, SignalTier::Strong);
    assert!(inserted);
    assert!(alerted);
    assert!(!movement_confirmed);

    let signal = h
        .store
        .find_signal("Los Angeles Lakers vs Boston Celtics", "Los Angeles Lakers")
        .await
        .unwrap()
        .expect("signal persisted");
    assert_eq!(signal.side, SignalSide::Yes);
    assert!((signal.polymarket_price - 0.45).abs() < 1e-9);
    assert!((signal.edge_percent - 10.0).abs() < 1e-9);
    assert_eq!(
        signal.signal_factors.trigger_reason,
        Some(TriggerReason::Edge)
    );
    assert_eq!(h.notifier.sent().len(), 1);
}

// Scenario: coordinated sharp movement confirms the NO side
#[tokio::test]
async fn movement_on_no_side_emits_elite() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "Los Angeles Lakers vs Boston Celtics";
    let m = market("c2", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    h.seed_move(event, "Boston Celtics", "pinnacle", 0.45, 0.52, now)
        .await;
    h.seed_move(event, "Boston Celtics", "betfair", 0.46, 0.53, now)
        .await;

    // Fair probabilities already reflect the sharp move
    let verdict = h
        .builder()
        .evaluate(
            input(&m, "Los Angeles Lakers", "Boston Celtics", 0.47, 0.53, 0.52),
            now,
        )
        .await
        .unwrap();

    let Verdict::Emitted {
        tier,
        movement_confirmed,
        ..
    } = verdict
    else {
        panic!("expected emitted, got {:?}", verdict);
    };
    assert_eq!(tier, SignalTier::Elite);
    assert!(movement_confirmed);

    let signal = h
        .store
        .find_signal(event, "Boston Celtics")
        .await
        .unwrap()
        .expect("signal persisted");
    assert_eq!(signal.side, SignalSide::No);
    // NO side is priced at 1 - yes_price
    assert!((signal.polymarket_price - 0.48).abs() < 1e-9);
    assert_eq!(
        signal.signal_factors.trigger_reason,
        Some(TriggerReason::Both)
    );
}

// Scenario: modest legitimate edge with a large swap-edge proceeds
#[tokio::test]
async fn swap_test_allows_modest_real_edge() {
    let h = Harness::new();
    let now = Utc::now();
    let m = market("c3", "Flyers vs Bruins", now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    let verdict = h
        .builder()
        .evaluate(
            input(&m, "Flyers", "Bruins", 0.25, 0.75, 0.20),
            now,
        )
        .await
        .unwrap();

    let Verdict::Emitted { tier, .. } = verdict else {
        panic!("expected emitted, got {:?}", verdict);
    };
    // raw edge 0.05: edge trigger fires, no movement
    assert_eq!(tier, SignalTier::Static);

    let signal = h
        .store
        .find_signal("Flyers vs Bruins", "Flyers")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal.side, SignalSide::Yes);
    assert!(signal
        .signal_factors
        .notes
        .iter()
        .any(|n| n == "MAPPING_ALLOWED_DESPITE_SWAP"));
}

// Boundary: suspected inversion blocks outright
#[tokio::test]
async fn swap_test_blocks_suspected_inversion() {
    let h = Harness::new();
    let now = Utc::now();
    let m = market("c4", "Flyers vs Bruins", now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    // Direct edges are negligible; swapped edges are huge
    let verdict = h
        .builder()
        .evaluate(
            input(&m, "Flyers", "Bruins", 0.205, 0.795, 0.20),
            now,
        )
        .await
        .unwrap();

    assert!(matches!(
        verdict,
        Verdict::Skipped(SkipReason::MappingInversion)
    ));
    assert!(h
        .store
        .find_signal("Flyers vs Bruins", "Flyers")
        .await
        .unwrap()
        .is_none());
}

// Scenario: stale high-probability edge is an artefact
#[tokio::test]
async fn stale_high_prob_edge_skipped() {
    let h = Harness::new();
    let now = Utc::now();
    let m = market("c5", "Favorites vs Underdogs", now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    // Quote came from the cache; last refresh 4 minutes ago
    let mut state = edgeline::domain::EventWatchState::monitored("c5");
    state.last_poly_refresh = Some(now - Duration::minutes(4));
    h.store.upsert_watch_state(&state).await.unwrap();

    let mut evaluation = input(&m, "Favorites", "Underdogs", 0.88, 0.12, 0.55);
    evaluation.quote_is_live = false;

    let verdict = h.builder().evaluate(evaluation, now).await.unwrap();
    assert!(matches!(verdict, Verdict::Skipped(SkipReason::StaleHighProb)));
}

// Extreme edge on a heavy favorite is capped, not dropped
#[tokio::test]
async fn extreme_edge_capped_at_forty_percent() {
    let h = Harness::new();
    let now = Utc::now();
    let m = market("c6", "Favorites vs Underdogs", now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    let verdict = h
        .builder()
        .evaluate(
            input(&m, "Favorites", "Underdogs", 0.92, 0.08, 0.40),
            now,
        )
        .await
        .unwrap();
    assert!(matches!(verdict, Verdict::Emitted { .. }));

    let signal = h
        .store
        .find_signal("Favorites vs Underdogs", "Favorites")
        .await
        .unwrap()
        .unwrap();
    assert!((signal.edge_percent - 40.0).abs() < 1e-9);
    assert!(signal
        .signal_factors
        .notes
        .iter()
        .any(|n| n == "EXTREME_EDGE_CAPPED"));
}

// Scenario: one-signal-per-event replacement
#[tokio::test]
async fn superseding_outcome_expires_previous_signal() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c7", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    // Pass 1: edge on A
    let v1 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.55, 0.45, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(v1, Verdict::Emitted { inserted: true, .. }));

    // Pass 2: edge flips to B
    let v2 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.40, 0.60, 0.52), now)
        .await
        .unwrap();
    assert!(matches!(v2, Verdict::Emitted { inserted: true, .. }));

    let active: Vec<_> = h
        .store
        .all_signals()
        .await
        .into_iter()
        .filter(|s| s.status == SignalStatus::Active)
        .collect();
    assert_eq!(active.len(), 1, "exactly one active signal per event");
    assert_eq!(active[0].recommended_outcome, "B Team");
    assert_eq!(active[0].side, SignalSide::No);
}

// Re-evaluating the same outcome updates in place, without re-alerting
#[tokio::test]
async fn same_outcome_updates_in_place() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c8", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    let v1 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.55, 0.45, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(v1, Verdict::Emitted { inserted: true, .. }));

    let v2 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.56, 0.44, 0.45), now)
        .await
        .unwrap();
    let Verdict::Emitted {
        inserted, alerted, ..
    } = v2
    else {
        panic!("expected emitted");
    };
    assert!(!inserted);
    assert!(!alerted);

    let all = h.store.all_signals().await;
    assert_eq!(all.len(), 1, "updated in place, not duplicated");
    assert_eq!(h.notifier.sent().len(), 1, "alert only on first insert");
}

// Boundary: dismissed signals are terminal for that (event, outcome)
#[tokio::test]
async fn dismissed_signal_not_recreated() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c9", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    let v1 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.55, 0.45, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(v1, Verdict::Emitted { .. }));

    // User dismisses it out of band
    let mut signal = h
        .store
        .find_signal(event, "A Team")
        .await
        .unwrap()
        .unwrap();
    signal.status = SignalStatus::Dismissed;
    h.store.update_signal(&signal).await.unwrap();

    let v2 = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.60, 0.40, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(v2, Verdict::Skipped(SkipReason::TerminalSignal)));

    let active: Vec<_> = h
        .store
        .all_signals()
        .await
        .into_iter()
        .filter(|s| s.status == SignalStatus::Active)
        .collect();
    assert!(active.is_empty());
}

// Boundary: raw edge below the floor waits even with movement
#[tokio::test]
async fn edge_below_floor_waits_despite_movement() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c10", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    h.seed_move(event, "A Team", "pinnacle", 0.40, 0.47, now).await;
    h.seed_move(event, "A Team", "betfair", 0.41, 0.48, now).await;

    let verdict = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.469, 0.531, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(verdict, Verdict::Skipped(SkipReason::BelowEdgeFloor)));
}

// Movement between the floor and the edge trigger fires via movement alone
#[tokio::test]
async fn movement_trigger_fires_between_floor_and_edge_trigger() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c11", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    h.seed_move(event, "A Team", "pinnacle", 0.40, 0.47, now).await;
    h.seed_move(event, "A Team", "betfair", 0.41, 0.48, now).await;

    // 3% raw edge: below the 5% edge trigger, above the 2% floor
    let verdict = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.48, 0.52, 0.45), now)
        .await
        .unwrap();
    let Verdict::Emitted {
        tier,
        movement_confirmed,
        ..
    } = verdict
    else {
        panic!("expected emitted, got {:?}", verdict);
    };
    assert!(movement_confirmed);
    assert_eq!(tier, SignalTier::Strong);

    let signal = h.store.find_signal(event, "A Team").await.unwrap().unwrap();
    assert_eq!(
        signal.signal_factors.trigger_reason,
        Some(TriggerReason::Movement)
    );
}

// Boundary: event starting now expires instead of signaling
#[tokio::test]
async fn event_start_expires_market() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c12", event, now);
    h.store.seed_market(m.clone()).await;

    let verdict = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.60, 0.40, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(verdict, Verdict::EventExpired));

    let market_row = h.store.market("c12").await.unwrap();
    assert_eq!(market_row.monitoring_status, MonitoringStatus::Expired);
    assert!(h.store.find_signal(event, "A Team").await.unwrap().is_none());
}

// Boundary: missing YES token skips before anything else
#[tokio::test]
async fn missing_token_skips_market() {
    let h = Harness::new();
    let now = Utc::now();
    let mut m = market("c13", "A vs B", now + Duration::hours(3));
    m.yes_token_id = None;
    h.store.seed_market(m.clone()).await;

    let verdict = h
        .builder()
        .evaluate(input(&m, "A Team", "B Team", 0.60, 0.40, 0.45), now)
        .await
        .unwrap();
    assert!(matches!(verdict, Verdict::Skipped(SkipReason::NoTokenId)));
    assert!(h.store.all_signals().await.is_empty());
}

// Idempotence: identical inputs twice leave identical terminal state
#[tokio::test]
async fn repeated_pass_is_idempotent() {
    let h = Harness::new();
    let now = Utc::now();
    let event = "A vs B";
    let m = market("c14", event, now + Duration::hours(3));
    h.store.seed_market(m.clone()).await;

    for _ in 0..2 {
        let verdict = h
            .builder()
            .evaluate(input(&m, "A Team", "B Team", 0.55, 0.45, 0.45), now)
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Emitted { .. }));
    }

    let all = h.store.all_signals().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, SignalStatus::Active);
    assert!((all[0].edge_percent - 10.0).abs() < 1e-9);
}
