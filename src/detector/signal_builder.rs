//! Signal construction and persistence
//!
//! Combines exchange price, consensus fair probabilities, and movement
//! into at most one active signal per event. Safety rails run in a fixed
//! order; side inversion protection is deliberately layered because each
//! gate addresses a distinct failure mode.

use crate::adapters::notifier::AlertNotifier;
use crate::adapters::store::DetectorStore;
use crate::config::{DetectorConfig, MovementConfig};
use crate::detector::matcher::MatchTier;
use crate::detector::movement::{detect_movement, MovementResult};
use crate::domain::{
    event_key, EventWatchState, MonitoringStatus, MovementDirection, SignalFactors,
    SignalOpportunity, SignalSide, SignalStatus, SignalTier, TriggerReason, Urgency, WatchState,
    WatchedMarket,
};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Slack for threshold comparisons on derived probabilities, where float
/// subtraction can land a boundary edge a hair under its nominal value
const EDGE_EPSILON: f64 = 1e-9;

/// Why a market produced no signal this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTokenId,
    NoPositiveEdge,
    BelowEdgeFloor,
    MappingInversion,
    StaleHighProb,
    NoTrigger,
    SideGate,
    TerminalSignal,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoTokenId => "NO_TOKEN_ID_SKIP",
            SkipReason::NoPositiveEdge => "NO_POSITIVE_EDGE",
            SkipReason::BelowEdgeFloor => "BELOW_EDGE_FLOOR",
            SkipReason::MappingInversion => "MAPPING_INVERSION_BLOCK",
            SkipReason::StaleHighProb => "STALE_PRICE_SKIP",
            SkipReason::NoTrigger => "NO_TRIGGER",
            SkipReason::SideGate => "SIDE_GATE_SKIP",
            SkipReason::TerminalSignal => "TERMINAL_SIGNAL_SKIP",
        }
    }
}

/// Per-market outcome of the decision stage
#[derive(Debug)]
pub enum Verdict {
    Skipped(SkipReason),
    EventExpired,
    Emitted {
        tier: SignalTier,
        inserted: bool,
        alerted: bool,
        movement_confirmed: bool,
    },
}

/// Everything the decision stage needs about one matched market
pub struct EvaluationInput<'a> {
    pub market: &'a WatchedMarket,
    /// Outcome label backing YES per the exchange title ("team" or "Over")
    pub yes_label: &'a str,
    pub no_label: &'a str,
    pub yes_fair: f64,
    pub no_fair: f64,
    pub books_used: usize,
    /// Current exchange YES ask
    pub live_yes_price: f64,
    /// False when the price came from the cache fallback
    pub quote_is_live: bool,
    /// Measured spread when available, in price units
    pub spread: Option<f64>,
    pub match_tier: MatchTier,
}

pub struct SignalBuilder<'a> {
    pub store: &'a dyn DetectorStore,
    pub notifier: &'a dyn AlertNotifier,
    pub detector: &'a DetectorConfig,
    pub movement: &'a MovementConfig,
}

impl<'a> SignalBuilder<'a> {
    pub async fn evaluate(&self, input: EvaluationInput<'_>, now: DateTime<Utc>) -> Result<Verdict> {
        let market = input.market;

        // Event-start gate
        if market.has_started(now) {
            self.expire_event(market).await?;
            return Ok(Verdict::EventExpired);
        }

        // Rail 1: token identity. A market without a YES token cannot be
        // priced or traded, whatever the cache says.
        if !market.is_tradeable() {
            warn!(
                condition_id = %market.condition_id,
                "{}", SkipReason::NoTokenId.as_str()
            );
            return Ok(Verdict::Skipped(SkipReason::NoTokenId));
        }

        let p = input.live_yes_price;
        let yes_edge = input.yes_fair - p;
        let no_edge = input.no_fair - (1.0 - p);

        let mut factors = SignalFactors {
            yes_fair: Some(input.yes_fair),
            no_fair: Some(input.no_fair),
            books_used: input.books_used,
            match_tier: Some(input.match_tier.as_str().to_string()),
            ..SignalFactors::default()
        };

        if yes_edge <= 0.0 && no_edge <= 0.0 {
            return Ok(Verdict::Skipped(SkipReason::NoPositiveEdge));
        }

        // Rail 2: dual-mapping swap test. If the edge only exists under
        // the assumption that the YES price was assigned to the wrong
        // side, the mapping is almost certainly inverted.
        let yes_edge_swapped = input.yes_fair - (1.0 - p);
        let no_edge_swapped = input.no_fair - p;
        let best_direct = yes_edge.max(no_edge);
        let best_swapped = yes_edge_swapped.max(no_edge_swapped);
        if best_direct < self.detector.swap_min_edge
            && best_swapped > self.detector.swap_block_threshold
        {
            warn!(
                condition_id = %market.condition_id,
                best_direct, best_swapped,
                "{}", SkipReason::MappingInversion.as_str()
            );
            return Ok(Verdict::Skipped(SkipReason::MappingInversion));
        }
        if best_swapped > self.detector.swap_block_threshold {
            debug!(
                condition_id = %market.condition_id,
                best_direct, best_swapped,
                "MAPPING_ALLOWED_DESPITE_SWAP"
            );
            factors.notes.push("MAPPING_ALLOWED_DESPITE_SWAP".to_string());
        }

        let mut side = if yes_edge >= no_edge {
            SignalSide::Yes
        } else {
            SignalSide::No
        };
        let mut raw_edge = yes_edge.max(no_edge);
        let mut outcome = match side {
            SignalSide::Yes => input.yes_label.to_string(),
            SignalSide::No => input.no_label.to_string(),
        };

        // Rail 3: outcome-side consistency. Re-derive the side from the
        // recommended outcome's name; on disagreement the inferred side
        // wins and the edge is recomputed for the inverted side.
        if let Some(inferred) = infer_side(&outcome, input.yes_label, input.no_label) {
            if inferred != side {
                warn!(
                    condition_id = %market.condition_id,
                    chosen = side.as_str(),
                    inferred = inferred.as_str(),
                    "Side inference disagrees; forcing inferred side"
                );
                side = inferred;
                raw_edge = match side {
                    SignalSide::Yes => yes_edge,
                    SignalSide::No => no_edge,
                };
                outcome = match side {
                    SignalSide::Yes => input.yes_label.to_string(),
                    SignalSide::No => input.no_label.to_string(),
                };
                factors.notes.push("SIDE_FORCED_BY_INFERENCE".to_string());
                if raw_edge <= 0.0 {
                    return Ok(Verdict::Skipped(SkipReason::NoPositiveEdge));
                }
            }
        }

        let fair = match side {
            SignalSide::Yes => input.yes_fair,
            SignalSide::No => input.no_fair,
        };
        let price_paid = match side {
            SignalSide::Yes => p,
            SignalSide::No => 1.0 - p,
        };

        // Edge floor: below it the whole block stays quiet
        if raw_edge + EDGE_EPSILON < self.detector.min_edge {
            return Ok(Verdict::Skipped(SkipReason::BelowEdgeFloor));
        }

        // Rail 4: staleness. High-probability edges on stale quotes are
        // almost always artefacts of a price that stopped updating.
        if fair >= self.detector.high_prob_threshold {
            let staleness_secs = if input.quote_is_live {
                0
            } else {
                self.store
                    .get_watch_state(&market.condition_id)
                    .await?
                    .and_then(|w| w.staleness_secs(now))
                    .unwrap_or(i64::MAX)
            };
            if staleness_secs > self.detector.stale_after_secs {
                warn!(
                    condition_id = %market.condition_id,
                    fair, staleness_secs,
                    "{}", SkipReason::StaleHighProb.as_str()
                );
                return Ok(Verdict::Skipped(SkipReason::StaleHighProb));
            }
        }

        // Rail 5: extreme-edge cap on heavy favorites
        if fair >= self.detector.extreme_prob_threshold
            && raw_edge > self.detector.extreme_edge_cap
        {
            debug!(
                condition_id = %market.condition_id,
                raw_edge,
                cap = self.detector.extreme_edge_cap,
                "Capping extreme edge"
            );
            raw_edge = self.detector.extreme_edge_cap;
            factors.notes.push("EXTREME_EDGE_CAPPED".to_string());
        }

        // Movement on the recommended outcome's snapshot series. Movement
        // never overrides the side; it only shapes trigger, tier, and
        // confidence.
        let movement = self.movement_for(&market.event_title, &outcome, now).await?;
        let movement_ok = movement.triggered
            && movement.direction == Some(MovementDirection::Shortening)
            && movement.books_confirming >= self.movement.min_confirming_books;

        let edge_fired = raw_edge + EDGE_EPSILON >= self.detector.edge_trigger;
        let trigger_reason = match (edge_fired, movement_ok) {
            (true, true) => TriggerReason::Both,
            (true, false) => TriggerReason::Edge,
            (false, true) => TriggerReason::Movement,
            (false, false) => {
                return Ok(Verdict::Skipped(SkipReason::NoTrigger));
            }
        };

        // Net edge after platform fee, spread, and slippage
        let volume = market.cached_volume_f64();
        let fee = self.detector.platform_fee_pct * raw_edge.max(0.0);
        let spread_cost = input.spread.unwrap_or_else(|| spread_fallback(volume));
        let slippage = slippage_cost(self.detector.reference_stake_usd, volume);
        let net_edge = raw_edge - fee - spread_cost - slippage;

        let tier = assign_tier(raw_edge, movement_ok);

        // Rail 6: final gate before any write. A recommended outcome that
        // no longer verifies against its side kills the signal outright.
        match infer_side(&outcome, input.yes_label, input.no_label) {
            Some(inferred) if inferred != side => {
                warn!(
                    condition_id = %market.condition_id,
                    "{}", SkipReason::SideGate.as_str()
                );
                return Ok(Verdict::Skipped(SkipReason::SideGate));
            }
            _ => {}
        }

        factors.trigger_reason = Some(trigger_reason);
        factors.raw_edge = raw_edge;
        factors.net_edge = net_edge;
        factors.fee_cost = fee;
        factors.spread_cost = spread_cost;
        factors.slippage_cost = slippage;
        factors.movement_books = movement.books_confirming;
        factors.movement_direction = movement.direction;

        let urgency = market
            .event_start_time
            .map(|start| Urgency::from_event_start(start, now))
            .unwrap_or(Urgency::Normal);

        let signal = SignalOpportunity {
            id: None,
            condition_id: market.condition_id.clone(),
            event_name: market.event_title.clone(),
            recommended_outcome: outcome.clone(),
            side,
            polymarket_price: price_paid,
            bookmaker_prob_fair: fair,
            edge_percent: raw_edge * 100.0,
            signal_strength: net_edge * 100.0,
            signal_tier: tier,
            movement_confirmed: movement_ok,
            movement_velocity: movement.velocity,
            confidence_score: SignalOpportunity::confidence(raw_edge, input.books_used, movement_ok),
            urgency,
            status: SignalStatus::Active,
            polymarket_yes_price: Some(p),
            polymarket_volume: volume,
            polymarket_updated_at: Some(now),
            event_start_time: market.event_start_time,
            expires_at: market.event_start_time,
            signal_factors: factors,
            created_at: None,
            updated_at: None,
        };

        self.persist(market, signal, now).await
    }

    /// One-signal-per-event write ordering: expirations precede upserts.
    async fn persist(
        &self,
        market: &WatchedMarket,
        mut signal: SignalOpportunity,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        let event_name = signal.event_name.clone();
        let outcome = signal.recommended_outcome.clone();

        for other in self.store.active_signals_for_event(&event_name).await? {
            if other.recommended_outcome != outcome {
                if let Some(id) = other.id {
                    info!(
                        %event_name,
                        superseded = %other.recommended_outcome,
                        by = %outcome,
                        "Expiring superseded signal"
                    );
                    self.store.expire_signal(id).await?;
                }
            }
        }

        let existing = self.store.find_signal(&event_name, &outcome).await?;
        let (inserted, tier) = match existing {
            Some(prior) if prior.status.blocks_recreation() => {
                debug!(
                    %event_name, %outcome,
                    status = prior.status.as_str(),
                    "{}", SkipReason::TerminalSignal.as_str()
                );
                return Ok(Verdict::Skipped(SkipReason::TerminalSignal));
            }
            Some(prior) => {
                signal.id = prior.id;
                signal.created_at = prior.created_at;
                self.store.update_signal(&signal).await?;
                (false, signal.signal_tier)
            }
            None => {
                self.store.insert_signal(&signal).await?;
                (true, signal.signal_tier)
            }
        };

        self.store
            .set_monitoring_status(&market.condition_id, MonitoringStatus::Triggered)
            .await?;
        let prior_watch = self.store.get_watch_state(&market.condition_id).await?;
        self.store
            .upsert_watch_state(&EventWatchState {
                condition_id: market.condition_id.clone(),
                watch_state: WatchState::Alerted,
                last_poly_refresh: prior_watch
                    .as_ref()
                    .and_then(|w| w.last_poly_refresh)
                    .or(Some(now)),
                current_probability: Some(signal.bookmaker_prob_fair),
                polymarket_matched: true,
            })
            .await?;

        // Notify only on fresh strong/elite signals for events inside 24h
        let within_day = market
            .event_start_time
            .map(|start| start > now && start <= now + Duration::hours(24))
            .unwrap_or(false);
        let alerted = inserted && tier.is_notifiable() && within_day;
        if alerted {
            let message = format!(
                "{} signal: back {} ({}) @ {:.2} | fair {:.2} | edge {:.1}% | {}",
                tier.as_str().to_uppercase(),
                signal.recommended_outcome,
                signal.side,
                signal.polymarket_price,
                signal.bookmaker_prob_fair,
                signal.edge_percent,
                event_name,
            );
            self.notifier.send_sms(&message).await;
        }

        info!(
            %event_name,
            %outcome,
            side = signal.side.as_str(),
            tier = tier.as_str(),
            raw_edge_pct = signal.edge_percent,
            net_edge_pct = signal.signal_strength,
            inserted,
            "Signal persisted"
        );

        Ok(Verdict::Emitted {
            tier,
            inserted,
            alerted,
            movement_confirmed: signal.movement_confirmed,
        })
    }

    async fn movement_for(
        &self,
        event_name: &str,
        outcome: &str,
        now: DateTime<Utc>,
    ) -> Result<MovementResult> {
        let key = event_key(event_name, outcome);
        let since = now - Duration::minutes(self.movement.window_minutes);
        let snapshots = self.store.snapshots_since(&key, outcome, since).await?;
        Ok(detect_movement(&snapshots, self.movement, now))
    }

    /// Expire a market whose event has started: status escalation, watch
    /// row, and any still-active signal on the event.
    async fn expire_event(&self, market: &WatchedMarket) -> Result<()> {
        info!(condition_id = %market.condition_id, "Event started; expiring");
        self.store
            .set_monitoring_status(&market.condition_id, MonitoringStatus::Expired)
            .await?;

        for signal in self
            .store
            .active_signals_for_event(&market.event_title)
            .await?
        {
            if let Some(id) = signal.id {
                self.store.expire_signal(id).await?;
            }
        }

        let prior = self.store.get_watch_state(&market.condition_id).await?;
        let mut state =
            prior.unwrap_or_else(|| EventWatchState::monitored(&market.condition_id));
        state.watch_state = WatchState::Expired;
        self.store.upsert_watch_state(&state).await?;
        Ok(())
    }
}

/// Which side an outcome label belongs to, by normalized word overlap with
/// containment as the tie-break. None when the label matches neither.
fn infer_side(outcome: &str, yes_label: &str, no_label: &str) -> Option<SignalSide> {
    let overlap = |a: &str, b: &str| -> usize {
        let a_words: HashSet<String> = crate::domain::normalize(a)
            .split_whitespace()
            .map(String::from)
            .collect();
        let b_words: HashSet<String> = crate::domain::normalize(b)
            .split_whitespace()
            .map(String::from)
            .collect();
        a_words.intersection(&b_words).count()
    };

    let yes_score = overlap(outcome, yes_label);
    let no_score = overlap(outcome, no_label);

    if yes_score > no_score {
        Some(SignalSide::Yes)
    } else if no_score > yes_score {
        Some(SignalSide::No)
    } else {
        let o = crate::domain::normalize(outcome);
        let yes_contains = crate::domain::normalize(yes_label).contains(&o);
        let no_contains = crate::domain::normalize(no_label).contains(&o);
        match (yes_contains, no_contains) {
            (true, false) => Some(SignalSide::Yes),
            (false, true) => Some(SignalSide::No),
            _ => None,
        }
    }
}

/// Volume-dependent spread fallback when no measured spread is available
fn spread_fallback(volume: Option<f64>) -> f64 {
    match volume {
        Some(v) if v >= 500_000.0 => 0.005,
        Some(v) if v >= 100_000.0 => 0.010,
        Some(v) if v >= 50_000.0 => 0.015,
        Some(v) if v >= 10_000.0 => 0.020,
        _ => 0.030,
    }
}

/// Slippage as a function of stake relative to market volume
fn slippage_cost(stake: f64, volume: Option<f64>) -> f64 {
    let Some(volume) = volume.filter(|v| *v > 0.0) else {
        return 0.03;
    };
    let ratio = stake / volume;
    if ratio <= 0.0005 {
        0.002
    } else if ratio >= 0.02 {
        0.03
    } else {
        0.002 + (ratio - 0.0005) / (0.02 - 0.0005) * (0.03 - 0.002)
    }
}

/// Tier ladder: a large edge stands on its own; movement boosts the tier
/// one or two steps when meaningful chosen-side edge is already there.
fn assign_tier(raw_edge: f64, movement_ok: bool) -> SignalTier {
    let edge = raw_edge + EDGE_EPSILON;
    let base = if edge >= 0.10 {
        SignalTier::Strong
    } else {
        SignalTier::Static
    };
    if !movement_ok {
        return base;
    }
    let steps = if edge >= 0.05 {
        2
    } else if edge >= 0.03 {
        1
    } else {
        0
    };
    base.boosted(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_algebra_zero_sum_on_calibrated_market() {
        // With yes_fair + no_fair = 1: yes_edge + no_edge = 0
        for (yes_fair, p) in [(0.55, 0.45), (0.3, 0.7), (0.9, 0.2)] {
            let no_fair = 1.0 - yes_fair;
            let yes_edge: f64 = yes_fair - p;
            let no_edge: f64 = no_fair - (1.0 - p);
            assert!((yes_edge + no_edge).abs() < 1e-12);
        }
    }

    #[test]
    fn test_infer_side_by_overlap() {
        assert_eq!(
            infer_side("Los Angeles Lakers", "Los Angeles Lakers", "Boston Celtics"),
            Some(SignalSide::Yes)
        );
        assert_eq!(
            infer_side("Celtics", "Los Angeles Lakers", "Boston Celtics"),
            Some(SignalSide::No)
        );
        assert_eq!(infer_side("Over", "Over", "Under"), Some(SignalSide::Yes));
        assert_eq!(infer_side("nothing shared", "Lakers", "Celtics"), None);
    }

    #[test]
    fn test_spread_fallback_grades_with_volume() {
        assert_eq!(spread_fallback(Some(600_000.0)), 0.005);
        assert_eq!(spread_fallback(Some(150_000.0)), 0.010);
        assert_eq!(spread_fallback(Some(60_000.0)), 0.015);
        assert_eq!(spread_fallback(Some(20_000.0)), 0.020);
        assert_eq!(spread_fallback(Some(5_000.0)), 0.030);
        assert_eq!(spread_fallback(None), 0.030);
    }

    #[test]
    fn test_slippage_monotone_in_ratio() {
        let big = slippage_cost(100.0, Some(1_000_000.0));
        let medium = slippage_cost(100.0, Some(20_000.0));
        let tiny = slippage_cost(100.0, Some(1_000.0));
        assert!(big <= medium && medium <= tiny);
        assert!((0.002..=0.03).contains(&big));
        assert!((0.002..=0.03).contains(&tiny));
    }

    #[test]
    fn test_tier_assignment() {
        assert_eq!(assign_tier(0.10, false), SignalTier::Strong);
        assert_eq!(assign_tier(0.12, true), SignalTier::Elite);
        assert_eq!(assign_tier(0.05, true), SignalTier::Elite);
        assert_eq!(assign_tier(0.04, true), SignalTier::Strong);
        assert_eq!(assign_tier(0.02, true), SignalTier::Static);
        assert_eq!(assign_tier(0.06, false), SignalTier::Static);
    }
}
