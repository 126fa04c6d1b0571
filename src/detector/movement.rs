//! Coordinated sharp-book movement detection
//!
//! Reads the rolling snapshot window for one (event, outcome) series and
//! looks for same-direction moves across at least two sharp books, with a
//! recency rule to keep old moves from re-triggering and a counter-move
//! veto.

use crate::config::MovementConfig;
use crate::domain::{MovementDirection, SharpSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Outcome of a movement check
#[derive(Debug, Clone, Default)]
pub struct MovementResult {
    pub triggered: bool,
    /// Mean absolute change across confirming books
    pub velocity: f64,
    pub books_confirming: usize,
    pub direction: Option<MovementDirection>,
}

/// Qualifying threshold for a move starting from probability `p`.
/// Probability-relative: a 3-point move on a 20% line is meaningful, on a
/// 75% line it is not. Non-decreasing in `p`.
pub fn movement_threshold(p: f64, cfg: &MovementConfig) -> f64 {
    cfg.min_abs_move.max(cfg.relative_factor * p)
}

#[derive(Debug)]
struct BookMove {
    change: f64,
    qualifies: bool,
}

/// Evaluate the snapshot window, assumed pre-filtered to the detection
/// window and ordered ascending by capture time.
pub fn detect_movement(
    snapshots: &[SharpSnapshot],
    cfg: &MovementConfig,
    now: DateTime<Utc>,
) -> MovementResult {
    if snapshots.len() < 2 {
        return MovementResult::default();
    }

    let recency_cutoff = now - Duration::minutes(cfg.recency_minutes);

    let mut by_book: HashMap<&str, Vec<&SharpSnapshot>> = HashMap::new();
    for snap in snapshots {
        by_book.entry(snap.bookmaker.as_str()).or_default().push(snap);
    }

    let mut moves: Vec<BookMove> = Vec::new();

    for series in by_book.values() {
        if series.len() < 2 {
            continue;
        }
        let oldest = series.first().expect("non-empty series");
        let newest = series.last().expect("non-empty series");
        let change = newest.implied_probability - oldest.implied_probability;

        let threshold = movement_threshold(oldest.implied_probability, cfg);
        let big_enough = change.abs() >= threshold;

        // Recency rule: the newest slice of the window must account for
        // most of the total movement, otherwise a stale move keeps
        // re-triggering pass after pass.
        let recent_enough = if big_enough {
            let baseline = series
                .iter()
                .rev()
                .find(|s| s.captured_at < recency_cutoff)
                .map(|s| s.implied_probability)
                .unwrap_or(oldest.implied_probability);
            let recent_change = newest.implied_probability - baseline;
            change.abs() > f64::EPSILON
                && recent_change.abs() / change.abs() >= cfg.recency_share
                && recent_change.signum() == change.signum()
        } else {
            false
        };

        moves.push(BookMove {
            change,
            qualifies: big_enough && recent_enough,
        });
    }

    let qualifying: Vec<&BookMove> = moves.iter().filter(|m| m.qualifies).collect();
    if qualifying.len() < cfg.min_confirming_books {
        return MovementResult::default();
    }

    let positive = qualifying.iter().filter(|m| m.change > 0.0).count();
    let negative = qualifying.len() - positive;
    let (sign, confirming) = if positive >= negative {
        (1.0, positive)
    } else {
        (-1.0, negative)
    };

    if confirming < cfg.min_confirming_books {
        return MovementResult::default();
    }

    // Counter-move veto: any sharp book moving the other way by the
    // absolute floor kills the trigger, qualifying or not
    let countered = moves
        .iter()
        .any(|m| m.change.signum() == -sign && m.change.abs() >= cfg.min_abs_move);
    if countered {
        debug!("Movement veto: sharp counter-move present");
        return MovementResult::default();
    }

    let confirming_moves: Vec<f64> = qualifying
        .iter()
        .filter(|m| m.change.signum() == sign)
        .map(|m| m.change.abs())
        .collect();
    let velocity = confirming_moves.iter().sum::<f64>() / confirming_moves.len() as f64;

    MovementResult {
        triggered: true,
        velocity,
        books_confirming: confirming,
        direction: Some(if sign > 0.0 {
            MovementDirection::Shortening
        } else {
            MovementDirection::Drifting
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snap(book: &str, p: f64, mins_ago: i64, now: DateTime<Utc>) -> SharpSnapshot {
        SharpSnapshot {
            id: None,
            event_key: "a vs b::a".to_string(),
            event_name: "A vs B".to_string(),
            outcome: "A".to_string(),
            bookmaker: book.to_string(),
            implied_probability: p,
            raw_odds: if p > 0.0 { 1.0 / p } else { 0.0 },
            captured_at: now - Duration::minutes(mins_ago),
        }
    }

    fn window(mut snaps: Vec<SharpSnapshot>) -> Vec<SharpSnapshot> {
        snaps.sort_by_key(|s| s.captured_at);
        snaps
    }

    #[test]
    fn test_threshold_monotone() {
        let cfg = MovementConfig::default();
        let mut last = 0.0;
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            let t = movement_threshold(p, &cfg);
            assert!(t >= last, "threshold must be non-decreasing");
            last = t;
        }
        // Floor active on a 10% line, relative component on a 50% line
        assert!((movement_threshold(0.10, &cfg) - 0.02).abs() < 1e-12);
        assert!((movement_threshold(0.50, &cfg) - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_fewer_than_two_snapshots() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        let result = detect_movement(&[snap("pinnacle", 0.5, 5, now)], &cfg, now);
        assert!(!result.triggered);
    }

    #[test]
    fn test_single_book_does_not_trigger() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        let snaps = window(vec![
            snap("pinnacle", 0.45, 8, now),
            snap("pinnacle", 0.52, 2, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(!result.triggered);
    }

    #[test]
    fn test_two_books_same_direction_trigger() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        let snaps = window(vec![
            snap("pinnacle", 0.45, 8, now),
            snap("pinnacle", 0.52, 2, now),
            snap("betfair", 0.46, 9, now),
            snap("betfair", 0.53, 1, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(result.triggered);
        assert_eq!(result.books_confirming, 2);
        assert_eq!(result.direction, Some(MovementDirection::Shortening));
        assert!((result.velocity - 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_counter_move_vetoes() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        let snaps = window(vec![
            snap("pinnacle", 0.45, 8, now),
            snap("pinnacle", 0.52, 2, now),
            snap("betfair", 0.46, 9, now),
            snap("betfair", 0.53, 1, now),
            // Third sharp book moving >= 2% the other way
            snap("circasports", 0.50, 9, now),
            snap("circasports", 0.47, 1, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(!result.triggered);
    }

    #[test]
    fn test_old_move_fails_recency() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        // All movement happened 15-25 minutes ago; flat in the recent window
        let snaps = window(vec![
            snap("pinnacle", 0.40, 25, now),
            snap("pinnacle", 0.50, 15, now),
            snap("pinnacle", 0.50, 2, now),
            snap("betfair", 0.41, 25, now),
            snap("betfair", 0.51, 15, now),
            snap("betfair", 0.51, 2, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(!result.triggered);
    }

    #[test]
    fn test_small_relative_move_on_high_line() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        // 3-point move on a 75% line is below 0.12 * 0.75 = 0.09
        let snaps = window(vec![
            snap("pinnacle", 0.75, 8, now),
            snap("pinnacle", 0.78, 2, now),
            snap("betfair", 0.74, 8, now),
            snap("betfair", 0.77, 2, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(!result.triggered);
    }

    #[test]
    fn test_drifting_direction() {
        let now = Utc::now();
        let cfg = MovementConfig::default();
        let snaps = window(vec![
            snap("pinnacle", 0.50, 8, now),
            snap("pinnacle", 0.42, 2, now),
            snap("betfair", 0.51, 9, now),
            snap("betfair", 0.43, 1, now),
        ]);
        let result = detect_movement(&snaps, &cfg, now);
        assert!(result.triggered);
        assert_eq!(result.direction, Some(MovementDirection::Drifting));
    }
}
