use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookmakers whose prices are treated as high-information
pub const SHARP_BOOKS: &[&str] = &["pinnacle", "betfair", "betonlineag", "bookmaker", "circasports"];

/// Sharp-book weighting applied by the consensus engine
pub const SHARP_WEIGHT: f64 = 1.5;

pub fn is_sharp_book(key: &str) -> bool {
    let lower = key.to_lowercase();
    SHARP_BOOKS.iter().any(|b| lower.contains(b) || b.contains(&lower.as_str()))
}

/// Lowercase, strip non-alphanumerics, collapse whitespace.
/// Shared by event keys and every name comparison in the matcher.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Derive the snapshot series key for an (event, outcome) pair
pub fn event_key(event_name: &str, outcome: &str) -> String {
    format!("{}::{}", normalize(event_name), normalize(outcome))
}

/// One observation of one (event, outcome, sharp bookmaker) triple.
/// Immutable once written; retained at least 30 minutes, pruned at 24h.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharpSnapshot {
    pub id: Option<i64>,
    pub event_key: String,
    pub event_name: String,
    pub outcome: String,
    /// Canonical short name from the sharp set
    pub bookmaker: String,
    /// 1 / decimal odds, in [0, 1]
    pub implied_probability: f64,
    pub raw_odds: f64,
    pub captured_at: DateTime<Utc>,
}

impl SharpSnapshot {
    pub fn new(
        event_name: &str,
        outcome: &str,
        bookmaker: &str,
        raw_odds: f64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let implied = if raw_odds > 0.0 { 1.0 / raw_odds } else { 0.0 };
        Self {
            id: None,
            event_key: event_key(event_name, outcome),
            event_name: event_name.to_string(),
            outcome: outcome.to_string(),
            bookmaker: bookmaker.to_lowercase(),
            implied_probability: implied.clamp(0.0, 1.0),
            raw_odds,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Montréal Canadiens!"), "montréal canadiens");
        assert_eq!(normalize("  A.F.C.  Wimbledon "), "a f c wimbledon");
    }

    #[test]
    fn test_event_key_stable() {
        assert_eq!(
            event_key("Lakers vs Celtics", "Los Angeles Lakers"),
            "lakers vs celtics::los angeles lakers"
        );
    }

    #[test]
    fn test_snapshot_implied_probability() {
        let snap = SharpSnapshot::new("A vs B", "A", "Pinnacle", 2.5, Utc::now());
        assert!((snap.implied_probability - 0.4).abs() < 1e-9);
        assert_eq!(snap.bookmaker, "pinnacle");
    }

    #[test]
    fn test_sharp_book_detection() {
        assert!(is_sharp_book("pinnacle"));
        assert!(is_sharp_book("betonlineag"));
        assert!(!is_sharp_book("draftkings"));
    }
}
