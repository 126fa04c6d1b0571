use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Escalation state of a long-lived event watch row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    Monitored,
    Alerted,
    Expired,
}

impl WatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchState::Monitored => "monitored",
            WatchState::Alerted => "alerted",
            WatchState::Expired => "expired",
        }
    }
}

impl TryFrom<&str> for WatchState {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "monitored" => Ok(WatchState::Monitored),
            "alerted" => Ok(WatchState::Alerted),
            "expired" => Ok(WatchState::Expired),
            _ => Err(()),
        }
    }
}

/// Optional long-lived row per exchange market, mutated every pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWatchState {
    pub condition_id: String,
    pub watch_state: WatchState,
    pub last_poly_refresh: Option<DateTime<Utc>>,
    pub current_probability: Option<f64>,
    pub polymarket_matched: bool,
}

impl EventWatchState {
    pub fn monitored(condition_id: &str) -> Self {
        Self {
            condition_id: condition_id.to_string(),
            watch_state: WatchState::Monitored,
            last_poly_refresh: None,
            current_probability: None,
            polymarket_matched: false,
        }
    }

    /// Quote age relative to `now`; None when the market has never been refreshed
    pub fn staleness_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_poly_refresh.map(|t| (now - t).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_watch_state_round_trip() {
        for state in [WatchState::Monitored, WatchState::Alerted, WatchState::Expired] {
            assert_eq!(WatchState::try_from(state.as_str()), Ok(state));
        }
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let mut state = EventWatchState::monitored("c1");
        assert_eq!(state.staleness_secs(now), None);
        state.last_poly_refresh = Some(now - Duration::seconds(240));
        assert_eq!(state.staleness_secs(now), Some(240));
    }
}
