use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which half of the exchange's binary contract a signal advises buying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Yes,
    No,
}

impl SignalSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSide::Yes => "YES",
            SignalSide::No => "NO",
        }
    }
}

impl std::fmt::Display for SignalSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SignalSide {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "YES" => Ok(SignalSide::Yes),
            "NO" => Ok(SignalSide::No),
            _ => Err(()),
        }
    }
}

/// Signal quality class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTier {
    Static,
    Strong,
    Elite,
}

impl SignalTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalTier::Static => "static",
            SignalTier::Strong => "strong",
            SignalTier::Elite => "elite",
        }
    }

    /// Upgrade by `steps` tiers, saturating at elite
    pub fn boosted(&self, steps: u8) -> Self {
        let mut tier = *self;
        for _ in 0..steps {
            tier = match tier {
                SignalTier::Static => SignalTier::Strong,
                SignalTier::Strong | SignalTier::Elite => SignalTier::Elite,
            };
        }
        tier
    }

    pub fn is_notifiable(&self) -> bool {
        matches!(self, SignalTier::Strong | SignalTier::Elite)
    }
}

impl TryFrom<&str> for SignalTier {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "static" => Ok(SignalTier::Static),
            "strong" => Ok(SignalTier::Strong),
            "elite" => Ok(SignalTier::Elite),
            _ => Err(()),
        }
    }
}

/// Life-cycle state of a signal row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Active,
    Executed,
    Expired,
    Dismissed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::Executed => "executed",
            SignalStatus::Expired => "expired",
            SignalStatus::Dismissed => "dismissed",
        }
    }

    /// Terminal states must never be resurrected by the detector
    pub fn blocks_recreation(&self) -> bool {
        matches!(self, SignalStatus::Executed | SignalStatus::Dismissed)
    }
}

impl TryFrom<&str> for SignalStatus {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "active" => Ok(SignalStatus::Active),
            "executed" => Ok(SignalStatus::Executed),
            "expired" => Ok(SignalStatus::Expired),
            "dismissed" => Ok(SignalStatus::Dismissed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    /// Derive urgency from time-to-event
    pub fn from_event_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let minutes = (start - now).num_minutes();
        if minutes < 60 {
            Urgency::Critical
        } else if minutes < 240 {
            Urgency::High
        } else {
            Urgency::Normal
        }
    }
}

impl TryFrom<&str> for Urgency {
    type Error = ();

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(()),
        }
    }
}

/// What fired the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerReason {
    Edge,
    Movement,
    Both,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Edge => "edge",
            TriggerReason::Movement => "movement",
            TriggerReason::Both => "both",
        }
    }
}

/// Direction of a coordinated sharp move, in probability space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    /// Probability increasing (price shortening)
    Shortening,
    /// Probability decreasing (price drifting)
    Drifting,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Shortening => "shortening",
            MovementDirection::Drifting => "drifting",
        }
    }
}

/// Structured diagnostics persisted alongside a signal
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignalFactors {
    pub trigger_reason: Option<TriggerReason>,
    pub raw_edge: f64,
    pub net_edge: f64,
    pub fee_cost: f64,
    pub spread_cost: f64,
    pub slippage_cost: f64,
    pub yes_fair: Option<f64>,
    pub no_fair: Option<f64>,
    pub books_used: usize,
    pub movement_books: usize,
    pub movement_direction: Option<MovementDirection>,
    pub match_tier: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl SignalFactors {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// The detector's output: one actionable mispricing per event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOpportunity {
    pub id: Option<Uuid>,
    pub condition_id: String,
    pub event_name: String,
    /// Team/side we advise backing
    pub recommended_outcome: String,
    pub side: SignalSide,
    /// Price of the recommended side, not always the YES price
    pub polymarket_price: f64,
    /// Consensus fair probability of the same side
    pub bookmaker_prob_fair: f64,
    /// Raw edge x 100
    pub edge_percent: f64,
    /// Net edge x 100, after fees, spread, slippage
    pub signal_strength: f64,
    pub signal_tier: SignalTier,
    pub movement_confirmed: bool,
    pub movement_velocity: f64,
    /// Bounded confidence score, capped at 95
    pub confidence_score: f64,
    pub urgency: Urgency,
    pub status: SignalStatus,
    /// Live YES price, refreshed every pass regardless of edge
    pub polymarket_yes_price: Option<f64>,
    pub polymarket_volume: Option<f64>,
    pub polymarket_updated_at: Option<DateTime<Utc>>,
    pub event_start_time: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signal_factors: SignalFactors,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SignalOpportunity {
    /// Confidence from edge size, book depth, and movement confirmation.
    /// Clamped to [0, 95]: consensus odds are never certainty.
    pub fn confidence(raw_edge: f64, books_used: usize, movement_confirmed: bool) -> f64 {
        let mut score = 50.0;
        score += (raw_edge * 200.0).min(20.0);
        score += match books_used {
            0..=2 => 0.0,
            3..=4 => 5.0,
            5..=7 => 10.0,
            _ => 15.0,
        };
        if movement_confirmed {
            score += 10.0;
        }
        score.clamp(0.0, 95.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_tier_boost_saturates() {
        assert_eq!(SignalTier::Static.boosted(1), SignalTier::Strong);
        assert_eq!(SignalTier::Static.boosted(2), SignalTier::Elite);
        assert_eq!(SignalTier::Elite.boosted(2), SignalTier::Elite);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(SignalTier::Static < SignalTier::Strong);
        assert!(SignalTier::Strong < SignalTier::Elite);
    }

    #[test]
    fn test_urgency_from_event_start() {
        let now = Utc::now();
        assert_eq!(
            Urgency::from_event_start(now + Duration::minutes(30), now),
            Urgency::Critical
        );
        assert_eq!(
            Urgency::from_event_start(now + Duration::hours(2), now),
            Urgency::High
        );
        assert_eq!(
            Urgency::from_event_start(now + Duration::hours(12), now),
            Urgency::Normal
        );
    }

    #[test]
    fn test_terminal_states_block_recreation() {
        assert!(SignalStatus::Dismissed.blocks_recreation());
        assert!(SignalStatus::Executed.blocks_recreation());
        assert!(!SignalStatus::Active.blocks_recreation());
        assert!(!SignalStatus::Expired.blocks_recreation());
    }

    #[test]
    fn test_confidence_capped() {
        let c = SignalOpportunity::confidence(0.5, 12, true);
        assert!(c <= 95.0);
        let weak = SignalOpportunity::confidence(0.02, 2, false);
        assert!(weak < c);
    }
}
