pub mod fair_prob;
pub mod loader;
pub mod matcher;
pub mod movement;
pub mod pass;
pub mod signal_builder;

pub use fair_prob::{fair_probability, probabilities_consistent, FairProbability};
pub use loader::load_watch_set;
pub use matcher::{match_market, H2hMatch, MarketMatch, MatchContext, MatchTier, TotalsMatch};
pub use movement::{detect_movement, movement_threshold, MovementResult};
pub use pass::{DetectorService, PassCounters};
pub use signal_builder::{EvaluationInput, SignalBuilder, SkipReason, Verdict};
