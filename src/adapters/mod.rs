pub mod exchange;
pub mod memory;
pub mod notifier;
pub mod odds_api;
pub mod postgres;
pub mod store;
pub mod team_resolver;

pub use exchange::{ExchangeClient, MarketSnapshotResponse, TokenQuote};
pub use memory::MemoryStore;
pub use notifier::{AlertNotifier, NoopNotifier, SmsWebhookNotifier};
pub use odds_api::{BookmakerOdds, Game, MarketOdds, OddsApiClient, Outcome};
pub use postgres::PostgresStore;
pub use store::DetectorStore;
pub use team_resolver::{
    DisabledResolver, LlmTeamResolver, ResolvedTeams, ResolverConfidence, TeamResolver,
};
