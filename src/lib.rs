pub mod adapters;
pub mod cli;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod services;
pub mod sports;

pub use adapters::{
    AlertNotifier, DetectorStore, ExchangeClient, MemoryStore, NoopNotifier, OddsApiClient,
    PostgresStore, SmsWebhookNotifier, TeamResolver,
};
pub use config::AppConfig;
pub use detector::{DetectorService, PassCounters, SignalBuilder};
pub use error::{EdgelineError, Result};
