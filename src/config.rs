use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server port for the scheduler endpoint (default: 8080)
    #[serde(default)]
    pub server_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Exchange quote API (CLOB-style price/spread/market endpoints)
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_exchange_url")]
    pub base_url: String,
    #[serde(default = "default_exchange_timeout_secs")]
    pub timeout_secs: u64,
    /// Tokens per batched /prices call
    #[serde(default = "default_price_chunk_size")]
    pub price_chunk_size: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_exchange_url(),
            timeout_secs: default_exchange_timeout_secs(),
            price_chunk_size: default_price_chunk_size(),
        }
    }
}

/// Aggregate sportsbook odds API
#[derive(Debug, Clone, Deserialize)]
pub struct OddsConfig {
    /// The Odds API key (env: EDGELINE_ODDS__API_KEY or ODDS_API_KEY)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_odds_url")]
    pub base_url: String,
    #[serde(default = "default_odds_regions")]
    pub regions: String,
    #[serde(default = "default_odds_timeout_secs")]
    pub timeout_secs: u64,
    /// Concurrent outbound odds calls (one per sport) allowed at once
    #[serde(default = "default_odds_concurrency")]
    pub max_concurrent: usize,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_odds_url(),
            regions: default_odds_regions(),
            timeout_secs: default_odds_timeout_secs(),
            max_concurrent: default_odds_concurrency(),
        }
    }
}

/// External language resolver used by matcher tier 4.
/// Disabled entirely when `api_key` is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_resolver_url")]
    pub base_url: String,
    #[serde(default = "default_resolver_model")]
    pub model: String,
    /// Per-call timeout
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
    /// Hard cap on resolver calls within one pass
    #[serde(default = "default_resolver_calls_per_pass")]
    pub max_calls_per_pass: u32,
    /// Bounded cross-pass resolution cache entries
    #[serde(default = "default_resolver_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_resolver_url(),
            model: default_resolver_model(),
            timeout_secs: default_resolver_timeout_secs(),
            max_calls_per_pass: default_resolver_calls_per_pass(),
            cache_capacity: default_resolver_cache_capacity(),
        }
    }
}

/// Signal builder thresholds. Every rail knob is policy, not a constant.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Floor below which no signal block runs at all
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    /// Raw edge that fires the edge trigger on its own
    #[serde(default = "default_edge_trigger")]
    pub edge_trigger: f64,
    /// Swap-test edge above which a suspected inversion blocks the market
    #[serde(default = "default_swap_block_threshold")]
    pub swap_block_threshold: f64,
    /// Chosen-side edge below which the swap test is allowed to block
    #[serde(default = "default_swap_min_edge")]
    pub swap_min_edge: f64,
    /// Fair probability above which the staleness rail applies
    #[serde(default = "default_high_prob_threshold")]
    pub high_prob_threshold: f64,
    /// Max quote age for high-probability edges
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
    /// Fair probability above which raw edge is capped
    #[serde(default = "default_extreme_prob_threshold")]
    pub extreme_prob_threshold: f64,
    #[serde(default = "default_extreme_edge_cap")]
    pub extreme_edge_cap: f64,
    /// Platform fee as a fraction of positive edge
    #[serde(default = "default_platform_fee_pct")]
    pub platform_fee_pct: f64,
    /// Notional stake used for slippage estimation
    #[serde(default = "default_reference_stake_usd")]
    pub reference_stake_usd: f64,
    /// Wall-clock budget for one pass
    #[serde(default = "default_pass_deadline_secs")]
    pub pass_deadline_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_edge: default_min_edge(),
            edge_trigger: default_edge_trigger(),
            swap_block_threshold: default_swap_block_threshold(),
            swap_min_edge: default_swap_min_edge(),
            high_prob_threshold: default_high_prob_threshold(),
            stale_after_secs: default_stale_after_secs(),
            extreme_prob_threshold: default_extreme_prob_threshold(),
            extreme_edge_cap: default_extreme_edge_cap(),
            platform_fee_pct: default_platform_fee_pct(),
            reference_stake_usd: default_reference_stake_usd(),
            pass_deadline_secs: default_pass_deadline_secs(),
        }
    }
}

impl DetectorConfig {
    /// Validate config invariants. Returns list of problems (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min_edge <= 0.0 || self.min_edge >= 1.0 {
            errors.push(format!("min_edge must be in (0, 1), got {}", self.min_edge));
        }
        if self.edge_trigger < self.min_edge {
            errors.push(format!(
                "edge_trigger {} must be >= min_edge {}",
                self.edge_trigger, self.min_edge
            ));
        }
        if self.swap_block_threshold <= self.swap_min_edge {
            errors.push(format!(
                "swap_block_threshold {} must exceed swap_min_edge {}",
                self.swap_block_threshold, self.swap_min_edge
            ));
        }
        if !(0.0..=1.0).contains(&self.extreme_edge_cap) {
            errors.push(format!(
                "extreme_edge_cap must be in [0, 1], got {}",
                self.extreme_edge_cap
            ));
        }
        if self.pass_deadline_secs == 0 {
            errors.push("pass_deadline_secs must be > 0".to_string());
        }
        errors
    }
}

/// Movement detector window and thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Portion of the window the recency rule inspects
    #[serde(default = "default_recency_minutes")]
    pub recency_minutes: i64,
    /// Share of total movement that must fall inside the recency window
    #[serde(default = "default_recency_share")]
    pub recency_share: f64,
    /// Absolute floor for a qualifying move
    #[serde(default = "default_min_abs_move")]
    pub min_abs_move: f64,
    /// Relative component: threshold = max(min_abs_move, relative_factor * oldest_prob)
    #[serde(default = "default_relative_factor")]
    pub relative_factor: f64,
    /// Books that must agree before the detector triggers
    #[serde(default = "default_min_confirming_books")]
    pub min_confirming_books: usize,
    /// Snapshot retention horizon
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            recency_minutes: default_recency_minutes(),
            recency_share: default_recency_share(),
            min_abs_move: default_min_abs_move(),
            relative_factor: default_relative_factor(),
            min_confirming_books: default_min_confirming_books(),
            retention_hours: default_retention_hours(),
        }
    }
}

/// Watch-set selection policy
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Minimum volume for API-sourced markets
    #[serde(default = "default_api_volume_floor")]
    pub api_volume_floor: f64,
    #[serde(default = "default_api_set_cap")]
    pub api_set_cap: i64,
    #[serde(default = "default_scrape_set_cap")]
    pub scrape_set_cap: i64,
    /// Only watch events starting within this horizon
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: i64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            api_volume_floor: default_api_volume_floor(),
            api_set_cap: default_api_set_cap(),
            scrape_set_cap: default_scrape_set_cap(),
            horizon_hours: default_horizon_hours(),
        }
    }
}

/// Downstream notification webhook
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertConfig {
    /// Base URL of the alert function; alerts disabled when empty
    #[serde(default)]
    pub webhook_url: String,
    /// Destination phone number
    #[serde(default)]
    pub sms_to: String,
}

impl AlertConfig {
    pub fn is_configured(&self) -> bool {
        !self.webhook_url.is_empty() && !self.sms_to.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a directory or a single TOML file
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("database.url", "")?
            .set_default("database.max_connections", 5)?
            .set_default("server_port", 8080)?;

        if config_path.is_file() {
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::from(config_path.join("default.toml")).required(false))
                .add_source(
                    File::from(config_path.join(
                        std::env::var("EDGELINE_ENV")
                            .unwrap_or_else(|_| "development".to_string()),
                    ))
                    .required(false),
                );
        }

        // Override with environment variables (EDGELINE_ODDS__API_KEY, etc.)
        builder = builder.add_source(
            Environment::with_prefix("EDGELINE")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;

        // Plain env fallbacks for the secrets operators actually set
        if cfg.odds.api_key.is_empty() {
            if let Ok(key) = std::env::var("ODDS_API_KEY") {
                cfg.odds.api_key = key;
            }
        }
        if cfg.resolver.api_key.is_empty() {
            if let Ok(key) = std::env::var("LLM_API_KEY") {
                cfg.resolver.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }

        Ok(cfg)
    }

    /// Validate the whole config. Returns list of problems (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.detector.validate();
        if self.database.url.is_empty() {
            errors.push("database.url must be set".to_string());
        }
        if self.odds.api_key.is_empty() {
            errors.push("odds.api_key must be set (ODDS_API_KEY)".to_string());
        }
        if self.movement.recency_minutes > self.movement.window_minutes {
            errors.push(format!(
                "movement.recency_minutes {} must be <= window_minutes {}",
                self.movement.recency_minutes, self.movement.window_minutes
            ));
        }
        if !(0.0..=1.0).contains(&self.movement.recency_share) {
            errors.push(format!(
                "movement.recency_share must be in [0, 1], got {}",
                self.movement.recency_share
            ));
        }
        errors
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_exchange_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_exchange_timeout_secs() -> u64 {
    10
}

fn default_price_chunk_size() -> usize {
    50
}

fn default_odds_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

fn default_odds_regions() -> String {
    "us,uk,eu".to_string()
}

fn default_odds_timeout_secs() -> u64 {
    10
}

fn default_odds_concurrency() -> usize {
    4
}

fn default_resolver_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_resolver_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    8
}

fn default_resolver_calls_per_pass() -> u32 {
    15
}

fn default_resolver_cache_capacity() -> usize {
    512
}

fn default_min_edge() -> f64 {
    0.02
}

fn default_edge_trigger() -> f64 {
    0.05
}

fn default_swap_block_threshold() -> f64 {
    0.05
}

fn default_swap_min_edge() -> f64 {
    0.01
}

fn default_high_prob_threshold() -> f64 {
    0.85
}

fn default_stale_after_secs() -> i64 {
    180
}

fn default_extreme_prob_threshold() -> f64 {
    0.90
}

fn default_extreme_edge_cap() -> f64 {
    0.40
}

fn default_platform_fee_pct() -> f64 {
    0.01
}

fn default_reference_stake_usd() -> f64 {
    100.0
}

fn default_pass_deadline_secs() -> u64 {
    25
}

fn default_window_minutes() -> i64 {
    30
}

fn default_recency_minutes() -> i64 {
    10
}

fn default_recency_share() -> f64 {
    0.70
}

fn default_min_abs_move() -> f64 {
    0.02
}

fn default_relative_factor() -> f64 {
    0.12
}

fn default_min_confirming_books() -> usize {
    2
}

fn default_retention_hours() -> i64 {
    24
}

fn default_api_volume_floor() -> f64 {
    5000.0
}

fn default_api_set_cap() -> i64 {
    150
}

fn default_scrape_set_cap() -> i64 {
    100
}

fn default_horizon_hours() -> i64 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_defaults_are_valid() {
        let cfg = DetectorConfig::default();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_detector_rejects_inverted_thresholds() {
        let cfg = DetectorConfig {
            edge_trigger: 0.01,
            ..DetectorConfig::default()
        };
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.contains("edge_trigger")));
    }

    #[test]
    fn test_movement_defaults() {
        let cfg = MovementConfig::default();
        assert_eq!(cfg.window_minutes, 30);
        assert_eq!(cfg.recency_minutes, 10);
        assert!(cfg.recency_share > 0.69 && cfg.recency_share < 0.71);
    }
}
