//! External language resolver for ambiguous event titles
//!
//! Matcher tier 4. Sends the exchange title plus sport context to a
//! chat-completions endpoint and parses a structured `(home, away,
//! confidence)` answer. The detector is fully functional without it;
//! resolution quota and timeout are explicit configuration.

use crate::config::ResolverConfig;
use crate::domain::{normalize, Sport};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Resolver's self-reported confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverConfidence {
    Low,
    Medium,
    High,
}

impl ResolverConfidence {
    fn from_str_loose(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        if lower.contains("high") {
            Self::High
        } else if lower.contains("low") {
            Self::Low
        } else {
            Self::Medium
        }
    }
}

/// Teams resolved from an event title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTeams {
    pub home_team: String,
    pub away_team: String,
    pub confidence: ResolverConfidence,
}

/// Seam for the matcher's final tier. `None` means "could not resolve";
/// negative results are worth caching so quota is not re-spent on them.
#[async_trait]
pub trait TeamResolver: Send + Sync {
    /// Whether tier 4 is available at all
    fn is_enabled(&self) -> bool;

    async fn resolve(&self, event_title: &str, sport: Sport) -> Result<Option<ResolvedTeams>>;
}

/// Resolver that always declines; used when no key is configured
pub struct DisabledResolver;

#[async_trait]
impl TeamResolver for DisabledResolver {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn resolve(&self, _event_title: &str, _sport: Sport) -> Result<Option<ResolvedTeams>> {
        Ok(None)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ResolvedPayload {
    home_team: String,
    away_team: String,
    #[serde(default)]
    confidence: Option<String>,
}

/// Chat-completions backed resolver with a bounded cross-pass cache
pub struct LlmTeamResolver {
    config: ResolverConfig,
    http: reqwest::Client,
    /// Keyed by sport + normalized title; caches negative results too
    cache: DashMap<String, Option<ResolvedTeams>>,
}

impl LlmTeamResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            http,
            cache: DashMap::new(),
        })
    }

    fn cache_key(event_title: &str, sport: Sport) -> String {
        format!("{}::{}", sport.api_key(), normalize(event_title))
    }

    fn cache_insert(&self, key: String, value: Option<ResolvedTeams>) {
        if self.cache.len() >= self.config.cache_capacity {
            // Bounded cache: drop an arbitrary entry rather than grow forever
            if let Some(evict) = self.cache.iter().next().map(|e| e.key().clone()) {
                self.cache.remove(&evict);
            }
        }
        self.cache.insert(key, value);
    }

    fn prompt(event_title: &str, sport: Sport) -> String {
        format!(
            "You identify the two teams in a {} betting market title.\n\
             Title: \"{}\"\n\
             Respond with only a JSON object: {{\"home_team\": \"<full name>\", \
             \"away_team\": \"<full name>\", \"confidence\": \"high|medium|low\"}}. \
             Use full official team names. If unsure, set confidence to low.",
            sport.display_name(),
            event_title
        )
    }

    fn parse_content(content: &str) -> Option<ResolvedPayload> {
        // Models sometimes wrap the JSON in code fences or prose
        let start = content.find('{')?;
        let end = content.rfind('}')?;
        serde_json::from_str(&content[start..=end]).ok()
    }
}

#[async_trait]
impl TeamResolver for LlmTeamResolver {
    fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn resolve(&self, event_title: &str, sport: Sport) -> Result<Option<ResolvedTeams>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let key = Self::cache_key(event_title, sport);
        if let Some(cached) = self.cache.get(&key) {
            debug!(%event_title, "Resolver cache hit");
            return Ok(cached.clone());
        }

        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::prompt(event_title, sport),
            }],
            temperature: 0.0,
            max_tokens: 200,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%event_title, "Resolver call failed {}: {}", status, text);
            self.cache_insert(key, None);
            return Ok(None);
        }

        let chat: ChatResponse = response.json().await?;
        let content = match chat.choices.first() {
            Some(choice) => choice.message.content.as_str(),
            None => {
                self.cache_insert(key, None);
                return Ok(None);
            }
        };

        let resolved = Self::parse_content(content).map(|payload| ResolvedTeams {
            home_team: payload.home_team,
            away_team: payload.away_team,
            confidence: payload
                .confidence
                .as_deref()
                .map(ResolverConfidence::from_str_loose)
                .unwrap_or(ResolverConfidence::Medium),
        });

        if resolved.is_none() {
            warn!(%event_title, "Resolver returned unparseable content");
        }
        self.cache_insert(key, resolved.clone());
        Ok(resolved)
    }
}
