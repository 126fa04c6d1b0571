//! One detection pass
//!
//! The scheduler entry point's unit of work: refresh both legs' prices in
//! batch, walk the watch set sequentially, and account for everything in
//! counters. A single bad market never aborts a pass, and nothing is
//! written after the wall-clock deadline.

use crate::adapters::exchange::{ExchangeClient, TokenQuote};
use crate::adapters::notifier::AlertNotifier;
use crate::adapters::odds_api::{Game, OddsApiClient};
use crate::adapters::store::DetectorStore;
use crate::adapters::team_resolver::TeamResolver;
use crate::config::AppConfig;
use crate::detector::fair_prob::{fair_probability, probabilities_consistent};
use crate::detector::loader::load_watch_set;
use crate::detector::matcher::{match_market, MarketMatch, MatchContext};
use crate::detector::signal_builder::{EvaluationInput, SignalBuilder, Verdict};
use crate::domain::{is_sharp_book, normalize, SharpSnapshot, MarketType, Sport, WatchedMarket};
use crate::error::{EdgelineError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Counters reported back to the scheduler
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassCounters {
    pub events_polled: u64,
    pub events_matched: u64,
    pub events_expired: u64,
    pub edges_found: u64,
    pub movement_confirmed: u64,
    pub alerts_sent: u64,
    pub duration_ms: u64,
}

/// The detection core wired to its collaborators
pub struct DetectorService {
    store: Arc<dyn DetectorStore>,
    exchange: ExchangeClient,
    odds: Option<OddsApiClient>,
    resolver: Arc<dyn TeamResolver>,
    notifier: Arc<dyn AlertNotifier>,
    config: AppConfig,
}

impl DetectorService {
    pub fn new(
        store: Arc<dyn DetectorStore>,
        exchange: ExchangeClient,
        odds: Option<OddsApiClient>,
        resolver: Arc<dyn TeamResolver>,
        notifier: Arc<dyn AlertNotifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            exchange,
            odds,
            resolver,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DetectorStore> {
        &self.store
    }

    /// Run one full pass under the configured deadline. Only a missing
    /// odds credential is an error; everything else degrades to partial
    /// counters.
    pub async fn run_pass(&self) -> Result<PassCounters> {
        let odds = self
            .odds
            .as_ref()
            .ok_or_else(|| EdgelineError::MissingCredential("ODDS_API_KEY".into()))?;

        let started = Instant::now();
        let now = Utc::now();
        let counters = Arc::new(Mutex::new(PassCounters::default()));

        let deadline = Duration::from_secs(self.config.detector.pass_deadline_secs);
        let body = self.pass_body(odds, now, Arc::clone(&counters));

        match tokio::time::timeout(deadline, body).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Pass aborted: {}", e);
            }
            Err(_) => {
                warn!(
                    deadline_secs = self.config.detector.pass_deadline_secs,
                    "Pass deadline exceeded; returning partial counters"
                );
            }
        }

        let mut out = counters.lock().expect("counter lock").clone();
        out.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            events_polled = out.events_polled,
            events_matched = out.events_matched,
            events_expired = out.events_expired,
            edges_found = out.edges_found,
            movement_confirmed = out.movement_confirmed,
            alerts_sent = out.alerts_sent,
            duration_ms = out.duration_ms,
            "Pass complete"
        );
        Ok(out)
    }

    async fn pass_body(
        &self,
        odds: &OddsApiClient,
        now: DateTime<Utc>,
        counters: Arc<Mutex<PassCounters>>,
    ) -> Result<()> {
        let mut markets = load_watch_set(self.store.as_ref(), &self.config.loader, now).await?;

        // Markets backing currently-active signals get their prices
        // refreshed even when they fell out of the watch set
        let active_signals = self.store.list_active_signals().await?;
        let mut signal_markets: HashMap<String, WatchedMarket> = HashMap::new();
        for signal in &active_signals {
            if let Some(market) = self.store.get_market(&signal.condition_id).await? {
                signal_markets.insert(signal.condition_id.clone(), market);
            }
        }

        let mut token_ids: Vec<String> = Vec::new();
        let mut seen_tokens: HashSet<String> = HashSet::new();
        for market in markets.iter().chain(signal_markets.values()) {
            if let Some(token) = &market.yes_token_id {
                if seen_tokens.insert(token.clone()) {
                    token_ids.push(token.clone());
                }
            }
        }

        let sports: Vec<(Sport, Vec<&str>)> = {
            let mut wanted: HashMap<Sport, bool> = HashMap::new();
            for market in &markets {
                if let Some(sport) = market.sport {
                    let totals = wanted.entry(sport).or_insert(false);
                    *totals |= market.market_type == MarketType::Total;
                }
            }
            wanted
                .into_iter()
                .map(|(sport, totals)| {
                    (sport, if totals { vec!["h2h", "totals"] } else { vec!["h2h"] })
                })
                .collect()
        };

        // The two I/O-bulk phases run concurrently; everything downstream
        // joins on both
        let (quote_leg, games_by_sport) = tokio::join!(
            self.fetch_exchange_leg(&token_ids),
            self.fetch_odds_leg(odds, sports),
        );
        let (quotes, spreads) = quote_leg;

        self.refresh_active_signal_prices(&active_signals, &signal_markets, &quotes, now)
            .await;

        let retention_cutoff =
            now - ChronoDuration::hours(self.config.movement.retention_hours);
        if let Err(e) = self.store.prune_snapshots(retention_cutoff).await {
            warn!("Snapshot prune failed: {}", e);
        }

        let builder = SignalBuilder {
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            detector: &self.config.detector,
            movement: &self.config.movement,
        };
        let mut match_ctx = MatchContext::new(
            self.resolver.as_ref(),
            self.config.resolver.max_calls_per_pass,
        );

        for market in markets.iter_mut() {
            counters.lock().expect("counter lock").events_polled += 1;

            let result = self
                .process_market(
                    market,
                    &quotes,
                    &spreads,
                    &games_by_sport,
                    &builder,
                    &mut match_ctx,
                    &counters,
                    now,
                )
                .await;

            match result {
                Ok(Some(verdict)) => {
                    let mut c = counters.lock().expect("counter lock");
                    match verdict {
                        Verdict::EventExpired => c.events_expired += 1,
                        Verdict::Emitted {
                            alerted,
                            movement_confirmed,
                            ..
                        } => {
                            c.edges_found += 1;
                            if movement_confirmed {
                                c.movement_confirmed += 1;
                            }
                            if alerted {
                                c.alerts_sent += 1;
                            }
                        }
                        Verdict::Skipped(_) => {}
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        condition_id = %market.condition_id,
                        "Market processing failed: {}", e
                    );
                }
            }
        }

        Ok(())
    }

    async fn fetch_exchange_leg(
        &self,
        token_ids: &[String],
    ) -> (HashMap<String, TokenQuote>, HashMap<String, f64>) {
        let quotes = self.exchange.batch_quotes(token_ids).await;
        let spreads = self.exchange.batch_spreads(token_ids).await;
        (quotes, spreads)
    }

    async fn fetch_odds_leg(
        &self,
        odds: &OddsApiClient,
        sports: Vec<(Sport, Vec<&str>)>,
    ) -> HashMap<Sport, Vec<Game>> {
        let semaphore = Arc::new(Semaphore::new(self.config.odds.max_concurrent.max(1)));

        let fetches = sports.into_iter().map(|(sport, market_keys)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match odds.fetch_games(sport, &market_keys).await {
                    Ok(games) => Some((sport, games)),
                    Err(e) => {
                        warn!(sport = sport.api_key(), "Odds fetch failed: {}", e);
                        Some((sport, Vec::new()))
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Stateless price refresh for signals already on the dashboard:
    /// batch quote first, cached price as the fallback.
    async fn refresh_active_signal_prices(
        &self,
        signals: &[crate::domain::SignalOpportunity],
        signal_markets: &HashMap<String, WatchedMarket>,
        quotes: &HashMap<String, TokenQuote>,
        now: DateTime<Utc>,
    ) {
        for signal in signals {
            let Some(id) = signal.id else { continue };
            let Some(market) = signal_markets.get(&signal.condition_id) else {
                continue;
            };

            let live = market
                .yes_token_id
                .as_ref()
                .and_then(|token| quotes.get(token))
                .and_then(|q| q.ask_f64());

            let price = live.or_else(|| market.cached_yes_price_f64());
            let Some(price) = price else { continue };

            if let Err(e) = self
                .store
                .refresh_signal_price(id, price, market.cached_volume_f64(), now)
                .await
            {
                warn!(signal = %id, "Signal price refresh failed: {}", e);
            }
        }
    }

    /// Resolve the freshest YES price for a market: batch quote, then the
    /// single-market endpoint (tokens matched by id, never position), then
    /// the cache.
    async fn resolve_live_price(
        &self,
        market: &mut WatchedMarket,
        quotes: &HashMap<String, TokenQuote>,
        now: DateTime<Utc>,
    ) -> Result<Option<(f64, bool)>> {
        let Some(token) = market.yes_token_id.clone() else {
            // Rail 1 in the builder owns the skip accounting
            return Ok(market.cached_yes_price_f64().map(|p| (p, false)));
        };

        if let Some(ask) = quotes.get(&token).and_then(|q| q.ask) {
            self.store
                .update_market_cache_price(&market.condition_id, ask, None, now)
                .await?;
            self.touch_refresh_time(&market.condition_id, now).await?;
            market.cached_yes_price = Some(ask);
            return Ok(ask.to_f64().map(|p| (p, true)));
        }

        match self.exchange.fetch_market(&market.condition_id).await {
            Ok(snapshot) => {
                if let Some(price) = snapshot.price_for(&token) {
                    self.store
                        .update_market_cache_price(
                            &market.condition_id,
                            price,
                            snapshot.volume,
                            now,
                        )
                        .await?;
                    self.touch_refresh_time(&market.condition_id, now).await?;
                    market.cached_yes_price = Some(price);
                    if snapshot.volume.is_some() {
                        market.cached_volume = snapshot.volume;
                    }
                    return Ok(price.to_f64().map(|p| (p, true)));
                }
            }
            Err(e) => {
                debug!(
                    condition_id = %market.condition_id,
                    "Single-market fallback failed: {}", e
                );
            }
        }

        Ok(market.cached_yes_price_f64().map(|p| (p, false)))
    }

    async fn touch_refresh_time(&self, condition_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut state = self
            .store
            .get_watch_state(condition_id)
            .await?
            .unwrap_or_else(|| crate::domain::EventWatchState::monitored(condition_id));
        state.last_poly_refresh = Some(now);
        self.store.upsert_watch_state(&state).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_market(
        &self,
        market: &mut WatchedMarket,
        quotes: &HashMap<String, TokenQuote>,
        spreads: &HashMap<String, f64>,
        games_by_sport: &HashMap<Sport, Vec<Game>>,
        builder: &SignalBuilder<'_>,
        match_ctx: &mut MatchContext<'_>,
        counters: &Arc<Mutex<PassCounters>>,
        now: DateTime<Utc>,
    ) -> Result<Option<Verdict>> {
        // Started events expire regardless of price availability
        if market.has_started(now) {
            let input_stub = self.expired_input(market);
            let verdict = builder.evaluate(input_stub, now).await?;
            return Ok(Some(verdict));
        }

        let Some((live_yes_price, quote_is_live)) =
            self.resolve_live_price(market, quotes, now).await?
        else {
            if market.yes_token_id.is_none() {
                warn!(condition_id = %market.condition_id, "NO_TOKEN_ID_SKIP");
            } else {
                debug!(condition_id = %market.condition_id, "No price from any source");
            }
            return Ok(None);
        };

        // Unknown-sport bucket skips the sportsbook leg entirely
        let Some(sport) = market.sport else {
            return Ok(None);
        };
        let Some(games) = games_by_sport.get(&sport) else {
            return Ok(None);
        };

        let Some(matched) = match_market(market, games, now, match_ctx).await else {
            return Ok(None);
        };
        counters.lock().expect("counter lock").events_matched += 1;

        let spread = market
            .yes_token_id
            .as_ref()
            .and_then(|token| spreads.get(token).copied())
            .or_else(|| {
                market
                    .yes_token_id
                    .as_ref()
                    .and_then(|token| quotes.get(token))
                    .and_then(|q| q.spread_pct())
            });

        let (yes_label, no_label, yes_fair, no_fair, books_used, tier) = match &matched {
            MarketMatch::H2h(h2h) => {
                let yes = fair_probability(&h2h.game, "h2h", &h2h.yes_team);
                let no = fair_probability(&h2h.game, "h2h", &h2h.no_team);
                let (Some(yes), Some(no)) = (yes, no) else {
                    debug!(
                        condition_id = %market.condition_id,
                        "No consensus for one side; skipping"
                    );
                    return Ok(None);
                };
                if !probabilities_consistent(yes.probability, no.probability) {
                    warn!(
                        condition_id = %market.condition_id,
                        yes = yes.probability,
                        no = no.probability,
                        "PROBABILITY MISMATCH"
                    );
                    return Ok(None);
                }
                (
                    h2h.yes_team.clone(),
                    h2h.no_team.clone(),
                    yes.probability,
                    no.probability,
                    yes.books_used.min(no.books_used),
                    h2h.tier,
                )
            }
            MarketMatch::Totals(totals) => {
                let no_outcome = if totals.yes_outcome == "Over" {
                    "Under"
                } else {
                    "Over"
                };
                let yes = fair_probability(&totals.game, "totals", &totals.yes_outcome);
                let no = fair_probability(&totals.game, "totals", no_outcome);
                let (Some(yes), Some(no)) = (yes, no) else {
                    return Ok(None);
                };
                if !probabilities_consistent(yes.probability, no.probability) {
                    warn!(
                        condition_id = %market.condition_id,
                        "PROBABILITY MISMATCH"
                    );
                    return Ok(None);
                }
                (
                    totals.yes_outcome.clone(),
                    no_outcome.to_string(),
                    yes.probability,
                    no.probability,
                    yes.books_used.min(no.books_used),
                    totals.tier,
                )
            }
        };

        let verdict = builder
            .evaluate(
                EvaluationInput {
                    market,
                    yes_label: &yes_label,
                    no_label: &no_label,
                    yes_fair,
                    no_fair,
                    books_used,
                    live_yes_price,
                    quote_is_live,
                    spread,
                    match_tier: tier,
                },
                now,
            )
            .await?;

        // Snapshots written this pass are only consumed by the next pass:
        // the movement read above happened before this write
        let snapshots = capture_snapshots(market, &matched, now);
        if let Err(e) = self.store.insert_snapshots(&snapshots).await {
            warn!(condition_id = %market.condition_id, "Snapshot write failed: {}", e);
        }

        Ok(Some(verdict))
    }

    /// Minimal input for a market that only needs the event-start gate
    fn expired_input<'m>(&self, market: &'m WatchedMarket) -> EvaluationInput<'m> {
        EvaluationInput {
            market,
            yes_label: "",
            no_label: "",
            yes_fair: 0.0,
            no_fair: 0.0,
            books_used: 0,
            live_yes_price: 0.0,
            quote_is_live: false,
            spread: None,
            match_tier: crate::detector::matcher::MatchTier::Direct,
        }
    }
}

/// One snapshot per (sharp book, outcome) for the matched game, keyed so
/// the movement detector's lookups by recommended outcome line up.
fn capture_snapshots(
    market: &WatchedMarket,
    matched: &MarketMatch,
    now: DateTime<Utc>,
) -> Vec<SharpSnapshot> {
    let (game, market_key, labels) = match matched {
        MarketMatch::H2h(h2h) => (
            &h2h.game,
            "h2h",
            vec![h2h.yes_team.clone(), h2h.no_team.clone()],
        ),
        MarketMatch::Totals(totals) => (
            &totals.game,
            "totals",
            vec!["Over".to_string(), "Under".to_string()],
        ),
    };

    let mut snapshots = Vec::new();
    for bookmaker in &game.bookmakers {
        if !is_sharp_book(&bookmaker.key) {
            continue;
        }
        let Some(odds_market) = bookmaker.market(market_key) else {
            continue;
        };
        for label in &labels {
            let label_norm = normalize(label);
            let outcome = odds_market.outcomes.iter().find(|o| {
                let name = normalize(&o.name);
                name == label_norm || name.contains(&label_norm) || label_norm.contains(&name)
            });
            if let Some(outcome) = outcome {
                if outcome.price > 1.0 {
                    snapshots.push(SharpSnapshot::new(
                        &market.event_title,
                        label,
                        &bookmaker.key,
                        outcome.price,
                        now,
                    ));
                }
            }
        }
    }
    snapshots
}
