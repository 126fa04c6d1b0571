//! Exchange-to-sportsbook event matching
//!
//! Resolves one exchange market to exactly one sportsbook game and, for
//! H2H, the bookmaker outcome backing each side of the binary contract.
//! The exchange title's "<yes> vs <no>" ordering is the source of truth
//! for YES/NO assignment and is never inferred from anything else.
//!
//! Four tiers, stopping at the first success: direct string match, local
//! nickname expansion, word-overlap fuzzy match, and a capped external
//! language resolver.

use crate::adapters::odds_api::Game;
use crate::adapters::team_resolver::{ResolverConfidence, TeamResolver};
use crate::domain::{normalize, MarketType, Sport, WatchedMarket};
use crate::sports::{expand_nickname, strip_affixes, team_nickname};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Fuzzy tier acceptance floor
const FUZZY_MIN_SCORE: f64 = 0.5;

/// Which strategy produced the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Direct,
    Nickname,
    Fuzzy,
    Resolver,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Direct => "direct",
            MatchTier::Nickname => "nickname",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Resolver => "resolver",
        }
    }
}

/// H2H match: game plus the outcome identity of each binary side
#[derive(Debug, Clone)]
pub struct H2hMatch {
    pub game: Game,
    /// Index into the reference bookmaker's H2H outcome list
    pub yes_index: usize,
    pub no_index: usize,
    /// Bookmaker-canonical team name backing the YES side
    pub yes_team: String,
    pub no_team: String,
    pub tier: MatchTier,
}

/// Totals match: game plus which side of the line the YES contract backs
#[derive(Debug, Clone)]
pub struct TotalsMatch {
    pub game: Game,
    /// "Over" or "Under"
    pub yes_outcome: String,
    pub tier: MatchTier,
}

#[derive(Debug, Clone)]
pub enum MarketMatch {
    H2h(H2hMatch),
    Totals(TotalsMatch),
}

impl MarketMatch {
    pub fn tier(&self) -> MatchTier {
        match self {
            MarketMatch::H2h(m) => m.tier,
            MarketMatch::Totals(m) => m.tier,
        }
    }

    pub fn game(&self) -> &Game {
        match self {
            MarketMatch::H2h(m) => &m.game,
            MarketMatch::Totals(m) => &m.game,
        }
    }
}

/// Per-pass matcher state: the resolver seam and its remaining quota
pub struct MatchContext<'a> {
    pub resolver: &'a dyn TeamResolver,
    pub llm_calls_remaining: u32,
}

impl<'a> MatchContext<'a> {
    pub fn new(resolver: &'a dyn TeamResolver, llm_call_cap: u32) -> Self {
        Self {
            resolver,
            llm_calls_remaining: llm_call_cap,
        }
    }
}

// ==================== Time guards ====================

/// Applied before any matcher tier. The date-delta guard prevents
/// cross-game mismatches for recurring fixtures; the window guard keeps
/// finished and far-future games out of consideration.
fn passes_time_guards(market: &WatchedMarket, game: &Game, now: DateTime<Utc>) -> bool {
    if let Some(event_start) = market.event_start_time {
        let delta = (game.commence_time - event_start).num_hours().abs();
        if delta > 24 {
            debug!(
                game = %game.id,
                delta_hours = delta,
                "Date-delta guard rejected game"
            );
            return false;
        }
    }

    game.commence_time >= now - Duration::minutes(30)
        && game.commence_time <= now + Duration::hours(24)
}

// ==================== Direct matcher ====================

fn word_set(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// At least one non-trivial word (length > 2) of the team name appears in
/// the normalized exchange text
fn team_word_present(text_words: &HashSet<String>, team: &str) -> bool {
    strip_affixes(team)
        .split_whitespace()
        .any(|w| w.len() > 2 && text_words.contains(w))
}

fn direct_qualifies(text_words: &HashSet<String>, game: &Game) -> bool {
    team_word_present(text_words, &game.home_team)
        && team_word_present(text_words, &game.away_team)
}

/// Token-overlap count between two affix-stripped names
fn shared_tokens(a: &str, b: &str) -> usize {
    let a_words: HashSet<String> = strip_affixes(a).split_whitespace().map(String::from).collect();
    let b_words: HashSet<String> = strip_affixes(b).split_whitespace().map(String::from).collect();
    a_words.intersection(&b_words).count()
}

/// Three-stage team assignment: exact, containment, token overlap.
/// `exclude` prevents double-mapping onto an already-claimed candidate.
fn team_index_for(half: &str, candidates: &[&str], exclude: Option<usize>) -> Option<usize> {
    let half_stripped = strip_affixes(half);
    if half_stripped.is_empty() {
        return None;
    }

    let allowed = |idx: usize| exclude != Some(idx);

    // (a) exact normalized match after affix stripping
    for (idx, candidate) in candidates.iter().enumerate() {
        if allowed(idx) && strip_affixes(candidate) == half_stripped {
            return Some(idx);
        }
    }

    // (b) substring containment in either direction
    for (idx, candidate) in candidates.iter().enumerate() {
        if !allowed(idx) {
            continue;
        }
        let cand_stripped = strip_affixes(candidate);
        if cand_stripped.contains(&half_stripped) || half_stripped.contains(&cand_stripped) {
            return Some(idx);
        }
    }

    // (c) token-overlap scoring, two shared tokens minimum
    let mut best: Option<(usize, usize)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        if !allowed(idx) {
            continue;
        }
        let score = shared_tokens(half, candidate);
        if score >= 2 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Locate the reference bookmaker's H2H outcome index for a team name
fn outcome_index(game: &Game, team: &str) -> Option<usize> {
    let market = game
        .bookmakers
        .iter()
        .find_map(|b| b.market("h2h"))?;

    let team_stripped = strip_affixes(team);
    market.outcomes.iter().position(|o| {
        let name = strip_affixes(&o.name);
        name == team_stripped || name.contains(&team_stripped) || team_stripped.contains(&name)
    })
}

/// The shared final step of every tier: map both title halves onto the
/// chosen game's teams and the reference bookmaker's outcomes.
fn assign_sides(game: &Game, yes_half: &str, no_half: &str, tier: MatchTier) -> Option<H2hMatch> {
    let candidates = [game.home_team.as_str(), game.away_team.as_str()];

    let yes_pick = team_index_for(yes_half, &candidates, None)?;
    let no_pick = team_index_for(no_half, &candidates, Some(yes_pick))?;
    if yes_pick == no_pick {
        return None;
    }

    let yes_team = candidates[yes_pick].to_string();
    let no_team = candidates[no_pick].to_string();

    let yes_index = outcome_index(game, &yes_team)?;
    let no_index = outcome_index(game, &no_team)?;
    if yes_index == no_index {
        warn!(
            game = %game.id,
            "Both sides resolved to the same outcome; rejecting match"
        );
        return None;
    }

    Some(H2hMatch {
        game: game.clone(),
        yes_index,
        no_index,
        yes_team,
        no_team,
        tier,
    })
}

/// Direct matcher over a candidate list: qualification plus assignment
fn direct_match(
    exchange_text: &str,
    yes_half: &str,
    no_half: &str,
    games: &[&Game],
    tier: MatchTier,
) -> Option<H2hMatch> {
    let text_words = word_set(exchange_text);

    for game in games {
        if !direct_qualifies(&text_words, game) {
            continue;
        }
        if let Some(matched) = assign_sides(game, yes_half, no_half, tier) {
            return Some(matched);
        }
    }
    None
}

// ==================== Fuzzy tier ====================

/// Word-overlap similarity between the exchange title and "home vs away"
fn jaccard_similarity(title: &str, game: &Game) -> f64 {
    let a = word_set(title);
    let b = word_set(&format!("{} vs {}", game.home_team, game.away_team));
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Guard: at least one team's nickname appears in the exchange text
fn nickname_guard(text_words: &HashSet<String>, game: &Game) -> bool {
    [&game.home_team, &game.away_team].iter().any(|team| {
        team_nickname(team)
            .map(|nick| text_words.contains(&nick))
            .unwrap_or(false)
    })
}

fn fuzzy_candidate<'g>(title: &str, games: &[&'g Game]) -> Option<&'g Game> {
    let text_words = word_set(title);

    games
        .iter()
        .map(|g| (*g, jaccard_similarity(title, g)))
        .filter(|(g, score)| *score >= FUZZY_MIN_SCORE && nickname_guard(&text_words, g))
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(g, _)| g)
}

// ==================== Resolver tier ====================

/// Overlap-based choice of which resolved team backs the YES half.
/// Title order stays authoritative; the resolver only supplies names.
fn order_resolved(yes_half: &str, home: &str, away: &str) -> (String, String) {
    let yes_home = shared_tokens(yes_half, home);
    let yes_away = shared_tokens(yes_half, away);
    let half_norm = strip_affixes(yes_half);
    let home_contains = strip_affixes(home).contains(&half_norm);
    let away_contains = strip_affixes(away).contains(&half_norm);

    if yes_home > yes_away || (home_contains && !away_contains) {
        (home.to_string(), away.to_string())
    } else if yes_away > yes_home || (away_contains && !home_contains) {
        (away.to_string(), home.to_string())
    } else {
        (home.to_string(), away.to_string())
    }
}

// ==================== Entry point ====================

/// Match one watched market against its sport's candidate games.
pub async fn match_market(
    market: &WatchedMarket,
    games: &[Game],
    now: DateTime<Utc>,
    ctx: &mut MatchContext<'_>,
) -> Option<MarketMatch> {
    // No consensus semantics defined for these; downstream skips them
    if matches!(
        market.market_type,
        MarketType::Spread | MarketType::PlayerProp | MarketType::Futures
    ) {
        return None;
    }

    let (yes_half, no_half) = market.title_teams()?;

    let candidates: Vec<&Game> = games
        .iter()
        .filter(|g| g.has_consensus_depth() && passes_time_guards(market, g, now))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let h2h = match_h2h(market, &yes_half, &no_half, &candidates, ctx).await?;

    match market.market_type {
        MarketType::H2h => Some(MarketMatch::H2h(h2h)),
        MarketType::Total => {
            let yes_outcome = totals_outcome(&market.question)?;
            Some(MarketMatch::Totals(TotalsMatch {
                game: h2h.game,
                yes_outcome,
                tier: h2h.tier,
            }))
        }
        MarketType::Spread | MarketType::PlayerProp | MarketType::Futures => None,
    }
}

async fn match_h2h(
    market: &WatchedMarket,
    yes_half: &str,
    no_half: &str,
    candidates: &[&Game],
    ctx: &mut MatchContext<'_>,
) -> Option<H2hMatch> {
    let exchange_text = format!("{} {}", market.event_title, market.question);
    let sport = market.sport.unwrap_or(Sport::Unknown);

    // Tier 1: direct string match
    if let Some(m) = direct_match(&exchange_text, yes_half, no_half, candidates, MatchTier::Direct)
    {
        return Some(m);
    }

    // Tier 2: local nickname expansion; both halves must resolve
    if let (Some(yes_full), Some(no_full)) = (
        expand_nickname(sport, yes_half),
        expand_nickname(sport, no_half),
    ) {
        let yes_norm = strip_affixes(yes_full);
        let no_norm = strip_affixes(no_full);
        let filtered: Vec<&Game> = candidates
            .iter()
            .filter(|g| {
                let teams = format!(
                    "{} {}",
                    strip_affixes(&g.home_team),
                    strip_affixes(&g.away_team)
                );
                teams.contains(&yes_norm) && teams.contains(&no_norm)
            })
            .copied()
            .collect();

        let expanded_text = format!("{} vs {}", yes_full, no_full);
        if let Some(m) = direct_match(
            &expanded_text,
            yes_full,
            no_full,
            &filtered,
            MatchTier::Nickname,
        ) {
            return Some(m);
        }
    }

    // Tier 3: fuzzy word-overlap on the title alone
    if let Some(game) = fuzzy_candidate(&market.event_title, candidates) {
        if let Some(m) = direct_match(
            &exchange_text,
            yes_half,
            no_half,
            &[game],
            MatchTier::Fuzzy,
        ) {
            return Some(m);
        }
    }

    // Tier 4: external language resolution, quota- and confidence-gated
    if ctx.resolver.is_enabled() && ctx.llm_calls_remaining > 0 {
        ctx.llm_calls_remaining -= 1;
        match ctx.resolver.resolve(&market.event_title, sport).await {
            Ok(Some(resolved)) => {
                if resolved.confidence == ResolverConfidence::Low {
                    debug!(title = %market.event_title, "Resolver low confidence; rejected");
                    return None;
                }

                // Validate against the original title: at least one resolved
                // nickname must appear, otherwise the resolver hallucinated
                let title_words = word_set(&market.event_title);
                let validated = [&resolved.home_team, &resolved.away_team]
                    .iter()
                    .any(|team| {
                        team_nickname(team)
                            .map(|nick| title_words.contains(&nick))
                            .unwrap_or(false)
                    });
                if !validated {
                    warn!(
                        title = %market.event_title,
                        home = %resolved.home_team,
                        away = %resolved.away_team,
                        "Resolver answer failed title validation"
                    );
                    return None;
                }

                let home_norm = strip_affixes(&resolved.home_team);
                let away_norm = strip_affixes(&resolved.away_team);
                let filtered: Vec<&Game> = candidates
                    .iter()
                    .filter(|g| {
                        let teams = format!(
                            "{} {}",
                            strip_affixes(&g.home_team),
                            strip_affixes(&g.away_team)
                        );
                        teams.contains(&home_norm) && teams.contains(&away_norm)
                    })
                    .copied()
                    .collect();

                let (yes_full, no_full) =
                    order_resolved(yes_half, &resolved.home_team, &resolved.away_team);
                let expanded_text = format!("{} vs {}", yes_full, no_full);
                return direct_match(
                    &expanded_text,
                    &yes_full,
                    &no_full,
                    &filtered,
                    MatchTier::Resolver,
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(title = %market.event_title, "Resolver error: {}", e);
            }
        }
    }

    None
}

/// Which side of the line the exchange question asks about. Whole-word
/// matching, so city names like "Denver" never read as "over".
fn totals_outcome(question: &str) -> Option<String> {
    let norm = normalize(question);
    let mut over_pos = None;
    let mut under_pos = None;
    for (idx, word) in norm.split_whitespace().enumerate() {
        if word == "over" && over_pos.is_none() {
            over_pos = Some(idx);
        }
        if word == "under" && under_pos.is_none() {
            under_pos = Some(idx);
        }
    }
    match (over_pos, under_pos) {
        (Some(o), Some(u)) if o < u => Some("Over".to_string()),
        (Some(_), None) => Some("Over".to_string()),
        (Some(_), Some(_)) | (None, Some(_)) => Some("Under".to_string()),
        (None, None) => None,
    }
}
