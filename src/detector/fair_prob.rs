//! Consensus fair probability engine
//!
//! Removes each bookmaker's overround, drops draws and outlier books,
//! upweights the sharp set, and returns the weighted mean probability for
//! one named outcome.

use crate::domain::{is_sharp_book, normalize, SHARP_WEIGHT};
use crate::adapters::odds_api::{Game, Outcome};
use crate::sports::team_nickname;
use tracing::debug;

/// Per-book fair probabilities outside this band signal malformed books or
/// stale prices and are dropped from consensus.
const OUTLIER_HIGH: f64 = 0.92;
const OUTLIER_LOW: f64 = 0.08;

/// Consensus output for one outcome
#[derive(Debug, Clone, Copy)]
pub struct FairProbability {
    pub probability: f64,
    pub books_used: usize,
}

/// Tolerance on `yes + no = 1` for an H2H pair; beyond it the YES/NO team
/// assignment is suspect and the match is discarded.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 0.05;

pub fn probabilities_consistent(yes_fair: f64, no_fair: f64) -> bool {
    (yes_fair + no_fair - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE
}

fn is_draw_outcome(name: &str) -> bool {
    let n = normalize(name);
    n == "draw" || n == "tie"
}

/// Locate the target outcome by exact normalized name, then by nickname
/// containment in either direction.
fn find_target<'a>(outcomes: &'a [Outcome], target: &str) -> Option<&'a Outcome> {
    let target_norm = normalize(target);

    if let Some(o) = outcomes.iter().find(|o| normalize(&o.name) == target_norm) {
        return Some(o);
    }

    outcomes.iter().find(|o| {
        let name_norm = normalize(&o.name);
        if name_norm.contains(&target_norm) || target_norm.contains(&name_norm) {
            return true;
        }
        match (team_nickname(&o.name), team_nickname(target)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}

/// Weighted consensus fair probability of `target_outcome` across every
/// bookmaker quoting `market_key` on the game. None when no book
/// contributed.
pub fn fair_probability(game: &Game, market_key: &str, target_outcome: &str) -> Option<FairProbability> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut books_used = 0usize;

    for bookmaker in &game.bookmakers {
        let Some(market) = bookmaker.market(market_key) else {
            continue;
        };

        // Three-way soccer markets collapse to two-way
        let contenders: Vec<&Outcome> = market
            .outcomes
            .iter()
            .filter(|o| !is_draw_outcome(&o.name) && o.price > 1.0)
            .collect();
        if contenders.len() < 2 {
            continue;
        }

        let owned: Vec<Outcome> = contenders.iter().map(|o| (*o).clone()).collect();
        let Some(target) = find_target(&owned, target_outcome) else {
            continue;
        };

        let overround: f64 = owned.iter().map(|o| 1.0 / o.price).sum();
        if overround <= 0.0 {
            continue;
        }
        let fair = (1.0 / target.price) / overround;

        if !(OUTLIER_LOW..=OUTLIER_HIGH).contains(&fair) {
            debug!(
                book = bookmaker.key.as_str(),
                fair, "Dropping outlier book from consensus"
            );
            continue;
        }

        let weight = if is_sharp_book(&bookmaker.key) {
            SHARP_WEIGHT
        } else {
            1.0
        };

        weighted_sum += fair * weight;
        weight_total += weight;
        books_used += 1;
    }

    if books_used == 0 {
        return None;
    }

    Some(FairProbability {
        probability: weighted_sum / weight_total,
        books_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::odds_api::{BookmakerOdds, MarketOdds};
    use chrono::Utc;

    fn game_with_books(books: Vec<(&str, Vec<(&str, f64)>)>) -> Game {
        Game {
            id: "g1".to_string(),
            sport_key: "basketball_nba".to_string(),
            commence_time: Utc::now(),
            home_team: "Boston Celtics".to_string(),
            away_team: "Los Angeles Lakers".to_string(),
            bookmakers: books
                .into_iter()
                .map(|(key, outcomes)| BookmakerOdds {
                    key: key.to_string(),
                    title: key.to_string(),
                    markets: vec![MarketOdds {
                        key: "h2h".to_string(),
                        outcomes: outcomes
                            .into_iter()
                            .map(|(name, price)| Outcome {
                                name: name.to_string(),
                                price,
                                point: None,
                            })
                            .collect(),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn test_vig_removal_sums_to_one() {
        // 1.87 / 2.05 carries ~3.6% vig; fair probs must renormalize
        let game = game_with_books(vec![(
            "draftkings",
            vec![("Boston Celtics", 1.87), ("Los Angeles Lakers", 2.05)],
        )]);

        let celtics = fair_probability(&game, "h2h", "Boston Celtics").unwrap();
        let lakers = fair_probability(&game, "h2h", "Los Angeles Lakers").unwrap();
        assert!((celtics.probability + lakers.probability - 1.0).abs() < 1e-9);
        assert!(celtics.probability > 0.5);
    }

    #[test]
    fn test_sharp_books_upweighted() {
        // Pinnacle says 60%, a soft book says 50%; consensus leans sharp
        let game = game_with_books(vec![
            (
                "pinnacle",
                vec![("Boston Celtics", 1.0 / 0.6), ("Los Angeles Lakers", 1.0 / 0.4)],
            ),
            (
                "draftkings",
                vec![("Boston Celtics", 2.0), ("Los Angeles Lakers", 2.0)],
            ),
        ]);

        let celtics = fair_probability(&game, "h2h", "Boston Celtics").unwrap();
        assert_eq!(celtics.books_used, 2);
        let expected = (0.6 * 1.5 + 0.5) / 2.5;
        assert!((celtics.probability - expected).abs() < 1e-9);
    }

    #[test]
    fn test_draw_filtered_and_renormalized() {
        // Three-way soccer market: draw outcome dropped, two-way renormalized
        let game = game_with_books(vec![(
            "pinnacle",
            vec![
                ("Manchester United", 2.5),
                ("Draw", 3.4),
                ("Arsenal", 2.8),
            ],
        )]);

        let united = fair_probability(&game, "h2h", "Manchester United").unwrap();
        let arsenal = fair_probability(&game, "h2h", "Arsenal").unwrap();
        assert!((united.probability + arsenal.probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_book_dropped() {
        let game = game_with_books(vec![
            (
                "pinnacle",
                vec![("Boston Celtics", 1.0 / 0.55), ("Los Angeles Lakers", 1.0 / 0.45)],
            ),
            // Malformed book: would imply 95% fair
            (
                "softbook",
                vec![("Boston Celtics", 1.05), ("Los Angeles Lakers", 20.0)],
            ),
        ]);

        let celtics = fair_probability(&game, "h2h", "Boston Celtics").unwrap();
        assert_eq!(celtics.books_used, 1);
        assert!((celtics.probability - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_nickname_containment_lookup() {
        let game = game_with_books(vec![(
            "pinnacle",
            vec![("Boston Celtics", 2.0), ("Los Angeles Lakers", 2.0)],
        )]);
        // Bare nickname resolves via containment
        assert!(fair_probability(&game, "h2h", "Celtics").is_some());
    }

    #[test]
    fn test_absent_team_returns_none() {
        let game = game_with_books(vec![(
            "pinnacle",
            vec![("Boston Celtics", 2.0), ("Los Angeles Lakers", 2.0)],
        )]);
        assert!(fair_probability(&game, "h2h", "Chicago Bulls").is_none());
    }

    #[test]
    fn test_consistency_band() {
        assert!(probabilities_consistent(0.52, 0.50));
        assert!(!probabilities_consistent(0.70, 0.40));
    }
}
