//! Bet recommendation engine
//!
//! Turns per-boat finishing-position probabilities into ranked candidates
//! for the five wager types:
//!
//! | type | combination | probability |
//! |------|-------------|-------------|
//! | 単勝 (tansho) | `i` | P1(i) |
//! | 2連単 (nirentan) | `i-j` | P1(i) × P2(j) |
//! | 2連複 (nirenpuku) | `i=j` | P1(i) × P2(j) + P1(j) × P2(i) |
//! | 3連単 (sanrentan) | `i-j-k` | P1(i) × P2(j) × P3(k) |
//! | 3連複 (sanrenpuku) | `i=j=k` | sum of 3連単 over the 6 orderings |
//!
//! Inputs are used as-is: no normalization, no clamping. Missing boats just
//! drop out of every combination that needs them.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::models::{
    BetCandidate, BoatProbability, FlatRecommendation, RecommendationSet, WagerType, NUM_BOATS,
};

/// Combination before classification
struct Scored {
    boats: Vec<u8>,
    probability: f64,
}

/// Compute ranked recommendations for all wager types.
///
/// Never fails. Duplicate boat numbers keep the first entry and boat numbers
/// outside 1..=6 are ignored.
///
/// # Examples
/// ```
/// use boatrace::core::recommend::compute_recommendations;
/// use boatrace::BoatProbability;
///
/// let boats: Vec<_> = (1..=6).map(BoatProbability::uniform).collect();
/// let set = compute_recommendations(&boats);
/// assert_eq!(set.tansho.len(), 6);
/// assert_eq!(set.sanrentan.len(), 10);
/// ```
pub fn compute_recommendations(boats: &[BoatProbability]) -> RecommendationSet {
    let field = prepare_field(boats);

    if field.len() < boats.len() || field.len() < NUM_BOATS {
        debug!(
            supplied = boats.len(),
            usable = field.len(),
            "Degraded input, computing over usable boats only"
        );
    }

    let set = RecommendationSet {
        tansho: rank(WagerType::Tansho, tansho(&field)),
        nirentan: rank(WagerType::Nirentan, nirentan(&field)),
        nirenpuku: rank(WagerType::Nirenpuku, nirenpuku(&field)),
        sanrentan: rank(WagerType::Sanrentan, sanrentan(&field)),
        sanrenpuku: rank(WagerType::Sanrenpuku, sanrenpuku(&field)),
    };

    debug!(
        tansho = set.tansho.len(),
        nirentan = set.nirentan.len(),
        nirenpuku = set.nirenpuku.len(),
        sanrentan = set.sanrentan.len(),
        sanrenpuku = set.sanrenpuku.len(),
        "Computed recommendations"
    );

    set
}

/// Usable boats, deduplicated and sorted by boat number
fn prepare_field(boats: &[BoatProbability]) -> Vec<&BoatProbability> {
    let mut seen = HashSet::with_capacity(NUM_BOATS);
    let mut field: Vec<&BoatProbability> = boats
        .iter()
        .filter(|b| (1..=NUM_BOATS as u8).contains(&b.boat_number))
        .filter(|b| seen.insert(b.boat_number))
        .collect();
    field.sort_by_key(|b| b.boat_number);
    field
}

/// P(first=a, second=b, third=c, ...) as the product of rank marginals
fn ordered_probability(order: &[&BoatProbability]) -> f64 {
    order
        .iter()
        .enumerate()
        .map(|(pos, boat)| boat.rank_probs()[pos])
        .product()
}

fn tansho(field: &[&BoatProbability]) -> Vec<Scored> {
    field
        .iter()
        .map(|b| Scored {
            boats: vec![b.boat_number],
            probability: b.win_prob,
        })
        .collect()
}

fn nirentan(field: &[&BoatProbability]) -> Vec<Scored> {
    let mut scored = Vec::with_capacity(30);

    for first in field {
        for second in field {
            if first.boat_number == second.boat_number {
                continue;
            }

            scored.push(Scored {
                boats: vec![first.boat_number, second.boat_number],
                probability: first.win_prob * second.second_prob,
            });
        }
    }

    scored
}

fn nirenpuku(field: &[&BoatProbability]) -> Vec<Scored> {
    let mut scored = Vec::with_capacity(15);

    for (i, a) in field.iter().enumerate() {
        for b in &field[i + 1..] {
            let probability = a.win_prob * b.second_prob + b.win_prob * a.second_prob;

            scored.push(Scored {
                boats: vec![a.boat_number, b.boat_number],
                probability,
            });
        }
    }

    scored
}

fn sanrentan(field: &[&BoatProbability]) -> Vec<Scored> {
    let mut scored = Vec::with_capacity(120);

    for first in field {
        for second in field {
            if first.boat_number == second.boat_number {
                continue;
            }

            for third in field {
                if third.boat_number == first.boat_number
                    || third.boat_number == second.boat_number
                {
                    continue;
                }

                scored.push(Scored {
                    boats: vec![first.boat_number, second.boat_number, third.boat_number],
                    probability: ordered_probability(&[*first, *second, *third]),
                });
            }
        }
    }

    scored
}

fn sanrenpuku(field: &[&BoatProbability]) -> Vec<Scored> {
    let mut scored = Vec::with_capacity(20);

    for (i, a) in field.iter().enumerate() {
        for (j, b) in field.iter().enumerate().skip(i + 1) {
            for c in &field[j + 1..] {
                let probability = [
                    [a, b, c],
                    [a, c, b],
                    [b, a, c],
                    [b, c, a],
                    [c, a, b],
                    [c, b, a],
                ]
                .iter()
                .map(|order| ordered_probability(&[*order[0], *order[1], *order[2]]))
                .sum::<f64>();

                scored.push(Scored {
                    boats: vec![a.boat_number, b.boat_number, c.boat_number],
                    probability,
                });
            }
        }
    }

    scored
}

/// Descending by probability; NaN sorts after every number
fn cmp_probability_desc(a: f64, b: f64) -> Ordering {
    match b.partial_cmp(&a) {
        Some(ordering) => ordering,
        None => a.is_nan().cmp(&b.is_nan()),
    }
}

/// Sort, truncate to the wager type's cap and classify
fn rank(wager_type: WagerType, mut scored: Vec<Scored>) -> Vec<BetCandidate> {
    scored.sort_by(|a, b| {
        cmp_probability_desc(a.probability, b.probability).then_with(|| a.boats.cmp(&b.boats))
    });

    if let Some(max) = wager_type.max_candidates() {
        scored.truncate(max);
    }

    scored
        .into_iter()
        .map(|s| BetCandidate {
            combination: wager_type.format_combination(&s.boats),
            probability: s.probability,
            confidence: wager_type.classify(s.probability),
        })
        .collect()
}

/// Settings for the flat cross-wager-type view
#[derive(Debug, Clone)]
pub struct FlatViewConfig {
    /// Minimum (exclusive) win probability for a 単勝 row
    pub win_threshold: f64,
    /// Minimum (exclusive) probability for a 2連単 row
    pub pair_threshold: f64,
    /// Maximum number of rows
    pub limit: usize,
}

impl Default for FlatViewConfig {
    fn default() -> Self {
        Self {
            win_threshold: 0.25,
            pair_threshold: 0.08,
            limit: 10,
        }
    }
}

/// Flatten 単勝 and 2連単 candidates into one ranked list.
///
/// Rows keep the confidence tier of their own wager type.
pub fn flatten_recommendations(
    set: &RecommendationSet,
    config: &FlatViewConfig,
) -> Vec<FlatRecommendation> {
    let wins = set
        .tansho
        .iter()
        .filter(|c| c.probability > config.win_threshold)
        .map(|c| (WagerType::Tansho, c));
    let pairs = set
        .nirentan
        .iter()
        .filter(|c| c.probability > config.pair_threshold)
        .map(|c| (WagerType::Nirentan, c));

    let mut rows: Vec<FlatRecommendation> = wins
        .chain(pairs)
        .map(|(wager_type, c)| FlatRecommendation {
            wager_type,
            bet: c.combination.clone(),
            probability: c.probability,
            confidence: c.confidence,
        })
        .collect();

    rows.sort_by(|a, b| {
        cmp_probability_desc(a.probability, b.probability)
            .then_with(|| a.wager_type.cmp(&b.wager_type))
            .then_with(|| a.bet.cmp(&b.bet))
    });
    rows.truncate(config.limit);

    rows
}
