//! Swiss pairing engine.
//!
//! 1. Odd field: the lowest-ranked competitor without a previous bye sits out with a bye
//!    (the lowest-ranked overall when everyone has had one).
//! 2. The rest are sorted by ranking order.
//! 3. From the top, each unpaired competitor takes the unpaired candidate with the smallest
//!    `10 * |points diff| + 3 * |match wins diff|`, never a past opponent; ties go to rank order.
//! 4. When that greedy choice strands someone later, the search backtracks to the next-best
//!    candidate. Only if no rematch-free pairing exists at all are extra byes handed to
//!    competitors left without an eligible opponent, as few as possible.
//! 5. If the search runs out of steps, a single greedy pass decides the draw instead and
//!    anyone it leaves without an eligible opponent gets a bye.

use crate::logic::standings;
use crate::models::{CompetitorId, EngineError, Standing};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Search steps allowed when the caller does not pass a budget.
pub const DEFAULT_SEARCH_BUDGET: usize = 200_000;

const POINTS_WEIGHT: i64 = 10;
const WINS_WEIGHT: i64 = 3;

/// One entry of a round's draw.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pairing {
    /// `a` is the higher-ranked side.
    Match { a: CompetitorId, b: CompetitorId },
    Bye { competitor: CompetitorId },
}

/// Next round's pairings from current standings.
pub fn generate_pairings(standings: &[Standing]) -> Result<Vec<Pairing>, EngineError> {
    generate_pairings_with_budget(standings, DEFAULT_SEARCH_BUDGET)
}

pub fn generate_pairings_with_budget(standings: &[Standing], budget: usize) -> Result<Vec<Pairing>, EngineError> {
    if standings.is_empty() {
        return Err(EngineError::NotEnoughCompetitors { required: 1, actual: 0 });
    }
    let mut seen = HashSet::new();
    for s in standings {
        if !seen.insert(s.competitor) {
            return Err(EngineError::DuplicateCompetitor(s.competitor));
        }
    }

    let mut ranked = standings.to_vec();
    standings::rank(&mut ranked);

    let odd_bye = if ranked.len() % 2 == 1 {
        let idx = ranked.iter().rposition(|s| !s.had_bye()).unwrap_or(ranked.len() - 1);
        let byed = ranked.remove(idx);
        log::debug!("odd field: bye to {} (rank {})", byed.competitor, idx + 1);
        Some(byed.competitor)
    } else {
        None
    };

    let mut search = Search::new(&ranked, budget);
    let mut extra_byes = 0;
    let mut pairings = loop {
        if extra_byes > ranked.len() {
            return Err(EngineError::NoLegalPairing(format!(
                "{} competitors cannot be paired even with byes",
                ranked.len()
            )));
        }
        match search.run(extra_byes) {
            Ok(Some(found)) => break found,
            // Pool size is even, so byes beyond the odd one come in pairs.
            Ok(None) => extra_byes += 2,
            Err(BudgetExhausted) => {
                log::warn!(
                    "pairing search gave up after {} steps ({} extra byes); using a single greedy pass",
                    budget,
                    extra_byes
                );
                break search.greedy();
            }
        }
    };

    for p in &pairings {
        if let Pairing::Bye { competitor } = p {
            log::warn!(
                "no eligible opponent left for {} (all remaining candidates already faced); assigning bye",
                competitor
            );
        }
    }
    if let Some(competitor) = odd_bye {
        pairings.push(Pairing::Bye { competitor });
    }
    Ok(pairings)
}

fn distance(a: &Standing, b: &Standing) -> i64 {
    POINTS_WEIGHT * (a.points - b.points).abs()
        + WINS_WEIGHT * (i64::from(a.match_wins) - i64::from(b.match_wins)).abs()
}

/// The search used up its step budget.
struct BudgetExhausted;

/// Depth-first search over the ranked pool, greedy choice first.
struct Search<'a> {
    pool: &'a [Standing],
    /// `eligible[i][j]`: `i` and `j` have not met yet.
    eligible: Vec<Vec<bool>>,
    used: Vec<bool>,
    out: Vec<Pairing>,
    steps: usize,
    budget: usize,
}

impl<'a> Search<'a> {
    fn new(pool: &'a [Standing], budget: usize) -> Self {
        let eligible = pool
            .iter()
            .enumerate()
            .map(|(i, a)| {
                pool.iter()
                    .enumerate()
                    .map(|(j, b)| i != j && !a.has_faced(b.competitor))
                    .collect()
            })
            .collect();
        Self {
            pool,
            eligible,
            used: vec![false; pool.len()],
            out: Vec::with_capacity(pool.len() / 2 + 1),
            steps: 0,
            budget,
        }
    }

    fn reset(&mut self) {
        self.used.iter_mut().for_each(|u| *u = false);
        self.out.clear();
        self.steps = 0;
    }

    /// A complete draw using exactly `byes` byes, or `None` if there is none.
    fn run(&mut self, byes: usize) -> Result<Option<Vec<Pairing>>, BudgetExhausted> {
        self.reset();
        if self.solve(byes)? {
            Ok(Some(std::mem::take(&mut self.out)))
        } else {
            Ok(None)
        }
    }

    /// One top-down pass taking the closest eligible candidate each time; anyone left
    /// without one gets a bye.
    fn greedy(&mut self) -> Vec<Pairing> {
        self.reset();
        for top in 0..self.pool.len() {
            if self.used[top] {
                continue;
            }
            self.used[top] = true;
            let pairing = match self.candidates(top).first() {
                Some(&j) => {
                    self.used[j] = true;
                    Pairing::Match {
                        a: self.pool[top].competitor,
                        b: self.pool[j].competitor,
                    }
                }
                None => Pairing::Bye {
                    competitor: self.pool[top].competitor,
                },
            };
            self.out.push(pairing);
        }
        std::mem::take(&mut self.out)
    }

    /// Eligible partners for `top`, best first.
    fn candidates(&self, top: usize) -> Vec<usize> {
        let current = &self.pool[top];
        let mut found: Vec<usize> = (top + 1..self.pool.len())
            .filter(|&j| !self.used[j] && self.eligible[top][j])
            .collect();
        // Stable: equal distances keep rank order.
        found.sort_by_key(|&j| distance(current, &self.pool[j]));
        found
    }

    /// Unpaired competitors with no unpaired opponent they have not met. Each needs a bye.
    fn stranded(&self) -> usize {
        let open: Vec<usize> = (0..self.pool.len()).filter(|&i| !self.used[i]).collect();
        open.iter()
            .filter(|&&i| !open.iter().any(|&j| self.eligible[i][j]))
            .count()
    }

    fn solve(&mut self, byes_left: usize) -> Result<bool, BudgetExhausted> {
        let Some(top) = self.used.iter().position(|u| !u) else {
            return Ok(byes_left == 0);
        };
        self.steps += 1;
        if self.steps > self.budget {
            return Err(BudgetExhausted);
        }
        let unpaired = self.used.iter().filter(|u| !**u).count();
        if byes_left > unpaired || self.stranded() > byes_left {
            return Ok(false);
        }

        self.used[top] = true;
        let candidates = self.candidates(top);
        for &j in &candidates {
            self.used[j] = true;
            self.out.push(Pairing::Match {
                a: self.pool[top].competitor,
                b: self.pool[j].competitor,
            });
            if self.solve(byes_left)? {
                return Ok(true);
            }
            self.out.pop();
            self.used[j] = false;
        }
        if byes_left > 0 {
            self.out.push(Pairing::Bye {
                competitor: self.pool[top].competitor,
            });
            if self.solve(byes_left - 1)? {
                return Ok(true);
            }
            self.out.pop();
        }
        self.used[top] = false;
        Ok(false)
    }
}
