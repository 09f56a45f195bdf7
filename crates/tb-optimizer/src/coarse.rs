//! Uniform grid sampling over a bracket.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tb_types::Bracket;

use crate::objective::{screened, Objective};

/// A bid together with its expected profit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub bid: f64,
    pub expected_profit: f64,
}

impl Candidate {
    pub fn new(bid: f64, expected_profit: f64) -> Self {
        Self {
            bid,
            expected_profit,
        }
    }
}

/// Raw output of one grid pass. Invalid values stay in `values` as returned
/// by the objective.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSample {
    pub bids: Vec<f64>,
    pub values: Vec<f64>,
    /// Index of the first finite maximum, `None` if nothing was finite.
    pub best: Option<usize>,
}

impl SearchSample {
    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn best_candidate(&self) -> Option<Candidate> {
        self.best
            .map(|i| Candidate::new(self.bids[i], self.values[i]))
    }

    /// True when the argmax is one of the last two grid points, a hint that
    /// the optimum lies beyond the upper edge.
    pub fn best_at_upper_edge(&self) -> bool {
        match self.best {
            Some(i) => self.len() >= 3 && i + 2 >= self.len(),
            None => false,
        }
    }
}

/// `n` evenly spaced points over `[lower, upper]`, both ends included.
pub fn linspace(lower: f64, upper: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let step = (upper - lower) / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| lower + step * i as f64).collect();
            points[n - 1] = upper;
            points
        }
    }
}

/// Index of the largest finite value, first occurrence on ties.
pub fn stable_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pick the best of an ordered candidate list; earlier entries win ties.
pub fn first_best(candidates: &[Candidate]) -> Option<Candidate> {
    candidates.iter().copied().fold(None, |best, c| match best {
        Some(b) if screened(c.expected_profit) <= screened(b.expected_profit) => Some(b),
        _ => Some(c),
    })
}

/// Evaluate the objective on an `n`-point grid over `bracket`.
///
/// With `parallel` the points are evaluated on the rayon pool; results are
/// collected in grid order so the argmax is the same either way.
pub fn coarse_search(
    objective: &Objective<'_>,
    bracket: Bracket,
    n: usize,
    parallel: bool,
) -> SearchSample {
    let bids = linspace(bracket.lower, bracket.upper, n);
    let values: Vec<f64> = if parallel {
        bids.par_iter()
            .map(|&bid| objective.expected_profit(bid))
            .collect()
    } else {
        bids.iter()
            .map(|&bid| objective.expected_profit(bid))
            .collect()
    };

    let best = stable_argmax(&values);
    let invalid = values.iter().filter(|v| !v.is_finite()).count();
    if invalid > 0 {
        debug!("Coarse pass over {} skipped {} invalid samples", bracket, invalid);
    }
    if let Some(i) = best {
        debug!(
            "Coarse pass over {} ({} points): best bid {:.2} -> {:.4}",
            bracket, n, bids[i], values[i]
        );
    }

    SearchSample { bids, values, best }
}
