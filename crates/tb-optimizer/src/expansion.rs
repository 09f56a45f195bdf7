//! Adaptive upward widening of the search bracket.
//!
//! When the coarse optimum sits on the last two grid points the true optimum
//! may lie above the bracket. Each round proposes `upper × growth`, refuses to
//! go there if winning is practically impossible, and only accepts the wider
//! range if it beats the current best by a relative margin.

use tracing::debug;

use tb_types::{Bracket, ExpansionStop};

use crate::coarse::{coarse_search, Candidate, SearchSample};
use crate::objective::Objective;

/// Knobs of the expansion loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionPolicy {
    /// Factor applied to the upper bound per round.
    pub growth: f64,
    /// Win-probability floor at the proposed upper bound.
    pub min_p_win: f64,
    /// Required relative improvement to accept a round.
    pub tol_rel: f64,
    /// Maximum number of accepted rounds.
    pub max_expansions: usize,
    /// Grid size of the initial pass; rounds use half of it.
    pub n_points: usize,
    /// Lower limit on the grid size of a round.
    pub min_round_points: usize,
}

impl ExpansionPolicy {
    pub const GROWTH: f64 = 1.5;
    pub const MAX_EXPANSIONS: usize = 8;
    pub const MIN_ROUND_POINTS: usize = 51;

    pub fn new(n_points: usize, min_p_win: f64, tol_rel: f64) -> Self {
        Self {
            growth: Self::GROWTH,
            min_p_win,
            tol_rel,
            max_expansions: Self::MAX_EXPANSIONS,
            n_points,
            min_round_points: Self::MIN_ROUND_POINTS,
        }
    }

    fn round_points(&self) -> usize {
        (self.n_points / 2).max(self.min_round_points)
    }

    /// `candidate` beats `best` by more than `tol_rel × |best|`.
    fn improves(&self, candidate: f64, best: f64) -> bool {
        candidate > best + self.tol_rel * best.abs()
    }
}

/// State after the expansion loop has terminated.
#[derive(Debug, Clone)]
pub struct ExpansionOutcome {
    /// Initial lower bound up to the last accepted upper bound.
    pub bracket: Bracket,
    pub best: Candidate,
    /// Sample of the last accepted pass.
    pub sample: SearchSample,
    pub expansions: usize,
    pub stop: ExpansionStop,
}

impl ExpansionOutcome {
    /// Outcome for a search that never tried to expand.
    pub fn unexpanded(bracket: Bracket, best: Candidate, sample: SearchSample) -> Self {
        Self {
            bracket,
            best,
            sample,
            expansions: 0,
            stop: ExpansionStop::Disabled,
        }
    }

    pub fn expanded(&self) -> bool {
        self.expansions > 0
    }
}

/// Run the expansion loop starting from the initial coarse pass.
pub fn expand(
    objective: &Objective<'_>,
    initial: Bracket,
    best: Candidate,
    sample: SearchSample,
    policy: &ExpansionPolicy,
    parallel: bool,
) -> ExpansionOutcome {
    let mut outcome = ExpansionOutcome {
        bracket: initial,
        best,
        sample,
        expansions: 0,
        stop: ExpansionStop::NotTriggered,
    };

    loop {
        if !outcome.sample.best_at_upper_edge() {
            outcome.stop = ExpansionStop::NotTriggered;
            break;
        }

        let upper = outcome.bracket.upper;
        let proposed = upper * policy.growth;
        match objective.win_probability(proposed) {
            Some(p) if p >= policy.min_p_win => {}
            p => {
                debug!(
                    "Expansion to {:.2} refused: win probability {:?} below floor {}",
                    proposed, p, policy.min_p_win
                );
                outcome.stop = ExpansionStop::WinProbabilityFloor;
                break;
            }
        }

        let round = Bracket {
            lower: upper,
            upper: proposed,
        };
        let sample = coarse_search(objective, round, policy.round_points(), parallel);
        let candidate = match sample.best_candidate() {
            Some(c) if policy.improves(c.expected_profit, outcome.best.expected_profit) => c,
            other => {
                debug!(
                    "Expansion over {} rejected: {:?} does not beat {:.4}",
                    round,
                    other.map(|c| c.expected_profit),
                    outcome.best.expected_profit
                );
                outcome.stop = ExpansionStop::BelowTolerance;
                break;
            }
        };

        outcome.bracket.upper = proposed;
        outcome.best = candidate;
        outcome.sample = sample;
        outcome.expansions += 1;
        debug!(
            "Expanded bracket to {} (round {}): best bid {:.2} -> {:.4}",
            outcome.bracket, outcome.expansions, candidate.bid, candidate.expected_profit
        );

        if outcome.expansions >= policy.max_expansions {
            outcome.stop = ExpansionStop::IterationCap;
            break;
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::ProfitSource;
    use crate::oracle::FnOracle;

    fn run(
        objective: &Objective<'_>,
        bracket: Bracket,
        policy: &ExpansionPolicy,
    ) -> ExpansionOutcome {
        let sample = coarse_search(objective, bracket, policy.n_points, false);
        let best = sample.best_candidate().unwrap();
        expand(objective, bracket, best, sample, policy, false)
    }

    #[test]
    fn interior_optimum_does_not_trigger() {
        // peak at 1.1 × base
        let win = FnOracle(|bid: f64, base: f64, _: f64| (1.0 - (bid - base) / (0.2 * base)).max(0.0));
        let objective = Objective::new(&win, ProfitSource::Formula, 100.0, 0.5);
        let policy = ExpansionPolicy::new(201, 1e-4, 1e-3);
        let outcome = run(&objective, Bracket::around(100.0), &policy);
        assert_eq!(outcome.stop, ExpansionStop::NotTriggered);
        assert!(!outcome.expanded());
    }

    #[test]
    fn win_floor_stops_expansion() {
        let win = FnOracle(|bid: f64, base: f64, _: f64| if bid > 1.1 * base { 0.0 } else { 1.0 });
        let objective = Objective::new(&win, ProfitSource::Formula, 100.0, 0.5);
        let policy = ExpansionPolicy::new(201, 1e-4, 1e-3);
        let outcome = run(&objective, Bracket::new(80.0, 105.0).unwrap(), &policy);
        assert_eq!(outcome.stop, ExpansionStop::WinProbabilityFloor);
        assert_eq!(outcome.expansions, 0);
        assert_eq!(outcome.bracket.upper, 105.0);
    }

    #[test]
    fn unbounded_growth_hits_iteration_cap() {
        // always winning: profit keeps rising with the bid
        let win = FnOracle(|_: f64, _: f64, _: f64| 1.0);
        let objective = Objective::new(&win, ProfitSource::Formula, 100.0, 0.5);
        let policy = ExpansionPolicy::new(101, 1e-4, 1e-3);
        let outcome = run(&objective, Bracket::around(100.0), &policy);
        assert_eq!(outcome.stop, ExpansionStop::IterationCap);
        assert_eq!(outcome.expansions, ExpansionPolicy::MAX_EXPANSIONS);
        let expected_upper = 120.0 * 1.5_f64.powi(8);
        assert!((outcome.bracket.upper - expected_upper).abs() < 1e-6);
        assert_eq!(outcome.bracket.lower, 80.0);
    }

    #[test]
    fn marginal_gain_is_rejected() {
        // expected profit saturates at 20 from bid 120 upward: the wider pass
        // cannot beat the edge value by the relative tolerance
        let win = FnOracle(|bid: f64, base: f64, _: f64| {
            let markup = bid - base;
            if markup <= 0.0 {
                1.0
            } else {
                markup.min(20.0) / markup
            }
        });
        let objective = Objective::new(&win, ProfitSource::Formula, 100.0, 0.5);
        let policy = ExpansionPolicy::new(101, 1e-4, 1e-3);
        let outcome = run(&objective, Bracket::new(105.0, 120.0).unwrap(), &policy);
        assert_eq!(outcome.stop, ExpansionStop::BelowTolerance);
        assert_eq!(outcome.expansions, 0);
    }

    #[test]
    fn improvement_is_relative_to_magnitude() {
        let policy = ExpansionPolicy::new(201, 1e-4, 1e-3);
        assert!(policy.improves(100.2, 100.0));
        assert!(!policy.improves(100.05, 100.0));
        // negative bests need a genuine increase
        assert!(!policy.improves(-100.05, -100.0));
        assert!(policy.improves(-99.8, -100.0));
    }
}
