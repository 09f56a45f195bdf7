//! End-to-end bid optimization: coarse pass, expansion, refinement, assembly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tb_types::{
    Bracket, OptimizationResult, OptimizeRequest, QualityDomain, TbError, TbResult,
};

use crate::coarse::{coarse_search, first_best, Candidate};
use crate::expansion::{expand, ExpansionOutcome, ExpansionPolicy};
use crate::golden::{golden_section_maximize, refinement_window, RefineConfig};
use crate::objective::{Objective, ProfitSource};
use crate::oracle::{ProfitOracle, WinProbabilityOracle};

/// Lower limit on the number of diagnostic sweep points.
const MIN_DIAGNOSTIC_POINTS: usize = 101;

/// Settings that stay fixed across requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub quality_domain: QualityDomain,
    /// Evaluate grid passes on the rayon pool.
    pub parallel: bool,
    /// Floor conditional profit at zero.
    pub clamp_profit: bool,
}

impl OptimizerConfig {
    pub fn with_quality_domain(mut self, domain: QualityDomain) -> Self {
        self.quality_domain = domain;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_profit_clamp(mut self, clamp: bool) -> Self {
        self.clamp_profit = clamp;
        self
    }
}

/// A loaded pair of oracles ready to answer optimization requests.
///
/// Cheap to clone; the oracles are shared.
#[derive(Clone)]
pub struct BidOptimizer {
    win: Arc<dyn WinProbabilityOracle>,
    profit: Option<Arc<dyn ProfitOracle>>,
    config: OptimizerConfig,
}

impl BidOptimizer {
    pub fn new(
        win: Arc<dyn WinProbabilityOracle>,
        profit: Option<Arc<dyn ProfitOracle>>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            win,
            profit,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize(&self, request: &OptimizeRequest) -> TbResult<OptimizationResult> {
        optimize(
            self.win.as_ref(),
            self.profit.as_deref(),
            request,
            &self.config,
        )
    }
}

/// Find the bid maximizing expected profit for one tender.
///
/// Without a profit oracle the markup formula is used regardless of
/// `request.use_profit_formula`.
///
/// # Errors
///
/// [`TbError::Validation`] for inputs rejected before the search, and
/// [`TbError::NoViableBid`] when every point of the initial pass is invalid.
pub fn optimize(
    win: &dyn WinProbabilityOracle,
    profit: Option<&dyn ProfitOracle>,
    request: &OptimizeRequest,
    config: &OptimizerConfig,
) -> TbResult<OptimizationResult> {
    request.validate(&config.quality_domain)?;
    let initial = request.initial_bracket()?;

    let source = match (request.use_profit_formula, profit) {
        (false, Some(oracle)) => ProfitSource::Oracle(oracle),
        (false, None) => {
            warn!("No profit oracle loaded; using bid - base_price");
            ProfitSource::Formula
        }
        (true, _) => ProfitSource::Formula,
    };
    let objective = Objective::new(win, source, request.base_price, request.quality_score)
        .with_profit_clamp(config.clamp_profit);

    debug!(
        "Optimizing bid for base price {:.2} (quality {}) over {}",
        request.base_price, request.quality_score, initial
    );

    let sample = coarse_search(&objective, initial, request.n_points, config.parallel);
    let best = sample.best_candidate().ok_or_else(|| TbError::NoViableBid {
        message: format!(
            "all {} samples over {} were invalid",
            sample.len(),
            initial
        ),
    })?;

    let explored = if request.auto_expand {
        let policy = ExpansionPolicy::new(request.n_points, request.min_p_win, request.tol_rel);
        expand(&objective, initial, best, sample, &policy, config.parallel)
    } else {
        ExpansionOutcome::unexpanded(initial, best, sample)
    };
    debug!(
        "Expansion finished after {} rounds ({:?}); best bid {:.2}",
        explored.expansions, explored.stop, explored.best.bid
    );

    let coarse_best = explored.best;
    let window = refinement_window(coarse_best.bid, request.base_price);
    let refine = RefineConfig::for_bid(coarse_best.bid, request.tol_rel);
    let refined = golden_section_maximize(|bid| objective.expected_profit(bid), window, &refine);
    debug!(
        "Golden-section refinement {:?} after {} iterations, bracket {}",
        refined.status, refined.iterations, refined.bracket
    );

    let chosen = select_final(coarse_best, refined.inner_left, refined.inner_right);

    let sweep = explored.bracket.union(&refined.bracket);
    let (diagnostic_bids, diagnostic_exp_profit) =
        diagnostic_sweep(&objective, sweep, request.n_points, config.parallel);

    let p_win_at_best = objective.win_probability(chosen.bid).unwrap_or(f64::NAN);
    let profit_if_won_at_best = objective.profit_if_won(chosen.bid).unwrap_or(f64::NAN);

    info!(
        "Best bid {:.2}: expected profit {:.2}, P(win) {:.4}, profit if won {:.2}",
        chosen.bid, chosen.expected_profit, p_win_at_best, profit_if_won_at_best
    );

    Ok(OptimizationResult {
        best_bid: chosen.bid,
        expected_profit_at_best: chosen.expected_profit,
        p_win_at_best,
        profit_if_won_at_best,
        initial_bracket: initial,
        final_bracket: explored.bracket,
        refined_bracket: refined.bracket,
        auto_expanded: explored.expanded(),
        expansions: explored.expansions,
        expansion_stop: explored.stop,
        refinement_status: refined.status,
        refinement_iterations: refined.iterations,
        diagnostic_bids,
        diagnostic_exp_profit,
    })
}

/// Best of `[coarse, x1, x2]`, earlier entries winning ties.
fn select_final(coarse: Candidate, x1: Candidate, x2: Candidate) -> Candidate {
    // coarse is always finite, so the list never comes back empty
    first_best(&[coarse, x1, x2]).unwrap_or(coarse)
}

/// Observability-only sweep; never feeds back into the selection.
fn diagnostic_sweep(
    objective: &Objective<'_>,
    bracket: Bracket,
    n_points: usize,
    parallel: bool,
) -> (Vec<f64>, Vec<f64>) {
    let sample = coarse_search(
        objective,
        bracket,
        n_points.max(MIN_DIAGNOSTIC_POINTS),
        parallel,
    );
    (sample.bids, sample.values)
}
