//! Golden-section maximization around the coarse optimum.
//!
//! Two interior points split the bracket by the golden ratio. Each iteration
//! drops the side of the worse point, reuses the better one, and evaluates a
//! single new point. Assumes the objective is unimodal on the window; if it is
//! not, the search still terminates with a local answer.

use tb_types::{Bracket, RefinementStatus};

use crate::coarse::Candidate;
use crate::objective::screened;

/// The golden ratio: φ = (1 + √5) / 2
const PHI: f64 = 1.618_033_988_749_895;

/// Fraction of the width between an outer bound and the nearer inner point.
const RESPHI: f64 = 2.0 - PHI;

/// Iteration cap and stopping width for the refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineConfig {
    pub max_iters: usize,
    /// Stop once the outer bracket is at most this wide.
    pub x_tol: f64,
}

impl RefineConfig {
    pub const MAX_ITERS: usize = 50;

    /// `max(1e-6, tol_rel × max(best_bid, 1))`
    pub fn for_bid(best_bid: f64, tol_rel: f64) -> Self {
        Self {
            max_iters: Self::MAX_ITERS,
            x_tol: (tol_rel * best_bid.max(1.0)).max(1e-6),
        }
    }
}

/// Search window around the coarse optimum.
///
/// Half-width `max(1, 0.1 × max(best_bid, 1))`, with the left edge kept at or
/// above half the base price. If the optimum itself is below that floor the
/// window starts at the optimum.
pub fn refinement_window(best_bid: f64, base_price: f64) -> Bracket {
    let span = (0.1 * best_bid.max(1.0)).max(1.0);
    let floor = 0.5 * base_price;
    let lower = (best_bid - span).max(floor).min(best_bid);
    Bracket {
        lower,
        upper: best_bid + span,
    }
}

/// Final state of a golden-section run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    /// Outer bracket at termination.
    pub bracket: Bracket,
    pub inner_left: Candidate,
    pub inner_right: Candidate,
    pub status: RefinementStatus,
    pub iterations: usize,
}

/// Outer bounds plus the two golden interior points and their values.
#[derive(Debug, Clone, Copy)]
struct GoldenBracket {
    left: f64,
    right: f64,
    inner_left: Candidate,
    inner_right: Candidate,
}

impl GoldenBracket {
    fn new<F: Fn(f64) -> f64>(window: Bracket, f: &F) -> Self {
        let (left, right) = (window.lower, window.upper);
        let x1 = left + RESPHI * (right - left);
        let x2 = right - RESPHI * (right - left);
        Self {
            left,
            right,
            inner_left: Candidate::new(x1, f(x1)),
            inner_right: Candidate::new(x2, f(x2)),
        }
    }

    fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }

    /// Drop `[left, inner_left)`; the old right point becomes the left one.
    fn shrink_left<F: Fn(f64) -> f64>(&mut self, f: &F) {
        self.left = self.inner_left.bid;
        self.inner_left = self.inner_right;
        let x = self.right - RESPHI * (self.right - self.left);
        self.inner_right = Candidate::new(x, f(x));
    }

    /// Drop `(inner_right, right]`; the old left point becomes the right one.
    fn shrink_right<F: Fn(f64) -> f64>(&mut self, f: &F) {
        self.right = self.inner_right.bid;
        self.inner_right = self.inner_left;
        let x = self.left + RESPHI * (self.right - self.left);
        self.inner_left = Candidate::new(x, f(x));
    }

    fn into_refinement(self, status: RefinementStatus, iterations: usize) -> Refinement {
        Refinement {
            bracket: Bracket {
                lower: self.left,
                upper: self.right,
            },
            inner_left: self.inner_left,
            inner_right: self.inner_right,
            status,
            iterations,
        }
    }
}

/// Maximize `f` over `window`.
///
/// Non-finite values compare as `-inf`. Ties move the bracket left, toward
/// lower bids.
pub fn golden_section_maximize<F>(f: F, window: Bracket, config: &RefineConfig) -> Refinement
where
    F: Fn(f64) -> f64,
{
    let mut golden = GoldenBracket::new(window, &f);

    for iter in 1..=config.max_iters {
        if screened(golden.inner_left.expected_profit) < screened(golden.inner_right.expected_profit)
        {
            golden.shrink_left(&f);
        } else {
            golden.shrink_right(&f);
        }

        if golden.width() <= config.x_tol {
            return golden.into_refinement(RefinementStatus::Converged, iter);
        }
    }

    golden.into_refinement(RefinementStatus::MaxIters, config.max_iters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interior_points_split_by_golden_ratio() {
        let golden = GoldenBracket::new(Bracket { lower: 0.0, upper: 1.0 }, &|x: f64| x);
        assert_relative_eq!(golden.inner_left.bid, RESPHI);
        assert_relative_eq!(golden.inner_right.bid, 1.0 - RESPHI);
        assert_relative_eq!(golden.inner_left.bid / golden.inner_right.bid, PHI - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn shrinking_reuses_the_kept_point() {
        let f = |x: f64| -(x - 0.7).powi(2);
        let mut golden = GoldenBracket::new(Bracket { lower: 0.0, upper: 1.0 }, &f);
        let old_right = golden.inner_right;
        golden.shrink_left(&f);
        assert_relative_eq!(golden.left, RESPHI);
        assert_eq!(golden.inner_left, old_right);

        let old_left = golden.inner_left;
        golden.shrink_right(&f);
        assert_eq!(golden.inner_right, old_left);
    }

    #[test]
    fn finds_parabola_peak() {
        let f = |x: f64| -(x - 3.3).powi(2) + 4.0;
        let config = RefineConfig {
            max_iters: 50,
            x_tol: 1e-8,
        };
        let result = golden_section_maximize(f, Bracket { lower: 0.0, upper: 10.0 }, &config);
        assert_eq!(result.status, RefinementStatus::Converged);
        assert_relative_eq!(result.inner_left.bid, 3.3, epsilon = 1e-6);
        assert_relative_eq!(result.inner_right.bid, 3.3, epsilon = 1e-6);
        assert!(result.bracket.width() <= 1e-8);
    }

    #[test]
    fn iteration_cap_is_not_an_error() {
        let f = |x: f64| -(x - 0.5).powi(2);
        let config = RefineConfig {
            max_iters: 5,
            x_tol: 1e-12,
        };
        let result = golden_section_maximize(f, Bracket { lower: 0.0, upper: 1.0 }, &config);
        assert_eq!(result.status, RefinementStatus::MaxIters);
        assert_eq!(result.iterations, 5);
        assert!(result.bracket.contains(0.5));
    }

    #[test]
    fn nan_region_is_avoided() {
        let f = |x: f64| if x > 5.0 { f64::NAN } else { x };
        let config = RefineConfig {
            max_iters: 50,
            x_tol: 1e-6,
        };
        let result = golden_section_maximize(f, Bracket { lower: 0.0, upper: 10.0 }, &config);
        assert!(result.inner_left.bid <= 5.0 + 1e-5);
        assert!(result.bracket.lower <= 5.0);
    }

    #[test]
    fn window_respects_half_base_floor() {
        let w = refinement_window(100_000.0, 100_000.0);
        assert_relative_eq!(w.lower, 90_000.0);
        assert_relative_eq!(w.upper, 110_000.0);

        let clamped = refinement_window(52_000.0, 100_000.0);
        assert_relative_eq!(clamped.lower, 50_000.0);

        let below_floor = refinement_window(30_000.0, 100_000.0);
        assert_relative_eq!(below_floor.lower, 30_000.0);
        assert_relative_eq!(below_floor.upper, 33_000.0);

        let tiny = refinement_window(0.5, 0.2);
        assert_relative_eq!(tiny.lower, 0.1);
        assert_relative_eq!(tiny.upper, 1.5);
    }

    #[test]
    fn tolerance_has_absolute_floor() {
        assert_relative_eq!(RefineConfig::for_bid(0.001, 1e-9).x_tol, 1e-6);
        assert_relative_eq!(RefineConfig::for_bid(150_000.0, 1e-3).x_tol, 150.0);
    }
}
