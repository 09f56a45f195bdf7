//! Bid-search request and result types shared by the optimizer and the engine.

use serde::{Deserialize, Serialize};

use crate::errors::TbResult;
use crate::validation_error;

/// Default lower bracket factor applied to the base price.
pub const DEFAULT_MIN_BID_FACTOR: f64 = 0.8;
/// Default upper bracket factor applied to the base price.
pub const DEFAULT_MAX_BID_FACTOR: f64 = 1.2;
pub const DEFAULT_POINTS: usize = 201;
pub const MIN_POINTS: usize = 21;
pub const MAX_POINTS: usize = 2001;
pub const DEFAULT_TOL_REL: f64 = 1e-3;
pub const DEFAULT_MIN_P_WIN: f64 = 1e-4;

/// Closed interval `[lower, upper]` of candidate bids.
///
/// Serialized as a two-element array so results read as `[L, U]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bracket {
    pub lower: f64,
    pub upper: f64,
}

impl Bracket {
    /// Create a bracket, rejecting non-finite or unordered bounds.
    pub fn new(lower: f64, upper: f64) -> TbResult<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(validation_error!(
                "bracket bounds must be finite, got [{lower}, {upper}]"
            ));
        }
        if lower >= upper {
            return Err(validation_error!(
                "bracket lower bound {lower} must be below upper bound {upper}"
            ));
        }
        Ok(Self { lower, upper })
    }

    /// The default search bracket `[0.8 × base, 1.2 × base]`.
    pub fn around(base_price: f64) -> Self {
        Self {
            lower: base_price * DEFAULT_MIN_BID_FACTOR,
            upper: base_price * DEFAULT_MAX_BID_FACTOR,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }

    /// Smallest bracket covering both `self` and `other`.
    pub fn union(&self, other: &Bracket) -> Bracket {
        Bracket {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }
}

impl From<[f64; 2]> for Bracket {
    fn from([lower, upper]: [f64; 2]) -> Self {
        Self { lower, upper }
    }
}

impl From<Bracket> for [f64; 2] {
    fn from(bracket: Bracket) -> Self {
        [bracket.lower, bracket.upper]
    }
}

impl std::fmt::Display for Bracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.2}, {:.2}]", self.lower, self.upper)
    }
}

/// Closed domain accepted for the bidder quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityDomain {
    pub min: f64,
    pub max: f64,
}

impl QualityDomain {
    pub fn contains(&self, score: f64) -> bool {
        score.is_finite() && score >= self.min && score <= self.max
    }
}

impl Default for QualityDomain {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Inputs to a single bid optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub base_price: f64,
    pub quality_score: f64,
    #[serde(default)]
    pub min_bid: Option<f64>,
    #[serde(default)]
    pub max_bid: Option<f64>,
    /// Grid size of the initial coarse pass.
    #[serde(default = "default_points")]
    pub n_points: usize,
    #[serde(default = "default_true")]
    pub auto_expand: bool,
    /// Relative tolerance for expansion acceptance and golden-section stopping.
    #[serde(default = "default_tol_rel")]
    pub tol_rel: f64,
    /// Win-probability floor below which the bracket is not expanded.
    #[serde(default = "default_min_p_win")]
    pub min_p_win: f64,
    /// Replace the profit oracle with `bid - base_price`.
    #[serde(default)]
    pub use_profit_formula: bool,
}

fn default_points() -> usize {
    DEFAULT_POINTS
}

fn default_true() -> bool {
    true
}

fn default_tol_rel() -> f64 {
    DEFAULT_TOL_REL
}

fn default_min_p_win() -> f64 {
    DEFAULT_MIN_P_WIN
}

impl OptimizeRequest {
    pub fn new(base_price: f64, quality_score: f64) -> Self {
        Self {
            base_price,
            quality_score,
            min_bid: None,
            max_bid: None,
            n_points: DEFAULT_POINTS,
            auto_expand: true,
            tol_rel: DEFAULT_TOL_REL,
            min_p_win: DEFAULT_MIN_P_WIN,
            use_profit_formula: false,
        }
    }

    pub fn with_bracket(mut self, min_bid: Option<f64>, max_bid: Option<f64>) -> Self {
        self.min_bid = min_bid;
        self.max_bid = max_bid;
        self
    }

    pub fn with_points(mut self, n: usize) -> Self {
        self.n_points = n;
        self
    }

    pub fn with_auto_expand(mut self, enabled: bool) -> Self {
        self.auto_expand = enabled;
        self
    }

    pub fn with_tolerance(mut self, tol_rel: f64) -> Self {
        self.tol_rel = tol_rel;
        self
    }

    pub fn with_min_p_win(mut self, min_p_win: f64) -> Self {
        self.min_p_win = min_p_win;
        self
    }

    pub fn with_profit_formula(mut self, enabled: bool) -> Self {
        self.use_profit_formula = enabled;
        self
    }

    /// Reject inputs the search cannot work with.
    ///
    /// Runs before any oracle call.
    pub fn validate(&self, quality: &QualityDomain) -> TbResult<()> {
        if !self.base_price.is_finite() || self.base_price <= 0.0 {
            return Err(validation_error!(
                "base_price must be > 0, got {}",
                self.base_price
            ));
        }
        if !quality.contains(self.quality_score) {
            return Err(validation_error!(
                "quality_score {} outside [{}, {}]",
                self.quality_score,
                quality.min,
                quality.max
            ));
        }
        if !(MIN_POINTS..=MAX_POINTS).contains(&self.n_points) {
            return Err(validation_error!(
                "n_points must be within [{MIN_POINTS}, {MAX_POINTS}], got {}",
                self.n_points
            ));
        }
        if !(self.tol_rel > 0.0 && self.tol_rel <= 1.0) {
            return Err(validation_error!(
                "tol_rel must be within (0, 1], got {}",
                self.tol_rel
            ));
        }
        if !(self.min_p_win > 0.0 && self.min_p_win <= 1.0) {
            return Err(validation_error!(
                "min_p_win must be within (0, 1], got {}",
                self.min_p_win
            ));
        }
        for (name, bound) in [("min_bid", self.min_bid), ("max_bid", self.max_bid)] {
            if let Some(v) = bound {
                if !v.is_finite() || v <= 0.0 {
                    return Err(validation_error!("{name} must be > 0, got {v}"));
                }
            }
        }
        self.initial_bracket().map(|_| ())
    }

    /// Bracket of the first coarse pass, falling back to the default factors.
    pub fn initial_bracket(&self) -> TbResult<Bracket> {
        let default = Bracket::around(self.base_price);
        Bracket::new(
            self.min_bid.unwrap_or(default.lower),
            self.max_bid.unwrap_or(default.upper),
        )
    }
}

/// Why the adaptive expansion loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStop {
    /// Expansion was switched off in the request.
    Disabled,
    /// The optimum was not at the upper edge of the grid.
    NotTriggered,
    /// Win probability at the proposed upper bound fell below the floor.
    WinProbabilityFloor,
    /// The wider pass did not beat the current best by the relative tolerance.
    BelowTolerance,
    IterationCap,
}

/// How the golden-section refinement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStatus {
    Converged,
    MaxIters,
}

/// Serde adapters for values that may be NaN: non-finite values are written
/// as `null` and `null` reads back as `NaN`.
pub mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }

    /// Element-wise variant for sample vectors.
    pub mod vec {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<f64>, D::Error> {
            let values = Vec::<Option<f64>>::deserialize(deserializer)?;
            Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        }
    }
}

/// Final output of one optimization call.
///
/// Oracle failures show up as `NaN` in the values at the best bid and in the
/// diagnostic sweep; JSON carries them as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_bid: f64,
    #[serde(with = "nan_as_null")]
    pub expected_profit_at_best: f64,
    #[serde(with = "nan_as_null")]
    pub p_win_at_best: f64,
    #[serde(with = "nan_as_null")]
    pub profit_if_won_at_best: f64,
    /// Bracket of the first coarse pass.
    pub initial_bracket: Bracket,
    /// Bracket after expansion (equal to the initial one when nothing expanded).
    pub final_bracket: Bracket,
    /// Golden-section bracket at termination.
    pub refined_bracket: Bracket,
    pub auto_expanded: bool,
    pub expansions: usize,
    pub expansion_stop: ExpansionStop,
    pub refinement_status: RefinementStatus,
    pub refinement_iterations: usize,
    pub diagnostic_bids: Vec<f64>,
    #[serde(with = "nan_as_null::vec")]
    pub diagnostic_exp_profit: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_bracket_scales_base_price() {
        let bracket = OptimizeRequest::new(100_000.0, 0.7)
            .initial_bracket()
            .unwrap();
        assert_relative_eq!(bracket.lower, 80_000.0);
        assert_relative_eq!(bracket.upper, 120_000.0);
    }

    #[test]
    fn partial_bracket_override_keeps_other_default() {
        let bracket = OptimizeRequest::new(100_000.0, 0.7)
            .with_bracket(None, Some(150_000.0))
            .initial_bracket()
            .unwrap();
        assert_relative_eq!(bracket.lower, 80_000.0);
        assert_relative_eq!(bracket.upper, 150_000.0);
    }

    #[test]
    fn negative_base_price_is_rejected() {
        let req = OptimizeRequest::new(-5.0, 0.5);
        let err = req.validate(&QualityDomain::default()).unwrap_err();
        assert!(err.to_string().contains("base_price"));
    }

    #[test]
    fn out_of_domain_quality_is_rejected() {
        let req = OptimizeRequest::new(1_000.0, 8.5);
        assert!(req.validate(&QualityDomain::default()).is_err());
        let wide = QualityDomain { min: 0.0, max: 10.0 };
        assert!(req.validate(&wide).is_ok());
    }

    #[test]
    fn knob_ranges_are_enforced() {
        let domain = QualityDomain::default();
        let base = OptimizeRequest::new(1_000.0, 0.5);
        assert!(base.clone().with_points(20).validate(&domain).is_err());
        assert!(base.clone().with_points(2002).validate(&domain).is_err());
        assert!(base.clone().with_tolerance(0.0).validate(&domain).is_err());
        assert!(base.clone().with_min_p_win(1.5).validate(&domain).is_err());
        assert!(base
            .clone()
            .with_bracket(Some(900.0), Some(800.0))
            .validate(&domain)
            .is_err());
        assert!(base
            .clone()
            .with_bracket(Some(-1.0), None)
            .validate(&domain)
            .is_err());
        assert!(base.validate(&domain).is_ok());
    }

    #[test]
    fn request_defaults_fill_from_json() {
        let req: OptimizeRequest =
            serde_json::from_str(r#"{"base_price": 5000.0, "quality_score": 0.4}"#).unwrap();
        assert_eq!(req.n_points, DEFAULT_POINTS);
        assert!(req.auto_expand);
        assert!(!req.use_profit_formula);
        assert_relative_eq!(req.tol_rel, DEFAULT_TOL_REL);
        assert_relative_eq!(req.min_p_win, DEFAULT_MIN_P_WIN);
    }

    #[test]
    fn bracket_serializes_as_pair() {
        let json = serde_json::to_string(&Bracket::around(10.0)).unwrap();
        assert_eq!(json, "[8.0,12.0]");
        let back: Bracket = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(back.upper, 12.0);
    }

    #[test]
    fn nan_values_survive_json() {
        let result = OptimizationResult {
            best_bid: 1_050.0,
            expected_profit_at_best: 25.0,
            p_win_at_best: f64::NAN,
            profit_if_won_at_best: 50.0,
            initial_bracket: Bracket::around(1_000.0),
            final_bracket: Bracket::around(1_000.0),
            refined_bracket: Bracket::new(950.0, 1_150.0).unwrap(),
            auto_expanded: false,
            expansions: 0,
            expansion_stop: ExpansionStop::NotTriggered,
            refinement_status: RefinementStatus::Converged,
            refinement_iterations: 12,
            diagnostic_bids: vec![800.0, 1_000.0, 1_200.0],
            diagnostic_exp_profit: vec![-100.0, 0.0, f64::NAN],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""p_win_at_best":null"#));
        assert!(json.contains(r#""diagnostic_exp_profit":[-100.0,0.0,null]"#));

        let back: OptimizationResult = serde_json::from_str(&json).unwrap();
        assert!(back.p_win_at_best.is_nan());
        assert_eq!(back.profit_if_won_at_best, 50.0);
        assert_eq!(back.diagnostic_exp_profit[..2], [-100.0, 0.0]);
        assert!(back.diagnostic_exp_profit[2].is_nan());
        assert_eq!(back.refinement_iterations, 12);
    }

    #[test]
    fn union_covers_both() {
        let a = Bracket::new(10.0, 20.0).unwrap();
        let b = Bracket::new(15.0, 30.0).unwrap();
        let u = a.union(&b);
        assert!(u.contains(10.0) && u.contains(30.0));
        assert_relative_eq!(u.width(), 20.0);
    }
}
