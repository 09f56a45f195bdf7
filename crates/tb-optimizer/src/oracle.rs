//! Oracle contract between the bid search and the learned predictors.
//!
//! The search only ever asks two questions about a candidate bid: how likely
//! it is to win, and what it earns if it does. Anything that answers them for
//! a single `(bid, base_price, quality_score)` point can drive the optimizer,
//! including the deterministic markup formula that stands in for a missing
//! regressor.

use tb_types::OracleError;

/// Estimates `P(win | bid)`.
///
/// Implementations must be side-effect free per call so that one loaded
/// instance can serve many concurrent optimizations.
pub trait WinProbabilityOracle: Send + Sync {
    fn win_probability(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError>;
}

/// Estimates the profit earned if `bid` wins. Not clamped unless the
/// implementation says so.
pub trait ProfitOracle: Send + Sync {
    fn profit_if_won(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError>;
}

/// Reject NaN and infinite oracle outputs.
pub(crate) fn finite(bid: f64, value: f64) -> Result<f64, OracleError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(OracleError::NonFinite { bid, value })
    }
}

/// `profit = bid - base_price`, the oracle-free markup formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitFormula;

impl ProfitOracle for ProfitFormula {
    fn profit_if_won(
        &self,
        bid: f64,
        base_price: f64,
        _quality_score: f64,
    ) -> Result<f64, OracleError> {
        Ok(bid - base_price)
    }
}

/// Model input features, in the order the trained pipelines expect them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    /// `(bid - base_price) / base_price`
    pub rel_markup: f64,
    pub quality_score: f64,
}

impl Features {
    pub const LEN: usize = 2;

    pub fn new(bid: f64, base_price: f64, quality_score: f64) -> Self {
        Self {
            rel_markup: (bid - base_price) / base_price,
            quality_score,
        }
    }

    pub fn to_array(self) -> [f64; Self::LEN] {
        [self.rel_markup, self.quality_score]
    }
}

/// What a classifier can say about a feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassOutput {
    /// Calibrated probability of the winning class.
    Probability(f64),
    /// Hard label only; the model exposes no probability.
    Label(bool),
}

/// A binary win/lose classifier over [`Features`].
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &Features) -> Result<ClassOutput, OracleError>;
}

/// Adapts a [`Classifier`] to the win-probability contract.
///
/// Label-only classifiers degrade to a `{0.0, 1.0}` step function instead of
/// failing.
#[derive(Debug, Clone)]
pub struct ClassifierOracle<C> {
    classifier: C,
}

impl<C: Classifier> ClassifierOracle<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

}

impl<C: Classifier> WinProbabilityOracle for ClassifierOracle<C> {
    fn win_probability(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError> {
        let features = Features::new(bid, base_price, quality_score);
        match self.classifier.classify(&features)? {
            ClassOutput::Probability(p) => finite(bid, p),
            ClassOutput::Label(true) => Ok(1.0),
            ClassOutput::Label(false) => Ok(0.0),
        }
    }
}

/// Wraps a plain function `(bid, base_price, quality_score) -> value` as an
/// oracle of either kind. Non-finite outputs become
/// [`OracleError::NonFinite`].
#[derive(Debug, Clone, Copy)]
pub struct FnOracle<F>(pub F);

impl<F> WinProbabilityOracle for FnOracle<F>
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync,
{
    fn win_probability(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError> {
        finite(bid, (self.0)(bid, base_price, quality_score))
    }
}

impl<F> ProfitOracle for FnOracle<F>
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync,
{
    fn profit_if_won(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError> {
        finite(bid, (self.0)(bid, base_price, quality_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct MarkupCutoff(f64);

    impl Classifier for MarkupCutoff {
        fn classify(&self, features: &Features) -> Result<ClassOutput, OracleError> {
            Ok(ClassOutput::Label(features.rel_markup <= self.0))
        }
    }

    #[test]
    fn formula_is_markup() {
        let p = ProfitFormula.profit_if_won(120.0, 100.0, 0.5).unwrap();
        assert_relative_eq!(p, 20.0);
        let loss = ProfitFormula.profit_if_won(90.0, 100.0, 0.5).unwrap();
        assert_relative_eq!(loss, -10.0);
    }

    #[test]
    fn features_use_relative_markup() {
        let f = Features::new(110_000.0, 100_000.0, 0.7);
        assert_relative_eq!(f.rel_markup, 0.1);
        assert_eq!(f.to_array()[1], 0.7);
    }

    #[test]
    fn label_only_classifier_degrades_to_step() {
        let oracle = ClassifierOracle::new(MarkupCutoff(0.1));
        assert_eq!(oracle.win_probability(105.0, 100.0, 0.5).unwrap(), 1.0);
        assert_eq!(oracle.win_probability(115.0, 100.0, 0.5).unwrap(), 0.0);
    }

    #[test]
    fn non_finite_outputs_are_oracle_errors() {
        let oracle = FnOracle(|bid: f64, _: f64, _: f64| if bid > 100.0 { f64::NAN } else { 1.0 });
        assert_eq!(oracle.win_probability(50.0, 100.0, 0.5), Ok(1.0));
        let err = oracle.profit_if_won(150.0, 100.0, 0.5).unwrap_err();
        assert!(matches!(err, OracleError::NonFinite { bid, .. } if bid == 150.0));

        struct Diverging;
        impl Classifier for Diverging {
            fn classify(&self, _: &Features) -> Result<ClassOutput, OracleError> {
                Ok(ClassOutput::Probability(f64::INFINITY))
            }
        }
        let err = ClassifierOracle::new(Diverging)
            .win_probability(100.0, 100.0, 0.5)
            .unwrap_err();
        assert_eq!(
            err,
            OracleError::NonFinite {
                bid: 100.0,
                value: f64::INFINITY
            }
        );
    }

    #[test]
    fn fn_oracle_serves_both_contracts() {
        let oracle = FnOracle(|bid: f64, base: f64, _q: f64| bid / base);
        assert_relative_eq!(oracle.win_probability(50.0, 100.0, 0.0).unwrap(), 0.5);
        assert_relative_eq!(oracle.profit_if_won(50.0, 100.0, 0.0).unwrap(), 0.5);
    }
}
