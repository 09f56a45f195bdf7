//! Serialized win/profit models and their oracle implementations.
//!
//! A [`ModelBundle`] is a JSON document holding the fitted parameters of a
//! win classifier and, optionally, a profit regressor. Both operate on
//! [`Features`] after an optional standard-scaling step.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tb_types::{ModelError, OracleError, TbResult};

use crate::oracle::{
    finite, ClassOutput, Classifier, ClassifierOracle, Features, ProfitOracle,
    WinProbabilityOracle,
};

/// Per-feature standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, OracleError> {
        if self.mean.len() != row.len() || self.scale.len() != row.len() {
            return Err(OracleError::FeatureMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // zero-variance features are centred only
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

/// Affine score `intercept + coefficients · scaled(features)`.
fn linear_score(
    scaler: Option<&StandardScaler>,
    coefficients: &[f64],
    intercept: f64,
    features: &Features,
) -> Result<f64, OracleError> {
    let raw = features.to_array();
    let row = match scaler {
        Some(scaler) => scaler.transform(&raw)?,
        None => raw.to_vec(),
    };
    if coefficients.len() != row.len() {
        return Err(OracleError::FeatureMismatch {
            expected: coefficients.len(),
            actual: row.len(),
        });
    }
    Ok(intercept + coefficients.iter().zip(&row).map(|(c, x)| c * x).sum::<f64>())
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic-regression win classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticWinModel {
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Classifier for LogisticWinModel {
    fn classify(&self, features: &Features) -> Result<ClassOutput, OracleError> {
        let z = linear_score(
            self.scaler.as_ref(),
            &self.coefficients,
            self.intercept,
            features,
        )?;
        Ok(ClassOutput::Probability(sigmoid(z)))
    }
}

/// Label-only classifier: wins whenever the relative markup stays at or
/// below `max_rel_markup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdClassifier {
    pub max_rel_markup: f64,
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, features: &Features) -> Result<ClassOutput, OracleError> {
        Ok(ClassOutput::Label(features.rel_markup <= self.max_rel_markup))
    }
}

/// Any classifier a model file can describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    Logistic(LogisticWinModel),
    Threshold(ThresholdClassifier),
}

impl Classifier for ClassifierModel {
    fn classify(&self, features: &Features) -> Result<ClassOutput, OracleError> {
        match self {
            Self::Logistic(model) => model.classify(features),
            Self::Threshold(model) => model.classify(features),
        }
    }
}

/// Linear regressor for profit if the bid wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProfitModel {
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Multiply the prediction by the base price (models fitted on profit
    /// relative to the estimate).
    #[serde(default)]
    pub relative_to_base: bool,
}

impl ProfitOracle for LinearProfitModel {
    fn profit_if_won(
        &self,
        bid: f64,
        base_price: f64,
        quality_score: f64,
    ) -> Result<f64, OracleError> {
        let features = Features::new(bid, base_price, quality_score);
        let y = linear_score(
            self.scaler.as_ref(),
            &self.coefficients,
            self.intercept,
            &features,
        )?;
        finite(bid, if self.relative_to_base { y * base_price } else { y })
    }
}

/// The pair of fitted models the optimizer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub classifier: ClassifierModel,
    #[serde(default)]
    pub regressor: Option<LinearProfitModel>,
}

impl ModelBundle {
    pub fn from_json_str(json: &str) -> TbResult<Self> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.check()?;
        Ok(bundle)
    }

    /// Load a bundle from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> TbResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        info!("Loading model bundle from: {}", path.display());
        let json = std::fs::read_to_string(path)?;
        let bundle = Self::from_json_str(&json)?;
        debug!(
            "Model bundle loaded (regressor: {})",
            if bundle.regressor.is_some() { "yes" } else { "no" }
        );
        Ok(bundle)
    }

    fn check(&self) -> Result<(), ModelError> {
        let check_linear = |what: &str,
                            scaler: Option<&StandardScaler>,
                            coefficients: &[f64]|
         -> Result<(), ModelError> {
            if coefficients.len() != Features::LEN {
                return Err(ModelError::Invalid {
                    message: format!(
                        "{what} has {} coefficients, expected {}",
                        coefficients.len(),
                        Features::LEN
                    ),
                });
            }
            if let Some(scaler) = scaler {
                if scaler.mean.len() != Features::LEN || scaler.scale.len() != Features::LEN {
                    return Err(ModelError::Invalid {
                        message: format!("{what} scaler does not match {} features", Features::LEN),
                    });
                }
            }
            Ok(())
        };

        if let ClassifierModel::Logistic(model) = &self.classifier {
            check_linear("classifier", model.scaler.as_ref(), &model.coefficients)?;
        }
        if let Some(model) = &self.regressor {
            check_linear("regressor", model.scaler.as_ref(), &model.coefficients)?;
        }
        Ok(())
    }

    /// Split the bundle into shareable oracles.
    pub fn into_oracles(
        self,
    ) -> (
        Arc<dyn WinProbabilityOracle>,
        Option<Arc<dyn ProfitOracle>>,
    ) {
        let win: Arc<dyn WinProbabilityOracle> = Arc::new(ClassifierOracle::new(self.classifier));
        let profit = self
            .regressor
            .map(|model| Arc::new(model) as Arc<dyn ProfitOracle>);
        (win, profit)
    }
}
