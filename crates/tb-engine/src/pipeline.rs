//! Document-to-bid pipeline.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tb_extract::{extract_folder, BasePrice, Extraction};
use tb_optimizer::{BidOptimizer, ModelBundle, ProfitOracle, WinProbabilityOracle};
use tb_types::{config_error, OptimizationResult, TbResult, TenderFields};

use crate::config::{EngineConfig, MODELS_ENV};

pub type RunId = Uuid;

/// Output of one document pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub base_price: BasePrice,
    pub fields: TenderFields,
    pub result: OptimizationResult,
}

/// Bracket overrides for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BidLimits {
    pub min_bid: Option<f64>,
    pub max_bid: Option<f64>,
}

/// Loaded oracles plus the config they are run with.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    optimizer: BidOptimizer,
}

impl Engine {
    /// Load the model bundle named by `config.models_path`.
    pub fn new(config: EngineConfig) -> TbResult<Self> {
        let path = config.models_path.clone().ok_or_else(|| {
            config_error!("No model bundle configured; set models_path or {}", MODELS_ENV)
        })?;
        let (win, profit) = ModelBundle::load(&path)?.into_oracles();
        Ok(Self::with_oracles(config, win, profit))
    }

    pub fn with_oracles(
        config: EngineConfig,
        win: Arc<dyn WinProbabilityOracle>,
        profit: Option<Arc<dyn ProfitOracle>>,
    ) -> Self {
        let optimizer = BidOptimizer::new(win, profit, config.optimizer_config());
        Self { config, optimizer }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Optimize a bid for an explicit base price.
    pub fn optimize(
        &self,
        base_price: f64,
        quality_score: f64,
        limits: BidLimits,
    ) -> TbResult<OptimizationResult> {
        let request = self
            .config
            .request(base_price, quality_score)
            .with_bracket(limits.min_bid, limits.max_bid);
        self.optimizer.optimize(&request)
    }

    /// Extract tender fields from a folder of page dumps.
    pub fn extract<P: AsRef<Path>>(&self, pages_dir: P) -> TbResult<Extraction> {
        Ok(extract_folder(pages_dir, &self.config.contexts)?)
    }

    /// Extract fields, derive the base price and optimize the bid.
    pub fn run_pipeline<P: AsRef<Path>>(
        &self,
        pages_dir: P,
        quality_score: f64,
        limits: BidLimits,
    ) -> TbResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        let pages_dir = pages_dir.as_ref();
        info!("Pipeline run {} over {}", run_id, pages_dir.display());

        let extraction = self.extract(pages_dir)?;
        let base_price = extraction.base_price()?;

        let request = self
            .config
            .request(base_price.as_f64(), quality_score)
            .with_bracket(limits.min_bid, limits.max_bid)
            .with_profit_formula(self.config.pipeline_profit_formula);
        let result = self.optimizer.optimize(&request)?;

        info!(
            "Pipeline run {} finished: base price {}, best bid {:.2}",
            run_id, base_price.amount, result.best_bid
        );

        Ok(PipelineReport {
            run_id,
            created_at: Utc::now(),
            base_price,
            fields: extraction.fields,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_optimizer::FnOracle;
    use tb_types::TbError;

    fn engine() -> Engine {
        let win = Arc::new(FnOracle(|bid: f64, base: f64, _: f64| {
            (1.0 - (bid - base) / (0.3 * base)).clamp(0.0, 1.0)
        }));
        Engine::with_oracles(EngineConfig::default(), win, None)
    }

    #[test]
    fn missing_models_path_is_a_config_error() {
        let err = Engine::new(EngineConfig::default()).err().unwrap();
        assert!(matches!(err, TbError::Config(ref m) if m.contains(MODELS_ENV)));
    }

    #[test]
    fn missing_model_file_is_a_model_error() {
        let config = EngineConfig::default().with_models_path("/nonexistent/models.json");
        let err = Engine::new(config).err().unwrap();
        assert!(matches!(err, TbError::Model(_)));
    }

    #[test]
    fn optimize_honors_bid_limits() {
        let limits = BidLimits {
            min_bid: Some(95_000.0),
            max_bid: Some(110_000.0),
        };
        let result = engine().optimize(100_000.0, 0.5, limits).unwrap();
        assert_eq!(result.initial_bracket.lower, 95_000.0);
        assert_eq!(result.initial_bracket.upper, 110_000.0);
    }

    #[test]
    fn missing_pages_folder_is_an_extraction_error() {
        let err = engine()
            .run_pipeline("/nonexistent/pages", 0.5, BidLimits::default())
            .unwrap_err();
        assert!(matches!(err, TbError::Extraction(_)));
    }
}
