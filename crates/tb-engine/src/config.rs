//! Engine configuration: a JSON file plus environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tb_extract::ContextConfig;
use tb_optimizer::OptimizerConfig;
use tb_types::{
    config_error, OptimizeRequest, QualityDomain, TbResult, DEFAULT_MIN_P_WIN, DEFAULT_POINTS,
    DEFAULT_TOL_REL, MAX_POINTS, MIN_POINTS,
};

/// Path of the JSON config file, used when none is given explicitly.
pub const CONFIG_ENV: &str = "TENDERBID_CONFIG";
/// Path of the model bundle; overrides `models_path` from the file.
pub const MODELS_ENV: &str = "TENDERBID_MODELS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// JSON model bundle with the win classifier and optional profit regressor.
    pub models_path: Option<PathBuf>,
    pub n_points: usize,
    pub auto_expand: bool,
    pub tol_rel: f64,
    pub min_p_win: f64,
    /// Profit formula for direct optimization requests.
    pub use_profit_formula: bool,
    /// Profit formula for the document pipeline.
    pub pipeline_profit_formula: bool,
    pub quality_domain: QualityDomain,
    /// Evaluate grid passes on the rayon pool.
    pub parallel: bool,
    pub clamp_profit: bool,
    pub contexts: ContextConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_path: None,
            n_points: DEFAULT_POINTS,
            auto_expand: true,
            tol_rel: DEFAULT_TOL_REL,
            min_p_win: DEFAULT_MIN_P_WIN,
            use_profit_formula: false,
            pipeline_profit_formula: true,
            quality_domain: QualityDomain::default(),
            parallel: false,
            clamp_profit: false,
            contexts: ContextConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TbResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(config_error!("Config file not found: {}", path.display()));
        }
        info!("Loading engine config from: {}", path.display());
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config from the process environment.
    pub fn load(explicit: Option<&Path>) -> TbResult<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Resolve the config: `explicit` file, else the file named by
    /// [`CONFIG_ENV`], else defaults; then apply [`MODELS_ENV`].
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> TbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = env(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given; using defaults");
                Self::default()
            }
        };

        if let Some(models) = env(MODELS_ENV) {
            debug!("{} overrides models_path with {}", MODELS_ENV, models);
            config.models_path = Some(PathBuf::from(models));
        }
        Ok(config)
    }

    pub fn validate(&self) -> TbResult<()> {
        if !(MIN_POINTS..=MAX_POINTS).contains(&self.n_points) {
            return Err(config_error!(
                "n_points must be within [{MIN_POINTS}, {MAX_POINTS}], got {}",
                self.n_points
            ));
        }
        if !(self.tol_rel > 0.0 && self.tol_rel <= 1.0) {
            return Err(config_error!("tol_rel must be within (0, 1], got {}", self.tol_rel));
        }
        if !(self.min_p_win > 0.0 && self.min_p_win <= 1.0) {
            return Err(config_error!(
                "min_p_win must be within (0, 1], got {}",
                self.min_p_win
            ));
        }
        let domain = &self.quality_domain;
        if !(domain.min.is_finite() && domain.max.is_finite() && domain.min <= domain.max) {
            return Err(config_error!(
                "quality_domain must be a finite [min, max], got [{}, {}]",
                domain.min,
                domain.max
            ));
        }
        Ok(())
    }

    pub fn with_models_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.models_path = Some(path.into());
        self
    }

    pub fn with_points(mut self, n: usize) -> Self {
        self.n_points = n;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_quality_domain(mut self, domain: QualityDomain) -> Self {
        self.quality_domain = domain;
        self
    }

    pub fn with_pipeline_profit_formula(mut self, enabled: bool) -> Self {
        self.pipeline_profit_formula = enabled;
        self
    }

    /// Request with this config's search knobs.
    pub fn request(&self, base_price: f64, quality_score: f64) -> OptimizeRequest {
        OptimizeRequest::new(base_price, quality_score)
            .with_points(self.n_points)
            .with_auto_expand(self.auto_expand)
            .with_tolerance(self.tol_rel)
            .with_min_p_win(self.min_p_win)
            .with_profit_formula(self.use_profit_formula)
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::default()
            .with_quality_domain(self.quality_domain)
            .with_parallel(self.parallel)
            .with_profit_clamp(self.clamp_profit)
    }
}
