//! # tb-optimizer
//!
//! Expected-profit bid search for tenders.
//!
//! The objective `P(win | bid) × profit(bid | win)` is backed by two opaque
//! oracles. The search samples a uniform grid over the bid bracket, widens the
//! bracket upward while the optimum sits on its edge, polishes the best grid
//! point with golden-section search and returns the best of the coarse and
//! refined candidates together with a diagnostic sweep.

mod coarse;
mod expansion;
mod golden;
mod models;
mod objective;
mod optimizer;
mod oracle;

pub use coarse::{coarse_search, linspace, stable_argmax, Candidate, SearchSample};
pub use expansion::{expand, ExpansionOutcome, ExpansionPolicy};
pub use golden::{golden_section_maximize, refinement_window, RefineConfig, Refinement};
pub use models::{
    ClassifierModel, LinearProfitModel, LogisticWinModel, ModelBundle, StandardScaler,
    ThresholdClassifier,
};
pub use objective::{Objective, ProfitSource};
pub use optimizer::{optimize, BidOptimizer, OptimizerConfig};
pub use oracle::{
    ClassOutput, Classifier, ClassifierOracle, Features, FnOracle, ProfitFormula, ProfitOracle,
    WinProbabilityOracle,
};
