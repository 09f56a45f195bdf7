//! # tb-engine
//!
//! Wires extraction, model loading and the bid optimizer into a single
//! engine used by the `tender-bid` command-line tool.

pub mod config;
pub mod pipeline;

pub use config::{EngineConfig, CONFIG_ENV, MODELS_ENV};
pub use pipeline::{BidLimits, Engine, PipelineReport, RunId};
