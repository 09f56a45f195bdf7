//! tender-bid: pick the bid that maximizes expected profit on a tender.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tb_engine::{BidLimits, Engine, EngineConfig, CONFIG_ENV};
use tb_extract::{extract_folder, BasePrice};
use tb_types::TenderFields;

/// Expected-profit bid optimizer for public tenders
#[derive(Parser)]
#[command(name = "tender-bid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (JSON)
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Model bundle (JSON); overrides the config file
    #[arg(short, long, global = true)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a bid for a known base price
    Optimize {
        /// Estimated cost of the tender
        #[arg(short, long)]
        base_price: f64,

        /// Bidder quality score
        #[arg(short, long)]
        quality: f64,

        #[command(flatten)]
        limits: LimitArgs,

        /// Grid size of the initial coarse pass
        #[arg(short = 'n', long)]
        points: Option<usize>,

        /// Keep the search inside the initial bracket
        #[arg(long)]
        no_expand: bool,

        /// Use bid - base_price instead of the profit model
        #[arg(long)]
        profit_formula: bool,
    },

    /// Extract tender fields from a folder of page dumps
    Extract {
        /// Folder with page*_text.txt and page*_table*.csv files
        #[arg(short, long)]
        pages: PathBuf,
    },

    /// Extract fields, derive the base price and optimize the bid
    Run {
        /// Folder with page*_text.txt and page*_table*.csv files
        #[arg(short, long)]
        pages: PathBuf,

        /// Bidder quality score
        #[arg(short, long)]
        quality: f64,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(clap::Args)]
struct LimitArgs {
    /// Lower bound of the initial bracket (default 0.8 × base price)
    #[arg(long)]
    min_bid: Option<f64>,

    /// Upper bound of the initial bracket (default 1.2 × base price)
    #[arg(long)]
    max_bid: Option<f64>,
}

impl From<LimitArgs> for BidLimits {
    fn from(args: LimitArgs) -> Self {
        BidLimits {
            min_bid: args.min_bid,
            max_bid: args.max_bid,
        }
    }
}

#[derive(Serialize)]
struct ExtractReport {
    sources: Vec<String>,
    snippets: usize,
    fields: TenderFields,
    missing: Vec<&'static str>,
    base_price: Option<BasePrice>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::load(cli.config.as_deref()).context("loading engine config")?;
    if let Some(models) = cli.models {
        config = config.with_models_path(models);
    }

    match cli.command {
        Commands::Optimize {
            base_price,
            quality,
            limits,
            points,
            no_expand,
            profit_formula,
        } => {
            if let Some(n) = points {
                config = config.with_points(n);
            }
            config.auto_expand = config.auto_expand && !no_expand;
            config.use_profit_formula = config.use_profit_formula || profit_formula;

            let engine = Engine::new(config).context("loading models")?;
            let result = engine.optimize(base_price, quality, limits.into())?;
            print_json(&result)
        }
        Commands::Extract { pages } => {
            let extraction = extract_folder(&pages, &config.contexts)
                .with_context(|| format!("extracting {}", pages.display()))?;
            let base_price = match extraction.base_price() {
                Ok(price) => Some(price),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            print_json(&ExtractReport {
                sources: extraction.sources.iter().map(|s| s.name.clone()).collect(),
                snippets: extraction.contexts.len(),
                missing: extraction.fields.missing(),
                fields: extraction.fields,
                base_price,
            })
        }
        Commands::Run {
            pages,
            quality,
            limits,
        } => {
            let engine = Engine::new(config).context("loading models")?;
            let report = engine.run_pipeline(&pages, quality, limits.into())?;
            print_json(&report)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
