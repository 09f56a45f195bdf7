//! # tb-extract
//!
//! Pulls structured tender fields out of page dumps (`page*_text.txt`,
//! `page*_table*.csv`): keyword contexts are cut from the sources, field
//! rules are folded over them first-match-wins, and a base price is derived
//! for the optimizer.

pub mod base_price;
pub mod extractor;
pub mod keywords;
pub mod rules;
pub mod sources;

pub use base_price::{derive_base_price, number_runs, BasePrice, BasePriceOrigin};
pub use extractor::FieldExtractor;
pub use keywords::{
    collect_contexts, contains_keyword, ContextConfig, ContextSnippet, KeywordContexts, Param,
};
pub use rules::{
    normalize_date, normalize_id, normalize_money, Field, FieldRule, FieldValue, ValueKind,
    DEFAULT_RULES,
};
pub use sources::{read_sources, table_to_text, Source, SourceKind, CELL_SEPARATOR};

use std::path::Path;

use serde::Serialize;

use tb_types::{ExtractionError, TenderFields};

/// Everything extracted from one document folder.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub sources: Vec<Source>,
    pub contexts: KeywordContexts,
    pub fields: TenderFields,
}

impl Extraction {
    /// Run context collection and the sealed fold over already-loaded sources.
    pub fn from_sources(sources: Vec<Source>, config: &ContextConfig) -> Self {
        let contexts = collect_contexts(&sources, config);
        let fields = FieldExtractor::default().extract_contexts(&contexts);
        Self {
            sources,
            contexts,
            fields,
        }
    }

    pub fn base_price(&self) -> Result<BasePrice, ExtractionError> {
        derive_base_price(&self.fields, &self.contexts, &self.sources)
    }
}

/// Read a page-dump folder and extract its tender fields.
pub fn extract_folder<P: AsRef<Path>>(
    dir: P,
    config: &ContextConfig,
) -> Result<Extraction, ExtractionError> {
    let sources = read_sources(dir)?;
    Ok(Extraction::from_sources(sources, config))
}
