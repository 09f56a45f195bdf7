//! Base price derivation with fallbacks.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tb_types::{ExtractionError, TenderFields};

use crate::keywords::{KeywordContexts, Param};
use crate::sources::{Source, SourceKind};

/// Minimum length of a number-like run in the last-resort text scan.
const FALLBACK_MIN_CHARS: usize = 5;

/// Where the base price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasePriceOrigin {
    /// The sealed estimated-cost field.
    EstimatedCost,
    /// Largest amount inside the estimated-cost context snippets.
    CostContext,
    /// First long number in the page text.
    PageText,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePrice {
    pub amount: Decimal,
    pub origin: BasePriceOrigin,
}

impl BasePrice {
    pub fn as_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(f64::NAN)
    }
}

/// Pick the base price: estimated cost, else the largest amount in the
/// estimated-cost contexts, else the first long number in the page text.
///
/// # Errors
///
/// [`ExtractionError::NoBasePrice`] when nothing is found or the value is
/// not positive.
pub fn derive_base_price(
    fields: &TenderFields,
    contexts: &KeywordContexts,
    sources: &[Source],
) -> Result<BasePrice, ExtractionError> {
    let found = fields
        .estimated_cost
        .map(|amount| (amount, BasePriceOrigin::EstimatedCost))
        .or_else(|| largest_context_amount(contexts).map(|a| (a, BasePriceOrigin::CostContext)))
        .or_else(|| first_page_number(sources).map(|a| (a, BasePriceOrigin::PageText)));

    match found {
        Some((amount, origin)) if amount > Decimal::ZERO => {
            info!("Using base price {} ({:?})", amount, origin);
            Ok(BasePrice { amount, origin })
        }
        other => Err(ExtractionError::NoBasePrice {
            found: other.map(|(amount, _)| amount.to_string()),
        }),
    }
}

fn largest_context_amount(contexts: &KeywordContexts) -> Option<Decimal> {
    let amount = contexts
        .get(Param::EstimatedCost)
        .iter()
        .flat_map(|snippet| number_runs(&snippet.lines.join(" "), 2))
        .filter(|amount| *amount > Decimal::ZERO)
        .max();
    debug!("Largest estimated-cost context amount: {:?}", amount);
    amount
}

fn first_page_number(sources: &[Source]) -> Option<Decimal> {
    sources
        .iter()
        .filter(|source| source.kind == SourceKind::Text)
        .find_map(|source| {
            let raw = digit_runs(&source.content)
                .find(|raw| raw.chars().count() >= FALLBACK_MIN_CHARS)?;
            parse_amount(raw)
        })
}

/// Parsed amounts of every digit-led run of digits, commas and dots with at
/// least `min_chars` characters.
pub fn number_runs(text: &str, min_chars: usize) -> Vec<Decimal> {
    digit_runs(text)
        .filter(|raw| raw.chars().count() >= min_chars)
        .filter_map(parse_amount)
        .collect()
}

/// Non-overlapping digit-led `[0-9,.]` runs, left to right.
fn digit_runs(text: &str) -> impl Iterator<Item = &str> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let offset = text[pos..].find(|c: char| c.is_ascii_digit())?;
        let start = pos + offset;
        let len = text[start..]
            .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
            .unwrap_or(text.len() - start);
        pos = start + len;
        Some(&text[start..pos])
    })
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(cleaned.trim_end_matches('.')).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::{collect_contexts, ContextConfig};

    fn text(name: &str, content: &str) -> Source {
        Source::new(name, SourceKind::Text, content)
    }

    #[test]
    fn estimated_cost_field_wins() {
        let fields = TenderFields {
            estimated_cost: Some(Decimal::from(1_234_567)),
            ..TenderFields::default()
        };
        let price = derive_base_price(&fields, &KeywordContexts::default(), &[]).unwrap();
        assert_eq!(price.origin, BasePriceOrigin::EstimatedCost);
        assert_eq!(price.as_f64(), 1_234_567.0);
    }

    #[test]
    fn falls_back_to_largest_context_amount() {
        let sources = [text(
            "page1_text.txt",
            "Project cost for phase 2 works\n₹ 4,50,000 civil\n₹ 12,00,000 electrical",
        )];
        let contexts = collect_contexts(&sources, &ContextConfig::default());
        let price = derive_base_price(&TenderFields::default(), &contexts, &sources).unwrap();
        assert_eq!(price.origin, BasePriceOrigin::CostContext);
        assert_eq!(price.amount, Decimal::from(1_200_000));
    }

    #[test]
    fn falls_back_to_first_long_number() {
        let sources = [
            Source::new("page1_table0.csv", SourceKind::Table, "99999999"),
            text("page1_text.txt", "Page 1 of 3"),
            text("page2_text.txt", "Bids invited, ref 12 dated 2024 for 3,75,000/-"),
        ];
        let price =
            derive_base_price(&TenderFields::default(), &KeywordContexts::default(), &sources)
                .unwrap();
        assert_eq!(price.origin, BasePriceOrigin::PageText);
        assert_eq!(price.amount, Decimal::from(375_000));
    }

    #[test]
    fn nothing_found_is_an_error() {
        let sources = [text("page1_text.txt", "no numbers here")];
        let err = derive_base_price(&TenderFields::default(), &KeywordContexts::default(), &sources)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoBasePrice { found: None }));
    }

    #[test]
    fn non_positive_value_is_rejected() {
        let fields = TenderFields {
            estimated_cost: Some(Decimal::ZERO),
            ..TenderFields::default()
        };
        let err = derive_base_price(&fields, &KeywordContexts::default(), &[]).unwrap_err();
        assert!(matches!(err, ExtractionError::NoBasePrice { found: Some(ref v) } if v == "0"));
    }

    #[test]
    fn number_runs_skip_short_and_unparseable() {
        let runs = number_runs("a 7 b 12,500 c 1.2.3 d 40.", 2);
        assert_eq!(runs, vec![Decimal::from(12_500), Decimal::from(40)]);
    }
}
