//! Sealed, first-match-wins extraction over context snippets.

use tracing::{debug, info};

use tb_types::TenderFields;

use crate::keywords::KeywordContexts;
use crate::rules::{FieldRule, DEFAULT_RULES};

/// Applies a rule set to documents, sealing each field at its first value.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<FieldRule>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl FieldExtractor {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Fill every still-empty field that `text` yields a value for.
    pub fn seal_from(&self, fields: &mut TenderFields, text: &str) {
        for rule in &self.rules {
            if rule.field.is_set(fields) {
                continue;
            }
            if let Some(value) = rule.find(text) {
                debug!("Sealed {:?} from {:?}", rule.field, value);
                rule.field.store(fields, value);
            }
        }
    }

    /// Fold named documents in the given order, stopping once every field
    /// is sealed.
    pub fn extract<'a, I>(&self, documents: I) -> TenderFields
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = TenderFields::default();
        for (name, text) in documents {
            if self.all_sealed(&fields) {
                debug!("All fields sealed before {}", name);
                break;
            }
            self.seal_from(&mut fields, text);
        }
        fields
    }

    /// Run over context snippets in lexicographic name order.
    pub fn extract_contexts(&self, contexts: &KeywordContexts) -> TenderFields {
        let named: Vec<(String, String)> = contexts
            .named()
            .into_iter()
            .map(|(name, snippet)| (name, snippet.text()))
            .collect();
        let fields = self.extract(named.iter().map(|(n, t)| (n.as_str(), t.as_str())));

        let missing = fields.missing();
        if missing.is_empty() {
            info!("Extracted all tender fields from {} snippets", named.len());
        } else {
            info!(
                "Extracted tender fields from {} snippets; missing {}",
                named.len(),
                missing.join(", ")
            );
        }
        fields
    }

    fn all_sealed(&self, fields: &TenderFields) -> bool {
        self.rules.iter().all(|rule| rule.field.is_set(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::{collect_contexts, ContextConfig};
    use crate::sources::{Source, SourceKind};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn first_value_is_never_overwritten() {
        let extractor = FieldExtractor::default();
        let fields = extractor.extract([
            ("emd_001", "EMD: Rs. 10,000"),
            ("emd_002", "EMD: Rs. 99,999"),
        ]);
        assert_eq!(fields.emd, Some(Decimal::from(10_000)));
    }

    #[test]
    fn fold_stops_once_complete() {
        let extractor = FieldExtractor::default();
        let complete = "Tender No.: T-1\nEstimated Cost: 1,00,000\nEMD: 2,000\n\
                        Date of Opening: 01-02-2024\nCompletion Time: 3 Months";
        let fields = extractor.extract([
            ("a_001", complete),
            ("b_001", "Tender No.: SHOULD-NOT-APPEAR"),
        ]);
        assert!(fields.is_complete());
        assert_eq!(fields.tender_id.as_deref(), Some("T-1"));
        assert_eq!(
            fields.date_of_opening,
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn contexts_are_folded_in_name_order() {
        let sources = [
            Source::new(
                "page1_text.txt",
                SourceKind::Text,
                "Tender No. : PWD/77\nName of work: resurfacing of ring road",
            ),
            Source::new(
                "page2_text.txt",
                SourceKind::Text,
                "Earnest Money Deposit: Rs. 45,000\nTender value Rs. 22,50,000",
            ),
        ];
        let contexts = collect_contexts(&sources, &ContextConfig::default());
        let fields = FieldExtractor::default().extract_contexts(&contexts);

        assert_eq!(fields.tender_id.as_deref(), Some("PWD/77"));
        assert_eq!(fields.emd, Some(Decimal::from(45_000)));
        assert!(fields.date_of_opening.is_none());
        assert!(fields.missing().contains(&"date_of_opening"));
    }
}
