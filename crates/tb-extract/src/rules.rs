//! Label-driven field rules.
//!
//! A rule names a field, the labels it may appear under and the shape of its
//! value. Matching first looks for `label ... : value`; only if no label in
//! the text is followed by a colon and a well-formed value does it fall back
//! to the first well-formed value anywhere after a label.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tb_types::{CompletionPeriod, PeriodUnit, TenderFields};

/// Fields filled by the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    TenderId,
    EstimatedCost,
    Emd,
    DateOfOpening,
    CompletionTime,
}

impl Field {
    pub fn is_set(&self, fields: &TenderFields) -> bool {
        match self {
            Field::TenderId => fields.tender_id.is_some(),
            Field::EstimatedCost => fields.estimated_cost.is_some(),
            Field::Emd => fields.emd.is_some(),
            Field::DateOfOpening => fields.date_of_opening.is_some(),
            Field::CompletionTime => fields.completion_time.is_some(),
        }
    }

    /// Store `value` if its shape fits this field. Returns whether it was stored.
    pub fn store(&self, fields: &mut TenderFields, value: FieldValue) -> bool {
        match (self, value) {
            (Field::TenderId, FieldValue::Id(id)) => fields.tender_id = Some(id),
            (Field::EstimatedCost, FieldValue::Money(amount)) => {
                fields.estimated_cost = Some(amount)
            }
            (Field::Emd, FieldValue::Money(amount)) => fields.emd = Some(amount),
            (Field::DateOfOpening, FieldValue::Date(date)) => fields.date_of_opening = Some(date),
            (Field::CompletionTime, FieldValue::Period(period)) => {
                fields.completion_time = Some(period)
            }
            _ => return false,
        }
        true
    }
}

/// Shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Reference number such as `KA/PWD/2024-25/17`.
    Id,
    /// Rupee amount, optionally prefixed `Rs.` or `₹`.
    Money,
    /// `dd[./-]mm[./-]yyyy`
    Date,
    /// Number followed by a day/week/month/year unit.
    Quantity,
}

/// A parsed, normalized field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Id(String),
    Money(Decimal),
    Date(NaiveDate),
    Period(CompletionPeriod),
}

impl ValueKind {
    /// Parse a value starting exactly at the beginning of `text`.
    pub fn parse_at(&self, text: &str) -> Option<FieldValue> {
        match self {
            ValueKind::Id => parse_id(text).map(FieldValue::Id),
            ValueKind::Money => parse_money(text).map(FieldValue::Money),
            ValueKind::Date => parse_date(text).map(FieldValue::Date),
            ValueKind::Quantity => parse_quantity(text).map(FieldValue::Period),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: Field,
    /// Labels matched case-insensitively; a space matches any run of
    /// whitespace, including none.
    pub keys: &'static [&'static str],
    pub kind: ValueKind,
}

/// The built-in rule set, in sealing order.
pub const DEFAULT_RULES: [FieldRule; 5] = [
    FieldRule {
        field: Field::TenderId,
        keys: &["Tender No.", "Tender Number", "Tender ID", "NIT No."],
        kind: ValueKind::Id,
    },
    FieldRule {
        field: Field::EstimatedCost,
        keys: &["Estimated Cost", "Est. Cost", "Estimated"],
        kind: ValueKind::Money,
    },
    FieldRule {
        field: Field::Emd,
        keys: &["EMD", "Earnest Money Deposit", "Earnest Money"],
        kind: ValueKind::Money,
    },
    FieldRule {
        field: Field::DateOfOpening,
        keys: &["Date of Opening", "Bid Opening Date", "Opening of technical bids"],
        kind: ValueKind::Date,
    },
    FieldRule {
        field: Field::CompletionTime,
        keys: &[
            "Completion Time",
            "Contract Period",
            "Period of Work",
            "Completion Period",
            "Time of completion",
        ],
        kind: ValueKind::Quantity,
    },
];

impl FieldRule {
    /// First value for this rule in `text`, colon form before proximity form.
    pub fn find(&self, text: &str) -> Option<FieldValue> {
        let labels = self.label_spans(text);
        self.find_after_colon(text, &labels)
            .or_else(|| self.find_near(text, &labels))
    }

    /// `(start, end)` byte spans of every label occurrence, ordered by start.
    fn label_spans(&self, text: &str) -> Vec<(usize, usize)> {
        text.char_indices()
            .filter_map(|(start, _)| {
                self.keys
                    .iter()
                    .find_map(|key| match_label(text, start, key))
                    .map(|end| (start, end))
            })
            .collect()
    }

    fn find_after_colon(&self, text: &str, labels: &[(usize, usize)]) -> Option<FieldValue> {
        labels.iter().find_map(|&(_, end)| {
            text[end..]
                .match_indices(':')
                .find_map(|(offset, colon)| {
                    let value = text[end + offset + colon.len()..].trim_start();
                    self.kind.parse_at(value)
                })
        })
    }

    fn find_near(&self, text: &str, labels: &[(usize, usize)]) -> Option<FieldValue> {
        labels.iter().find_map(|&(_, end)| {
            let tail = &text[end..];
            tail.char_indices()
                .find_map(|(offset, _)| self.kind.parse_at(&tail[offset..]))
        })
    }
}

/// Match `key` at byte `start` of `text`, returning the end of the match.
fn match_label(text: &str, start: usize, key: &str) -> Option<usize> {
    let mut pos = start;
    for k in key.chars() {
        if k == ' ' {
            pos += leading_len(&text[pos..], char::is_whitespace);
            continue;
        }
        let c = text[pos..].chars().next()?;
        if !c.eq_ignore_ascii_case(&k) {
            return None;
        }
        pos += c.len_utf8();
    }
    Some(pos)
}

/// Byte length of the prefix of `text` whose chars satisfy `pred`.
fn leading_len(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.chars()
        .take_while(|c| pred(*c))
        .map(char::len_utf8)
        .sum()
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '/' | '.' | '-')
}

/// Id token: word chars, `/`, `.` and `-`, trimmed of edge dots and hyphens.
fn parse_id(text: &str) -> Option<String> {
    let raw = &text[..leading_len(text, is_id_char)];
    let id = normalize_id(raw);
    (!id.is_empty()).then_some(id)
}

/// Collapse whitespace around hyphens and strip edge spaces, dots and hyphens.
pub fn normalize_id(raw: &str) -> String {
    raw.split('-')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches(|c: char| c == ' ' || c == '.' || c == '-')
        .to_string()
}

/// Money token: optional `Rs`/`Rs.`/`₹` prefix, then a digit-led run of
/// digits, commas and dots.
fn parse_money(text: &str) -> Option<Decimal> {
    let rest = strip_currency(text);
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let raw = &rest[..leading_len(rest, |c| c.is_ascii_digit() || c == ',' || c == '.')];
    normalize_money(raw)
}

fn strip_currency(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix('₹') {
        return rest.trim_start();
    }
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && bytes[..2].eq_ignore_ascii_case(b"rs") {
        let rest = &text[2..];
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        return rest.trim_start();
    }
    text
}

/// Keep digits and dots, trim edge dots and parse. `12,34,567.00/-` → `1234567.00`.
pub fn normalize_money(raw: &str) -> Option<Decimal> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let digits = digits.trim_matches('.');
    if digits.is_empty() {
        return None;
    }
    Decimal::from_str(digits).ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let b = text.as_bytes();
    if b.len() < 10 {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    let separator = |i: usize| matches!(b[i], b'.' | b'/' | b'-');
    if !(digits(0..2) && separator(2) && digits(3..5) && separator(5) && digits(6..10)) {
        return None;
    }
    normalize_date(&text[..10])
}

/// Parse `dd[./-]mm[./-]yyyy`, separators unified to `-`.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let unified: String = raw
        .trim_matches(|c: char| c == ' ' || c == '.' || c == ',')
        .chars()
        .map(|c| if matches!(c, '.' | '/') { '-' } else { c })
        .collect();
    NaiveDate::parse_from_str(&unified, "%d-%m-%Y").ok()
}

fn parse_quantity(text: &str) -> Option<CompletionPeriod> {
    let number_len = leading_len(text, |c| c.is_ascii_digit() || c == '.');
    if number_len == 0 {
        return None;
    }
    let amount = Decimal::from_str(text[..number_len].trim_matches('.')).ok()?;

    let rest = text[number_len..].trim_start();
    let word = &rest[..leading_len(rest, |c| c.is_ascii_alphabetic())];
    let unit = PeriodUnit::parse(word)?;
    Some(CompletionPeriod { amount, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(field: Field) -> FieldRule {
        DEFAULT_RULES
            .iter()
            .copied()
            .find(|r| r.field == field)
            .unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn labels_match_case_insensitively_with_flexible_spacing() {
        assert_eq!(match_label("EARNEST MONEY: x", 0, "Earnest Money"), Some(13));
        assert_eq!(match_label("EarnestMoney", 0, "Earnest Money"), Some(12));
        assert_eq!(match_label("Earnest\n  Money", 0, "Earnest Money"), Some(15));
        assert_eq!(match_label("Earnest Mon", 0, "Earnest Money"), None);
    }

    #[test]
    fn money_with_prefix_and_indian_grouping() {
        let emd = rule(Field::Emd);
        assert_eq!(
            emd.find("EMD : Rs. 1,25,000/- only"),
            Some(FieldValue::Money(dec("125000")))
        );
        assert_eq!(
            emd.find("Earnest Money Deposit: ₹ 50,000.00"),
            Some(FieldValue::Money(dec("50000.00")))
        );
    }

    #[test]
    fn colon_form_wins_over_proximity() {
        let cost = rule(Field::EstimatedCost);
        let text = "Estimated cost 2024-25 schedule\nEstimated Cost of work (in Rs.) : 45,67,890";
        assert_eq!(cost.find(text), Some(FieldValue::Money(dec("4567890"))));
    }

    #[test]
    fn proximity_form_when_no_colon() {
        let cost = rule(Field::EstimatedCost);
        assert_eq!(
            cost.find("Estimated cost of the work Rs 8,00,000 inclusive of GST"),
            Some(FieldValue::Money(dec("800000")))
        );
    }

    #[test]
    fn colon_without_value_falls_through_to_later_colon() {
        let emd = rule(Field::Emd);
        assert_eq!(
            emd.find("EMD details: see below\nAmount: 75,000"),
            Some(FieldValue::Money(dec("75000")))
        );
    }

    #[test]
    fn tender_id_is_normalized() {
        let id = rule(Field::TenderId);
        assert_eq!(
            id.find("Tender No. : KA/PWD/2024-25/17."),
            Some(FieldValue::Id("KA/PWD/2024-25/17".into()))
        );
        assert_eq!(
            id.find("NIT No. -BBMP/EE/33-"),
            Some(FieldValue::Id("BBMP/EE/33".into()))
        );
    }

    #[test]
    fn normalize_id_collapses_hyphen_spacing() {
        assert_eq!(normalize_id(" KA - 2024 - 17 ."), "KA-2024-17");
        assert_eq!(normalize_id("--."), "");
    }

    #[test]
    fn dates_accept_mixed_separators() {
        let opening = rule(Field::DateOfOpening);
        assert_eq!(
            opening.find("Date of Opening: 15.03.2024 at 11:00 hrs"),
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()))
        );
        assert_eq!(
            opening.find("Bid Opening Date 01/12/2023"),
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()))
        );
        assert_eq!(normalize_date("31-02-2024"), None);
    }

    #[test]
    fn completion_period_parses_units() {
        let period = rule(Field::CompletionTime);
        assert_eq!(
            period.find("Time of completion: 6 Months (including monsoon)"),
            Some(FieldValue::Period(CompletionPeriod {
                amount: dec("6"),
                unit: PeriodUnit::Months
            }))
        );
        assert_eq!(
            period.find("Contract Period 180 days"),
            Some(FieldValue::Period(CompletionPeriod {
                amount: dec("180"),
                unit: PeriodUnit::Days
            }))
        );
        assert_eq!(period.find("Completion Time: as directed"), None);
    }

    #[test]
    fn normalize_money_strips_noise() {
        assert_eq!(normalize_money("12,34,567.00/-"), Some(dec("1234567.00")));
        assert_eq!(normalize_money(".500."), Some(dec("500")));
        assert_eq!(normalize_money(",,"), None);
        assert_eq!(normalize_money("1.2.3"), None);
    }

    #[test]
    fn store_rejects_mismatched_shapes() {
        let mut fields = TenderFields::default();
        assert!(!Field::Emd.store(&mut fields, FieldValue::Id("x".into())));
        assert!(Field::Emd.store(&mut fields, FieldValue::Money(dec("10"))));
        assert!(Field::Emd.is_set(&fields));
    }
}
