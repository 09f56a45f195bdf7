//! Keyword-anchored context windows around tender parameters.
//!
//! Page dumps are noisy: labels are split across lines, words run together
//! with stray dots and values often sit a few lines below their label. For
//! every parameter we keep short windows of lines around keyword hits and
//! leave value parsing to the field rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sources::Source;

/// Tender parameters that context windows are collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    TenderId,
    TenderName,
    EstimatedCost,
    Emd,
    TenderFee,
    Organization,
    DateOfOpening,
    CompletionTime,
}

impl Param {
    pub const ALL: [Param; 8] = [
        Param::TenderId,
        Param::TenderName,
        Param::EstimatedCost,
        Param::Emd,
        Param::TenderFee,
        Param::Organization,
        Param::DateOfOpening,
        Param::CompletionTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Param::TenderId => "tender_id",
            Param::TenderName => "tender_name",
            Param::EstimatedCost => "estimated_cost",
            Param::Emd => "emd",
            Param::TenderFee => "tender_fee",
            Param::Organization => "organization",
            Param::DateOfOpening => "date_of_opening",
            Param::CompletionTime => "completion_time",
        }
    }

    /// Lower-case phrases that anchor a context window.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Param::TenderId => &[
                "tender id",
                "tender no",
                "tender number",
                "nit no",
                "e-tender no",
                "bid no",
                "reference no",
            ],
            Param::TenderName => &[
                "name of work",
                "work name",
                "tender name",
                "subject",
                "work title",
                "scope of work",
            ],
            Param::EstimatedCost => &[
                "estimated cost",
                "estimated amount",
                "tender value",
                "value put to tender",
                "project cost",
                "cost of work",
            ],
            Param::Emd => &[
                "emd",
                "earnest money deposit",
                "bid security",
                "security deposit",
                "earnest money",
                "earnest",
            ],
            Param::TenderFee => &[
                "tender fee",
                "document fee",
                "cost of bid document",
                "cost of tender document",
                "bid fee",
            ],
            Param::Organization => &[
                "organization",
                "department",
                "authority",
                "employer",
                "client",
                "agency",
                "organisation",
            ],
            Param::DateOfOpening => &[
                "date of opening",
                "tender opening date",
                "bid opening date",
                "opening date",
                "date opened",
                "bid open date",
            ],
            Param::CompletionTime => &[
                "completion time",
                "work completion period",
                "time for completion",
                "period of completion",
                "completion period",
                "time to complete",
                "time of completion",
            ],
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window sizes and limits for context collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Lines kept before a hit; the window extends this many plus two after it.
    pub window_lines: usize,
    pub max_snippets_per_param: usize,
    /// Snippets shorter than this are dropped unless they contain a digit.
    pub min_snippet_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_lines: 3,
            max_snippets_per_param: 10,
            min_snippet_chars: 15,
        }
    }
}

/// Number of lines (including the hit) joined when looking for a keyword.
const MATCH_SPAN_LINES: usize = 3;

/// Lines after a hit that are scanned for trailing numeric values.
const NUMERIC_LOOKAHEAD: usize = 4;

/// Lines collected around one keyword hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub param: Param,
    /// Name of the source file the lines came from.
    pub source: String,
    pub lines: Vec<String>,
}

impl ContextSnippet {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn joined(&self) -> String {
        self.lines.join(" ")
    }
}

/// Context snippets grouped by parameter, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordContexts {
    by_param: BTreeMap<Param, Vec<ContextSnippet>>,
}

impl KeywordContexts {
    pub fn get(&self, param: Param) -> &[ContextSnippet] {
        self.by_param.get(&param).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_param.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snippets keyed `<param>_<NNN>` (1-based) in lexicographic key order.
    pub fn named(&self) -> Vec<(String, &ContextSnippet)> {
        let mut named: Vec<(String, &ContextSnippet)> = self
            .by_param
            .iter()
            .flat_map(|(param, snippets)| {
                snippets
                    .iter()
                    .enumerate()
                    .map(move |(i, snippet)| (format!("{}_{:03}", param, i + 1), snippet))
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        named
    }

    fn push(&mut self, snippet: ContextSnippet) {
        self.by_param.entry(snippet.param).or_default().push(snippet);
    }

    fn count(&self, param: Param) -> usize {
        self.get(param).len()
    }
}

/// Collect context windows for every parameter from `sources`, in order.
pub fn collect_contexts(sources: &[Source], config: &ContextConfig) -> KeywordContexts {
    let mut contexts = KeywordContexts::default();

    for source in sources {
        let lines = source.lines();
        let lower: Vec<String> = lines.iter().map(|l| l.to_lowercase()).collect();

        for param in Param::ALL {
            if contexts.count(param) >= config.max_snippets_per_param {
                continue;
            }

            for idx in 0..lines.len() {
                let end = (idx + MATCH_SPAN_LINES).min(lines.len());
                let combined = lower[idx..end].join(" ");
                if !param
                    .keywords()
                    .iter()
                    .any(|kw| contains_keyword(&combined, kw))
                {
                    continue;
                }

                let snippet = ContextSnippet {
                    param,
                    source: source.name.clone(),
                    lines: window(&lines, idx, config.window_lines)
                        .iter()
                        .map(|l| l.to_string())
                        .collect(),
                };
                let joined = snippet.joined();

                if contexts
                    .get(param)
                    .iter()
                    .any(|existing| existing.joined().contains(&joined))
                {
                    continue;
                }
                if joined.chars().count() < config.min_snippet_chars && !has_numeric(&joined) {
                    continue;
                }

                debug!("{}: context at {}:{}", param, source.name, idx + 1);
                contexts.push(snippet);
                if contexts.count(param) >= config.max_snippets_per_param {
                    break;
                }
            }
        }
    }

    contexts
}

/// Lines `[hit - w, hit + w + 3)`, stretched to cover numeric lines shortly
/// after the hit.
fn window<'a>(lines: &'a [&'a str], hit: usize, w: usize) -> &'a [&'a str] {
    let start = hit.saturating_sub(w);
    let mut end = (hit + w + MATCH_SPAN_LINES).min(lines.len());
    let lookahead_end = (hit + 1 + NUMERIC_LOOKAHEAD).min(lines.len());
    for j in (hit + 1)..lookahead_end {
        if has_numeric(lines[j]) {
            end = end.max(j + 1);
        }
    }
    &lines[start..end]
}

fn has_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit() || c == '₹')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Word-bounded match of a lower-case keyword in lower-case `haystack`.
///
/// Words of the keyword may be separated by any run of whitespace and dots,
/// including none, so OCR output like `tender.no` or `tenderno` still hits.
pub fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    let words: Vec<&str> = keyword.split_whitespace().collect();
    let Some(first) = words.first() else {
        return false;
    };

    haystack.char_indices().any(|(start, _)| {
        if haystack[..start].chars().next_back().is_some_and(is_word_char) {
            return false;
        }
        if !haystack[start..].starts_with(first) {
            return false;
        }

        let mut pos = start + first.len();
        for word in &words[1..] {
            pos += haystack[pos..]
                .chars()
                .take_while(|c| c.is_whitespace() || *c == '.')
                .map(char::len_utf8)
                .sum::<usize>();
            if !haystack[pos..].starts_with(word) {
                return false;
            }
            pos += word.len();
        }

        !haystack[pos..].chars().next().is_some_and(is_word_char)
    })
}
