//! Page text and table dumps produced by the document-to-text step.

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tb_types::ExtractionError;

/// Separator placed between table cells when a CSV row is flattened to text.
pub const CELL_SEPARATOR: &str = " | ";

/// What a source file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `page<N>_text.txt`
    Text,
    /// `page<N>_table<M>.csv`
    Table,
}

impl SourceKind {
    /// Classify a file name, or `None` for files that are not page dumps.
    pub fn of(file_name: &str) -> Option<Self> {
        let rest = file_name.strip_prefix("page")?;
        if rest.ends_with("_text.txt") {
            return Some(Self::Text);
        }
        match rest.strip_suffix(".csv") {
            Some(stem) if stem.contains("_table") => Some(Self::Table),
            _ => None,
        }
    }
}

/// One non-empty page dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub content: String,
}

impl Source {
    pub fn new(name: impl Into<String>, kind: SourceKind, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            content: content.into(),
        }
    }

    /// Trimmed, non-blank lines of the content.
    pub fn lines(&self) -> Vec<&str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Load every page dump in `dir`, sorted by file name.
///
/// Empty or unreadable files are skipped with a warning.
pub fn read_sources<P: AsRef<Path>>(dir: P) -> Result<Vec<Source>, ExtractionError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ExtractionError::FolderNotFound {
            path: dir.display().to_string(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| ExtractionError::SourceRead {
        name: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut candidates: Vec<(String, SourceKind, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let kind = SourceKind::of(&name)?;
            Some((name, kind, entry.path()))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sources = Vec::with_capacity(candidates.len());
    for (name, kind, path) in candidates {
        match read_source(&name, kind, &path) {
            Ok(Some(source)) => {
                debug!("Read {} ({} bytes)", source.name, source.content.len());
                sources.push(source);
            }
            Ok(None) => warn!("Skipping empty source {}", name),
            Err(e) => warn!("Skipping source: {}", e),
        }
    }

    if sources.is_empty() {
        return Err(ExtractionError::NoSources {
            path: dir.display().to_string(),
        });
    }

    info!("Loaded {} sources from {}", sources.len(), dir.display());
    Ok(sources)
}

fn read_source(
    name: &str,
    kind: SourceKind,
    path: &Path,
) -> Result<Option<Source>, ExtractionError> {
    let bytes = fs::read(path).map_err(|e| ExtractionError::SourceRead {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    let content = match kind {
        SourceKind::Text => String::from_utf8_lossy(&bytes).trim().to_string(),
        SourceKind::Table => table_to_text(name, &bytes)?,
    };

    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Source::new(name, kind, content)))
    }
}

/// Flatten a headerless CSV table to one line per row, cells joined by
/// [`CELL_SEPARATOR`]. Rows with no content are dropped.
pub fn table_to_text(name: &str, data: &[u8]) -> Result<String, ExtractionError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for (line_num, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|e| ExtractionError::SourceRead {
            name: name.to_string(),
            message: format!("row {}: {}", line_num + 1, e),
        })?;

        let cells: Vec<String> = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
            .collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells.join(CELL_SEPARATOR));
    }

    Ok(rows.join("\n"))
}
