// Source Reader: turns the editorial spreadsheet into publish candidates.
//
// The sheet has a fixed layout. The first [`HEADER_ROWS`] rows are headers;
// below them, a row with only column A filled starts a new section and every
// following row inherits that label until the next one.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{CopydeskError, Result};

pub const HEADER_ROWS: usize = 7;
pub const DEFAULT_SECTION: &str = "Uncategorized";
pub const ONLINE_COLUMN_LETTER: &str = "D";

const COL_SECTION: usize = 0;
const COL_READY: usize = 1;
const COL_ONLINE: usize = 3;
const COL_DOCUMENT: usize = 4;
const COL_AUTHORS: usize = 7;
const COL_IMAGE: usize = 13;
const COL_CATEGORIES: usize = 14;
const COL_HEADLINES: usize = 15;
const COL_CUTLINES: usize = 16;

/// One sheet cell as returned by the grid API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub formatted_value: Option<String>,
    #[serde(default)]
    pub hyperlink: Option<String>,
    #[serde(default)]
    pub text_format_runs: Vec<FormatRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatRun {
    #[serde(default)]
    pub format: Option<RunFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunFormat {
    #[serde(default)]
    pub link: Option<RunLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunLink {
    #[serde(default)]
    pub uri: Option<String>,
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Self {
            formatted_value: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn linked(value: &str, url: &str) -> Self {
        Self {
            formatted_value: Some(value.to_string()),
            hyperlink: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn value(&self) -> Option<&str> {
        self.formatted_value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Link carried by the cell: first linked run, then the cell hyperlink,
    /// then the first URL in the text.
    pub fn link(&self) -> Option<String> {
        let from_runs = self
            .text_format_runs
            .iter()
            .filter_map(|run| run.format.as_ref()?.link.as_ref()?.uri.clone())
            .next();

        from_runs
            .or_else(|| self.hyperlink.clone())
            .or_else(|| {
                let text = self.formatted_value.as_deref()?;
                url_pattern().find(text).map(|m| m.as_str().to_string())
            })
    }
}

/// A raw sheet row.
#[derive(Debug, Clone, Default)]
pub struct GridRow {
    pub cells: Vec<Cell>,
}

impl GridRow {
    fn cell(&self, idx: usize) -> Option<&Cell> {
        self.cells.get(idx)
    }

    fn value(&self, idx: usize) -> Option<&str> {
        self.cell(idx).and_then(Cell::value)
    }

    fn link(&self, idx: usize) -> Option<String> {
        self.cell(idx).and_then(Cell::link)
    }

    fn flag(&self, idx: usize) -> bool {
        self.value(idx).map(is_truthy).unwrap_or(false)
    }

    fn list(&self, idx: usize) -> Vec<String> {
        self.value(idx).map(split_list).unwrap_or_default()
    }
}

/// A publish candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based sheet row number.
    pub number: usize,
    pub ready: bool,
    pub online: bool,
    pub document_link: String,
    pub authors: Vec<String>,
    pub image_link: Option<String>,
    pub categories: Vec<String>,
    pub headlines_link: Option<String>,
    pub cutlines_link: Option<String>,
    pub section: String,
}

/// Read/write access to the editorial spreadsheet.
pub trait SheetSource {
    /// All rows of the first sheet, in order, starting at row 1.
    fn fetch_grid(&self, sheet_id: &str) -> Result<Vec<GridRow>>;

    /// Set the Online flag of a 1-based sheet row.
    fn mark_online(&self, sheet_id: &str, row: usize) -> Result<()>;
}

/// Rows that are ready to post and not yet online, in sheet order.
pub fn get_eligible_rows(source: &dyn SheetSource, sheet_id: &str) -> Result<Vec<Row>> {
    let grid = source.fetch_grid(sheet_id)?;
    eligible_rows(&grid)
}

pub fn eligible_rows(grid: &[GridRow]) -> Result<Vec<Row>> {
    let data = grid.get(HEADER_ROWS..).unwrap_or_default();
    if data.iter().any(|row| !row.cells.is_empty()) && !data.iter().any(|row| row.cells.len() > COL_DOCUMENT) {
        return Err(CopydeskError::SourceFormat(format!(
            "no row reaches the document column (column {})",
            (b'A' + COL_DOCUMENT as u8) as char
        )));
    }

    let mut eligible = Vec::new();
    let mut section = DEFAULT_SECTION.to_string();

    for (idx, row) in data.iter().enumerate() {
        let number = idx + HEADER_ROWS + 1;

        if row.cells.is_empty() {
            continue;
        }

        if let Some(label) = row.value(COL_SECTION) {
            let header_only = [COL_READY, COL_ONLINE, COL_DOCUMENT]
                .iter()
                .all(|&col| row.value(col).is_none());
            if header_only {
                tracing::debug!(row = number, section = label, "Section header");
                section = label.to_string();
                continue;
            }
        }

        let ready = row.flag(COL_READY);
        let online = row.flag(COL_ONLINE);
        if !ready || online {
            tracing::debug!(row = number, ready, online, "Row not eligible");
            continue;
        }

        let Some(document_link) = row.link(COL_DOCUMENT) else {
            tracing::warn!(row = number, "Ready row has no document link, skipping");
            continue;
        };

        eligible.push(Row {
            number,
            ready,
            online,
            document_link,
            authors: row.list(COL_AUTHORS),
            image_link: row.link(COL_IMAGE),
            categories: row.list(COL_CATEGORIES),
            headlines_link: row.link(COL_HEADLINES),
            cutlines_link: row.link(COL_CUTLINES),
            section: section.clone(),
        });
    }

    tracing::info!(count = eligible.len(), "Eligible rows found");
    Ok(eligible)
}

/// Extract the spreadsheet id from a Sheets URL. A bare id is accepted as is.
pub fn sheet_id_from_url(input: &str) -> Result<String> {
    let input = input.trim();
    static ID: OnceLock<Regex> = OnceLock::new();
    let re = ID.get_or_init(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("valid regex"));

    if let Some(caps) = re.captures(input) {
        return Ok(caps[1].to_string());
    }
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Ok(input.to_string());
    }
    Err(CopydeskError::Configuration(format!("not a Google Sheets URL: {}", input)))
}

pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_uppercase().as_str(), "TRUE" | "✓" | "YES" | "1")
}

/// Split a comma separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://\S+").expect("valid regex"))
}
