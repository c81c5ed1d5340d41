// src/ingest/header.rs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Characters outside the identifier alphabet; each maximal run collapses to
/// one underscore.
static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]+").unwrap());
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// The four semantic header rows, aligned by column index with the data rows
/// beneath them. Roles are fixed by position:
/// - `sections`: sparse section labels, forward-filled during reconstruction
/// - `line_numbers`: meaningful only when the cell is a pure decimal literal
/// - `descriptions`: free-text field descriptions, used as-is
/// - `period_markers`: `CY` / `PY` / blank current-vs-prior-year tags
#[derive(Debug, Default)]
pub struct HeaderBlock {
    pub sections: Vec<String>,
    pub line_numbers: Vec<String>,
    pub descriptions: Vec<String>,
    pub period_markers: Vec<String>,
}

impl HeaderBlock {
    /// Build a block from up to four rows in role order. Missing rows become
    /// empty; no cell content is interpreted here.
    pub fn from_rows(rows: impl IntoIterator<Item = Vec<String>>) -> Self {
        let mut it = rows.into_iter();
        HeaderBlock {
            sections: it.next().unwrap_or_default(),
            line_numbers: it.next().unwrap_or_default(),
            descriptions: it.next().unwrap_or_default(),
            period_markers: it.next().unwrap_or_default(),
        }
    }

    /// Widest row in the block; reconstruction produces one name per index
    /// up to this width.
    pub fn width(&self) -> usize {
        self.sections
            .len()
            .max(self.line_numbers.len())
            .max(self.descriptions.len())
            .max(self.period_markers.len())
    }

    fn cell(row: &[String], i: usize) -> &str {
        row.get(i).map(String::as_str).unwrap_or("")
    }
}

/// True when the trimmed cell consists solely of decimal digits.
fn is_pure_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Lower-case and reduce to `[a-z0-9_]`, stripping leading/trailing and
/// repeated underscores.
pub fn sanitize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = NON_IDENT.replace_all(&lowered, "_");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Derive one semantic name per column index from the four header rows.
///
/// Per index: forward-filled section label, digit-only line number, trimmed
/// description, joined by underscores; `column_<i>` when all three are blank;
/// a `_cy`/`_py` suffix from the period marker; then the sanitize pass.
/// Never fails; malformed cells degrade to whatever parts survive.
pub fn reconstruct_columns(block: &HeaderBlock) -> Vec<String> {
    let width = block.width();
    let mut names = Vec::with_capacity(width);

    // Forward-fill the sparse section row: left-to-right scan carrying the
    // last non-blank value.
    let mut filled_sections = Vec::with_capacity(width);
    let mut last_seen = String::new();
    for i in 0..width {
        let cell = HeaderBlock::cell(&block.sections, i).trim();
        if !cell.is_empty() {
            last_seen = cell.to_string();
        }
        filled_sections.push(last_seen.clone());
    }

    for i in 0..width {
        let section = filled_sections[i].as_str();
        let line = HeaderBlock::cell(&block.line_numbers, i);
        let line = if is_pure_numeric(line) { line.trim() } else { "" };
        let desc = HeaderBlock::cell(&block.descriptions, i).trim();

        let mut parts: Vec<&str> = Vec::with_capacity(3);
        for part in [section, line, desc] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        let base = if parts.is_empty() {
            format!("column_{}", i)
        } else {
            parts.join("_")
        };

        let marker = HeaderBlock::cell(&block.period_markers, i).trim();
        let suffix = if marker.eq_ignore_ascii_case("cy") {
            "_cy"
        } else if marker.eq_ignore_ascii_case("py") {
            "_py"
        } else {
            ""
        };

        names.push(sanitize_name(&format!("{}{}", base, suffix)));
    }

    names
}

/// Force the name list to exactly `data_width` entries: truncate extras or
/// synthesize `extra_column_<i>` placeholders. A mismatch is a recoverable
/// shape defect, not an error.
pub fn align_to_width(mut names: Vec<String>, data_width: usize) -> (Vec<String>, bool) {
    if names.len() == data_width {
        return (names, false);
    }

    warn!(
        header_columns = names.len(),
        data_columns = data_width,
        "header and data column counts differ; adjusting to data width"
    );

    if names.len() > data_width {
        names.truncate(data_width);
    } else {
        for i in names.len()..data_width {
            names.push(format!("extra_column_{}", i));
        }
    }
    (names, true)
}
