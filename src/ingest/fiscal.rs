// src/ingest/fiscal.rs

use once_cell::sync::Lazy;
use regex::Regex;

/// A fiscal-period end: the reporting year and its closing month. Only ever
/// produced whole; a rule that cannot supply both components yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalPeriod {
    pub year: i32,
    pub month: u32,
}

/// Which capture group holds the month vs. the year for one format rule.
struct FormatRule {
    pattern: &'static Lazy<Regex>,
    month_group: usize,
    year_group: usize,
}

// Anchored full-string patterns, whitespace already trimmed. Order matters:
// the month-first forms must be tried before the more permissive
// year-first/day-carrying ones so a token like "6/2023" is never read as a
// truncated calendar date.
static MONTH_SLASH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").unwrap());
static YEAR_SLASH_MD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").unwrap());
static MONTH_DAY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

static RULES: [FormatRule; 4] = [
    // M/YYYY
    FormatRule {
        pattern: &MONTH_SLASH_YEAR,
        month_group: 1,
        year_group: 2,
    },
    // YYYY/MM/DD, day ignored
    FormatRule {
        pattern: &YEAR_SLASH_MD,
        month_group: 2,
        year_group: 1,
    },
    // M/D/YYYY
    FormatRule {
        pattern: &MONTH_DAY_YEAR,
        month_group: 1,
        year_group: 3,
    },
    // YYYY-MM-DD, day ignored
    FormatRule {
        pattern: &ISO_DATE,
        month_group: 2,
        year_group: 1,
    },
];

/// Parse one free-form fiscal-period-end string.
///
/// Rules are tried in priority order and the first full match with a month
/// in 1–12 wins. A structural match whose month is out of range counts as a
/// non-match and falls through, so `"13/2023"` ends up absent rather than
/// producing a nonsense month. Blank input is absent, never an error.
pub fn parse_fiscal_period(raw: &str) -> Option<FiscalPeriod> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for rule in &RULES {
        let Some(caps) = rule.pattern.captures(s) else {
            continue;
        };
        // Groups are all-digit by construction; length caps keep them well
        // inside their integer ranges.
        let month: u32 = caps[rule.month_group].parse().ok()?;
        let year: i32 = caps[rule.year_group].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(FiscalPeriod { year, month });
        }
    }

    None
}
