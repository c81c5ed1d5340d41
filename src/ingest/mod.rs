// src/ingest/mod.rs

pub mod dedupe;
pub mod fiscal;
pub mod header;
pub mod load;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::warn;

use header::HeaderBlock;

/// Number of physical rows above the data: one dummy header row plus the
/// four semantic header rows.
const PREAMBLE_ROWS: usize = 5;

/// One source file pulled apart into its header block and raw data rows.
///
/// Rows keep whatever field count the file gave them; alignment against the
/// reconstructed schema happens later in the pipeline.
#[derive(Debug)]
pub struct RawExtract {
    pub header: HeaderBlock,
    pub rows: Vec<Vec<String>>,
}

/// Read a filing extract from disk.
///
/// Physical row 1 is an ignored dummy header; rows 2–5 carry the semantic
/// header block (section label, line number, field description, period
/// marker); everything from row 6 on is data. Files shorter than the
/// preamble degrade to an empty header block rather than failing.
pub fn read_extract<P: AsRef<Path>>(path: P) -> Result<RawExtract> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening source file {}", path.display()))?;

    let mut preamble: Vec<Vec<String>> = Vec::with_capacity(PREAMBLE_ROWS);
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        let fields: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if preamble.len() < PREAMBLE_ROWS {
            preamble.push(fields);
        } else {
            rows.push(fields);
        }
    }

    if preamble.len() < PREAMBLE_ROWS {
        warn!(
            path = %path.display(),
            rows = preamble.len(),
            expected = PREAMBLE_ROWS,
            "extract shorter than the header preamble; treating missing header rows as blank"
        );
    }

    // Row 1 is noise; rows 2-5 are the block, in role order.
    let header = HeaderBlock::from_rows(preamble.into_iter().skip(1));

    Ok(RawExtract { header, rows })
}

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,irsloader=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
