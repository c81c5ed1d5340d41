// src/ingest/load.rs

use anyhow::{bail, Result};
use rusqlite::types::Value;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::ingest::{dedupe, fiscal, header, read_extract};
use crate::store::{Column, RunRecord, Store};

/// Names of the two derived columns attached to every record.
pub const FISCAL_YEAR_COLUMN: &str = "fiscal_year";
pub const FISCAL_MONTH_COLUMN: &str = "fiscal_month";

/// Run-level diagnostics returned by the pipeline. Degraded conditions are
/// counted here instead of being raised; the caller decides what to log.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub source_file: String,
    pub table_name: String,
    pub fiscal_column: String,
    pub rows_in: usize,
    pub rows_written: usize,
    /// Final column count, including the two derived fiscal fields.
    pub column_count: usize,
    pub renamed_columns: usize,
    pub dropped_columns: usize,
    pub header_shape_mismatch: bool,
    pub parse_ok: usize,
    pub parse_blank: usize,
    pub parse_failed: usize,
}

/// Execute one full ingestion run: read the extract, finalize the schema,
/// derive the fiscal period per row, and atomically replace the destination
/// table. Fatal preconditions (missing source, no fiscal-marker column,
/// unopenable store, derived-name collision) abort before anything
/// destructive happens to the destination.
pub fn run(config: &Config) -> Result<IngestReport> {
    // 1) Read and split the raw extract.
    let extract = read_extract(&config.source_path)?;
    let mut rows = extract.rows;
    info!(
        source = %config.source_path.display(),
        rows = rows.len(),
        "read extract"
    );

    // 2) Reconstruct names and align them to the data width.
    let names = header::reconstruct_columns(&extract.header);
    let data_width = rows.iter().map(Vec::len).max().unwrap_or(names.len());
    let (mut names, shape_mismatch) = header::align_to_width(names, data_width);
    for row in rows.iter_mut() {
        row.resize(data_width, String::new());
    }

    // 3) Drop the non-data leading column, an artifact of the source layout.
    if !names.is_empty() {
        names.remove(0);
        for row in rows.iter_mut() {
            row.remove(0);
        }
    }

    // 4) Uniqueness pass.
    let outcome = dedupe::finalize_schema(names, &mut rows);
    let schema = outcome.names;

    // 5) Locate the fiscal-period-end column. Not finding one is fatal and
    //    must precede any write.
    let mut matches = schema
        .iter()
        .enumerate()
        .filter(|(_, name)| name.contains(&config.fiscal_marker));
    let (fiscal_idx, fiscal_column) = match matches.next() {
        Some((idx, name)) => (idx, name.clone()),
        None => bail!(
            "no column name contains the fiscal-period marker `{}` (columns: {})",
            config.fiscal_marker,
            schema.join(", ")
        ),
    };
    let ignored: Vec<&str> = matches.map(|(_, n)| n.as_str()).collect();
    if !ignored.is_empty() {
        warn!(
            chosen = %fiscal_column,
            ignored = %ignored.join(", "),
            "multiple columns match the fiscal-period marker; using the first"
        );
    }

    if schema.iter().any(|n| n == FISCAL_YEAR_COLUMN || n == FISCAL_MONTH_COLUMN) {
        bail!(
            "source schema already contains a `{}` or `{}` column; refusing to overwrite it",
            FISCAL_YEAR_COLUMN,
            FISCAL_MONTH_COLUMN
        );
    }

    // 6) Derive the fiscal period per row and build the storage rows.
    let mut parse_ok = 0;
    let mut parse_blank = 0;
    let mut parse_failed = 0;
    let storage_rows: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            let raw_date = row[fiscal_idx].as_str();
            let period = fiscal::parse_fiscal_period(raw_date);
            match (&period, raw_date.trim().is_empty()) {
                (Some(_), _) => parse_ok += 1,
                (None, true) => parse_blank += 1,
                (None, false) => parse_failed += 1,
            }

            let mut values: Vec<Value> = row
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(cell.clone())
                    }
                })
                .collect();
            match period {
                Some(p) => {
                    values.push(Value::Integer(p.year as i64));
                    values.push(Value::Integer(p.month as i64));
                }
                None => {
                    values.push(Value::Null);
                    values.push(Value::Null);
                }
            }
            values
        })
        .collect();

    if parse_failed > 0 {
        warn!(
            column = %fiscal_column,
            failed = parse_failed,
            "some fiscal-period values did not match any known format"
        );
    }

    // 7) Persist: staging write + atomic swap, then the run history row.
    let mut columns: Vec<Column> = schema.iter().map(|n| Column::text(n.as_str())).collect();
    columns.push(Column::integer(FISCAL_YEAR_COLUMN));
    columns.push(Column::integer(FISCAL_MONTH_COLUMN));

    let mut store = Store::open(&config.db_path)?;
    let rows_written = store.replace_table(&config.table_name, &columns, &storage_rows)?;

    let report = IngestReport {
        source_file: config.source_path.display().to_string(),
        table_name: config.table_name.clone(),
        fiscal_column,
        rows_in: rows.len(),
        rows_written,
        column_count: columns.len(),
        renamed_columns: outcome.renamed,
        dropped_columns: outcome.dropped,
        header_shape_mismatch: shape_mismatch,
        parse_ok,
        parse_blank,
        parse_failed,
    };
    store.record_run(&RunRecord {
        source_file: &report.source_file,
        table_name: &report.table_name,
        rows_written: report.rows_written,
        column_count: report.column_count,
        parse_ok: report.parse_ok,
        parse_failed: report.parse_failed,
    })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::init_test_logging;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
c0,c1,c2,c3,c4
,EIN,Part I,,
,,9,12,
row,Number,Total Revenue,Total Revenue,FY Ending
,,CY,PY,
1,11-1111111,100,90,6/30/2023
2,22-2222222,200,180,12/2022
3,33-3333333,300,270,not-a-date
";

    fn write_source(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("extract.csv");
        fs::write(&path, content).unwrap();
        path
    }

    fn test_config(dir: &Path, content: &str) -> Config {
        Config {
            source_path: write_source(dir, content),
            db_path: dir.join("filings.db"),
            table_name: "filings".to_string(),
            fiscal_marker: "fy_ending".to_string(),
        }
    }

    #[test]
    fn end_to_end_load() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let config = test_config(dir.path(), SAMPLE);

        let report = run(&config)?;
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.column_count, 6);
        assert_eq!(report.fiscal_column, "part_i_fy_ending");
        assert_eq!(report.parse_ok, 2);
        assert_eq!(report.parse_failed, 1);
        assert!(!report.header_shape_mismatch);

        let store = Store::open(&config.db_path)?;
        assert_eq!(store.count_rows("filings")?, 3);
        assert_eq!(
            store.column_names("filings")?,
            vec![
                "ein_number",
                "part_i_9_total_revenue_cy",
                "part_i_12_total_revenue_py",
                "part_i_fy_ending",
                "fiscal_year",
                "fiscal_month",
            ]
        );

        let periods: Vec<(Option<i64>, Option<i64>)> = store
            .connection()
            .prepare("SELECT fiscal_year, fiscal_month FROM filings ORDER BY ein_number")?
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        assert_eq!(
            periods,
            vec![
                (Some(2023), Some(6)),
                (Some(2022), Some(12)),
                (None, None),
            ]
        );
        Ok(())
    }

    #[test]
    fn rerun_is_idempotent() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let config = test_config(dir.path(), SAMPLE);

        let first = run(&config)?;
        let second = run(&config)?;
        assert_eq!(first.rows_written, second.rows_written);
        assert_eq!(first.column_count, second.column_count);

        let store = Store::open(&config.db_path)?;
        assert_eq!(store.count_rows("filings")?, 3);
        assert_eq!(store.column_names("filings")?.len(), 6);
        // Both runs leave their mark in the history table.
        assert_eq!(store.count_rows("ingest_runs")?, 2);
        Ok(())
    }

    #[test]
    fn second_run_fully_supersedes_the_first() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let config = test_config(dir.path(), SAMPLE);
        run(&config)?;

        let smaller = "\
c0,c1,c2,c3,c4
,EIN,Part I,,
,,9,12,
row,Number,Total Revenue,Total Revenue,FY Ending
,,CY,PY,
9,99-9999999,1,2,2023-06-30
";
        write_source(dir.path(), smaller);
        run(&config)?;

        let store = Store::open(&config.db_path)?;
        assert_eq!(store.count_rows("filings")?, 1);
        let year: i64 = store
            .connection()
            .query_row("SELECT fiscal_year FROM filings", [], |r| r.get(0))?;
        assert_eq!(year, 2023);
        Ok(())
    }

    #[test]
    fn missing_marker_aborts_without_touching_destination() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let mut config = test_config(dir.path(), SAMPLE);

        // Seed the destination with a previous successful run.
        run(&config)?;

        config.fiscal_marker = "no_such_marker".to_string();
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("no_such_marker"));

        // The previous dataset is still fully intact.
        let store = Store::open(&config.db_path)?;
        assert_eq!(store.count_rows("filings")?, 3);
        assert_eq!(store.count_rows("ingest_runs")?, 1);
        Ok(())
    }

    #[test]
    fn missing_source_is_fatal() {
        init_test_logging();
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path(), SAMPLE);
        config.source_path = dir.path().join("gone.csv");
        assert!(run(&config).is_err());
    }

    #[test]
    fn more_names_than_data_columns_truncates() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        // Header describes 5 columns, data rows carry only 4: the trailing
        // name is cut, and the run still succeeds.
        let content = "\
c0,c1,c2,c3,c4
,,,,
,,,,
row,EIN,Revenue,FY Ending,Orphan
,,,,
1,11-1111111,100,6/2023
2,22-2222222,200,7/2023
";
        let config = test_config(dir.path(), content);
        let report = run(&config)?;
        assert!(report.header_shape_mismatch);
        assert_eq!(report.column_count, 5);

        let store = Store::open(&config.db_path)?;
        assert_eq!(
            store.column_names("filings")?,
            vec!["ein", "revenue", "fy_ending", "fiscal_year", "fiscal_month"]
        );
        Ok(())
    }

    #[test]
    fn fewer_names_than_data_columns_pads() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        // Header describes 3 columns, data rows carry 5: placeholders fill
        // the gap so every value keeps a home.
        let content = "\
c0,c1,c2
,,
,,
row,EIN,FY Ending
,,
1,11-1111111,6/2023,stray,stray2
2,22-2222222,7/2023,stray,stray2
";
        let config = test_config(dir.path(), content);
        let report = run(&config)?;
        assert!(report.header_shape_mismatch);

        let store = Store::open(&config.db_path)?;
        assert_eq!(
            store.column_names("filings")?,
            vec![
                "ein",
                "fy_ending",
                "extra_column_3",
                "extra_column_4",
                "fiscal_year",
                "fiscal_month",
            ]
        );
        assert_eq!(store.count_rows("filings")?, 2);
        Ok(())
    }

    #[test]
    fn duplicate_and_blank_header_columns_are_resolved() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        // Two identical Revenue descriptions plus one fully blank header
        // column whose data is discarded with it.
        let content = "\
c0,c1,c2,c3,c4
,,,,
,,,,
row,Revenue,Revenue,%%%,FY Ending
,,,,
1,100,200,junk,6/2023
";
        let config = test_config(dir.path(), content);
        let report = run(&config)?;
        assert_eq!(report.renamed_columns, 1);
        assert_eq!(report.dropped_columns, 1);

        let store = Store::open(&config.db_path)?;
        assert_eq!(
            store.column_names("filings")?,
            vec!["revenue", "revenue_1", "fy_ending", "fiscal_year", "fiscal_month"]
        );
        let dup: String = store
            .connection()
            .query_row("SELECT revenue_1 FROM filings", [], |r| r.get(0))?;
        assert_eq!(dup, "200");
        Ok(())
    }

    #[test]
    fn blank_dates_count_separately_from_failures() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let content = "\
c0,c1,c2
,,
,,
row,EIN,FY Ending
,,
1,11-1111111,6/2023
2,22-2222222,
3,33-3333333,garbage
";
        let config = test_config(dir.path(), content);
        let report = run(&config)?;
        assert_eq!(report.parse_ok, 1);
        assert_eq!(report.parse_blank, 1);
        assert_eq!(report.parse_failed, 1);
        assert_eq!(report.rows_written, 3);
        Ok(())
    }

    #[test]
    fn derived_name_collision_is_fatal() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let content = "\
c0,c1,c2
,,
,,
row,Fiscal Year,FY Ending
,,
1,2020,6/2023
";
        let config = test_config(dir.path(), content);
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("fiscal_year"));
        assert!(!config.db_path.exists());
        Ok(())
    }
}
