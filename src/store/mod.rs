// src/store/mod.rs

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, Connection};
use std::path::Path;
use tracing::{debug, info};

/// Storage type for one destination column. Raw extract cells stay TEXT;
/// the derived fiscal fields are nullable INTEGERs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn text(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            ty: ColumnType::Text,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            ty: ColumnType::Integer,
        }
    }
}

/// Diagnostics row appended to `ingest_runs` after each successful load.
#[derive(Debug)]
pub struct RunRecord<'a> {
    pub source_file: &'a str,
    pub table_name: &'a str,
    pub rows_written: usize,
    pub column_count: usize,
    pub parse_ok: usize,
    pub parse_failed: usize,
}

/// SQLite-backed destination for the filings table.
pub struct Store {
    conn: Connection,
}

/// Quote an identifier for direct embedding in SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Store {
    /// Open (or create) the database file. Failure here is fatal for the
    /// run and happens before anything destructive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("opening destination database {}", path.display()))?;
        Ok(Store { conn })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Store {
            conn: Connection::open_in_memory().context("opening in-memory database")?,
        })
    }

    /// Replace `table` with the given rows, atomically.
    ///
    /// The new dataset is written to a staging table and swapped in within a
    /// single transaction, so readers of the destination name see either the
    /// previous complete dataset or the new one. A failed run leaves the
    /// old table exactly as it was.
    pub fn replace_table(
        &mut self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<Value>],
    ) -> Result<usize> {
        let staging = format!("{}_staging", table);
        let quoted_table = quote_ident(table);
        let quoted_staging = quote_ident(&staging);

        let tx = self.conn.transaction().context("starting replace transaction")?;

        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.sql()))
            .collect();
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {staging};\nCREATE TABLE {staging} ({defs});",
            staging = quoted_staging,
            defs = column_defs.join(", "),
        ))
        .with_context(|| format!("creating staging table {}", staging))?;

        {
            let placeholders = vec!["?"; columns.len()].join(", ");
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} VALUES ({})",
                    quoted_staging, placeholders
                ))
                .context("preparing staging insert")?;
            for (idx, row) in rows.iter().enumerate() {
                stmt.execute(params_from_iter(row.iter()))
                    .with_context(|| format!("inserting row {} into {}", idx, staging))?;
            }
        }

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nALTER TABLE {staging} RENAME TO {table};",
            table = quoted_table,
            staging = quoted_staging,
        ))
        .with_context(|| format!("swapping staging table into {}", table))?;

        tx.commit().context("committing replace transaction")?;

        info!(table, rows = rows.len(), columns = columns.len(), "replaced table");
        Ok(rows.len())
    }

    /// Append one diagnostics row for a completed run.
    pub fn record_run(&self, record: &RunRecord) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ingest_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_file TEXT NOT NULL,
                    table_name TEXT NOT NULL,
                    rows_written INTEGER NOT NULL,
                    column_count INTEGER NOT NULL,
                    parse_ok INTEGER NOT NULL,
                    parse_failed INTEGER NOT NULL,
                    loaded_at TEXT NOT NULL
                );",
            )
            .context("creating ingest_runs table")?;

        self.conn
            .execute(
                "INSERT INTO ingest_runs
                 (source_file, table_name, rows_written, column_count, parse_ok, parse_failed, loaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.source_file,
                    record.table_name,
                    record.rows_written as i64,
                    record.column_count as i64,
                    record.parse_ok as i64,
                    record.parse_failed as i64,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("recording run history")?;
        debug!(table = record.table_name, "recorded run history");
        Ok(())
    }

    /// Row count of `table`, mostly for callers verifying a load.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
                [],
                |r| r.get(0),
            )
            .with_context(|| format!("counting rows in {}", table))
    }

    /// Column names of `table`, in declaration order.
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .with_context(|| format!("reading schema of {}", table))?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
