use anyhow::Result;
use irsloader::{config::Config, ingest::load};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) load configuration ───────────────────────────────────────
    // One optional argument: the config file path. Defaults otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    info!(
        source = %config.source_path.display(),
        db = %config.db_path.display(),
        table = %config.table_name,
        marker = %config.fiscal_marker,
        "configured"
    );

    // ─── 3) run the pipeline ─────────────────────────────────────────
    let report = load::run(&config)?;

    // ─── 4) report ───────────────────────────────────────────────────
    if report.header_shape_mismatch || report.parse_failed > 0 {
        warn!(
            parse_failed = report.parse_failed,
            shape_mismatch = report.header_shape_mismatch,
            "run completed with degraded conditions"
        );
    }
    info!(
        rows = report.rows_written,
        columns = report.column_count,
        parse_ok = report.parse_ok,
        "load complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
