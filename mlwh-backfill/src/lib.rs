use anyhow::Context;
use camino::Utf8PathBuf;
use config::{Cli, Command};

pub mod backfill;
pub mod config;
pub mod db;
pub mod product_id;

/// Runs the backfill selected by `cli` against the configured ML warehouse.
///
/// # Errors
/// Fails on incomplete configuration, an invalid time window or any database
/// error. A failed backfill leaves the database unchanged.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        mut config,
        log_dir,
        verbose,
        command,
    } = cli;

    initialize_logging(log_dir, verbose);

    config
        .read_secrets()
        .context("failed to read secrets directory")?;
    let db_url = config.db_url()?;

    let args = command.args();
    let window = args.window()?;
    let dry_run = args.dry_run;

    let mut db_conn = db::connect(&db_url)
        .await
        .context("failed to connect to the ML warehouse")?;
    tracing::info!(?window, dry_run, "connected to the ML warehouse");

    match command {
        Command::RunWellMetrics(_) => {
            let products = backfill::backfill_rw_metrics(&mut db_conn, window, dry_run)
                .await
                .context("failed to backfill pac_bio_run_well_metrics")?;
            tracing::info!(n_products = products.len(), "run well metrics backfill complete");
        }
        Command::ProductMetrics(_) => {
            let products = backfill::backfill_product_metrics(&mut db_conn, window, dry_run)
                .await
                .context("failed to backfill pac_bio_product_metrics")?;
            tracing::info!(n_products = products.len(), "product metrics backfill complete");
        }
    }

    Ok(())
}

fn initialize_logging(log_dir: Option<Utf8PathBuf>, verbose: bool) {
    use tracing::Level;
    use tracing_subscriber::{filter::Targets, prelude::*};

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let log_filter = Targets::new().with_target("mlwh_backfill", level);
    let log_layer = tracing_subscriber::fmt::layer();

    // A subscriber may already be installed when `run` is called more than
    // once in a process
    match log_dir {
        None => {
            let log_layer = log_layer.pretty().with_filter(log_filter);

            let _ = tracing_subscriber::registry().with(log_layer).try_init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "mlwh_backfill.log");
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(log_filter);

            let _ = tracing_subscriber::registry().with(log_layer).try_init();
        }
    }
}
