use std::{fs, io};

use anyhow::{Context, bail, ensure};
use camino::Utf8PathBuf;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::db::TimeWindow;

#[derive(Args, Clone)]
pub struct Config {
    #[arg(long, env = "MLWH_SECRETS_DIR")]
    secrets_dir: Option<Utf8PathBuf>,
    #[arg(long, env = "MLWH_DB_USER", default_value_t)]
    db_user: String,
    #[arg(long, env = "MLWH_DB_PASSWORD", default_value_t, hide_env_values = true)]
    db_password: String,
    #[arg(long, env = "MLWH_DB_HOST", default_value_t)]
    db_host: String,
    #[arg(long, env = "MLWH_DB_PORT")]
    db_port: Option<u16>,
    #[arg(long, env = "MLWH_DB_NAME", default_value_t)]
    db_name: String,
}

impl Config {
    /// Overrides connection settings with the contents of any of the files
    /// `db_user`, `db_password`, `db_host`, `db_port` and `db_name` found in
    /// the secrets directory.
    ///
    /// # Errors
    pub fn read_secrets(&mut self) -> anyhow::Result<()> {
        let Self {
            secrets_dir,
            db_user,
            db_password,
            db_host,
            db_port,
            db_name,
        } = self;

        let Some(secrets_dir) = secrets_dir else {
            return Ok(());
        };

        let read_secret = |name: &str| -> anyhow::Result<Option<String>> {
            match fs::read_to_string(secrets_dir.join(name)) {
                Ok(secret) => Ok(Some(secret.trim().to_string())),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err).context(format!("failed to read secret {name}")),
            }
        };

        for (name, field) in [
            ("db_user", db_user),
            ("db_password", db_password),
            ("db_host", db_host),
            ("db_name", db_name),
        ] {
            if let Some(secret) = read_secret(name)? {
                *field = secret;
            }
        }

        if let Some(port) = read_secret("db_port")? {
            *db_port = Some(port.parse().context("secret db_port is not a port number")?);
        }

        Ok(())
    }

    /// Builds a `postgres://` URL with the user and password percent-encoded.
    ///
    /// # Errors
    /// Fails naming every connection setting that is missing, or if the host
    /// or database name do not form a valid URL
    pub fn db_url(&self) -> anyhow::Result<String> {
        let Self {
            db_user,
            db_password,
            db_host,
            db_port,
            db_name,
            ..
        } = self;

        let missing: Vec<_> = [
            ("MLWH_DB_USER", db_user.is_empty()),
            ("MLWH_DB_PASSWORD", db_password.is_empty()),
            ("MLWH_DB_HOST", db_host.is_empty()),
            ("MLWH_DB_PORT", db_port.is_none()),
            ("MLWH_DB_NAME", db_name.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();

        if !missing.is_empty() {
            bail!(
                "missing database connection settings: {}",
                missing.join(", ")
            );
        }

        let Some(db_port) = db_port else {
            bail!("missing database connection settings: MLWH_DB_PORT");
        };

        let mut url = Url::parse(&format!("postgres://{db_host}:{db_port}/{db_name}"))
            .context("invalid database host or name")?;
        ensure!(url.set_username(db_user).is_ok(), "invalid database user");
        ensure!(
            url.set_password(Some(db_password)).is_ok(),
            "invalid database password"
        );

        Ok(url.into())
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
}

#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct BackfillArgs {
    /// Only rows recorded after this time are backfilled
    #[arg(long, value_parser = parse_timestamp)]
    pub start: NaiveDateTime,
    /// Only rows recorded before this time are backfilled
    #[arg(long, value_parser = parse_timestamp)]
    pub end: NaiveDateTime,
    /// Log the product ids that would be written without writing them
    #[arg(long, default_value_t)]
    pub dry_run: bool,
}

impl BackfillArgs {
    /// # Errors
    /// Fails if `start` is not strictly before `end`
    pub fn window(&self) -> anyhow::Result<TimeWindow> {
        let Self { start, end, .. } = self;

        ensure!(start < end, "--start ({start}) must be before --end ({end})");

        Ok(TimeWindow::new(*start, *end))
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Backfill `pac_bio_run_well_metrics.id_pac_bio_product`
    RunWellMetrics(BackfillArgs),
    /// Backfill `pac_bio_product_metrics.id_pac_bio_product`
    ProductMetrics(BackfillArgs),
}

impl Command {
    #[must_use]
    pub fn args(&self) -> &BackfillArgs {
        match self {
            Self::RunWellMetrics(args) | Self::ProductMetrics(args) => args,
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Backfill PacBio product ids in the ML warehouse")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
    #[arg(long, env = "MLWH_LOG_DIR")]
    pub log_dir: Option<Utf8PathBuf>,
    /// Also log the SQL sent to the database
    #[arg(short, long, default_value_t)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}
