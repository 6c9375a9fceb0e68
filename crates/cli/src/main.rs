//! # notebox-migrate
//!
//! Applies the SQL migrations in `migrations/` to the notebox database, or
//! shows which of them are applied and which are still pending.
//!
//! ```bash
//! # Apply every pending migration (the default action)
//! notebox-migrate -action up
//!
//! # Show applied and pending migrations
//! notebox-migrate -action status
//!
//! # Use another migrations directory
//! notebox-migrate --action status --dir ./db/migrations
//! ```
//!
//! The database connection comes from the same `DB_*` / `DATABASE_URL`
//! environment variables the server uses.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::{Arg, Command, crate_version};
use notebox::{
    config::DatabaseConfig,
    db::{self, DEFAULT_MIGRATIONS_DIR, Migrator, PgMigrationStore},
};

/// Flags that may be written with a single leading dash.
const LONG_FLAGS: &[&str] = &["action", "dir"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Up,
    Status,
}

impl Action {
    const AVAILABLE: &'static str = "up, status";

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

fn command() -> Command {
    Command::new("notebox-migrate")
        .version(crate_version!())
        .about("Apply or inspect notebox database migrations")
        .arg(
            Arg::new("action")
                .long("action")
                .help("Migration action: up, status")
                .value_name("ACTION")
                .default_value("up"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("Directory containing the migration files")
                .value_name("DIR")
                .default_value(DEFAULT_MIGRATIONS_DIR),
        )
}

/// Rewrites `-action up` / `-action=up` to `--action up` / `--action=up`.
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let is_single_dash_flag = LONG_FLAGS.iter().any(|flag| {
                arg.strip_prefix('-')
                    .and_then(|rest| rest.strip_prefix(flag))
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
            });

            if is_single_dash_flag {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let matches = command().get_matches_from(normalize_args(std::env::args()));

    let action_name = matches
        .get_one::<String>("action")
        .map_or("up", String::as_str);
    let dir = matches
        .get_one::<String>("dir")
        .map_or(DEFAULT_MIGRATIONS_DIR, String::as_str);

    let Some(action) = Action::from_name(action_name) else {
        println!("Unknown action: {action_name}");
        println!("Available actions: {}", Action::AVAILABLE);
        std::process::exit(1);
    };

    tracing_common::setup_tracing("notebox-migrate").map_err(|e| anyhow!("{e:?}"))?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(action, Path::new(dir)))
}

async fn run(action: Action, dir: &Path) -> Result<()> {
    let config = DatabaseConfig::from_env()?;
    let pool = db::connect(&config)
        .await
        .context("Failed to initialize database")?;

    let migrator = Migrator::new(PgMigrationStore::new(pool.clone()), dir);

    let result = match action {
        Action::Up => migrator
            .run()
            .await
            .map(|report| {
                tracing::info!(
                    applied = report.applied.len(),
                    skipped = report.skipped.len(),
                    "Migrations completed successfully"
                );
            })
            .context("Failed to run migrations"),
        Action::Status => match migrator.status().await {
            Ok(status) => status
                .render(&mut std::io::stdout().lock())
                .context("Failed to write migration status"),
            Err(e) => Err(e).context("Failed to show migration status"),
        },
    };

    pool.close().await;

    if let Err(e) = &result {
        tracing::error!(error = ?e, "Migration command failed");
    }

    result
}
