//! Operator diagnostics behind the `check-env`, `db` and `smtp-test` subcommands.
//!
//! Each one prints a short report to stdout and returns the process exit code.

pub mod database;
pub mod env;

use std::{path::Path, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    config::{Config, DbCommand},
    email::EmailService,
};

/// Exit code for a diagnostic that ran but found a problem
pub const EXIT_FAILURE: i32 = 1;

async fn diagnostic_pool(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .diagnostic_database_url()
        .context("No database URL configured (set DATABASE_URL or STORAGE_DATABASE_URL)")?;
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(config.database.pool.acquire_timeout_secs))
        .connect(url)
        .await
        .context("connect to database")
}

/// Run one of the `db` subcommands
pub async fn run_db(config: &Config, command: &DbCommand) -> anyhow::Result<i32> {
    let pool = diagnostic_pool(config).await?;

    match command {
        DbCommand::Tables => {
            let tables = database::list_tables(&pool).await?;
            if tables.is_empty() {
                println!("No tables in the public schema.");
            }
            for table in tables {
                println!("{:<40} {:>10}", table.name, table.rows);
            }
        }
        DbCommand::Export { output } => {
            let export = database::export_tables(&pool).await?;
            let json = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    write_export(path, &json)?;
                    println!("Exported {} tables to {}", export.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        DbCommand::Schema { table } => {
            let columns = database::describe_table(&pool, table).await?;
            if columns.is_empty() {
                println!("Table \"{table}\" not found.");
                pool.close().await;
                return Ok(EXIT_FAILURE);
            }
            println!("{:<30} {:<30} {:<9} DEFAULT", "COLUMN", "TYPE", "NULLABLE");
            for column in columns {
                println!(
                    "{:<30} {:<30} {:<9} {}",
                    column.name,
                    column.data_type,
                    if column.nullable { "yes" } else { "no" },
                    column.default.as_deref().unwrap_or("-")
                );
            }
        }
    }

    pool.close().await;
    Ok(0)
}

fn write_export(path: &Path, json: &str) -> anyhow::Result<()> {
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

/// Send a diagnostic message through the configured transport
pub async fn run_smtp_test(config: &Config, to: &str) -> anyhow::Result<i32> {
    let service = EmailService::new(config)?;
    match service.send_diagnostic_email(to).await {
        Ok(()) => {
            println!("Test message sent to {to}.");
            Ok(0)
        }
        Err(e) => {
            println!("Sending failed: {e}");
            Ok(EXIT_FAILURE)
        }
    }
}
