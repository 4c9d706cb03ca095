//! CLI entry point for the entity registry.
//!
//! This binary provides the `registry` command: it resolves configuration,
//! opens the database, runs one subcommand and closes the database again.

mod cli;
mod commands;
mod config;
mod helpers;

use anyhow::{Context, Result};
use clap::Parser;
use registry_store::{Database, Registry};
use tracing::info;

use crate::cli::Cli;
use crate::config::RegistryConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    helpers::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let config = RegistryConfig::resolve(&cli.config, cli.db.clone())?;
    let db_path = config.database.path.clone();
    helpers::ensure_parent_dir(&db_path)?;

    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    info!(path = %db_path.display(), hash_passwords = config.security.hash_passwords, "registry ready");
    let registry = Registry::with_options(db.clone(), config.registry_options());

    let result = commands::run(&registry, cli.command).await;
    db.close().await.context("failed to close database")?;

    let output = result?;
    if !output.text.is_empty() {
        println!("{}", output.text);
    }
    if !output.success {
        std::process::exit(1);
    }
    Ok(())
}
