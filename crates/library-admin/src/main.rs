//! `libdb` administrative binary.
//!
//! Reads `libdb.toml` (or the path given with `--config`), opens the SQLite
//! store it names, and runs one maintenance command against it.
//!
//! ```text
//! libdb setup ./exports
//! libdb check --json
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use library_admin::{AdminConfig, commands};
use library_core::{import::Table, store::LibraryStore};
use library_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Library database administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "libdb.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Drop every table and recreate them without foreign keys.
  Reset,
  /// Load one CSV export into a table.
  Import {
    #[arg(value_parser = Table::parse)]
    table: Table,
    file:  PathBuf,
  },
  /// Load every `<table>.csv` in a directory (default: `data_dir`).
  Load { dir: Option<PathBuf> },
  /// Repair return records against their issues and delete orphans.
  Reconcile,
  /// Add foreign-key constraints to every table.
  Constrain,
  /// Reset, load, reconcile and constrain in one go.
  Setup { dir: Option<PathBuf> },
  /// Rewrite a member id prefix in members and issue records.
  NormalizeMembers {
    #[arg(long, default_value = "C")]
    from: String,
    #[arg(long, default_value = "M")]
    to:   String,
  },
  /// Recompute every book's status from return history.
  RefreshStatus,
  /// Audit referential integrity; exits non-zero if anything is wrong.
  Check {
    #[arg(long)]
    json: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AdminConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::Reset => {
      store.reset_schema().await?;
      println!("schema reset");
    }
    Command::Import { table, file } => {
      let rows = commands::import_file(&store, table, &file).await?;
      println!("{table}: {rows} row(s)");
    }
    Command::Load { dir } => {
      let dir = dir.unwrap_or(cfg.data_dir);
      for (table, rows) in commands::load_dir(&store, &dir).await? {
        println!("{table}: {rows} row(s)");
      }
    }
    Command::Reconcile => {
      let report = store.reconcile_returns().await?;
      println!(
        "reconciled {} return(s), removed {}",
        report.reconciled,
        report.removed.len()
      );
    }
    Command::Constrain => {
      store.apply_constraints().await?;
      println!("schema constrained");
    }
    Command::Setup { dir } => {
      let dir = dir.unwrap_or(cfg.data_dir);
      let summary = commands::setup(&store, &dir).await?;
      for (table, rows) in &summary.loaded {
        println!("{table}: {rows} row(s)");
      }
      println!(
        "reconciled {} return(s), removed {}",
        summary.cleanup.reconciled,
        summary.cleanup.removed.len()
      );
      println!("schema constrained");
    }
    Command::NormalizeMembers { from, to } => {
      let renamed = store
        .normalize_member_prefix(&from, &to)
        .await
        .with_context(|| format!("failed to rewrite {from:?} to {to:?}"))?;
      println!("renamed {renamed} member(s)");
    }
    Command::RefreshStatus => {
      let sweep = store.refresh_book_status().await?;
      println!(
        "{} available, {} unavailable",
        sweep.available, sweep.unavailable
      );
    }
    Command::Check { json } => {
      let report = store.check_integrity().await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        println!("phase: {}", report.phase);
        for violation in &report.violations {
          println!("violation: {violation}");
        }
        println!("orphan returns: {}", report.orphan_returns);
        println!("snapshot mismatches: {}", report.snapshot_mismatches);
      }
      if !report.is_clean() {
        bail!("integrity check failed");
      }
    }
  }

  Ok(())
}
