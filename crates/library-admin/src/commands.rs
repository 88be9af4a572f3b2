//! Command implementations shared by the `libdb` binary.
//!
//! Every function is generic over [`LibraryStore`] and returns what it did so
//! the binary can print it.

use std::path::Path;

use anyhow::Context as _;
use library_core::{
  import::{ImportBatch, Table},
  maintenance::CleanupReport,
  store::LibraryStore,
};
use strum::IntoEnumIterator as _;

/// Rows loaded per table by [`load_dir`].
pub type Loaded = Vec<(Table, usize)>;

/// What [`setup`] did, step by step.
#[derive(Debug)]
pub struct SetupSummary {
  pub loaded:  Loaded,
  pub cleanup: CleanupReport,
}

/// Decode one CSV export and insert it into `table`.
pub async fn import_file<S: LibraryStore>(
  store: &S,
  table: Table,
  path:  &Path,
) -> anyhow::Result<usize> {
  let batch = ImportBatch::from_path(table, path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  store
    .bulk_insert(batch)
    .await
    .with_context(|| format!("failed to load {table} from {}", path.display()))
}

/// Load every `<table>.csv` found in `dir`, parents first. Missing files are
/// skipped with a warning.
pub async fn load_dir<S: LibraryStore>(store: &S, dir: &Path) -> anyhow::Result<Loaded> {
  let mut loaded = Vec::new();
  for table in Table::iter() {
    let path = dir.join(table.file_name());
    if !path.is_file() {
      tracing::warn!(%table, path = %path.display(), "no export found; skipping");
      continue;
    }
    let rows = import_file(store, table, &path).await?;
    loaded.push((table, rows));
  }
  Ok(loaded)
}

/// Full rebuild from exports: reset, load, reconcile, constrain.
///
/// Stops at the first failure. A constraint violation here means the exports
/// hold references the cleanup pass does not repair (e.g. an employee at an
/// unknown branch).
pub async fn setup<S: LibraryStore>(store: &S, dir: &Path) -> anyhow::Result<SetupSummary> {
  store.reset_schema().await.context("failed to reset schema")?;
  let loaded = load_dir(store, dir).await?;
  let cleanup = store
    .reconcile_returns()
    .await
    .context("failed to reconcile return records")?;
  store
    .apply_constraints()
    .await
    .context("failed to apply foreign-key constraints")?;
  Ok(SetupSummary { loaded, cleanup })
}
