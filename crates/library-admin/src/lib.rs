//! Administrative layer for the library data model.
//!
//! Loads configuration and drives any [`LibraryStore`] through the setup
//! sequence: reset, bulk load, reconcile, constrain.
//!
//! [`LibraryStore`]: library_core::store::LibraryStore

pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `libdb.toml` and `LIBDB_*`
/// environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct AdminConfig {
  /// SQLite database file.
  pub store_path: PathBuf,
  /// Directory holding `<table>.csv` exports for `load` and `setup`.
  pub data_dir:   PathBuf,
}

impl AdminConfig {
  /// Layer defaults, the optional file at `path`, then the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("store_path", "library.db")?
      .set_default("data_dir", "data")?
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("LIBDB"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise AdminConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.data_dir = expand_tilde(&cfg.data_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_apply_without_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = AdminConfig::load(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from("data"));
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "data_dir = \"exports\"").unwrap();

    let cfg = AdminConfig::load(file.path()).unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from("exports"));
  }

  #[test]
  fn tilde_is_left_alone_without_slash() {
    assert_eq!(expand_tilde(Path::new("~library.db")), PathBuf::from("~library.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
