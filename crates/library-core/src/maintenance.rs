//! Result types for the administrative operations on a store.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Schema phase ────────────────────────────────────────────────────────────

/// How far schema setup has progressed.
///
/// Tables are created bare so historical data can be loaded without tripping
/// referential checks; foreign keys are added in a second step once the data
/// has been cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPhase {
  /// Tables exist with primary keys only.
  Bare,
  /// Every foreign-key invariant is enforced.
  Constrained,
}

impl fmt::Display for SchemaPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Bare => f.write_str("bare"),
      Self::Constrained => f.write_str("constrained"),
    }
  }
}

// ─── Constraint violations ───────────────────────────────────────────────────

/// One row that breaks a foreign-key invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
  /// Table holding the offending row.
  pub table:  String,
  pub rowid:  Option<i64>,
  /// Table the row's reference should resolve against.
  pub parent: String,
}

impl fmt::Display for ConstraintViolation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.rowid {
      Some(rowid) => write!(f, "{} row {rowid} -> {}", self.table, self.parent),
      None => write!(f, "{} -> {}", self.table, self.parent),
    }
  }
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

/// A return row deleted by the cleanup pass, kept verbatim for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedReturn {
  pub return_id:        String,
  pub issued_id:        Option<String>,
  pub return_book_name: Option<String>,
  pub return_book_isbn: Option<String>,
  pub return_date:      Option<String>,
}

/// Outcome of reconciling return records against issue records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
  /// Return rows whose reference or snapshot was rewritten to match their
  /// issue.
  pub reconciled: usize,
  /// Return rows deleted because their issue reference was null or
  /// unresolvable.
  pub removed:    Vec<RemovedReturn>,
}

impl CleanupReport {
  /// `true` when the pass changed nothing.
  pub fn is_noop(&self) -> bool { self.reconciled == 0 && self.removed.is_empty() }
}

// ─── Status sweep ────────────────────────────────────────────────────────────

/// Book counts after a bulk status recomputation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSweep {
  pub available:   usize,
  pub unavailable: usize,
}

// ─── Integrity ───────────────────────────────────────────────────────────────

/// A read-only audit of the data model's referential state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
  pub phase:               SchemaPhase,
  /// Non-null references that name no parent row. Computed the same way in
  /// either phase.
  pub violations:          Vec<ConstraintViolation>,
  /// Return rows with a null or unresolvable issue reference.
  pub orphan_returns:      usize,
  /// Return rows whose title/isbn snapshot differs from their issue.
  pub snapshot_mismatches: usize,
}

impl IntegrityReport {
  pub fn is_clean(&self) -> bool {
    self.violations.is_empty()
      && self.orphan_returns == 0
      && self.snapshot_mismatches == 0
  }
}
