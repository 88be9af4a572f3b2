//! Synchronous maintenance routines run on the connection thread.
//!
//! Every routine that writes does so inside a single transaction, so a
//! failure part-way leaves the tables as they were.

use library_core::{
  import::Table,
  maintenance::{
    CleanupReport, ConstraintViolation, IntegrityReport, StatusSweep,
  },
};
use rusqlite::Connection;

use crate::{
  encode::removed_return_from_row,
  schema::{
    bare_sql, drop_sql, phase_from_version, with_foreign_keys_off, REFERENCES,
    TABLES, VERSION_BARE, VERSION_CONSTRAINED,
  },
};

/// Return rows whose issue reference is null or names no issue.
const ORPHAN_RETURN: &str = "
  r.issued_id IS NULL
  OR NOT EXISTS (SELECT 1 FROM issued_status AS i WHERE i.issued_id = r.issued_id)";

/// Characters stripped when matching a return's reference to an issue:
/// space, tab, line feed and carriage return.
const PADDING: &str = "' ' || char(9, 10, 13)";

pub fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
  conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Drop every table and recreate them bare.
///
/// Enforcement is off while dropping: with branch and employees referencing
/// each other there is no order in which a plain drop of a populated,
/// constrained pair succeeds.
pub fn reset_schema(conn: &mut Connection) -> rusqlite::Result<()> {
  with_foreign_keys_off(conn, |conn| {
    let tx = conn.transaction()?;
    tx.execute_batch(&drop_sql())?;
    tx.execute_batch(&bare_sql())?;
    tx.pragma_update(None, "user_version", VERSION_BARE)?;
    tx.commit()
  })
}

/// Rebuild every table with its foreign keys.
///
/// Returns the violating rows, if any, in which case the transaction is
/// rolled back and the schema stays bare. An empty result means the schema is
/// now constrained.
pub fn apply_constraints(
  conn: &mut Connection,
) -> rusqlite::Result<Vec<ConstraintViolation>> {
  with_foreign_keys_off(conn, |conn| {
    let tx = conn.transaction()?;

    // NULLs pass a foreign-key check but not the rebuilt table's CHECK
    // rule; report them the same way.
    let mut violations = incomplete_returns(&tx)?;
    if violations.is_empty() {
      for def in &TABLES {
        tx.execute_batch(&def.rebuild_sql())?;
      }
      violations = foreign_key_check(&tx)?;
    }

    if violations.is_empty() {
      tx.pragma_update(None, "user_version", VERSION_CONSTRAINED)?;
      tx.commit()?;
    }
    Ok(violations)
  })
}

/// Return rows missing their issue reference or either snapshot column.
fn incomplete_returns(conn: &Connection) -> rusqlite::Result<Vec<ConstraintViolation>> {
  let mut stmt = conn.prepare(
    "SELECT rowid FROM return_status
      WHERE issued_id IS NULL
         OR return_book_name IS NULL
         OR return_book_isbn IS NULL
      ORDER BY rowid",
  )?;
  let rows = stmt
    .query_map([], |row| {
      Ok(ConstraintViolation {
        table:  Table::ReturnStatus.name().to_owned(),
        rowid:  row.get(0)?,
        parent: Table::IssuedStatus.name().to_owned(),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn foreign_key_check(conn: &Connection) -> rusqlite::Result<Vec<ConstraintViolation>> {
  let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
  let rows = stmt
    .query_map([], |row| {
      Ok(ConstraintViolation {
        table:  row.get(0)?,
        rowid:  row.get(1)?,
        parent: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

/// Reconcile return records with the issues they close.
///
/// 1. A return whose reference matches an issue once surrounding whitespace
///    (space, tab, CR, LF) is ignored takes that issue's exact id, title and
///    isbn. An exact match, when one exists, wins over a trimmed one.
/// 2. Returns whose reference is null or still unresolved are deleted.
///
/// Running it again changes nothing.
pub fn reconcile_returns(conn: &mut Connection) -> rusqlite::Result<CleanupReport> {
  let tx = conn.transaction()?;

  let reconciled = tx.execute(
    &format!(
      "UPDATE return_status AS r
        SET issued_id        = i.issued_id,
            return_book_name = i.issued_book_name,
            return_book_isbn = i.issued_book_isbn
       FROM issued_status AS i
      WHERE TRIM(r.issued_id, {PADDING}) = TRIM(i.issued_id, {PADDING})
        AND NOT EXISTS (
              SELECT 1 FROM issued_status AS x
               WHERE x.issued_id = r.issued_id AND x.issued_id <> i.issued_id)
        AND (r.issued_id        IS NOT i.issued_id
          OR r.return_book_name IS NOT i.issued_book_name
          OR r.return_book_isbn IS NOT i.issued_book_isbn)"
    ),
    [],
  )?;

  let removed = {
    let mut stmt = tx.prepare(&format!(
      "SELECT r.return_id, r.issued_id, r.return_book_name, r.return_book_isbn,
              r.return_date
         FROM return_status AS r
        WHERE {ORPHAN_RETURN}
        ORDER BY r.return_id"
    ))?;
    let rows = stmt
      .query_map([], removed_return_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows
  };

  tx.execute(
    &format!(
      "DELETE FROM return_status
        WHERE return_id IN (SELECT r.return_id FROM return_status AS r WHERE {ORPHAN_RETURN})"
    ),
    [],
  )?;

  tx.commit()?;
  Ok(CleanupReport { reconciled, removed })
}

// ─── Identifier normalization ────────────────────────────────────────────────

/// Rewrite the `from` prefix of member ids to `to`, in `members` and in the
/// issue records that reference them.
///
/// Foreign-key checks are deferred to commit so the parent and child rows can
/// be updated one after the other; if the end state is inconsistent, or a
/// renamed id collides with an existing one, the commit fails and nothing
/// changes.
pub fn normalize_member_prefix(
  conn: &mut Connection,
  from: &str,
  to: &str,
) -> rusqlite::Result<usize> {
  let tx = conn.transaction()?;
  tx.pragma_update(None, "defer_foreign_keys", true)?;

  let renamed = tx.execute(
    "UPDATE members
        SET member_id = ?2 || substr(member_id, length(?1) + 1)
      WHERE substr(member_id, 1, length(?1)) = ?1",
    rusqlite::params![from, to],
  )?;
  tx.execute(
    "UPDATE issued_status
        SET issued_member_id = ?2 || substr(issued_member_id, length(?1) + 1)
      WHERE substr(issued_member_id, 1, length(?1)) = ?1",
    rusqlite::params![from, to],
  )?;

  tx.commit()?;
  Ok(renamed)
}

// ─── Derived status ──────────────────────────────────────────────────────────

/// Mark a book available when its isbn appears in any return, unavailable
/// otherwise.
///
/// Later re-issues are not taken into account.
pub fn refresh_book_status(conn: &mut Connection) -> rusqlite::Result<StatusSweep> {
  let tx = conn.transaction()?;

  tx.execute(
    "UPDATE books
        SET status = CASE
              WHEN EXISTS (SELECT 1 FROM return_status AS r
                            WHERE r.return_book_isbn = books.isbn)
              THEN 'available'
              ELSE 'unavailable'
            END",
    [],
  )?;

  let (available, unavailable): (i64, i64) = tx.query_row(
    "SELECT COALESCE(SUM(status = 'available'), 0),
            COALESCE(SUM(status = 'unavailable'), 0)
       FROM books",
    [],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;

  tx.commit()?;
  Ok(StatusSweep {
    available:   available as usize,
    unavailable: unavailable as usize,
  })
}

// ─── Integrity ───────────────────────────────────────────────────────────────

/// Audit every reference without relying on declared foreign keys, so the
/// same report is available before and after constraints are applied.
pub fn check_integrity(conn: &Connection) -> rusqlite::Result<IntegrityReport> {
  let phase = phase_from_version(user_version(conn)?);

  let mut violations = Vec::new();
  for reference in &REFERENCES {
    let mut stmt = conn.prepare(&reference.dangling_sql())?;
    let rows = stmt
      .query_map([], |row| {
        Ok(ConstraintViolation {
          table:  reference.child.name().to_owned(),
          rowid:  row.get(0)?,
          parent: reference.parent.name().to_owned(),
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    violations.extend(rows);
  }

  let orphan_returns: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM return_status AS r WHERE {ORPHAN_RETURN}"),
    [],
    |row| row.get(0),
  )?;

  let snapshot_mismatches: i64 = conn.query_row(
    "SELECT COUNT(*)
       FROM return_status AS r
       JOIN issued_status AS i ON i.issued_id = r.issued_id
      WHERE r.return_book_name IS NOT i.issued_book_name
         OR r.return_book_isbn IS NOT i.issued_book_isbn",
    [],
    |row| row.get(0),
  )?;

  Ok(IntegrityReport {
    phase,
    violations,
    orphan_returns: orphan_returns as usize,
    snapshot_mismatches: snapshot_mismatches as usize,
  })
}
