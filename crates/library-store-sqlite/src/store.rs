//! SQLite implementation of [`LibraryStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use library_core::{
  catalog::Book,
  circulation::{IssueRecord, ReturnRecord},
  import::{ImportBatch, Table},
  maintenance::{CleanupReport, IntegrityReport, SchemaPhase, StatusSweep},
  member::Member,
  org::{Branch, Employee},
  store::LibraryStore,
};

use crate::{
  encode::{
    branch_from_row, employee_from_row, encode_date, encode_status, RawBook,
    RawIssue, RawMember, RawReturn,
  },
  maintenance,
  schema::{bare_sql, phase_from_version, PRAGMAS, VERSION_BARE},
  Error, Result,
};

type RowMapper<T> = fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A library store backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  ///
  /// A new database gets the bare tables. An existing one keeps whatever
  /// phase it was left in.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        if maintenance::user_version(conn)? == 0 {
          let tx = conn.transaction()?;
          tx.execute_batch(&bare_sql())?;
          tx.pragma_update(None, "user_version", VERSION_BARE)?;
          tx.commit()?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a parameterless query and map every row.
  async fn fetch_all<T>(&self, sql: &'static str, map: RowMapper<T>) -> Result<Vec<T>>
  where
    T: Send + 'static,
  {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map([], map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Run a query keyed on a single identifier and map the row, if any.
  async fn fetch_one<T>(
    &self,
    sql: &'static str,
    key: &str,
    map: RowMapper<T>,
  ) -> Result<Option<T>>
  where
    T: Send + 'static,
  {
    let key = key.to_owned();
    let row = self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, rusqlite::params![key], map).optional()?))
      .await?;
    Ok(row)
  }

  /// Run one insert inside its own transaction.
  async fn insert_with<T>(
    &self,
    row: T,
    insert: fn(&rusqlite::Connection, &T) -> rusqlite::Result<()>,
  ) -> Result<()>
  where
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert(&tx, &row)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Inserts ─────────────────────────────────────────────────────────────────

fn insert_branch(conn: &rusqlite::Connection, b: &Branch) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO branch (branch_id, manager_id, branch_address, contact_no)
       VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(rusqlite::params![
      b.branch_id,
      b.manager_id,
      b.branch_address,
      b.contact_no,
    ])?;
  Ok(())
}

fn insert_employee(conn: &rusqlite::Connection, e: &Employee) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO employees (emp_id, emp_name, position, salary, branch_id)
       VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(rusqlite::params![
      e.emp_id,
      e.emp_name,
      e.position,
      e.salary,
      e.branch_id,
    ])?;
  Ok(())
}

fn insert_member(conn: &rusqlite::Connection, m: &Member) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO members (member_id, member_name, member_address, reg_date)
       VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(rusqlite::params![
      m.member_id,
      m.member_name,
      m.member_address,
      encode_date(m.reg_date),
    ])?;
  Ok(())
}

fn insert_book(conn: &rusqlite::Connection, b: &Book) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO books (
         isbn, book_title, category, rental_price, status, author, publisher
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?
    .execute(rusqlite::params![
      b.isbn,
      b.book_title,
      b.category,
      b.rental_price,
      encode_status(b.status),
      b.author,
      b.publisher,
    ])?;
  Ok(())
}

fn insert_issue(conn: &rusqlite::Connection, i: &IssueRecord) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO issued_status (
         issued_id, issued_member_id, issued_book_name, issued_date,
         issued_book_isbn, issued_emp_id
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(rusqlite::params![
      i.issued_id,
      i.issued_member_id,
      i.issued_book_name,
      encode_date(i.issued_date),
      i.issued_book_isbn,
      i.issued_emp_id,
    ])?;
  Ok(())
}

fn insert_return(conn: &rusqlite::Connection, r: &ReturnRecord) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO return_status (
         return_id, issued_id, return_book_name, return_date, return_book_isbn
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(rusqlite::params![
      r.return_id,
      r.issued_id,
      r.return_book_name,
      encode_date(r.return_date),
      r.return_book_isbn,
    ])?;
  Ok(())
}

fn insert_all<T>(
  conn: &rusqlite::Connection,
  rows: &[T],
  insert: fn(&rusqlite::Connection, &T) -> rusqlite::Result<()>,
) -> rusqlite::Result<()> {
  rows.iter().try_for_each(|row| insert(conn, row))
}

// ─── LibraryStore impl ───────────────────────────────────────────────────────

impl LibraryStore for SqliteStore {
  type Error = Error;

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn reset_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| Ok(maintenance::reset_schema(conn)?))
      .await?;
    tracing::info!("schema reset; tables recreated without foreign keys");
    Ok(())
  }

  async fn schema_phase(&self) -> Result<SchemaPhase> {
    let version = self
      .conn
      .call(|conn| Ok(maintenance::user_version(conn)?))
      .await?;
    Ok(phase_from_version(version))
  }

  async fn apply_constraints(&self) -> Result<()> {
    if self.schema_phase().await? == SchemaPhase::Constrained {
      tracing::info!("foreign keys already applied");
      return Ok(());
    }

    let violations = self
      .conn
      .call(|conn| Ok(maintenance::apply_constraints(conn)?))
      .await?;

    if !violations.is_empty() {
      for v in &violations {
        tracing::error!(violation = %v, "foreign-key violation");
      }
      return Err(Error::ConstraintViolation(violations));
    }

    tracing::info!("foreign keys applied");
    Ok(())
  }

  // ── Bulk ingestion ────────────────────────────────────────────────────────

  async fn bulk_insert(&self, batch: ImportBatch) -> Result<usize> {
    let table = batch.table();

    let count = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match &batch {
          ImportBatch::Branches(rows) => insert_all(&tx, rows, insert_branch)?,
          ImportBatch::Employees(rows) => insert_all(&tx, rows, insert_employee)?,
          ImportBatch::Members(rows) => insert_all(&tx, rows, insert_member)?,
          ImportBatch::Books(rows) => insert_all(&tx, rows, insert_book)?,
          ImportBatch::Issues(rows) => insert_all(&tx, rows, insert_issue)?,
          ImportBatch::Returns(rows) => insert_all(&tx, rows, insert_return)?,
        }
        tx.commit()?;
        Ok(batch.len())
      })
      .await?;

    tracing::info!(%table, rows = count, "bulk insert committed");
    Ok(count)
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn reconcile_returns(&self) -> Result<CleanupReport> {
    let report = self
      .conn
      .call(|conn| Ok(maintenance::reconcile_returns(conn)?))
      .await?;

    for row in &report.removed {
      tracing::warn!(
        return_id = %row.return_id,
        issued_id = ?row.issued_id,
        return_book_name = ?row.return_book_name,
        return_book_isbn = ?row.return_book_isbn,
        return_date = ?row.return_date,
        "removed return with unresolvable issue reference",
      );
    }
    tracing::info!(
      reconciled = report.reconciled,
      removed = report.removed.len(),
      "return records reconciled",
    );
    Ok(report)
  }

  async fn normalize_member_prefix(&self, from: &str, to: &str) -> Result<usize> {
    if from.is_empty() {
      return Err(Error::InvalidPrefix(from.to_owned()));
    }

    let (from_owned, to_owned) = (from.to_owned(), to.to_owned());
    let renamed = self
      .conn
      .call(move |conn| {
        Ok(maintenance::normalize_member_prefix(conn, &from_owned, &to_owned)?)
      })
      .await?;

    tracing::info!(from, to, renamed, "member ids normalized");
    Ok(renamed)
  }

  async fn refresh_book_status(&self) -> Result<StatusSweep> {
    let sweep = self
      .conn
      .call(|conn| Ok(maintenance::refresh_book_status(conn)?))
      .await?;
    tracing::info!(
      available = sweep.available,
      unavailable = sweep.unavailable,
      "book status refreshed",
    );
    Ok(sweep)
  }

  async fn check_integrity(&self) -> Result<IntegrityReport> {
    let report = self
      .conn
      .call(|conn| Ok(maintenance::check_integrity(conn)?))
      .await?;
    tracing::debug!(?report, "integrity checked");
    Ok(report)
  }

  // ── Inserts ───────────────────────────────────────────────────────────────

  async fn add_branch(&self, branch: Branch) -> Result<()> {
    self.insert_with(branch, insert_branch).await
  }

  async fn add_employee(&self, employee: Employee) -> Result<()> {
    self.insert_with(employee, insert_employee).await
  }

  async fn add_member(&self, member: Member) -> Result<()> {
    self.insert_with(member, insert_member).await
  }

  async fn add_book(&self, book: Book) -> Result<()> {
    self.insert_with(book, insert_book).await
  }

  async fn record_issue(&self, issue: IssueRecord) -> Result<()> {
    self.insert_with(issue, insert_issue).await
  }

  async fn record_return(&self, ret: ReturnRecord) -> Result<()> {
    self.insert_with(ret, insert_return).await
  }

  // ── Corrective updates ────────────────────────────────────────────────────

  async fn update_member_address(&self, member_id: &str, address: &str) -> Result<()> {
    let (id, addr) = (member_id.to_owned(), address.to_owned());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE members SET member_address = ?2 WHERE member_id = ?1",
          rusqlite::params![id, addr],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotFound {
        table: Table::Members,
        id:    member_id.to_owned(),
      });
    }
    Ok(())
  }

  async fn set_branch_manager(
    &self,
    branch_id: &str,
    manager_id: Option<&str>,
  ) -> Result<()> {
    let id = branch_id.to_owned();
    let manager = manager_id.map(str::to_owned);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE branch SET manager_id = ?2 WHERE branch_id = ?1",
          rusqlite::params![id, manager],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotFound {
        table: Table::Branch,
        id:    branch_id.to_owned(),
      });
    }
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_branch(&self, branch_id: &str) -> Result<Option<Branch>> {
    self
      .fetch_one(
        "SELECT branch_id, manager_id, branch_address, contact_no
         FROM branch WHERE branch_id = ?1",
        branch_id,
        branch_from_row,
      )
      .await
  }

  async fn get_employee(&self, emp_id: &str) -> Result<Option<Employee>> {
    self
      .fetch_one(
        "SELECT emp_id, emp_name, position, salary, branch_id
         FROM employees WHERE emp_id = ?1",
        emp_id,
        employee_from_row,
      )
      .await
  }

  async fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
    let raw = self
      .fetch_one(
        "SELECT member_id, member_name, member_address, reg_date
         FROM members WHERE member_id = ?1",
        member_id,
        RawMember::from_row,
      )
      .await?;
    raw.map(RawMember::into_member).transpose()
  }

  async fn get_book(&self, isbn: &str) -> Result<Option<Book>> {
    let raw = self
      .fetch_one(
        "SELECT isbn, book_title, category, rental_price, status, author, publisher
         FROM books WHERE isbn = ?1",
        isbn,
        RawBook::from_row,
      )
      .await?;
    raw.map(RawBook::into_book).transpose()
  }

  async fn get_issue(&self, issued_id: &str) -> Result<Option<IssueRecord>> {
    let raw = self
      .fetch_one(
        "SELECT issued_id, issued_member_id, issued_book_name, issued_date,
                issued_book_isbn, issued_emp_id
         FROM issued_status WHERE issued_id = ?1",
        issued_id,
        RawIssue::from_row,
      )
      .await?;
    raw.map(RawIssue::into_issue).transpose()
  }

  async fn get_return(&self, return_id: &str) -> Result<Option<ReturnRecord>> {
    let raw = self
      .fetch_one(
        "SELECT return_id, issued_id, return_book_name, return_date, return_book_isbn
         FROM return_status WHERE return_id = ?1",
        return_id,
        RawReturn::from_row,
      )
      .await?;
    raw.map(RawReturn::into_return).transpose()
  }

  async fn list_branches(&self) -> Result<Vec<Branch>> {
    self
      .fetch_all(
        "SELECT branch_id, manager_id, branch_address, contact_no
         FROM branch ORDER BY branch_id",
        branch_from_row,
      )
      .await
  }

  async fn list_employees(&self) -> Result<Vec<Employee>> {
    self
      .fetch_all(
        "SELECT emp_id, emp_name, position, salary, branch_id
         FROM employees ORDER BY emp_id",
        employee_from_row,
      )
      .await
  }

  async fn list_members(&self) -> Result<Vec<Member>> {
    self
      .fetch_all(
        "SELECT member_id, member_name, member_address, reg_date
         FROM members ORDER BY member_id",
        RawMember::from_row,
      )
      .await?
      .into_iter()
      .map(RawMember::into_member)
      .collect()
  }

  async fn list_books(&self) -> Result<Vec<Book>> {
    self
      .fetch_all(
        "SELECT isbn, book_title, category, rental_price, status, author, publisher
         FROM books ORDER BY isbn",
        RawBook::from_row,
      )
      .await?
      .into_iter()
      .map(RawBook::into_book)
      .collect()
  }

  async fn list_issues(&self) -> Result<Vec<IssueRecord>> {
    self
      .fetch_all(
        "SELECT issued_id, issued_member_id, issued_book_name, issued_date,
                issued_book_isbn, issued_emp_id
         FROM issued_status ORDER BY issued_id",
        RawIssue::from_row,
      )
      .await?
      .into_iter()
      .map(RawIssue::into_issue)
      .collect()
  }

  async fn list_returns(&self) -> Result<Vec<ReturnRecord>> {
    self
      .fetch_all(
        "SELECT return_id, issued_id, return_book_name, return_date, return_book_isbn
         FROM return_status ORDER BY return_id",
        RawReturn::from_row,
      )
      .await?
      .into_iter()
      .map(RawReturn::into_return)
      .collect()
  }
}
