//! The `LibraryStore` trait.
//!
//! Implemented by storage backends (e.g. `library-store-sqlite`). The admin
//! binary depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  catalog::Book,
  circulation::{IssueRecord, ReturnRecord},
  import::ImportBatch,
  maintenance::{CleanupReport, IntegrityReport, SchemaPhase, StatusSweep},
  member::Member,
  org::{Branch, Employee},
};

/// Abstraction over a library data-model backend.
///
/// Setup runs in two phases: tables are created bare, loaded, cleaned with
/// [`reconcile_returns`](Self::reconcile_returns), and only then constrained
/// with [`apply_constraints`](Self::apply_constraints). Issue records are
/// never deleted by any method.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait LibraryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema ────────────────────────────────────────────────────────────

  /// Drop every table and recreate them bare. Safe to re-run.
  fn reset_schema(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn schema_phase(
    &self,
  ) -> impl Future<Output = Result<SchemaPhase, Self::Error>> + Send + '_;

  /// Add every foreign-key invariant over the existing rows.
  ///
  /// Fails without changing anything if any row violates an invariant. A
  /// store that is already constrained is left as is.
  fn apply_constraints(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Bulk ingestion ────────────────────────────────────────────────────

  /// Insert every row of `batch` atomically. Returns the number of rows
  /// inserted.
  fn bulk_insert(
    &self,
    batch: ImportBatch,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Bring return records into line with issue records.
  ///
  /// Returns whose issue reference matches an issue (ignoring surrounding
  /// whitespace) get the issue's exact id, title and isbn. Returns with a
  /// null or unresolvable reference are deleted and listed in the report.
  /// Idempotent.
  fn reconcile_returns(
    &self,
  ) -> impl Future<Output = Result<CleanupReport, Self::Error>> + Send + '_;

  /// Rewrite member ids starting with `from` to start with `to`, in both
  /// `members` and `issued_status`, atomically. Returns the number of
  /// members renamed.
  fn normalize_member_prefix<'a>(
    &'a self,
    from: &'a str,
    to: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Recompute every book's status: available if its isbn appears in any
  /// return record, unavailable otherwise.
  ///
  /// Re-issues after a return are not considered, so a book returned once
  /// and lent out again still reads available. This mirrors the
  /// library's existing maintenance policy.
  fn refresh_book_status(
    &self,
  ) -> impl Future<Output = Result<StatusSweep, Self::Error>> + Send + '_;

  /// Audit the referential state without changing anything.
  fn check_integrity(
    &self,
  ) -> impl Future<Output = Result<IntegrityReport, Self::Error>> + Send + '_;

  // ── Inserts ───────────────────────────────────────────────────────────

  fn add_branch(
    &self,
    branch: Branch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_employee(
    &self,
    employee: Employee,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_member(
    &self,
    member: Member,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_book(
    &self,
    book: Book,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record a loan event.
  fn record_issue(
    &self,
    issue: IssueRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record the return of a loan.
  fn record_return(
    &self,
    ret: ReturnRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Corrective updates ────────────────────────────────────────────────

  fn update_member_address<'a>(
    &'a self,
    member_id: &'a str,
    address: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Point a branch at a (new) manager, or clear it with `None`.
  fn set_branch_manager<'a>(
    &'a self,
    branch_id: &'a str,
    manager_id: Option<&'a str>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_branch<'a>(
    &'a self,
    branch_id: &'a str,
  ) -> impl Future<Output = Result<Option<Branch>, Self::Error>> + Send + 'a;

  fn get_employee<'a>(
    &'a self,
    emp_id: &'a str,
  ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send + 'a;

  fn get_member<'a>(
    &'a self,
    member_id: &'a str,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  fn get_book<'a>(
    &'a self,
    isbn: &'a str,
  ) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send + 'a;

  fn get_issue<'a>(
    &'a self,
    issued_id: &'a str,
  ) -> impl Future<Output = Result<Option<IssueRecord>, Self::Error>> + Send + 'a;

  fn get_return<'a>(
    &'a self,
    return_id: &'a str,
  ) -> impl Future<Output = Result<Option<ReturnRecord>, Self::Error>> + Send + 'a;

  fn list_branches(
    &self,
  ) -> impl Future<Output = Result<Vec<Branch>, Self::Error>> + Send + '_;

  fn list_employees(
    &self,
  ) -> impl Future<Output = Result<Vec<Employee>, Self::Error>> + Send + '_;

  fn list_members(
    &self,
  ) -> impl Future<Output = Result<Vec<Member>, Self::Error>> + Send + '_;

  fn list_books(
    &self,
  ) -> impl Future<Output = Result<Vec<Book>, Self::Error>> + Send + '_;

  fn list_issues(
    &self,
  ) -> impl Future<Output = Result<Vec<IssueRecord>, Self::Error>> + Send + '_;

  fn list_returns(
    &self,
  ) -> impl Future<Output = Result<Vec<ReturnRecord>, Self::Error>> + Send + '_;
}
