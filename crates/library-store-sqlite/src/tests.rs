//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use library_core::{
  catalog::{Book, BookStatus},
  circulation::{IssueRecord, ReturnRecord},
  import::{ImportBatch, Table},
  maintenance::SchemaPhase,
  member::Member,
  org::{Branch, Employee},
  store::LibraryStore,
};

use crate::{Error, SqliteStore};

const CATCHER: &str = "978-0-553-29698-2";
const ANIMAL_FARM: &str = "978-0-330-25864-8";
const SOLITUDE: &str = "978-0-14-118776-1";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn branch(id: &str, manager: Option<&str>) -> Branch {
  Branch {
    branch_id:      id.into(),
    manager_id:     manager.map(Into::into),
    branch_address: "123 Main St".into(),
    contact_no:     "+919099988676".into(),
  }
}

fn employee(id: &str, branch_id: &str) -> Employee {
  Employee {
    emp_id:    id.into(),
    emp_name:  "John Doe".into(),
    position:  "Clerk".into(),
    salary:    60000.0,
    branch_id: branch_id.into(),
  }
}

fn member(id: &str) -> Member {
  Member {
    member_id:      id.into(),
    member_name:    "Alice Johnson".into(),
    member_address: "123 Main St".into(),
    reg_date:       date(2021, 5, 15),
  }
}

fn book(isbn: &str, title: &str) -> Book {
  Book {
    isbn:         isbn.into(),
    book_title:   title.into(),
    category:     "Classic".into(),
    rental_price: 7.0,
    status:       BookStatus::Available,
    author:       "Somebody".into(),
    publisher:    "Penguin Books".into(),
  }
}

fn issue(id: &str, member_id: &str, isbn: &str, title: &str) -> IssueRecord {
  IssueRecord {
    issued_id:        id.into(),
    issued_member_id: member_id.into(),
    issued_book_name: title.into(),
    issued_date:      date(2024, 3, 10),
    issued_book_isbn: isbn.into(),
    issued_emp_id:    "E101".into(),
  }
}

fn ret(id: &str, issued_id: Option<&str>, snapshot: Option<(&str, &str)>) -> ReturnRecord {
  ReturnRecord {
    return_id:        id.into(),
    issued_id:        issued_id.map(Into::into),
    return_book_name: snapshot.map(|(title, _)| title.into()),
    return_date:      date(2024, 3, 25),
    return_book_isbn: snapshot.map(|(_, isbn)| isbn.into()),
  }
}

/// One branch managed by E101, two employees, two members, three books and a
/// single issue `IS101` of the Catcher to `C101`.
async fn seed(s: &SqliteStore) {
  s.add_branch(branch("B001", Some("E101"))).await.unwrap();
  s.add_employee(employee("E101", "B001")).await.unwrap();
  s.add_employee(employee("E102", "B001")).await.unwrap();
  s.add_member(member("C101")).await.unwrap();
  s.add_member(member("C102")).await.unwrap();
  s.add_book(book(CATCHER, "The Catcher in the Rye")).await.unwrap();
  s.add_book(book(ANIMAL_FARM, "Animal Farm")).await.unwrap();
  s.add_book(book(SOLITUDE, "One Hundred Years of Solitude"))
    .await
    .unwrap();
  s.record_issue(issue("IS101", "C101", CATCHER, "The Catcher in the Rye"))
    .await
    .unwrap();
}

// ─── Schema lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn new_store_starts_bare_and_clean() {
  let s = store().await;
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Bare);

  let report = s.check_integrity().await.unwrap();
  assert!(report.is_clean(), "{report:?}");
  assert_eq!(report.phase, SchemaPhase::Bare);
}

#[tokio::test]
async fn reset_schema_drops_rows_and_constraints() {
  let s = store().await;
  seed(&s).await;
  s.apply_constraints().await.unwrap();

  s.reset_schema().await.unwrap();
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Bare);
  assert!(s.list_branches().await.unwrap().is_empty());
  assert!(s.list_employees().await.unwrap().is_empty());
  assert!(s.list_issues().await.unwrap().is_empty());

  // Re-running is harmless, and bare tables accept dangling references.
  s.reset_schema().await.unwrap();
  s.add_employee(employee("E900", "B404")).await.unwrap();
}

#[tokio::test]
async fn bare_schema_accepts_dangling_references() {
  let s = store().await;
  s.record_issue(issue("IS900", "C999", CATCHER, "Ghost")).await.unwrap();

  let report = s.check_integrity().await.unwrap();
  // member, book and employee are all missing.
  assert_eq!(report.violations.len(), 3);
  assert!(report.violations.iter().all(|v| v.table == "issued_status"));
}

#[tokio::test]
async fn constraint_phase_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("library.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    seed(&s).await;
    s.apply_constraints().await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Constrained);
  assert_eq!(s.list_books().await.unwrap().len(), 3);
  let err = s
    .record_issue(issue("IS102", "C999", CATCHER, "The Catcher in the Rye"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_each_entity() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();

  assert_eq!(
    s.get_branch("B001").await.unwrap().unwrap().manager_id.as_deref(),
    Some("E101")
  );
  assert_eq!(s.get_employee("E102").await.unwrap().unwrap().salary, 60000.0);
  assert_eq!(
    s.get_member("C101").await.unwrap().unwrap().reg_date,
    date(2021, 5, 15)
  );
  assert_eq!(
    s.get_book(ANIMAL_FARM).await.unwrap().unwrap().status,
    BookStatus::Available
  );

  let issued = s.get_issue("IS101").await.unwrap().unwrap();
  assert_eq!(issued.issued_date, date(2024, 3, 10));
  let returned = s.get_return("RS101").await.unwrap().unwrap();
  assert!(returned.matches_issue(&issued));
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get_branch("B404").await.unwrap().is_none());
  assert!(s.get_member("C404").await.unwrap().is_none());
  assert!(s.get_return("RS404").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_id_is_a_constraint_error() {
  let s = store().await;
  s.add_member(member("C101")).await.unwrap();
  let err = s.add_member(member("C101")).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");
}

#[tokio::test]
async fn update_member_address() {
  let s = store().await;
  s.add_member(member("C101")).await.unwrap();

  s.update_member_address("C101", "125 Oak St").await.unwrap();
  assert_eq!(
    s.get_member("C101").await.unwrap().unwrap().member_address,
    "125 Oak St"
  );

  let err = s.update_member_address("C404", "nowhere").await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotFound { table: Table::Members, ref id } if id == "C404"
  ));
}

#[tokio::test]
async fn bulk_insert_is_atomic() {
  let s = store().await;
  let batch = ImportBatch::Members(vec![member("C101"), member("C102"), member("C101")]);
  let err = s.bulk_insert(batch).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)));
  assert!(s.list_members().await.unwrap().is_empty());

  let batch = ImportBatch::Members(vec![member("C102"), member("C101")]);
  assert_eq!(s.bulk_insert(batch).await.unwrap(), 2);
  let ids: Vec<String> = s
    .list_members()
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.member_id)
    .collect();
  assert_eq!(ids, ["C101", "C102"]);
}

#[tokio::test]
async fn bulk_insert_from_csv_export() {
  let s = store().await;
  let csv = "return_id,issued_id,return_book_name,return_date,return_book_isbn\n\
             RS104,IS106,,2024-05-01,\n\
             RS105,IS107,,2024-05-03,\n";
  let batch = ImportBatch::from_reader(Table::ReturnStatus, csv.as_bytes()).unwrap();
  assert_eq!(s.bulk_insert(batch).await.unwrap(), 2);

  let rows = s.list_returns().await.unwrap();
  assert_eq!(rows[0].return_id, "RS104");
  assert_eq!(rows[0].return_book_name, None);
  assert_eq!(rows[1].return_date, date(2024, 5, 3));
}

// ─── Constraint application ──────────────────────────────────────────────────

#[tokio::test]
async fn matching_issue_and_return_constrain_cleanly() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();

  s.apply_constraints().await.unwrap();
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Constrained);

  let report = s.check_integrity().await.unwrap();
  assert!(report.is_clean(), "{report:?}");
  assert_eq!(s.list_returns().await.unwrap().len(), 1);

  // Applying again is a no-op.
  s.apply_constraints().await.unwrap();
}

#[tokio::test]
async fn null_issue_reference_blocks_constraints_until_cleanup() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret("RS101", Some("IS101"), None)).await.unwrap();
  s.record_return(ret("RS102", None, None)).await.unwrap();

  let err = s.apply_constraints().await.unwrap_err();
  let Error::ConstraintViolation(violations) = err else {
    panic!("expected constraint violation, got {err:?}");
  };
  // RS101 lacks its snapshot, RS102 its reference.
  let rowids: Vec<_> = violations.iter().map(|v| v.rowid).collect();
  assert_eq!(rowids, [Some(1), Some(2)]);
  assert!(violations.iter().all(|v| v.table == "return_status"));
  assert!(violations.iter().all(|v| v.parent == "issued_status"));
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Bare);

  let report = s.reconcile_returns().await.unwrap();
  assert_eq!(report.removed.len(), 1);
  assert_eq!(report.removed[0].return_id, "RS102");

  s.apply_constraints().await.unwrap();
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Constrained);
}

#[tokio::test]
async fn dangling_employee_branch_blocks_constraints() {
  let s = store().await;
  seed(&s).await;
  s.add_employee(employee("E103", "B404")).await.unwrap();

  let err = s.apply_constraints().await.unwrap_err();
  let Error::ConstraintViolation(violations) = err else {
    panic!("expected constraint violation, got {err:?}");
  };
  assert_eq!(violations.len(), 1);
  assert_eq!(violations[0].table, "employees");
  assert_eq!(violations[0].parent, "branch");

  // Rolled back: still bare and the row is still there.
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Bare);
  assert!(s.get_employee("E103").await.unwrap().is_some());
}

#[tokio::test]
async fn constrained_store_rejects_dangling_writes() {
  let s = store().await;
  seed(&s).await;
  s.apply_constraints().await.unwrap();

  let err = s.add_employee(employee("E103", "B404")).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  let err = s
    .record_issue(issue("IS102", "C101", "978-0-00-000000-0", "Unknown"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  let err = s.record_return(ret("RS109", Some("IS404"), None)).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  let err = s.record_return(ret("RS110", None, None)).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");
}

#[tokio::test]
async fn constrained_store_rejects_drifted_snapshots() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();
  s.apply_constraints().await.unwrap();

  let err = s
    .record_return(ret("RS900", Some("IS101"), Some(("Wrong Title", ANIMAL_FARM))))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  let err = s
    .record_return(ret("RS901", Some("IS101"), Some(("The Catcher in the Rye", ANIMAL_FARM))))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  let err = s.record_return(ret("RS902", Some("IS101"), None)).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  s.record_return(ret(
    "RS903",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();

  let report = s.check_integrity().await.unwrap();
  assert!(report.is_clean(), "{report:?}");
  assert_eq!(s.list_returns().await.unwrap().len(), 2);
}

#[tokio::test]
async fn drifted_snapshot_blocks_constraints_until_cleanup() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret("RS101", Some("IS101"), Some(("Wrong Title", ANIMAL_FARM))))
    .await
    .unwrap();

  let err = s.apply_constraints().await.unwrap_err();
  assert!(matches!(err, Error::ConstraintViolation(_)), "got {err:?}");
  assert_eq!(s.schema_phase().await.unwrap(), SchemaPhase::Bare);

  assert_eq!(s.reconcile_returns().await.unwrap().reconciled, 1);
  s.apply_constraints().await.unwrap();
}

#[tokio::test]
async fn branch_manager_must_resolve_once_constrained() {
  let s = store().await;
  seed(&s).await;
  s.apply_constraints().await.unwrap();

  let err = s.set_branch_manager("B001", Some("E404")).await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  s.set_branch_manager("B001", Some("E102")).await.unwrap();
  assert_eq!(
    s.get_branch("B001").await.unwrap().unwrap().manager_id.as_deref(),
    Some("E102")
  );

  // A new branch can exist without a manager, then get one in a second pass.
  s.add_branch(branch("B002", None)).await.unwrap();
  s.add_employee(employee("E201", "B002")).await.unwrap();
  s.set_branch_manager("B002", Some("E201")).await.unwrap();

  let err = s.set_branch_manager("B404", None).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { table: Table::Branch, .. }));

  let report = s.check_integrity().await.unwrap();
  assert!(report.is_clean(), "{report:?}");
}

// ─── Cleanup pass ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cleanup_reconciles_snapshots_and_removes_orphans() {
  let s = store().await;
  seed(&s).await;
  s.record_issue(issue("IS102", "C102", ANIMAL_FARM, "Animal Farm"))
    .await
    .unwrap();

  // Missing snapshot, padded reference with a drifted snapshot, and two
  // orphans.
  s.record_return(ret("RS101", Some("IS101"), None)).await.unwrap();
  s.record_return(ret("RS102", Some(" IS102 "), Some(("Animal Farm 2", SOLITUDE))))
    .await
    .unwrap();
  s.record_return(ret("RS103", None, None)).await.unwrap();
  s.record_return(ret("RS104", Some("IS999"), Some(("Ghost", CATCHER))))
    .await
    .unwrap();

  let before = s.check_integrity().await.unwrap();
  assert_eq!(before.orphan_returns, 3);

  let report = s.reconcile_returns().await.unwrap();
  assert_eq!(report.reconciled, 2);
  let removed: Vec<&str> = report.removed.iter().map(|r| r.return_id.as_str()).collect();
  assert_eq!(removed, ["RS103", "RS104"]);
  assert_eq!(report.removed[1].return_book_name.as_deref(), Some("Ghost"));
  assert_eq!(report.removed[1].return_date.as_deref(), Some("2024-03-25"));

  // Every survivor resolves and carries its issue's snapshot.
  let issues = s.list_issues().await.unwrap();
  let returns = s.list_returns().await.unwrap();
  assert_eq!(returns.len(), 2);
  for r in &returns {
    let issued = issues
      .iter()
      .find(|i| Some(i.issued_id.as_str()) == r.issued_id.as_deref())
      .expect("return resolves to an issue");
    assert!(r.matches_issue(issued), "{r:?} vs {issued:?}");
  }

  let after = s.check_integrity().await.unwrap();
  assert!(after.is_clean(), "{after:?}");
  s.apply_constraints().await.unwrap();
}

#[tokio::test]
async fn cleanup_is_idempotent() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret("RS101", Some("IS101 "), None)).await.unwrap();
  s.record_return(ret("RS102", None, None)).await.unwrap();

  let first = s.reconcile_returns().await.unwrap();
  assert!(!first.is_noop());

  let snapshot = s.list_returns().await.unwrap();
  let second = s.reconcile_returns().await.unwrap();
  assert!(second.is_noop(), "{second:?}");
  assert_eq!(s.list_returns().await.unwrap(), snapshot);
}

#[tokio::test]
async fn cleanup_never_touches_issues() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret("RS101", Some("IS404"), None)).await.unwrap();

  let before = s.list_issues().await.unwrap();
  s.reconcile_returns().await.unwrap();
  assert_eq!(s.list_issues().await.unwrap(), before);
}

#[tokio::test]
async fn exact_reference_wins_over_trimmed_match() {
  let s = store().await;
  seed(&s).await;
  s.record_issue(issue("IS101 ", "C102", ANIMAL_FARM, "Animal Farm"))
    .await
    .unwrap();
  s.record_return(ret("RS101", Some("IS101 "), None)).await.unwrap();

  s.reconcile_returns().await.unwrap();
  let r = s.get_return("RS101").await.unwrap().unwrap();
  assert_eq!(r.issued_id.as_deref(), Some("IS101 "));
  assert_eq!(r.return_book_isbn.as_deref(), Some(ANIMAL_FARM));

  assert!(s.reconcile_returns().await.unwrap().is_noop());
}

#[tokio::test]
async fn cleanup_trims_tabs_and_line_endings() {
  let s = store().await;
  seed(&s).await;
  s.record_issue(issue("IS102", "C102", ANIMAL_FARM, "Animal Farm"))
    .await
    .unwrap();
  s.record_return(ret("RS101", Some("IS101\t"), None)).await.unwrap();
  s.record_return(ret("RS102", Some(" IS102\r\n"), None)).await.unwrap();

  let report = s.reconcile_returns().await.unwrap();
  assert_eq!(report.reconciled, 2);
  assert!(report.removed.is_empty(), "{:?}", report.removed);

  let first = s.get_return("RS101").await.unwrap().unwrap();
  assert_eq!(first.issued_id.as_deref(), Some("IS101"));
  assert_eq!(first.return_book_isbn.as_deref(), Some(CATCHER));
  let second = s.get_return("RS102").await.unwrap().unwrap();
  assert_eq!(second.issued_id.as_deref(), Some("IS102"));

  s.apply_constraints().await.unwrap();
}

// ─── Identifier normalization ────────────────────────────────────────────────

#[tokio::test]
async fn normalize_member_prefix_keeps_issues_resolvable() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();
  s.apply_constraints().await.unwrap();

  let renamed = s.normalize_member_prefix("C", "M").await.unwrap();
  assert_eq!(renamed, 2);

  let issued = s.get_issue("IS101").await.unwrap().unwrap();
  assert_eq!(issued.issued_member_id, "M101");
  assert!(s.get_member("M101").await.unwrap().is_some());
  assert!(s.get_member("C101").await.unwrap().is_none());

  let report = s.check_integrity().await.unwrap();
  assert!(report.is_clean(), "{report:?}");

  // Nothing left to rename.
  assert_eq!(s.normalize_member_prefix("C", "M").await.unwrap(), 0);
}

#[tokio::test]
async fn normalize_collision_changes_nothing() {
  let s = store().await;
  seed(&s).await;
  s.add_member(member("M101")).await.unwrap();
  s.apply_constraints().await.unwrap();

  let err = s.normalize_member_prefix("C", "M").await.unwrap_err();
  assert!(matches!(err, Error::Constraint(_)), "got {err:?}");

  assert!(s.get_member("C101").await.unwrap().is_some());
  assert!(s.get_member("C102").await.unwrap().is_some());
  let issued = s.get_issue("IS101").await.unwrap().unwrap();
  assert_eq!(issued.issued_member_id, "C101");
}

#[tokio::test]
async fn normalize_rejects_empty_prefix() {
  let s = store().await;
  let err = s.normalize_member_prefix("", "M").await.unwrap_err();
  assert!(matches!(err, Error::InvalidPrefix(_)));
}

// ─── Derived status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_follows_return_history() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();

  let sweep = s.refresh_book_status().await.unwrap();
  assert_eq!(sweep.available, 1);
  assert_eq!(sweep.unavailable, 2);

  for b in s.list_books().await.unwrap() {
    assert_eq!(b.status.is_available(), b.isbn == CATCHER, "{}", b.isbn);
  }
}

#[tokio::test]
async fn status_ignores_reissue_after_return() {
  let s = store().await;
  seed(&s).await;
  s.record_return(ret(
    "RS101",
    Some("IS101"),
    Some(("The Catcher in the Rye", CATCHER)),
  ))
  .await
  .unwrap();
  // Lent out again after coming back.
  s.record_issue(issue("IS105", "C102", CATCHER, "The Catcher in the Rye"))
    .await
    .unwrap();

  s.refresh_book_status().await.unwrap();
  assert!(s.get_book(CATCHER).await.unwrap().unwrap().status.is_available());
}
