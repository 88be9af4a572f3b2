//! Bulk ingestion of tabular exports.
//!
//! Each table is loaded from a CSV file whose header row names the table's
//! columns, e.g. `branch.csv` starting with
//! `branch_id,manager_id,branch_address,contact_no`. Rows are decoded with
//! serde straight into the domain types; nothing beyond type shape is
//! validated here, integrity is the store's job.

use std::{fs::File, io, path::Path};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  catalog::Book,
  circulation::{IssueRecord, ReturnRecord},
  member::Member,
  org::{Branch, Employee},
};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The six tables of the data model, in load order.
///
/// Iterating with [`strum::IntoEnumIterator`] yields parents before the rows
/// that reference them (except for the branch/manager cycle, which only
/// matters once constraints are applied).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
  Branch,
  Employees,
  Members,
  Books,
  IssuedStatus,
  ReturnStatus,
}

impl Table {
  /// Parse a table name, e.g. `"issued_status"`.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownTable(s.to_owned()))
  }

  /// The SQL table name.
  pub fn name(self) -> &'static str { self.into() }

  /// Conventional export file name for this table, e.g. `books.csv`.
  pub fn file_name(self) -> String { format!("{}.csv", self.name()) }
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// Rows destined for a single table.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportBatch {
  Branches(Vec<Branch>),
  Employees(Vec<Employee>),
  Members(Vec<Member>),
  Books(Vec<Book>),
  Issues(Vec<IssueRecord>),
  Returns(Vec<ReturnRecord>),
}

impl ImportBatch {
  pub fn table(&self) -> Table {
    match self {
      Self::Branches(_) => Table::Branch,
      Self::Employees(_) => Table::Employees,
      Self::Members(_) => Table::Members,
      Self::Books(_) => Table::Books,
      Self::Issues(_) => Table::IssuedStatus,
      Self::Returns(_) => Table::ReturnStatus,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Self::Branches(rows) => rows.len(),
      Self::Employees(rows) => rows.len(),
      Self::Members(rows) => rows.len(),
      Self::Books(rows) => rows.len(),
      Self::Issues(rows) => rows.len(),
      Self::Returns(rows) => rows.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Decode CSV rows for `table` from any reader.
  ///
  /// Header names are trimmed; field values are kept verbatim so that padded
  /// identifiers survive until the cleanup pass can reconcile them. Empty
  /// fields decode as `None` for optional columns.
  pub fn from_reader<R: io::Read>(table: Table, reader: R) -> Result<Self> {
    let mut rdr = csv::ReaderBuilder::new()
      .trim(csv::Trim::Headers)
      .from_reader(reader);

    Ok(match table {
      Table::Branch => Self::Branches(decode_rows(&mut rdr)?),
      Table::Employees => Self::Employees(decode_rows(&mut rdr)?),
      Table::Members => Self::Members(decode_rows(&mut rdr)?),
      Table::Books => Self::Books(decode_rows(&mut rdr)?),
      Table::IssuedStatus => Self::Issues(decode_rows(&mut rdr)?),
      Table::ReturnStatus => Self::Returns(decode_rows(&mut rdr)?),
    })
  }

  /// Decode CSV rows for `table` from a file.
  pub fn from_path(table: Table, path: impl AsRef<Path>) -> Result<Self> {
    let file = File::open(path)?;
    Self::from_reader(table, io::BufReader::new(file))
  }
}

fn decode_rows<T, R>(rdr: &mut csv::Reader<R>) -> Result<Vec<T>>
where
  T: DeserializeOwned,
  R: io::Read,
{
  rdr
    .deserialize()
    .collect::<std::result::Result<Vec<T>, csv::Error>>()
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use chrono::NaiveDate;
  use strum::IntoEnumIterator as _;

  use super::*;
  use crate::catalog::BookStatus;

  #[test]
  fn tables_iterate_in_load_order() {
    let names: Vec<&str> = Table::iter().map(Table::name).collect();
    assert_eq!(
      names,
      [
        "branch",
        "employees",
        "members",
        "books",
        "issued_status",
        "return_status"
      ]
    );
  }

  #[test]
  fn table_parse_accepts_sql_names_only() {
    assert_eq!(Table::parse("return_status").unwrap(), Table::ReturnStatus);
    assert_eq!(Table::IssuedStatus.file_name(), "issued_status.csv");
    assert!(matches!(
      Table::parse("loans"),
      Err(Error::UnknownTable(ref s)) if s == "loans"
    ));
  }

  #[test]
  fn branches_with_empty_manager_decode_as_none() {
    let csv = "branch_id,manager_id,branch_address,contact_no\n\
               B001,E109,123 Main St,+919099988676\n\
               B002,,456 Elm St,+919099988677\n";
    let batch = ImportBatch::from_reader(Table::Branch, csv.as_bytes()).unwrap();
    let ImportBatch::Branches(rows) = batch else {
      panic!("expected branches");
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].manager_id.as_deref(), Some("E109"));
    assert_eq!(rows[1].manager_id, None);
  }

  #[test]
  fn books_accept_yes_no_status() {
    let csv = "isbn,book_title,category,rental_price,status,author,publisher\n\
               978-0-553-29698-2,The Catcher in the Rye,Classic,7.0,yes,J.D. Salinger,Little Brown\n\
               978-0-330-25864-8,Animal Farm,Classic,5.5,no,George Orwell,Penguin\n";
    let batch = ImportBatch::from_reader(Table::Books, csv.as_bytes()).unwrap();
    assert_eq!(batch.table(), Table::Books);
    let ImportBatch::Books(rows) = batch else {
      panic!("expected books");
    };
    assert_eq!(rows[0].status, BookStatus::Available);
    assert_eq!(rows[1].status, BookStatus::Unavailable);
    assert_eq!(rows[1].rental_price, 5.5);
  }

  #[test]
  fn returns_keep_padding_and_allow_missing_snapshot() {
    let csv = " return_id , issued_id ,return_book_name,return_date,return_book_isbn\n\
               RS101,IS101 ,,2023-06-06,\n\
               RS102,,,2023-06-07,\n";
    let batch = ImportBatch::from_reader(Table::ReturnStatus, csv.as_bytes()).unwrap();
    let ImportBatch::Returns(rows) = batch else {
      panic!("expected returns");
    };
    assert_eq!(rows[0].issued_id.as_deref(), Some("IS101 "));
    assert_eq!(rows[0].return_book_name, None);
    assert_eq!(
      rows[0].return_date,
      NaiveDate::from_ymd_opt(2023, 6, 6).unwrap()
    );
    assert_eq!(rows[1].issued_id, None);
  }

  #[test]
  fn malformed_date_is_a_csv_error() {
    let csv = "member_id,member_name,member_address,reg_date\n\
               C101,Alice Johnson,123 Main St,not-a-date\n";
    let err = ImportBatch::from_reader(Table::Members, csv.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::Csv(_)), "got {err:?}");
  }

  #[test]
  fn from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "emp_id,emp_name,position,salary,branch_id").unwrap();
    writeln!(file, "E101,John Doe,Clerk,60000.0,B001").unwrap();

    let batch = ImportBatch::from_path(Table::Employees, file.path()).unwrap();
    assert_eq!(batch.len(), 1);
    assert!(!batch.is_empty());
  }

  #[test]
  fn from_path_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ImportBatch::from_path(Table::Books, dir.path().join("books.csv"))
      .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
  }
}
