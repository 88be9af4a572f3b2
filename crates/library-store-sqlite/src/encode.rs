//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` strings and book status as the lowercase
//! words `available` / `unavailable`. Rows holding either are read into a
//! `Raw*` struct of plain strings first and decoded outside the connection
//! thread.

use chrono::NaiveDate;
use library_core::{
  catalog::{Book, BookStatus},
  circulation::{IssueRecord, ReturnRecord},
  maintenance::RemovedReturn,
  member::Member,
  org::{Branch, Employee},
};
use rusqlite::Row;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── BookStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(status: BookStatus) -> &'static str { status.as_str() }

pub fn decode_status(s: &str) -> Result<BookStatus> { Ok(s.parse()?) }

// ─── Plain rows ──────────────────────────────────────────────────────────────

pub fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
  Ok(Branch {
    branch_id:      row.get(0)?,
    manager_id:     row.get(1)?,
    branch_address: row.get(2)?,
    contact_no:     row.get(3)?,
  })
}

pub fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
  Ok(Employee {
    emp_id:    row.get(0)?,
    emp_name:  row.get(1)?,
    position:  row.get(2)?,
    salary:    row.get(3)?,
    branch_id: row.get(4)?,
  })
}

pub fn removed_return_from_row(row: &Row<'_>) -> rusqlite::Result<RemovedReturn> {
  Ok(RemovedReturn {
    return_id:        row.get(0)?,
    issued_id:        row.get(1)?,
    return_book_name: row.get(2)?,
    return_book_isbn: row.get(3)?,
    return_date:      row.get(4)?,
  })
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Raw strings read directly from a `members` row.
pub struct RawMember {
  pub member_id:      String,
  pub member_name:    String,
  pub member_address: String,
  pub reg_date:       String,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:      row.get(0)?,
      member_name:    row.get(1)?,
      member_address: row.get(2)?,
      reg_date:       row.get(3)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      reg_date:       decode_date(&self.reg_date)?,
      member_id:      self.member_id,
      member_name:    self.member_name,
      member_address: self.member_address,
    })
  }
}

/// Raw strings read directly from a `books` row.
pub struct RawBook {
  pub isbn:         String,
  pub book_title:   String,
  pub category:     String,
  pub rental_price: f64,
  pub status:       String,
  pub author:       String,
  pub publisher:    String,
}

impl RawBook {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      isbn:         row.get(0)?,
      book_title:   row.get(1)?,
      category:     row.get(2)?,
      rental_price: row.get(3)?,
      status:       row.get(4)?,
      author:       row.get(5)?,
      publisher:    row.get(6)?,
    })
  }

  pub fn into_book(self) -> Result<Book> {
    Ok(Book {
      status:       decode_status(&self.status)?,
      isbn:         self.isbn,
      book_title:   self.book_title,
      category:     self.category,
      rental_price: self.rental_price,
      author:       self.author,
      publisher:    self.publisher,
    })
  }
}

/// Raw strings read directly from an `issued_status` row.
pub struct RawIssue {
  pub issued_id:        String,
  pub issued_member_id: String,
  pub issued_book_name: String,
  pub issued_date:      String,
  pub issued_book_isbn: String,
  pub issued_emp_id:    String,
}

impl RawIssue {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      issued_id:        row.get(0)?,
      issued_member_id: row.get(1)?,
      issued_book_name: row.get(2)?,
      issued_date:      row.get(3)?,
      issued_book_isbn: row.get(4)?,
      issued_emp_id:    row.get(5)?,
    })
  }

  pub fn into_issue(self) -> Result<IssueRecord> {
    Ok(IssueRecord {
      issued_date:      decode_date(&self.issued_date)?,
      issued_id:        self.issued_id,
      issued_member_id: self.issued_member_id,
      issued_book_name: self.issued_book_name,
      issued_book_isbn: self.issued_book_isbn,
      issued_emp_id:    self.issued_emp_id,
    })
  }
}

/// Raw strings read directly from a `return_status` row.
pub struct RawReturn {
  pub return_id:        String,
  pub issued_id:        Option<String>,
  pub return_book_name: Option<String>,
  pub return_date:      String,
  pub return_book_isbn: Option<String>,
}

impl RawReturn {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      return_id:        row.get(0)?,
      issued_id:        row.get(1)?,
      return_book_name: row.get(2)?,
      return_date:      row.get(3)?,
      return_book_isbn: row.get(4)?,
    })
  }

  pub fn into_return(self) -> Result<ReturnRecord> {
    Ok(ReturnRecord {
      return_date:      decode_date(&self.return_date)?,
      return_id:        self.return_id,
      issued_id:        self.issued_id,
      return_book_name: self.return_book_name,
      return_book_isbn: self.return_book_isbn,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn date_encoding_is_iso() {
    let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    assert_eq!(encode_date(d), "2024-03-09");
    assert_eq!(decode_date(" 2024-03-09 ").unwrap(), d);
  }

  #[test]
  fn bad_date_is_reported() {
    assert!(matches!(decode_date("09/03/2024"), Err(Error::DateParse(_))));
  }

  #[test]
  fn unknown_status_is_a_core_error() {
    assert!(matches!(
      decode_status("lost"),
      Err(Error::Core(library_core::Error::UnknownBookStatus(_)))
    ));
    assert_eq!(encode_status(BookStatus::Unavailable), "unavailable");
  }
}
