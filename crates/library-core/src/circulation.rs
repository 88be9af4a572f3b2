//! Loan events: issues and returns.
//!
//! Both records carry a snapshot of the book's title and ISBN as they were at
//! the time of the event. The snapshots are an audit trail and are kept even
//! though the same data lives in `books`; the store's cleanup pass keeps a
//! return's snapshot equal to the snapshot on the issue it closes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single loan of a book to a member, recorded by an employee.
///
/// Issue records are never deleted. The only mutation they see is a
/// corrective administrative update such as a member-identifier migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
  pub issued_id:        String,
  pub issued_member_id: String,
  /// Book title at issue time.
  pub issued_book_name: String,
  pub issued_date:      NaiveDate,
  pub issued_book_isbn: String,
  /// The employee who issued the book.
  pub issued_emp_id:    String,
}

/// The return of a previously issued book.
///
/// `issued_id` and the snapshot columns are optional because bulk-loaded
/// history often arrives incomplete. After the cleanup pass every surviving
/// row has a resolvable `issued_id` and a filled-in snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecord {
  pub return_id:        String,
  pub issued_id:        Option<String>,
  pub return_book_name: Option<String>,
  pub return_date:      NaiveDate,
  pub return_book_isbn: Option<String>,
}

impl ReturnRecord {
  /// Whether this return's snapshot agrees with `issue`.
  pub fn matches_issue(&self, issue: &IssueRecord) -> bool {
    self.issued_id.as_deref() == Some(issue.issued_id.as_str())
      && self.return_book_name.as_deref() == Some(issue.issued_book_name.as_str())
      && self.return_book_isbn.as_deref() == Some(issue.issued_book_isbn.as_str())
  }
}
