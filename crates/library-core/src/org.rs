//! Branches and the employees who staff them.
//!
//! The two entities reference each other: every employee belongs to a branch,
//! and a branch may name one employee as its manager. Neither owns the other,
//! so both are plain records keyed by identifier and the references are
//! resolved by the store's foreign-key constraints once both tables are
//! populated.

use serde::{Deserialize, Serialize};

/// A library branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
  pub branch_id:      String,
  /// `emp_id` of the managing employee. Left empty until the manager row
  /// exists when branches are loaded ahead of their staff.
  pub manager_id:     Option<String>,
  pub branch_address: String,
  pub contact_no:     String,
}

/// A member of staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
  pub emp_id:    String,
  pub emp_name:  String,
  pub position:  String,
  pub salary:    f64,
  /// The branch this employee works at.
  pub branch_id: String,
}
