//! Library members.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A registered borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:      String,
  pub member_name:    String,
  pub member_address: String,
  pub reg_date:       NaiveDate,
}
