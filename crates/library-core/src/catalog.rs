//! The book catalogue.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Whether a title can currently be lent.
///
/// This is a derived value: it is recomputed in bulk by the store's status
/// sweep from the return history, not tracked per loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
  #[default]
  #[serde(alias = "yes")]
  Available,
  #[serde(alias = "no")]
  Unavailable,
}

impl BookStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Available => "available",
      Self::Unavailable => "unavailable",
    }
  }

  pub fn is_available(self) -> bool { matches!(self, Self::Available) }
}

impl fmt::Display for BookStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts the stored words as well as the `yes`/`no` spelling used by
/// spreadsheet exports.
impl FromStr for BookStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "available" | "yes" => Ok(Self::Available),
      "unavailable" | "no" => Ok(Self::Unavailable),
      _ => Err(Error::UnknownBookStatus(s.to_owned())),
    }
  }
}

/// A title in the catalogue, keyed by ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
  pub isbn:         String,
  pub book_title:   String,
  pub category:     String,
  pub rental_price: f64,
  pub status:       BookStatus,
  pub author:       String,
  pub publisher:    String,
}
