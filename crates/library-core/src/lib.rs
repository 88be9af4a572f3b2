//! Entities, CSV import and the [`store::LibraryStore`] trait for the
//! library data model.
//!
//! No database code lives here; `library-store-sqlite` implements the trait.

#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod circulation;
pub mod error;
pub mod import;
pub mod maintenance;
pub mod member;
pub mod org;
pub mod store;

pub use error::{Error, Result};
