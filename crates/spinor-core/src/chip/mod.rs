//! Flash chip catalog
//!
//! This module provides the static table of known chips, keyed by the
//! JEDEC ID bytes they answer to RDID, and the flags describing them.

mod catalog;
mod flags;
mod types;

pub use catalog::{find_by_name, lookup, CATALOG};
pub use flags::CatalogFlags;
pub use types::*;
