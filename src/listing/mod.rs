//! Listing identity and record types
//!
//! This module defines the stable listing identifier, the extracted field
//! set, and the durable record stored in the listing dataset.

mod record;

pub use record::{ListingFields, ListingRecord};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a listing, extracted from its URL or page
///
/// Ids are stable across recrawls: the same listing always yields the same
/// id, and the id uniquely determines at most one record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
