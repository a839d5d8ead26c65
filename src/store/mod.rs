//! Store module for the durable listing dataset
//!
//! This module handles persistence of listing records, including:
//! - Loading the dataset file at startup (with corruption detection)
//! - Keyed lookup and merge-on-upsert semantics
//! - Staleness queries for the recrawl pass
//! - Atomic full-table persistence (write temp file, then rename)

mod dataset;

pub use dataset::{ListingStore, LISTINGS_FILE};

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The dataset file exists but could not be read back as listing rows.
    /// Callers must surface this instead of starting over an empty store.
    #[error("Corrupt listing dataset at {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an upsert, used for run accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The id was not present; a new record was created
    Inserted,
    /// An existing record was merged with the fresh extraction
    Updated,
}
