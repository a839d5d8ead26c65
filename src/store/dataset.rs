//! CSV-backed listing store implementation
//!
//! The dataset is one flat CSV file, one row per listing, living in the
//! configured data directory. The whole table is held in memory during a
//! run and rewritten atomically on every persist.

use crate::listing::{ListingId, ListingRecord};
use crate::store::{StoreError, StoreResult, UpsertOutcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the listing dataset inside the data directory
pub const LISTINGS_FILE: &str = "listings.csv";

/// Durable keyed collection of listing records
///
/// The store never deletes records: listings that disappear from discovery
/// (delisted items) are left untouched.
pub struct ListingStore {
    path: PathBuf,
    records: HashMap<ListingId, ListingRecord>,
}

impl ListingStore {
    /// Opens the dataset inside a data directory, creating an empty store
    /// when no dataset file exists yet
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        Self::load(data_dir.join(LISTINGS_FILE))
    }

    /// Loads the dataset from an explicit file path
    ///
    /// A missing file yields an empty store. An existing file that cannot
    /// be read back as listing rows yields [`StoreError::Corrupt`] — the
    /// caller decides whether to abort or start fresh, it is never decided
    /// silently here.
    pub fn load(path: PathBuf) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self {
                path,
                records: HashMap::new(),
            });
        }

        let mut reader =
            csv::Reader::from_path(&path).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut records: HashMap<ListingId, ListingRecord> = HashMap::new();
        for row in reader.deserialize::<ListingRecord>() {
            let record = row.map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            // Older dataset files may carry duplicate rows for one id;
            // keep the most recently checked one.
            match records.entry(record.id.clone()) {
                Entry::Occupied(mut existing) => {
                    if record.last_checked >= existing.get().last_checked {
                        existing.insert(record);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        tracing::debug!("Loaded {} listings from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    /// Returns the dataset file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &ListingId) -> Option<&ListingRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.records.contains_key(id)
    }

    /// Iterates over all records in unspecified order
    pub fn records(&self) -> impl Iterator<Item = &ListingRecord> {
        self.records.values()
    }

    /// Inserts a fresh extraction, or merges it into the existing record
    ///
    /// Merging overwrites field values, preserves the original
    /// `first_seen`, and never lets `last_checked` regress. Calling this
    /// twice with the same input leaves the store in the same state.
    pub fn upsert(&mut self, record: ListingRecord) -> UpsertOutcome {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().merge(record);
                UpsertOutcome::Updated
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Returns the ids of all records with `now - last_checked >= threshold`
    ///
    /// Ordered oldest-checked first so the most-overdue listings win under
    /// a limited fetch budget. Ties break on id to keep runs deterministic.
    pub fn stale_ids(&self, threshold: Duration, now: DateTime<Utc>) -> Vec<ListingId> {
        let mut stale: Vec<(&ListingRecord, &ListingId)> = self
            .records
            .iter()
            .filter(|(_, record)| now - record.last_checked >= threshold)
            .map(|(id, record)| (record, id))
            .collect();

        stale.sort_by(|a, b| {
            a.0.last_checked
                .cmp(&b.0.last_checked)
                .then_with(|| a.1.cmp(b.1))
        });

        stale.into_iter().map(|(_, id)| id.clone()).collect()
    }

    /// Writes the full table to durable storage
    ///
    /// The table is written to a sibling temp file which is then renamed
    /// over the dataset file, so a concurrent reader never observes a
    /// half-written dataset.
    pub fn persist(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;

            // Stable row order keeps diffs between runs readable
            let mut rows: Vec<&ListingRecord> = self.records.values().collect();
            rows.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.id.cmp(&b.id)));

            for record in rows {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(
            "Persisted {} listings to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}
