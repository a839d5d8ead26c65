use super::ListingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes extracted from a listing page
///
/// The `listed_at` timestamp is reported by the marketplace itself and is
/// kept as an opaque string; `first_seen`/`last_checked` bookkeeping lives
/// on [`ListingRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFields {
    pub title: String,
    pub description: String,
    pub ad_type: String,
    pub price_type: String,
    pub price_cents: i64,
    pub seller_id: String,
    pub city_name: String,
    pub country_code: String,
    pub listed_at: String,
    pub view_count: u64,
    pub favorited_count: u64,
}

/// One row of the durable listing dataset
///
/// The row is flat so it serializes directly to a CSV record: extracted
/// field columns plus id, url and the two crawl timestamps.
///
/// Invariants:
/// - `id` uniquely determines at most one record in the store
/// - `last_checked` never decreases across recrawls of the same id
/// - `first_seen` is set once and preserved by every merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub ad_type: String,
    pub price_type: String,
    pub price_cents: i64,
    pub seller_id: String,
    pub city_name: String,
    pub country_code: String,
    pub listed_at: String,
    pub view_count: u64,
    pub favorited_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
}

impl ListingRecord {
    /// Creates a record from a fresh extraction
    ///
    /// Both timestamps start at `now`; a brand-new listing has
    /// `first_seen == last_checked`.
    pub fn new(id: ListingId, url: String, fields: ListingFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            url,
            title: fields.title,
            description: fields.description,
            ad_type: fields.ad_type,
            price_type: fields.price_type,
            price_cents: fields.price_cents,
            seller_id: fields.seller_id,
            city_name: fields.city_name,
            country_code: fields.country_code,
            listed_at: fields.listed_at,
            view_count: fields.view_count,
            favorited_count: fields.favorited_count,
            first_seen: now,
            last_checked: now,
        }
    }

    /// Merges a fresh extraction of the same listing into this record
    ///
    /// Field values are overwritten by the incoming extraction,
    /// `first_seen` is preserved, and `last_checked` takes the later of the
    /// two values so it never regresses.
    pub fn merge(&mut self, incoming: ListingRecord) {
        debug_assert_eq!(self.id, incoming.id);

        self.url = incoming.url;
        self.title = incoming.title;
        self.description = incoming.description;
        self.ad_type = incoming.ad_type;
        self.price_type = incoming.price_type;
        self.price_cents = incoming.price_cents;
        self.seller_id = incoming.seller_id;
        self.city_name = incoming.city_name;
        self.country_code = incoming.country_code;
        self.listed_at = incoming.listed_at;
        self.view_count = incoming.view_count;
        self.favorited_count = incoming.favorited_count;
        self.last_checked = self.last_checked.max(incoming.last_checked);
    }
}
