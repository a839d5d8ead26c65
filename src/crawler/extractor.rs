//! Listing field extraction from marketplace HTML
//!
//! The marketplace serves server-rendered pages that embed their data as
//! JSON script payloads: search pages carry the result set under a
//! `__NEXT_DATA__` script, listing pages carry the listing object under a
//! `__CONFIG__` script next to a DOM description block. Extraction reads
//! those payloads; anything required that is missing surfaces as
//! [`ExtractError::IncompleteData`] and the affected listing is skipped
//! for the run.

use crate::listing::{ListingFields, ListingId};
use scraper::{Html, Selector};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Element id of the JSON payload embedded in search pages
const SEARCH_DATA_ID: &str = "__NEXT_DATA__";

/// Element id of the JSON payload embedded in listing pages
const LISTING_DATA_ID: &str = "__CONFIG__";

/// DOM block holding the listing description
const DESCRIPTION_SELECTOR: &str = "div.Description-description";

/// Item ids with this prefix are sponsored advertisement slots, not
/// real listings, and are never enqueued
const SPONSORED_PREFIX: &str = "a";

/// Errors produced by the extraction capability
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Required data missing from page: {0}")]
    IncompleteData(String),
}

/// A listing summary discovered on a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredListing {
    pub id: ListingId,
    pub url: String,
}

/// Extraction capability: turn fetched HTML into structured data
///
/// Injected into the scheduler alongside the fetcher so both can be faked
/// in tests.
pub trait Extractor: Send + Sync {
    /// Extracts listing summaries from a category search page
    ///
    /// An empty result is a valid answer: it means the category has run
    /// out of listings at this page.
    fn search_page(
        &self,
        html: &str,
        base_url: &Url,
    ) -> Result<Vec<DiscoveredListing>, ExtractError>;

    /// Extracts the full field set from a listing page
    fn listing(&self, html: &str) -> Result<ListingFields, ExtractError>;
}

/// Extractor over the marketplace's server-rendered pages
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn search_page(
        &self,
        html: &str,
        base_url: &Url,
    ) -> Result<Vec<DiscoveredListing>, ExtractError> {
        let document = Html::parse_document(html);
        let data = embedded_json(&document, SEARCH_DATA_ID)?;

        let listings = data
            .pointer("/props/pageProps/searchRequestAndResponse/listings")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::IncompleteData("search listings array".to_string()))?;

        let mut discovered = Vec::new();
        for entry in listings {
            let item_id = entry
                .get("itemId")
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::IncompleteData("itemId".to_string()))?;

            if item_id.starts_with(SPONSORED_PREFIX) {
                continue;
            }

            let vip_url = entry
                .get("vipUrl")
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::IncompleteData("vipUrl".to_string()))?;

            let url = base_url.join(vip_url).map_err(|e| {
                ExtractError::IncompleteData(format!("listing URL '{}': {}", vip_url, e))
            })?;

            discovered.push(DiscoveredListing {
                id: ListingId::new(item_id),
                url: url.to_string(),
            });
        }

        Ok(discovered)
    }

    fn listing(&self, html: &str) -> Result<ListingFields, ExtractError> {
        let document = Html::parse_document(html);
        let data = embedded_json(&document, LISTING_DATA_ID)?;

        let listing = data
            .get("listing")
            .ok_or_else(|| ExtractError::IncompleteData("listing object".to_string()))?;

        let title = normalize_whitespace(&str_field(listing, "title")?);
        let ad_type = str_field(listing, "adType")?;

        let price_info = listing
            .get("priceInfo")
            .ok_or_else(|| ExtractError::IncompleteData("priceInfo".to_string()))?;
        let price_type = str_field(price_info, "priceType")?;
        let price_cents = price_info
            .get("priceCents")
            .and_then(Value::as_i64)
            .ok_or_else(|| ExtractError::IncompleteData("priceCents".to_string()))?;

        let stats = listing
            .get("stats")
            .ok_or_else(|| ExtractError::IncompleteData("stats".to_string()))?;
        let view_count = stats
            .get("viewCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ExtractError::IncompleteData("viewCount".to_string()))?;
        let favorited_count = stats
            .get("favoritedCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ExtractError::IncompleteData("favoritedCount".to_string()))?;
        let listed_at = str_field(stats, "since")?;

        // Seller and location are not present on every listing
        let seller_id = opt_str(listing, "/sellerInformation/sellerId");
        let country_code = opt_str(listing, "/location/countryAbbreviation");
        let city_name = opt_str(listing, "/location/cityName");

        let description = description_text(&document)?;

        Ok(ListingFields {
            title,
            description,
            ad_type,
            price_type,
            price_cents,
            seller_id,
            city_name,
            country_code,
            listed_at,
            view_count,
            favorited_count,
        })
    }
}

/// Finds and parses a JSON script payload by element id
fn embedded_json(document: &Html, element_id: &str) -> Result<Value, ExtractError> {
    let selector = Selector::parse(&format!("script#{}", element_id))
        .map_err(|_| ExtractError::IncompleteData(format!("selector for #{}", element_id)))?;

    let script = document.select(&selector).next().ok_or_else(|| {
        ExtractError::IncompleteData(format!("embedded data script #{}", element_id))
    })?;

    let raw = script.text().collect::<String>();
    serde_json::from_str(&raw).map_err(|e| {
        ExtractError::IncompleteData(format!("embedded JSON #{}: {}", element_id, e))
    })
}

/// Extracts and normalizes the listing description block
fn description_text(document: &Html) -> Result<String, ExtractError> {
    let selector = Selector::parse(DESCRIPTION_SELECTOR)
        .map_err(|_| ExtractError::IncompleteData("description selector".to_string()))?;

    let element = document
        .select(&selector)
        .next()
        .ok_or_else(|| ExtractError::IncompleteData("listing description".to_string()))?;

    let text = element.text().collect::<Vec<_>>().join(" ");
    Ok(normalize_whitespace(&text))
}

fn str_field(value: &Value, key: &str) -> Result<String, ExtractError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExtractError::IncompleteData(format!("field '{}'", key)))
}

fn opt_str(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Collapses runs of whitespace into single spaces
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
