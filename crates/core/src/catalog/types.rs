//! Types for the stamp catalog mirror.

use serde::{Deserialize, Serialize};

use crate::store::CacheRecord;

/// A stamp, flattened for display.
///
/// `country`, `seriesName` and `issueYear` are indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    /// Opaque identifier, unique across the store.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denomination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perforation: Option<String>,
    /// e.g. "stamp", "variety", "sheet".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "MarketValues::is_empty")]
    pub market_values: MarketValues,
}

impl CacheRecord for CatalogRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Catalogue market values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<f64>,
    /// ISO 4217 code the values are quoted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl MarketValues {
    pub fn is_empty(&self) -> bool {
        self.mint.is_none() && self.used.is_none() && self.currency.is_none()
    }
}

/// A catalog item as delivered by the remote API, restricted to the fields
/// the drill-down views use.
///
/// Build one from an arbitrary payload with [`RawCatalogItem::project`];
/// fields not listed here are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCatalogItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denomination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perforation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_stamp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
}

impl CacheRecord for RawCatalogItem {
    fn record_id(&self) -> &str {
        &self.id
    }
}
