//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use stampcache_core::testing::{fixtures, MockCatalogSource};
//!
//! let source = MockCatalogSource::new();
//! source.set_records(fixtures::catalog_records(10)).await;
//! source.set_raw_items(fixtures::raw_payloads(10)).await;
//! ```

mod mock_catalog_source;

pub use mock_catalog_source::MockCatalogSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::catalog::{CatalogRecord, MarketValues};

    const COUNTRIES: &[&str] = &["Great Britain", "France", "Peru", "Japan", "Canada"];

    /// Create a catalog record with reasonable defaults.
    pub fn catalog_record(id: &str, name: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: name.to_string(),
            country: Some("Great Britain".to_string()),
            series_name: Some("Definitives".to_string()),
            issue_year: Some(1935),
            denomination: Some("1d".to_string()),
            color: Some("scarlet".to_string()),
            paper: Some("wove".to_string()),
            watermark: Some("Multiple Crown".to_string()),
            perforation: Some("15x14".to_string()),
            item_type: Some("stamp".to_string()),
            image_url: Some(format!("https://images.example.org/{}.jpg", id)),
            market_values: MarketValues {
                mint: Some(2.5),
                used: Some(0.4),
                currency: Some("GBP".to_string()),
            },
        }
    }

    /// Create `n` records with distinct ids, spread over a few countries and years.
    pub fn catalog_records(n: usize) -> Vec<CatalogRecord> {
        (0..n)
            .map(|i| {
                let mut record =
                    catalog_record(&format!("stamp-{:05}", i), &format!("Stamp {}", i));
                record.country = Some(COUNTRIES[i % COUNTRIES.len()].to_string());
                record.issue_year = Some(1900 + (i % 100) as i32);
                record
            })
            .collect()
    }

    /// Create a raw API payload, including a field the projection drops.
    pub fn raw_payload(id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Item {}", id),
            "country": "France",
            "seriesName": "Sower",
            "issueYear": 1906,
            "parentStampId": "stamp-00001",
            "stampGroupId": "group-sower",
            "categoryId": "definitives",
            "releaseId": "release-1906",
            "mintValue": 12.0,
            "createdBy": "import-job",
        })
    }

    /// Create `n` raw payloads with distinct ids.
    pub fn raw_payloads(n: usize) -> Vec<Value> {
        (0..n).map(|i| raw_payload(&format!("raw-{:05}", i))).collect()
    }
}
