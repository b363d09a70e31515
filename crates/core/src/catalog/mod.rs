//! Stamp catalog records as mirrored locally.
//!
//! `CatalogRecord` is what list views render; `RawCatalogItem` keeps the
//! hierarchy links the drill-down browser groups by.

mod projection;
mod types;

pub use projection::project_raw_items;
pub use types::*;
