//! Static instrument catalog.
//!
//! Loaded once at boot from a JSON document and immutable afterwards.
//! Both the TradingView symbol and the broker symbol of an entry resolve
//! to the same token and lot size.

pub mod catalog;
pub mod error;

pub use catalog::{InstrumentCatalog, RawInstrument};
pub use error::{CatalogError, CatalogResult};
