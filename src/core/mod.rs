//! Core domain types, valuation and the storage/warehouse seams

pub mod config;
pub mod decimal;
pub mod log;
pub mod news;
pub mod price;
pub mod queries;
pub mod storage;
pub mod valuation;
pub mod warehouse;

// Re-export main types for cleaner imports
pub use news::{Headline, NewsItem, NewsProvider};
pub use price::{CurrentPriceMap, PricePoint};
pub use storage::ObjectStore;
pub use warehouse::{Binding, Row, Warehouse};
