//! Core domain types and application plumbing

pub mod config;
pub mod error;
pub mod log;
pub mod quote;
pub mod rate;

// Re-export main types for cleaner imports
pub use error::{
    ConnectionError, FetchError, IngestError, ReadError, SchemaError, Stage, WriteError,
};
pub use quote::QuoteFetcher;
pub use rate::{CurrencyPair, RateRecord};
