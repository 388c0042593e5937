//! Rate persistence: the PostgreSQL gateway and an in-memory stand-in

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::{RateRecord, ReadError, WriteError};

pub use memory::MemoryStore;
pub use postgres::{PgGateway, SchemaReport};

/// A row of the `forex_data` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRate {
    pub id: i32,
    pub currency_pair: String,
    pub exchange_rate: Decimal,
    pub observed_at: String,
}

impl StoredRate {
    /// True when the row holds exactly the fields of `record`.
    pub fn matches(&self, record: &RateRecord) -> bool {
        self.currency_pair == record.currency_pair().as_str()
            && self.exchange_rate == record.exchange_rate()
            && self.observed_at == record.observed_at()
    }
}

/// Append-only sink for rate records.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persists one record, committed before returning.
    async fn write(&self, record: &RateRecord) -> Result<(), WriteError>;

    /// All stored rows for a pair, oldest first.
    async fn rows_for_pair(&self, pair: &str) -> Result<Vec<StoredRate>, ReadError>;
}
