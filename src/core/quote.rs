//! Quote provider abstraction

use async_trait::async_trait;

use crate::core::error::FetchError;
use crate::core::rate::RateRecord;

#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Fetches the current rate for a `BASE/QUOTE` pair. Performs no retry.
    async fn fetch(&self, pair: &str) -> Result<RateRecord, FetchError>;
}
