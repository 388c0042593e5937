//! One ingestion cycle: fetch a quote, then persist it.

use tracing::{info, instrument};

use crate::core::{IngestError, QuoteFetcher, RateRecord};
use crate::store::RateStore;

pub struct IngestionService<F, S> {
    fetcher: F,
    store: S,
}

impl<F, S> IngestionService<F, S>
where
    F: QuoteFetcher,
    S: RateStore,
{
    pub fn new(fetcher: F, store: S) -> Self {
        IngestionService { fetcher, store }
    }

    /// Fetches `pair` and writes it. The store is not touched if the fetch
    /// fails, and the returned error names the stage that stopped the cycle.
    #[instrument(name = "IngestOnce", skip(self))]
    pub async fn ingest_once(&self, pair: &str) -> Result<RateRecord, IngestError> {
        let record = self
            .fetcher
            .fetch(pair)
            .await
            .map_err(IngestError::Fetch)?;
        self.store
            .write(&record)
            .await
            .map_err(IngestError::Write)?;
        info!(
            rate = %record.exchange_rate(),
            observed_at = record.observed_at(),
            "Rate ingested"
        );
        Ok(record)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
