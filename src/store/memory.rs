use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::{RateRecord, ReadError, WriteError};
use crate::store::{RateStore, StoredRate};

/// In-memory rate table, used for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<StoredRate>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn write(&self, record: &RateRecord) -> Result<(), WriteError> {
        let mut rows = self.rows.lock().await;
        let id = rows.last().map_or(1, |row| row.id + 1);
        debug!(id, pair = %record.currency_pair(), "Memory store INSERT");
        rows.push(StoredRate {
            id,
            currency_pair: record.currency_pair().to_string(),
            exchange_rate: record.exchange_rate(),
            observed_at: record.observed_at().to_string(),
        });
        Ok(())
    }

    async fn rows_for_pair(&self, pair: &str) -> Result<Vec<StoredRate>, ReadError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|row| row.currency_pair == pair)
            .cloned()
            .collect())
    }
}
