use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Asset, SnapshotRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("stored payload for {asset} is not valid json: {source}")]
    Payload {
        asset: Asset,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// Schema-less row as the store sees it: key columns plus the full record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub asset: Asset,
    pub day_ms: i64,
    pub created_ms: i64,
    pub created_at: String,
    pub payload: serde_json::Value,
}

impl StoredSnapshot {
    pub fn encode<R: SnapshotRecord>(record: &R) -> Result<Self, serde_json::Error> {
        let key = record.key();
        Ok(Self {
            asset: R::ASSET,
            day_ms: key.day_ms,
            created_ms: key.created_ms,
            created_at: key.created_at.clone(),
            payload: serde_json::to_value(record)?,
        })
    }

    pub fn decode<R: SnapshotRecord>(self) -> Result<R, serde_json::Error> {
        serde_json::from_value(self.payload)
    }
}

/// Day-partitioned, `created`-sorted snapshot storage, one table per asset.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, snapshot: &StoredSnapshot) -> Result<(), StoreError>;

    /// Rows of `asset` in partition `day_ms` with `created_ms > created_after_ms`.
    /// Ordering is backend-defined.
    async fn query(
        &self,
        asset: Asset,
        day_ms: i64,
        created_after_ms: i64,
    ) -> Result<Vec<StoredSnapshot>, StoreError>;
}
