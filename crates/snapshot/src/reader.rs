use std::time::Duration;

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tracing::debug;

use crate::model::{start_of_day_ms, Asset, SnapshotRecord};
use crate::store::{SnapshotStore, StoreError};

/// Oldest snapshot age still worth answering with.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(6 * 60);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to decode {asset} snapshot: {source}")]
    Decode {
        asset: Asset,
        #[source]
        source: serde_json::Error,
    },
}

/// Freshest snapshot of `R`'s asset written today and within `staleness` of `now`.
///
/// Returns `Ok(None)` when the window is empty.
pub async fn find_fresh_snapshot<R, Tz>(
    store: &dyn SnapshotStore,
    now: &DateTime<Tz>,
    staleness: Duration,
) -> Result<Option<R>, SnapshotError>
where
    R: SnapshotRecord,
    Tz: TimeZone,
{
    let day_ms = start_of_day_ms(now);
    let window_ms = i64::try_from(staleness.as_millis()).unwrap_or(i64::MAX);
    let created_after_ms = now.timestamp_millis().saturating_sub(window_ms);

    let mut rows = store.query(R::ASSET, day_ms, created_after_ms).await?;
    // Stable: rows sharing a `created` keep the backend's order.
    rows.sort_by(|a, b| b.created_ms.cmp(&a.created_ms));

    let Some(freshest) = rows.into_iter().next() else {
        debug!(asset = %R::ASSET, day_ms, created_after_ms, "no fresh snapshot");
        return Ok(None);
    };
    debug!(asset = %R::ASSET, created_ms = freshest.created_ms, "fresh snapshot found");

    freshest
        .decode()
        .map(Some)
        .map_err(|source| SnapshotError::Decode {
            asset: R::ASSET,
            source,
        })
}
