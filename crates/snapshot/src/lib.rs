//! Fee snapshots: the persisted record shapes, the store seam, and the two
//! lookups that run against them (freshest-snapshot read and fee-bucket match).

mod matcher;
mod model;
mod reader;
mod store;

pub use matcher::{match_wait_time, FeeBucket, WaitRange};
pub use model::{
    start_of_day_ms, Asset, BitcoinSnapshot, BitcoinTier, BitcoinTierKind, EthereumSnapshot,
    EthereumTier, EthereumTierKind, SnapshotKey, SnapshotRecord,
};
pub use reader::{find_fresh_snapshot, SnapshotError, DEFAULT_STALENESS};
pub use store::{SnapshotStore, StoreError, StoredSnapshot};
