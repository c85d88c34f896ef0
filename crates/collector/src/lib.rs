//! Builds one snapshot per asset from the upstream feeds and appends it to the store.

mod upstream;

use chrono::{DateTime, TimeZone};
use snapshot::{
    match_wait_time, BitcoinSnapshot, BitcoinTier, BitcoinTierKind, EthereumSnapshot,
    EthereumTier, FeeBucket, SnapshotKey, SnapshotStore, StoreError, StoredSnapshot,
};
use thiserror::Error;
use tracing::{info, warn};

pub use upstream::{
    ticker_price, Endpoints, FeeSource, GasStationReport, HttpFeeSource, RecommendedFees, Ticker,
    UpstreamError, DEFAULT_BITCOINFEES_URL, DEFAULT_GAS_STATION_URL, DEFAULT_TICKER_URL,
};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

fn bitcoin_tier(kind: BitcoinTierKind, price: u64, buckets: &[FeeBucket]) -> BitcoinTier {
    let wait = match_wait_time(price, buckets);
    if wait.is_none() {
        warn!(tier = kind.label(), fee = price, "no fee bucket covers tier fee");
    }
    BitcoinTier { price, wait }
}

/// Fetches bitcoin fees and price, then writes exactly one snapshot.
///
/// The snapshot is stamped by `clock` once every fetch has returned. Nothing is
/// written if any upstream call fails.
pub async fn collect_bitcoin_snapshot<Tz, C>(
    source: &dyn FeeSource,
    store: &dyn SnapshotStore,
    clock: C,
) -> Result<BitcoinSnapshot, CollectError>
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
{
    let recommended = source.bitcoin_recommended().await?;
    let buckets = source.bitcoin_fee_list().await?;
    let tickers = source.tickers().await?;
    let btc_price = ticker_price(&tickers, "bitcoin")?;

    let snapshot = BitcoinSnapshot {
        key: SnapshotKey::at(&clock()),
        btc_price,
        low: bitcoin_tier(BitcoinTierKind::Low, recommended.hour_fee, &buckets),
        normal: bitcoin_tier(BitcoinTierKind::Normal, recommended.half_hour_fee, &buckets),
        fast: bitcoin_tier(BitcoinTierKind::Fast, recommended.fastest_fee, &buckets),
    };
    store.put(&StoredSnapshot::encode(&snapshot)?).await?;
    info!(
        created_ms = snapshot.key.created_ms,
        btc_price,
        low = snapshot.low.price,
        normal = snapshot.normal.price,
        fast = snapshot.fast.price,
        "bitcoin snapshot collected"
    );
    Ok(snapshot)
}

/// Fetches the gas station report and ether price, then writes one snapshot
/// stamped by `clock` after the fetches.
pub async fn collect_ethereum_snapshot<Tz, C>(
    source: &dyn FeeSource,
    store: &dyn SnapshotStore,
    clock: C,
) -> Result<EthereumSnapshot, CollectError>
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
{
    let gas = source.ethereum_gas().await?;
    let tickers = source.tickers().await?;
    let ether_price = ticker_price(&tickers, "ethereum")?;

    let snapshot = EthereumSnapshot {
        key: SnapshotKey::at(&clock()),
        ether_price,
        block_num: gas.block_num,
        block_time: gas.block_time,
        speed: gas.speed,
        safe_low: EthereumTier {
            price: gas.safe_low,
            wait: gas.safe_low_wait,
        },
        average: EthereumTier {
            price: gas.average,
            wait: gas.avg_wait,
        },
        fast: EthereumTier {
            price: gas.fast,
            wait: gas.fast_wait,
        },
        fastest: EthereumTier {
            price: gas.fastest,
            wait: gas.fastest_wait,
        },
    };
    store.put(&StoredSnapshot::encode(&snapshot)?).await?;
    info!(
        created_ms = snapshot.key.created_ms,
        ether_price,
        block_num = snapshot.block_num,
        "ethereum snapshot collected"
    );
    Ok(snapshot)
}
