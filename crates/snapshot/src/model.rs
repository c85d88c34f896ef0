use std::fmt;

use chrono::{DateTime, TimeZone};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::matcher::WaitRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    Bitcoin,
    Ethereum,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Bitcoin, Asset::Ethereum];

    /// Table holding this asset's day-partitioned snapshots.
    pub fn table(self) -> &'static str {
        match self {
            Asset::Bitcoin => "btc_info",
            Asset::Ethereum => "ether_info",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Asset::Bitcoin => "bitcoin",
            Asset::Ethereum => "ethereum",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition and sort key shared by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotKey {
    #[serde(rename = "day")]
    pub day_ms: i64,
    #[serde(rename = "created")]
    pub created_ms: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl SnapshotKey {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self {
            day_ms: start_of_day_ms(now),
            created_ms: now.timestamp_millis(),
            created_at: now
                .with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Milliseconds of the first instant of `now`'s calendar day in its own zone.
///
/// Midnight can be skipped by a DST transition; the first hour that exists is
/// used instead.
pub fn start_of_day_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let tz = now.timezone();
    let date = now.date_naive();
    (0..24)
        .find_map(|hour| {
            let naive = date.and_hms_opt(hour, 0, 0)?;
            tz.from_local_datetime(&naive).earliest()
        })
        .map(|start| start.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

/// A typed snapshot that can round-trip through a [`crate::SnapshotStore`].
pub trait SnapshotRecord: Serialize + DeserializeOwned + Send + Sync {
    const ASSET: Asset;

    fn key(&self) -> &SnapshotKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitcoinTierKind {
    Low,
    Normal,
    Fast,
}

impl BitcoinTierKind {
    pub const ALL: [BitcoinTierKind; 3] = [
        BitcoinTierKind::Low,
        BitcoinTierKind::Normal,
        BitcoinTierKind::Fast,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BitcoinTierKind::Low => "Low",
            BitcoinTierKind::Normal => "Normal",
            BitcoinTierKind::Fast => "Fast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinTier {
    /// Fee level in satoshi per byte.
    pub price: u64,
    /// `None` when no fee bucket covered `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinSnapshot {
    #[serde(flatten)]
    pub key: SnapshotKey,
    pub btc_price: f64,
    pub low: BitcoinTier,
    pub normal: BitcoinTier,
    pub fast: BitcoinTier,
}

impl BitcoinSnapshot {
    pub fn tier(&self, kind: BitcoinTierKind) -> &BitcoinTier {
        match kind {
            BitcoinTierKind::Low => &self.low,
            BitcoinTierKind::Normal => &self.normal,
            BitcoinTierKind::Fast => &self.fast,
        }
    }
}

impl SnapshotRecord for BitcoinSnapshot {
    const ASSET: Asset = Asset::Bitcoin;

    fn key(&self) -> &SnapshotKey {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EthereumTierKind {
    SafeLow,
    Average,
    Fast,
    Fastest,
}

impl EthereumTierKind {
    pub const ALL: [EthereumTierKind; 4] = [
        EthereumTierKind::SafeLow,
        EthereumTierKind::Average,
        EthereumTierKind::Fast,
        EthereumTierKind::Fastest,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EthereumTierKind::SafeLow => "Low",
            EthereumTierKind::Average => "Normal",
            EthereumTierKind::Fast => "Fast",
            EthereumTierKind::Fastest => "Fastest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthereumTier {
    /// Gas price as reported upstream: gwei multiplied by ten.
    pub price: f64,
    /// Expected wait in fractional minutes.
    pub wait: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumSnapshot {
    #[serde(flatten)]
    pub key: SnapshotKey,
    pub ether_price: f64,
    pub block_num: u64,
    pub block_time: f64,
    /// Network load in `0..=1`.
    pub speed: f64,
    pub safe_low: EthereumTier,
    pub average: EthereumTier,
    pub fast: EthereumTier,
    pub fastest: EthereumTier,
}

impl EthereumSnapshot {
    pub fn tier(&self, kind: EthereumTierKind) -> &EthereumTier {
        match kind {
            EthereumTierKind::SafeLow => &self.safe_low,
            EthereumTierKind::Average => &self.average,
            EthereumTierKind::Fast => &self.fast,
            EthereumTierKind::Fastest => &self.fastest,
        }
    }
}

impl SnapshotRecord for EthereumSnapshot {
    const ASSET: Asset = Asset::Ethereum;

    fn key(&self) -> &SnapshotKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn start_of_day_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 42, 13).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(start_of_day_ms(&now), midnight.timestamp_millis());
    }

    #[test]
    fn start_of_day_follows_the_local_calendar() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        // 22:30 UTC on the 9th is already 01:30 on the 10th at +03:00.
        let now = Utc
            .with_ymd_and_hms(2024, 3, 9, 22, 30, 0)
            .unwrap()
            .with_timezone(&tz);
        let local_midnight = tz.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(start_of_day_ms(&now), local_midnight.timestamp_millis());
    }

    #[test]
    fn key_carries_write_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let key = SnapshotKey::at(&now);
        assert_eq!(key.created_ms, now.timestamp_millis());
        assert_eq!(key.created_at, "2024-03-09T12:00:00.000Z");
        assert!(key.day_ms <= key.created_ms);
    }

    #[test]
    fn tiers_map_to_their_own_fields() {
        let tier = |price| BitcoinTier { price, wait: None };
        let snap = BitcoinSnapshot {
            key: SnapshotKey::at(&Utc::now()),
            btc_price: 1.0,
            low: tier(1),
            normal: tier(2),
            fast: tier(3),
        };
        let prices: Vec<u64> = BitcoinTierKind::ALL
            .iter()
            .map(|kind| snap.tier(*kind).price)
            .collect();
        assert_eq!(prices, vec![1, 2, 3]);
        assert_eq!(EthereumTierKind::SafeLow.label(), "Low");
        assert_eq!(EthereumTierKind::Average.label(), "Normal");
    }

    #[test]
    fn bitcoin_snapshot_serializes_with_partition_fields() {
        let snap = BitcoinSnapshot {
            key: SnapshotKey {
                day_ms: 10,
                created_ms: 20,
                created_at: "t".into(),
            },
            btc_price: 50_000.0,
            low: BitcoinTier {
                price: 5,
                wait: Some(WaitRange {
                    min_minutes: 30,
                    max_minutes: 60,
                }),
            },
            normal: BitcoinTier {
                price: 10,
                wait: None,
            },
            fast: BitcoinTier {
                price: 20,
                wait: None,
            },
        };
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["day"], 10);
        assert_eq!(value["created"], 20);
        assert_eq!(value["btcPrice"], 50_000.0);
        assert_eq!(value["low"]["wait"]["minMinutes"], 30);
        assert!(value["normal"].get("wait").is_none());

        let back: BitcoinSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snap);
    }
}
