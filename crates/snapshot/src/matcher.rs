use serde::{Deserialize, Serialize};

/// One entry of the upstream fee histogram: a fee range and the delay seen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBucket {
    pub min_fee: u64,
    pub max_fee: u64,
    pub min_minutes: u64,
    pub max_minutes: u64,
    #[serde(default)]
    pub min_delay: u64,
    #[serde(default)]
    pub max_delay: u64,
    #[serde(default)]
    pub day_count: u64,
    #[serde(default)]
    pub mem_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitRange {
    pub min_minutes: u64,
    pub max_minutes: u64,
}

impl From<&FeeBucket> for WaitRange {
    fn from(bucket: &FeeBucket) -> Self {
        Self {
            min_minutes: bucket.min_minutes,
            max_minutes: bucket.max_minutes,
        }
    }
}

/// Wait estimate of the bucket whose inclusive fee range contains `fee_level`.
///
/// Buckets may overlap; the last matching one in iteration order wins.
// TODO: last-match-wins is what the bot has always answered with; switching to
// the narrowest match needs a product call before it changes.
pub fn match_wait_time(fee_level: u64, buckets: &[FeeBucket]) -> Option<WaitRange> {
    buckets
        .iter()
        .rev()
        .find(|bucket| bucket.min_fee <= fee_level && fee_level <= bucket.max_fee)
        .map(WaitRange::from)
}
