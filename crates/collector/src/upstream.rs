use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use snapshot::FeeBucket;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BITCOINFEES_URL: &str = "https://bitcoinfees.earn.com/api/v1/fees";
pub const DEFAULT_GAS_STATION_URL: &str = "https://ethgasstation.info/json/ethgasAPI.json";
pub const DEFAULT_TICKER_URL: &str = "https://api.coinmarketcap.com/v1/ticker/?limit=5";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("ticker list has no entry for `{0}`")]
    MissingTicker(String),

    #[error("ticker `{0}` carries no usd price")]
    MissingPrice(String),
}

/// `GET {bitcoinfees}/recommended`, in satoshi per byte.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct FeeList {
    fees: Vec<FeeBucket>,
}

/// Gas station report. Prices are gwei times ten, waits are minutes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasStationReport {
    pub safe_low: f64,
    pub average: f64,
    pub fast: f64,
    pub fastest: f64,
    pub safe_low_wait: f64,
    pub avg_wait: f64,
    pub fast_wait: f64,
    pub fastest_wait: f64,
    pub block_num: u64,
    #[serde(rename = "block_time")]
    pub block_time: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ticker {
    pub id: String,
    #[serde(default, deserialize_with = "decimal_or_number")]
    pub price_usd: Option<f64>,
}

/// The ticker API quotes prices as decimal strings.
fn decimal_or_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// USD price of the ticker entry with `id`.
pub fn ticker_price(tickers: &[Ticker], id: &str) -> Result<f64, UpstreamError> {
    let ticker = tickers
        .iter()
        .find(|ticker| ticker.id == id)
        .ok_or_else(|| UpstreamError::MissingTicker(id.to_string()))?;
    ticker
        .price_usd
        .ok_or_else(|| UpstreamError::MissingPrice(id.to_string()))
}

/// Read-only fee and price feeds the collector pulls from.
#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn bitcoin_recommended(&self) -> Result<RecommendedFees, UpstreamError>;

    async fn bitcoin_fee_list(&self) -> Result<Vec<FeeBucket>, UpstreamError>;

    async fn ethereum_gas(&self) -> Result<GasStationReport, UpstreamError>;

    async fn tickers(&self) -> Result<Vec<Ticker>, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base of the bitcoinfees API; `/recommended` and `/list` are appended.
    pub bitcoinfees: String,
    pub gas_station: String,
    pub ticker: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            bitcoinfees: DEFAULT_BITCOINFEES_URL.to_string(),
            gas_station: DEFAULT_GAS_STATION_URL.to_string(),
            ticker: DEFAULT_TICKER_URL.to_string(),
        }
    }
}

impl Endpoints {
    fn bitcoin_recommended(&self) -> String {
        format!("{}/recommended", self.bitcoinfees.trim_end_matches('/'))
    }

    fn bitcoin_fee_list(&self) -> String {
        format!("{}/list", self.bitcoinfees.trim_end_matches('/'))
    }
}

pub struct HttpFeeSource {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpFeeSource {
    pub fn new(endpoints: Endpoints) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| UpstreamError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, endpoints })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let http = |source| UpstreamError::Http {
            url: url.to_string(),
            source,
        };
        debug!(url, "fetching upstream");
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http)?
            .json()
            .await
            .map_err(http)
    }
}

#[async_trait]
impl FeeSource for HttpFeeSource {
    async fn bitcoin_recommended(&self) -> Result<RecommendedFees, UpstreamError> {
        self.get_json(&self.endpoints.bitcoin_recommended()).await
    }

    async fn bitcoin_fee_list(&self) -> Result<Vec<FeeBucket>, UpstreamError> {
        let list: FeeList = self.get_json(&self.endpoints.bitcoin_fee_list()).await?;
        Ok(list.fees)
    }

    async fn ethereum_gas(&self) -> Result<GasStationReport, UpstreamError> {
        self.get_json(&self.endpoints.gas_station).await
    }

    async fn tickers(&self) -> Result<Vec<Ticker>, UpstreamError> {
        self.get_json(&self.endpoints.ticker).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_prices_parse_from_strings() {
        let raw = r#"[
            {"id": "bitcoin", "symbol": "BTC", "price_usd": "6512.34"},
            {"id": "ethereum", "price_usd": 210.5},
            {"id": "delisted", "price_usd": null}
        ]"#;
        let tickers: Vec<Ticker> = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker_price(&tickers, "bitcoin").unwrap(), 6512.34);
        assert_eq!(ticker_price(&tickers, "ethereum").unwrap(), 210.5);
        assert!(matches!(
            ticker_price(&tickers, "delisted"),
            Err(UpstreamError::MissingPrice(_))
        ));
        assert!(matches!(
            ticker_price(&tickers, "litecoin"),
            Err(UpstreamError::MissingTicker(id)) if id == "litecoin"
        ));
    }

    #[test]
    fn unparseable_price_is_rejected() {
        let raw = r#"[{"id": "bitcoin", "price_usd": "n/a"}]"#;
        assert!(serde_json::from_str::<Vec<Ticker>>(raw).is_err());
    }

    #[test]
    fn gas_station_report_decodes() {
        let raw = r#"{"fast": 200.0, "fastest": 400.0, "safeLow": 15.0, "average": 100.0,
            "block_time": 14.3, "blockNum": 7000000, "speed": 0.85,
            "safeLowWait": 0.5, "avgWait": 1.2, "fastWait": 0.7, "fastestWait": 0.6}"#;
        let report: GasStationReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.block_num, 7_000_000);
        assert_eq!(report.block_time, 14.3);
        assert_eq!(report.avg_wait, 1.2);
    }

    #[test]
    fn fee_list_endpoints_extend_the_base() {
        let endpoints = Endpoints {
            bitcoinfees: "http://localhost:8080/fees/".into(),
            ..Endpoints::default()
        };
        assert_eq!(
            endpoints.bitcoin_recommended(),
            "http://localhost:8080/fees/recommended"
        );
        assert_eq!(endpoints.bitcoin_fee_list(), "http://localhost:8080/fees/list");
    }
}
