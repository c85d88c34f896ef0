use std::{sync::Arc, time::Duration};

use bot_ipc::{BotRequest, BotResponse, BotStatus, FeeCommand, Reply};
use chrono::{DateTime, TimeZone};
use collector::{collect_bitcoin_snapshot, collect_ethereum_snapshot, CollectError, FeeSource};
use metrics::{MetricsHandle, Outcome};
use snapshot::{find_fresh_snapshot, Asset, BitcoinSnapshot, EthereumSnapshot, SnapshotError};
use storage::Store;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub run_id: String,
    pub store: Store,
    pub source: Arc<dyn FeeSource>,
    pub metrics: MetricsHandle,
    pub staleness: Duration,
    pub collect_interval: Duration,
}

impl AppState {
    fn status(&self) -> BotStatus {
        BotStatus {
            run_id: self.run_id.clone(),
            collect_interval_secs: self.collect_interval.as_secs(),
            staleness_secs: self.staleness.as_secs(),
        }
    }
}

/// Answers one bot request. Every request gets a response.
///
/// `clock` is read when a lookup runs and when each snapshot is written.
pub async fn respond<Tz, C>(state: &AppState, req: BotRequest, clock: C) -> BotResponse
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
{
    match req {
        BotRequest::BitcoinFees => {
            BotResponse::Reply(fee_reply(state, FeeCommand::Bitcoin, &clock()).await)
        }
        BotRequest::EthereumFees => {
            BotResponse::Reply(fee_reply(state, FeeCommand::Ethereum, &clock()).await)
        }
        BotRequest::Text(text) => {
            BotResponse::Reply(fee_reply(state, FeeCommand::route(&text), &clock()).await)
        }
        BotRequest::Collect => {
            let failed = collect_all(state, clock).await;
            if failed.is_empty() {
                BotResponse::Ack
            } else {
                let assets: Vec<&str> = failed.iter().map(|asset| asset.as_str()).collect();
                BotResponse::Error(format!("collection failed for: {}", assets.join(", ")))
            }
        }
        BotRequest::Status => BotResponse::Status(state.status()),
    }
}

/// Freshest snapshot for `command` rendered as a reply, or the not-found / failure text.
pub async fn fee_reply<Tz: TimeZone>(
    state: &AppState,
    command: FeeCommand,
    now: &DateTime<Tz>,
) -> Reply {
    let lookup: Result<Option<Reply>, SnapshotError> = match command {
        FeeCommand::Bitcoin => {
            find_fresh_snapshot::<BitcoinSnapshot, _>(&state.store, now, state.staleness)
                .await
                .map(|found| found.as_ref().map(presenter::bitcoin_reply))
        }
        FeeCommand::Ethereum => {
            find_fresh_snapshot::<EthereumSnapshot, _>(&state.store, now, state.staleness)
                .await
                .map(|found| found.as_ref().map(presenter::ethereum_reply))
        }
    };

    let (reply, outcome) = match lookup {
        Ok(Some(reply)) => (reply, Outcome::Ok),
        Ok(None) => (Reply::not_found(), Outcome::NotFound),
        Err(err) => {
            error!(command = command.as_str(), error = %err, "fee lookup failed");
            (Reply::failure(), Outcome::Failed)
        }
    };
    state.metrics.record_command(command.as_str(), outcome);
    reply
}

/// Runs both collectors one after the other; returns the assets whose run failed.
///
/// Each snapshot is stamped from `clock` when it is written, so a slow bitcoin
/// run does not age the ethereum snapshot behind it.
pub async fn collect_all<Tz, C>(state: &AppState, clock: C) -> Vec<Asset>
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
{
    let source = state.source.as_ref();
    let mut failed = Vec::new();

    let bitcoin = collect_bitcoin_snapshot(source, &state.store, &clock)
        .await
        .map(drop);
    if !record_collection(state, Asset::Bitcoin, bitcoin).await {
        failed.push(Asset::Bitcoin);
    }

    let ethereum = collect_ethereum_snapshot(source, &state.store, &clock)
        .await
        .map(drop);
    if !record_collection(state, Asset::Ethereum, ethereum).await {
        failed.push(Asset::Ethereum);
    }

    failed
}

async fn record_collection(
    state: &AppState,
    asset: Asset,
    result: Result<(), CollectError>,
) -> bool {
    let err = match result {
        Ok(()) => {
            state.metrics.record_collection(asset.as_str(), Outcome::Ok);
            return true;
        }
        Err(err) => err,
    };

    warn!(%asset, error = %err, "snapshot collection failed");
    state.metrics.record_collection(asset.as_str(), Outcome::Failed);
    if let Err(log_err) = state
        .store
        .log_incident(
            &state.run_id,
            "warning",
            "collect_failed",
            &format!("{asset}: {err}"),
        )
        .await
    {
        warn!(error = ?log_err, "failed to record collection incident");
    }
    false
}
