use std::{fs, net::SocketAddr, path::Path, time::Duration};

use anyhow::bail;
use bot_ipc::DEFAULT_SOCKET_PATH;
use clap::Parser;
use collector::{Endpoints, DEFAULT_BITCOINFEES_URL, DEFAULT_GAS_STATION_URL, DEFAULT_TICKER_URL};
use snapshot::DEFAULT_STALENESS;
use tracing::info;

const MEMORY_PREFIX: &str = "sqlite::memory:";
const URL_PREFIX: &str = "sqlite://";

#[derive(Parser, Debug, Clone)]
#[command(name = "feebotd", about = "Collects network fee snapshots and answers fee commands")]
pub struct Args {
    #[arg(long, env = "SQLITE_PATH", default_value = "sqlite://feebot.db?mode=rwc")]
    pub sqlite_path: String,

    #[arg(long, env = "BOT_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub bot_socket: String,

    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9109")]
    pub metrics_addr: SocketAddr,

    /// Seconds between collector runs.
    #[arg(
        long,
        env = "COLLECT_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub collect_interval_secs: u64,

    /// Oldest snapshot age, in seconds, a command will still answer with.
    #[arg(long, env = "STALENESS_SECS", default_value_t = DEFAULT_STALENESS.as_secs())]
    pub staleness_secs: u64,

    #[arg(long, env = "BITCOINFEES_URL", default_value = DEFAULT_BITCOINFEES_URL)]
    pub bitcoinfees_url: String,

    #[arg(long, env = "GAS_STATION_URL", default_value = DEFAULT_GAS_STATION_URL)]
    pub gas_station_url: String,

    #[arg(long, env = "TICKER_URL", default_value = DEFAULT_TICKER_URL)]
    pub ticker_url: String,
}

impl Args {
    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            bitcoinfees: self.bitcoinfees_url.clone(),
            gas_station: self.gas_station_url.clone(),
            ticker: self.ticker_url.clone(),
        }
    }
}

pub fn log_startup(args: &Args, run_id: &str) {
    info!(path = %args.sqlite_path, "sqlite path configured");
    info!(socket = %args.bot_socket, "bot socket bind planned");
    info!(addr = %args.metrics_addr, "metrics bind planned");
    info!(
        interval_secs = args.collect_interval_secs,
        staleness_secs = args.staleness_secs,
        "collector schedule configured"
    );
    info!(
        bitcoinfees = %args.bitcoinfees_url,
        gas_station = %args.gas_station_url,
        ticker = %args.ticker_url,
        "upstream endpoints configured"
    );
    info!(%run_id, "run initialized");
}

/// Filesystem part of a `sqlite://` url, without query parameters.
fn sqlite_file_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(URL_PREFIX)?;
    Some(rest.split_once('?').map(|(path, _)| path).unwrap_or(rest))
}

pub fn validate_sqlite_path(path: &str) -> anyhow::Result<()> {
    if path.starts_with(MEMORY_PREFIX) {
        return Ok(());
    }

    match sqlite_file_path(path) {
        None => bail!("sqlite path must start with `sqlite://` or use `sqlite::memory:`"),
        Some("") => bail!("sqlite path is missing a filesystem component after `sqlite://`"),
        Some(_) => Ok(()),
    }
}

pub fn ensure_sqlite_parent_dir(path: &str) -> anyhow::Result<()> {
    if path.starts_with(MEMORY_PREFIX) {
        return Ok(());
    }

    if let Some(parent) = sqlite_file_path(path).and_then(|file| Path::new(file).parent()) {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}
