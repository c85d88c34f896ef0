//! Newline-delimited JSON command channel between `feebotctl` (or any chat
//! front-end) and the daemon, one request and one response per connection.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

pub use presenter::Reply;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/feebot.sock";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum BotRequest {
    BitcoinFees,
    EthereumFees,
    /// Free-form chat text, routed the way the chat bot routes it.
    Text(String),
    /// Run both collectors now instead of waiting for the next tick.
    Collect,
    Status,
}

/// Which fee table a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCommand {
    Bitcoin,
    Ethereum,
}

impl FeeCommand {
    /// Only the `/btc` command (optionally addressed as `/btc@bot`) asks for
    /// bitcoin; every other message gets the ethereum table.
    pub fn route(text: &str) -> Self {
        let word = text.split_whitespace().next().unwrap_or_default();
        let word = word.split('@').next().unwrap_or_default();
        if word == "/btc" {
            FeeCommand::Bitcoin
        } else {
            FeeCommand::Ethereum
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeeCommand::Bitcoin => "btc",
            FeeCommand::Ethereum => "eth",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BotStatus {
    pub run_id: String,
    pub collect_interval_secs: u64,
    pub staleness_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum BotResponse {
    Reply(Reply),
    Status(BotStatus),
    Ack,
    Error(String),
}

pub async fn run_server<F, Fut>(socket_path: &str, handler: F) -> Result<()>
where
    F: Fn(BotRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BotResponse>> + Send + 'static,
{
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    let handler = Arc::new(handler);
    info!(socket = socket_path, "bot ipc listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(stream, handler).await {
                warn!(error = ?err, "bot ipc connection error");
            }
        });
    }
}

async fn handle_stream<F, Fut>(stream: UnixStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(BotRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BotResponse>> + Send + 'static,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    let resp = match serde_json::from_str::<BotRequest>(buf.trim()) {
        Ok(req) => handler(req).await.unwrap_or_else(|err| {
            warn!(error = ?err, "bot ipc handler failed");
            BotResponse::Error(err.to_string())
        }),
        Err(err) => BotResponse::Error(format!("malformed request: {err}")),
    };
    let line = serde_json::to_string(&resp)? + "\n";
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn send_request(socket_path: &str, req: &BotRequest) -> Result<BotResponse> {
    let mut stream = UnixStream::connect(socket_path).await?;
    let line = serde_json::to_string(req)? + "\n";
    stream.write_all(line.as_bytes()).await?;
    let (read_half, _) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let _ = reader.read_line(&mut buf).await?;
    let resp: BotResponse = serde_json::from_str(buf.trim())?;
    Ok(resp)
}
