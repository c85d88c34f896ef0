mod config;
mod handlers;

use std::{future, sync::Arc};

use anyhow::Context;
use bot_ipc::BotRequest;
use chrono::Local;
use clap::Parser;
use collector::HttpFeeSource;
use metrics::MetricsHandle;
use storage::init_sqlite;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn, Level};
use uuid::Uuid;

use crate::config::{ensure_sqlite_parent_dir, log_startup, validate_sqlite_path, Args};
use crate::handlers::{collect_all, respond, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    validate_sqlite_path(&args.sqlite_path)?;
    info!(
        sqlite = %args.sqlite_path,
        socket = %args.bot_socket,
        "booting feebotd"
    );

    ensure_sqlite_parent_dir(&args.sqlite_path)?;

    let run_id = Uuid::new_v4().to_string();
    let store = init_sqlite(&args.sqlite_path).await?;
    store.insert_run(&run_id, env!("CARGO_PKG_VERSION")).await?;
    log_startup(&args, &run_id);

    let missing_tables = store.validate_required_tables().await?;
    if !missing_tables.is_empty() {
        warn!(tables = ?missing_tables, "sqlite missing required tables");
        if let Err(err) = store
            .log_incident(
                &run_id,
                "warning",
                "db_schema_missing",
                &format!(
                    "sqlite missing required tables: {}",
                    missing_tables.join(", ")
                ),
            )
            .await
        {
            warn!(error = ?err, "failed to log missing schema incident");
        }
    }

    let source = HttpFeeSource::new(args.endpoints()).context("building upstream http client")?;
    let metrics = MetricsHandle::new()?;
    let state = AppState {
        run_id: run_id.clone(),
        store: store.clone(),
        source: Arc::new(source),
        metrics: metrics.clone(),
        staleness: args.staleness(),
        collect_interval: args.collect_interval(),
    };

    let ipc_state = state.clone();
    let socket_path = args.bot_socket.clone();
    task::spawn(async move {
        let handler = move |req: BotRequest| {
            let state = ipc_state.clone();
            async move { Ok::<_, anyhow::Error>(respond(&state, req, Local::now).await) }
        };
        if let Err(err) = bot_ipc::run_server(&socket_path, handler).await {
            tracing::error!(error = ?err, "bot ipc server failed");
        }
    });

    let metrics_addr = args.metrics_addr;
    task::spawn(async move {
        if let Err(err) = metrics.serve(metrics_addr).await {
            tracing::error!(error = ?err, "metrics server error");
        }
    });

    info!(
        run_id = %run_id,
        sqlite = %args.sqlite_path,
        bot_socket = %args.bot_socket,
        metrics_addr = %args.metrics_addr,
        "ready"
    );
    if let Err(err) = store
        .log_incident(&run_id, "info", "ready", "feebotd booted and ready")
        .await
    {
        warn!(error = ?err, "failed to record ready incident");
    }

    let collect_state = state.clone();
    task::spawn(async move {
        let mut ticker = time::interval(collect_state.collect_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let failed = collect_all(&collect_state, Local::now).await;
            if !failed.is_empty() {
                warn!(assets = ?failed, "collection tick incomplete");
            }
        }
    });

    info!(run_id = %run_id, "started");

    // keep running
    future::pending::<()>().await;
    Ok(())
}
