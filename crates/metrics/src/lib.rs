use anyhow::Result;
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder, TEXT_FORMAT};
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NotFound,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::NotFound => "not_found",
            Outcome::Failed => "failed",
        }
    }
}

#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
    collections: IntCounterVec,
    commands: IntCounterVec,
}

impl MetricsHandle {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collections = IntCounterVec::new(
            Opts::new("feebot_collections_total", "Snapshot collection runs"),
            &["asset", "outcome"],
        )?;
        let commands = IntCounterVec::new(
            Opts::new("feebot_commands_total", "Fee commands answered"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(collections.clone()))?;
        registry.register(Box::new(commands.clone()))?;
        Ok(Self {
            registry,
            collections,
            commands,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_collection(&self, asset: &str, outcome: Outcome) {
        self.collections
            .with_label_values(&[asset, outcome.as_str()])
            .inc();
    }

    pub fn record_command(&self, command: &str, outcome: Outcome) {
        self.commands
            .with_label_values(&[command, outcome.as_str()])
            .inc();
    }

    pub fn collection_count(&self, asset: &str, outcome: Outcome) -> u64 {
        self.collections
            .with_label_values(&[asset, outcome.as_str()])
            .get()
    }

    pub fn command_count(&self, command: &str, outcome: Outcome) -> u64 {
        self.commands
            .with_label_values(&[command, outcome.as_str()])
            .get()
    }

    /// Current registry contents in the prometheus text format.
    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let registry = self.registry.clone();
        let make_svc = make_service_fn(move |_| {
            let registry = registry.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req: Request<Body>| {
                    let registry = registry.clone();
                    async move { Ok::<_, hyper::Error>(scrape(&registry)) }
                }))
            }
        });

        let server = Server::bind(&addr).serve(make_svc);
        info!(%addr, "metrics exporter listening");
        server.await?;
        Ok(())
    }
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn scrape(registry: &Registry) -> Response<Body> {
    match encode_registry(registry) {
        Ok(text) => {
            let mut response = Response::new(Body::from(text));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));
            response
        }
        Err(err) => {
            warn!(error = ?err, "failed to encode metrics");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
