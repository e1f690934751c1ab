//! ---
//! ha_section: "04-metrics-observability"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Metrics collection and export utilities."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State as AxumState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use indexmap::IndexMap;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use sol_ha_common::{State, StateCache};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The supervisor's scrape gauges, re-rendered from the state cache on
/// every scrape. All gauges carry `validator_name`, `public_ip`, and the
/// operator's static labels.
pub struct HaMetrics {
    registry: Registry,
    static_label_values: Vec<String>,
    metadata: GaugeVec,
    peer_count: GaugeVec,
    self_in_gossip: GaugeVec,
    failover_status: GaugeVec,
}

impl HaMetrics {
    pub fn new(static_labels: &IndexMap<String, String>) -> Result<Self> {
        let registry = Registry::new();

        let mut common_label_names: Vec<&str> = vec!["validator_name", "public_ip"];
        common_label_names.extend(static_labels.keys().map(String::as_str));

        let mut metadata_labels = common_label_names.clone();
        metadata_labels.push("role");
        metadata_labels.push("status");
        let metadata = GaugeVec::new(
            Opts::new(
                "solana_validator_ha_metadata",
                "Metadata about the supervisor and its current role",
            ),
            &metadata_labels,
        )?;
        registry.register(Box::new(metadata.clone()))?;

        let peer_count = GaugeVec::new(
            Opts::new(
                "solana_validator_ha_peer_count",
                "Number of configured peers observed in cluster gossip",
            ),
            &common_label_names,
        )?;
        registry.register(Box::new(peer_count.clone()))?;

        let self_in_gossip = GaugeVec::new(
            Opts::new(
                "solana_validator_ha_self_in_gossip",
                "Whether this node's public IP is present in cluster gossip (0/1)",
            ),
            &common_label_names,
        )?;
        registry.register(Box::new(self_in_gossip.clone()))?;

        let mut failover_labels = common_label_names.clone();
        failover_labels.push("failover_status");
        let failover_status = GaugeVec::new(
            Opts::new(
                "solana_validator_ha_failover_status",
                "Whether a role transition is in flight (0/1), labelled with the status",
            ),
            &failover_labels,
        )?;
        registry.register(Box::new(failover_status.clone()))?;

        Ok(Self {
            registry,
            static_label_values: static_labels.values().cloned().collect(),
            metadata,
            peer_count,
            self_in_gossip,
            failover_status,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Re-render all gauges from a cache snapshot. Previous label sets are
    /// dropped so stale series never linger between scrapes.
    pub fn render(&self, state: &State) {
        self.metadata.reset();
        self.peer_count.reset();
        self.self_in_gossip.reset();
        self.failover_status.reset();

        let mut common: Vec<&str> = vec![&state.validator_name, &state.public_ip];
        common.extend(self.static_label_values.iter().map(String::as_str));

        let mut metadata_values = common.clone();
        metadata_values.push(state.role.as_str());
        metadata_values.push(state.status.as_str());
        self.metadata.with_label_values(&metadata_values).set(1.0);

        self.peer_count
            .with_label_values(&common)
            .set(state.peer_count as f64);

        self.self_in_gossip
            .with_label_values(&common)
            .set(if state.self_in_gossip { 1.0 } else { 0.0 });

        let mut failover_values = common.clone();
        failover_values.push(state.failover_status.as_str());
        self.failover_status
            .with_label_values(&failover_values)
            .set(if state.failover_status.is_idle() {
                0.0
            } else {
                1.0
            });
    }
}

struct SurfaceState {
    cache: Arc<StateCache>,
    metrics: HaMetrics,
}

/// Handle to the running HTTP surface.
pub struct SurfaceHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SurfaceHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Request graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.context("metrics surface task panicked")
    }
}

/// Bind the HTTP surface and start serving `/metrics` and `/status`.
///
/// A bind failure is returned to the caller; it is a startup-fatal error.
pub async fn spawn_surface(
    cache: Arc<StateCache>,
    metrics: HaMetrics,
    port: u16,
) -> Result<SurfaceHandle> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, "metrics surface listening");

    let state = Arc::new(SurfaceState { cache, metrics });
    let router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let task = tokio::spawn(async move {
        if let Err(err) = server.await {
            warn!(error = %err, "metrics surface exited with error");
        }
    });

    Ok(SurfaceHandle {
        addr: local_addr,
        task,
        shutdown: shutdown_tx,
    })
}

async fn metrics_handler(AxumState(state): AxumState<Arc<SurfaceState>>) -> Response {
    let snapshot = state.cache.read();
    state.metrics.render(&snapshot);

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&state.metrics.registry().gather()) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type())],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "metrics encoding error".to_owned(),
            )
                .into_response()
        }
    }
}

async fn status_handler(AxumState(state): AxumState<Arc<SurfaceState>>) -> Json<State> {
    Json(state.cache.read())
}
