//! Prometheus metrics for p2psyncd

use prometheus::{Counter, Encoder, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics collector for p2psyncd
#[derive(Clone)]
pub struct MetricsCollector {
    events: Counter,
    admissions: Counter,
    withdrawals: Counter,
    store_failures: Counter,
    netlink_errors: Counter,

    registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events = Counter::new(
            "p2psyncd_events_total",
            "Link events for peer-group interfaces",
        )?;
        registry.register(Box::new(events.clone()))?;

        let admissions = Counter::new(
            "p2psyncd_admissions_total",
            "Interfaces added to the routing configuration",
        )?;
        registry.register(Box::new(admissions.clone()))?;

        let withdrawals = Counter::new(
            "p2psyncd_withdrawals_total",
            "Interfaces removed from the routing configuration",
        )?;
        registry.register(Box::new(withdrawals.clone()))?;

        let store_failures = Counter::new(
            "p2psyncd_store_failures_total",
            "Configuration store operations that failed",
        )?;
        registry.register(Box::new(store_failures.clone()))?;

        let netlink_errors = Counter::new(
            "p2psyncd_netlink_errors_total",
            "Netlink errors and dump timeouts",
        )?;
        registry.register(Box::new(netlink_errors.clone()))?;

        Ok(Self {
            events,
            admissions,
            withdrawals,
            store_failures,
            netlink_errors,
            registry: Arc::new(registry),
        })
    }

    /// Record a link event for a matching interface
    pub fn record_event(&self) {
        self.events.inc();
    }

    /// Record an admitted interface
    pub fn record_admission(&self) {
        self.admissions.inc();
    }

    /// Record a withdrawn interface
    pub fn record_withdrawal(&self) {
        self.withdrawals.inc();
    }

    /// Record a failed store operation
    pub fn record_store_failure(&self) {
        self.store_failures.inc();
    }

    /// Record a netlink error or timeout
    pub fn record_netlink_error(&self) {
        self.netlink_errors.inc();
    }

    /// Current admission count
    pub fn admissions(&self) -> f64 {
        self.admissions.get()
    }

    /// Current withdrawal count
    pub fn withdrawals(&self) -> f64 {
        self.withdrawals.get()
    }

    /// Current store failure count
    pub fn store_failures(&self) -> f64 {
        self.store_failures.get()
    }

    /// Current netlink error count
    pub fn netlink_errors(&self) -> f64 {
        self.netlink_errors.get()
    }

    /// Render all metrics in Prometheus text format
    pub fn gather_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Serve `/metrics` over plain HTTP until the task is dropped
pub async fn serve_metrics(
    listen_addr: std::net::SocketAddr,
    metrics: MetricsCollector,
) -> std::io::Result<()> {
    use axum::{Router, routing::get};

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let body = metrics.gather_metrics();
            async move { body }
        }),
    );

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "Serving metrics");
    axum::serve(listener, app).await
}
