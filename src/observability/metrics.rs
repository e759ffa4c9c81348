//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define client metrics (source calls, latency, broadcasts, swaps)
//! - Expose a Prometheus-compatible scrape endpoint
//! - Track per-source and per-currency metrics
//!
//! # Metrics
//! - `swap_client_source_calls_total` (counter): data-source calls by currency, source, op, outcome
//! - `swap_client_source_call_duration_seconds` (histogram): data-source latency
//! - `swap_client_broadcasts_total` (counter): aggregated broadcasts by currency, outcome
//! - `swap_client_swaps_created_total` (counter): persisted swaps by kind
//! - `swap_client_verification_failures_total` (counter): rejected counterparty responses by kind
//! - `swap_client_block_height` (gauge): last observed tip per currency
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until a recorder is installed, so
//!   library users and tests pay nothing
//! - Labels stay low-cardinality: no transaction ids or addresses

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::chain::types::Currency;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Count one data-source call.
pub fn record_source_call(currency: Currency, source: &str, op: &'static str, ok: bool) {
    metrics::counter!(
        "swap_client_source_calls_total",
        "currency" => currency.symbol(),
        "source" => source.to_string(),
        "op" => op,
        "outcome" => outcome(ok)
    )
    .increment(1);
}

/// Record how long a data-source call took.
pub fn record_source_latency(currency: Currency, source: &str, op: &'static str, elapsed: Duration) {
    metrics::histogram!(
        "swap_client_source_call_duration_seconds",
        "currency" => currency.symbol(),
        "source" => source.to_string(),
        "op" => op
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_broadcast(currency: Currency, ok: bool) {
    metrics::counter!(
        "swap_client_broadcasts_total",
        "currency" => currency.symbol(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_swap_created(kind: &'static str) {
    metrics::counter!("swap_client_swaps_created_total", "kind" => kind).increment(1);
}

pub fn record_verification_failure(kind: &'static str) {
    metrics::counter!("swap_client_verification_failures_total", "kind" => kind).increment(1);
}

pub fn record_block_height(currency: Currency, height: u32) {
    metrics::gauge!("swap_client_block_height", "currency" => currency.symbol()).set(height as f64);
}
