//! Pipeline metrics recorded through the `metrics` facade.
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use ::metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Installs the Prometheus exporter on `addr` and describes all metrics.
/// Idempotent; must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    INIT.call_once(|| {
        match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => info!("Prometheus HTTP exporter started at http://{}/metrics", addr),
            Err(e) => {
                warn!("Failed to install Prometheus exporter on {}: {}", addr, e);
                return;
            }
        }
        BronzeMetrics::describe();
    });
}

/// Metrics for the bronze ingestion job
pub struct BronzeMetrics;

impl BronzeMetrics {
    pub fn describe() {
        describe_counter!("bronze_runs_total", "Pipeline runs started");
        describe_counter!("bronze_run_failures_total", "Pipeline runs that ended in an error");
        describe_counter!("bronze_source_rows_total", "Rows read from the source extract");
        describe_counter!("bronze_rows_written_total", "Rows written per bronze table");
        describe_counter!("bronze_write_failures_total", "Rejected table replaces per bronze table");
        describe_histogram!("bronze_run_duration_seconds", "Wall time of a pipeline run");
        describe_histogram!("bronze_write_duration_seconds", "Wall time of one table replace");
    }

    pub fn run_started() {
        counter!("bronze_runs_total").increment(1);
    }

    pub fn run_failed() {
        counter!("bronze_run_failures_total").increment(1);
    }

    pub fn run_finished(duration_secs: f64) {
        histogram!("bronze_run_duration_seconds").record(duration_secs);
    }

    pub fn source_rows(rows: usize) {
        counter!("bronze_source_rows_total").increment(rows as u64);
    }

    pub fn table_written(table: &str, rows: usize, duration_secs: f64) {
        counter!("bronze_rows_written_total", "table" => table.to_string()).increment(rows as u64);
        histogram!("bronze_write_duration_seconds", "table" => table.to_string())
            .record(duration_secs);
    }

    pub fn table_write_failed(table: &str) {
        counter!("bronze_write_failures_total", "table" => table.to_string()).increment(1);
    }
}
