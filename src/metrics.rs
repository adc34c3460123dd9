//! Query metrics and tracing spans.
//!
//! With the `metrics` feature, `METRICS` records statement counts, failures
//! and durations through an OpenTelemetry meter provider whose reader is a
//! Prometheus exporter; [`SqlambdaMetrics::render`] produces the scrape text.
//! With the `tracing` feature, `tracing_helpers` provides the spans executions
//! run in.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::SdkMeterProvider;
#[cfg(feature = "metrics")]
use prometheus::{Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::time::Duration;

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<SqlambdaMetrics> = Lazy::new(SqlambdaMetrics::init);

#[cfg(feature = "metrics")]
pub struct SqlambdaMetrics {
    /// Registry the exporter writes into
    pub registry: Registry,
    pub provider: SdkMeterProvider,
    pub queries_total: Counter<u64>,
    pub query_errors_total: Counter<u64>,
    pub query_duration: Histogram<f64>,
    pub async_wait_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl SqlambdaMetrics {
    pub fn init() -> Self {
        let registry = Registry::new();
        let builder = SdkMeterProvider::builder();
        let builder = match opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
        {
            Ok(exporter) => builder.with_reader(exporter),
            Err(err) => {
                log::warn!("Failed to build prometheus exporter, metrics are not exported: {err}");
                builder
            }
        };
        let provider = builder.build();
        global::set_meter_provider(provider.clone());
        let meter = provider.meter("sqlambda");

        let queries_total = meter
            .u64_counter("sqlambda_queries_total")
            .with_description("Total statements executed")
            .build();

        let query_errors_total = meter
            .u64_counter("sqlambda_query_errors_total")
            .with_description("Statements that failed in the executor")
            .build();

        let query_duration = meter
            .f64_histogram("sqlambda_query_duration_seconds")
            .with_description("Duration of statement execution")
            .build();

        let async_wait_duration = meter
            .f64_histogram("sqlambda_async_wait_seconds")
            .with_description("Time asynchronous queries waited before executing")
            .build();

        Self {
            registry,
            provider,
            queries_total,
            query_errors_total,
            query_duration,
            async_wait_duration,
        }
    }

    pub fn record_query_duration(&self, elapsed: Duration) {
        self.queries_total.add(1, &[]);
        self.query_duration.record(elapsed.as_secs_f64(), &[]);
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.add(1, &[]);
    }

    pub fn observe_async_wait(&self, waited: Duration) {
        self.async_wait_duration.record(waited.as_secs_f64(), &[]);
    }

    /// Current values in the Prometheus text format.
    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|e| format!("# Error encoding metrics: {e}\n"))
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    /// Span wrapping one statement execution.
    pub fn execute_query_span(sql: &str) -> tracing::Span {
        tracing::info_span!("sqlambda.execute_query", db.statement = sql)
    }
}
