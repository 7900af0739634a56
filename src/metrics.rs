//! Prometheus metrics collection for tidebridge.
//!
//! Tracks queue throughput, gate denials, consumer channel activity, and
//! rate limiting, exposed on the HTTP API's `/metrics` endpoint.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Commands appended to the queue.
pub static COMMANDS_ENQUEUED: OnceLock<IntCounter> = OnceLock::new();

/// Commands marked executed by the consumer.
pub static COMMANDS_EXECUTED: OnceLock<IntCounter> = OnceLock::new();

/// Refresh signals broadcast to connected consumers.
pub static BROADCASTS_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Pairing codes issued.
pub static LINK_CODES_ISSUED: OnceLock<IntCounter> = OnceLock::new();

/// Pairing codes successfully redeemed.
pub static LINK_CODES_REDEEMED: OnceLock<IntCounter> = OnceLock::new();

/// Rate limit hits on sensitive endpoints.
pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

/// API errors by stable error code.
pub static API_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Currently connected consumer channels.
pub static CONSUMERS_CONNECTED: OnceLock<IntGauge> = OnceLock::new();

/// Unexecuted records in the queue.
pub static QUEUE_DEPTH: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        COMMANDS_ENQUEUED,
        IntCounter::new("bridge_commands_enqueued_total", "Commands appended to the queue")
    );
    register!(
        COMMANDS_EXECUTED,
        IntCounter::new("bridge_commands_executed_total", "Commands marked executed")
    );
    register!(
        BROADCASTS_SENT,
        IntCounter::new("bridge_broadcasts_sent_total", "Refresh signals broadcast to consumers")
    );
    register!(
        LINK_CODES_ISSUED,
        IntCounter::new("bridge_link_codes_issued_total", "Pairing codes issued")
    );
    register!(
        LINK_CODES_REDEEMED,
        IntCounter::new("bridge_link_codes_redeemed_total", "Pairing codes redeemed")
    );
    register!(
        RATE_LIMITED,
        IntCounter::new("bridge_rate_limited_total", "Sensitive-action rate limit hits")
    );
    register!(
        API_ERRORS,
        IntCounterVec::new(
            Opts::new("bridge_api_errors_total", "API errors by stable error code"),
            &["code"]
        )
    );
    register!(
        CONSUMERS_CONNECTED,
        IntGauge::new("bridge_consumers_connected", "Currently connected consumer channels")
    );
    register!(
        QUEUE_DEPTH,
        IntGauge::new("bridge_queue_depth", "Unexecuted records in the queue")
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_enqueue() {
    if let Some(c) = COMMANDS_ENQUEUED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_executed() {
    if let Some(c) = COMMANDS_EXECUTED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_broadcast() {
    if let Some(c) = BROADCASTS_SENT.get() {
        c.inc();
    }
}

#[inline]
pub fn record_code_issued() {
    if let Some(c) = LINK_CODES_ISSUED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_code_redeemed() {
    if let Some(c) = LINK_CODES_REDEEMED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_rate_limited() {
    if let Some(c) = RATE_LIMITED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_error(code: &str) {
    if let Some(c) = API_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

/// Adjust the connected-consumers gauge.
#[inline]
pub fn consumer_connected(delta: i64) {
    if let Some(g) = CONSUMERS_CONNECTED.get() {
        g.add(delta);
    }
}

#[inline]
pub fn set_queue_depth(depth: i64) {
    if let Some(g) = QUEUE_DEPTH.get() {
        g.set(depth);
    }
}
