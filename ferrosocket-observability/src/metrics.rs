//! Prometheus counters for duplex socket traffic and shutdowns

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, OnceLock};

/// Registry holding every FerroSocket metric
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SOCKET_METRICS: OnceLock<SocketMetrics> = OnceLock::new();

/// Counters recorded by the duplex pumps
#[derive(Debug, Clone)]
pub struct SocketMetrics {
    messages_received: IntCounter,
    bytes_received: IntCounter,
    frames_sent: IntCounter,
    bytes_sent: IntCounter,
    shutdowns: IntCounterVec,
}

impl SocketMetrics {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        let metrics = Self {
            messages_received: IntCounter::new(
                "ferrosocket_messages_received_total",
                "Complete inbound messages published to the input pipe",
            )?,
            bytes_received: IntCounter::new(
                "ferrosocket_bytes_received_total",
                "Inbound payload bytes published to the input pipe",
            )?,
            frames_sent: IntCounter::new(
                "ferrosocket_frames_sent_total",
                "Outbound fragments handed to the connection",
            )?,
            bytes_sent: IntCounter::new(
                "ferrosocket_bytes_sent_total",
                "Outbound payload bytes handed to the connection",
            )?,
            shutdowns: IntCounterVec::new(
                Opts::new(
                    "ferrosocket_shutdowns_total",
                    "Duplex socket completions by reason",
                ),
                &["reason"],
            )?,
        };

        registry.register(Box::new(metrics.messages_received.clone()))?;
        registry.register(Box::new(metrics.bytes_received.clone()))?;
        registry.register(Box::new(metrics.frames_sent.clone()))?;
        registry.register(Box::new(metrics.bytes_sent.clone()))?;
        registry.register(Box::new(metrics.shutdowns.clone()))?;
        Ok(metrics)
    }

    #[inline]
    pub fn record_message_received(&self, bytes: usize) {
        self.messages_received.inc();
        self.bytes_received.inc_by(bytes as u64);
    }

    #[inline]
    pub fn record_frames_sent(&self, frames: usize, bytes: usize) {
        self.frames_sent.inc_by(frames as u64);
        self.bytes_sent.inc_by(bytes as u64);
    }

    #[inline]
    pub fn record_shutdown(&self, reason: &str) {
        self.shutdowns.with_label_values(&[reason]).inc();
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.get()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.get()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.get()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.get()
    }

    pub fn shutdowns(&self, reason: &str) -> u64 {
        self.shutdowns.with_label_values(&[reason]).get()
    }
}

/// Register the socket counters. Later calls return the same instance.
pub fn init_metrics() -> &'static SocketMetrics {
    SOCKET_METRICS.get_or_init(|| {
        SocketMetrics::register(&REGISTRY).expect("socket metrics registered twice")
    })
}

/// The socket counters, if [`init_metrics`] has run
#[inline]
pub fn socket_metrics() -> Option<&'static SocketMetrics> {
    SOCKET_METRICS.get()
}

pub fn metrics_enabled() -> bool {
    SOCKET_METRICS.get().is_some()
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
