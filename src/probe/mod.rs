//! Health-check probes.
//!
//! A probe is a single GET-style reachability check with a bounded timeout.
//! Failures never surface as errors: every outcome, healthy or not, is
//! classified and handed back for recording.

mod http;

pub use http::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Probe timeout, independent of any target's scheduling interval.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Classification of an unhealthy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Response arrived with a status outside [200, 300).
    HttpError,
    /// The probe exceeded [`PROBE_TIMEOUT`].
    Timeout,
    /// Name resolution failed.
    DnsError,
    /// The target actively refused the connection.
    ConnectionRefused,
    /// Any other transport failure.
    NetworkError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::HttpError => "http_error",
            FailureKind::Timeout => "timeout",
            FailureKind::DnsError => "dns_error",
            FailureKind::ConnectionRefused => "connection_refused",
            FailureKind::NetworkError => "network_error",
        }
    }

    /// Parse the persisted form back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http_error" => Some(FailureKind::HttpError),
            "timeout" => Some(FailureKind::Timeout),
            "dns_error" => Some(FailureKind::DnsError),
            "connection_refused" => Some(FailureKind::ConnectionRefused),
            "network_error" => Some(FailureKind::NetworkError),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one reachability probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Wall-clock time from request start to response or point of failure.
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub response_bytes: Option<u64>,
    /// `None` means the check was healthy.
    pub failure: Option<FailureKind>,
}

impl ProbeOutcome {
    pub fn is_up(&self) -> bool {
        self.failure.is_none()
    }
}

/// A reachability prober. Implementations encode failure in the outcome
/// instead of returning transport errors.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Statuses the monitor treats as healthy.
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}
