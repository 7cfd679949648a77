//! HTTP reachability probe.

use std::time::{Duration, Instant};

use super::{is_success_status, FailureKind, ProbeOutcome, Prober, PROBE_TIMEOUT};

/// GET-based prober. One client is shared by every scheduled target; the
/// timeout is applied per request.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        // Add jitter to avoid thundering herd
        let jitter = rand::random::<u64>() % 100;
        tokio::time::sleep(Duration::from_millis(jitter)).await;

        let start = Instant::now();

        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let status = response.status().as_u16();
                // Read the body for the transfer size; a body that breaks
                // mid-stream still counts as a response with its status.
                let response_bytes = response.bytes().await.ok().map(|b| b.len() as u64);

                let failure = if is_success_status(status) {
                    None
                } else {
                    Some(FailureKind::HttpError)
                };

                ProbeOutcome {
                    latency_ms: Some(latency_ms),
                    status_code: Some(status),
                    response_bytes,
                    failure,
                }
            }
            Err(e) => ProbeOutcome {
                latency_ms: Some(start.elapsed().as_millis() as u64),
                status_code: None,
                response_bytes: None,
                failure: Some(classify_transport_error(&e)),
            },
        }
    }
}

/// Map a transport error onto the failure taxonomy.
///
/// reqwest does not expose DNS or connection-refused failures as typed
/// variants, so those are recognized from the error source chain.
fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }

    let mut chain = String::new();
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        chain.push_str(&e.to_string().to_lowercase());
        chain.push(' ');
        source = e.source();
    }

    if chain.contains("dns") || chain.contains("failed to lookup") || chain.contains("resolve") {
        FailureKind::DnsError
    } else if chain.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else {
        FailureKind::NetworkError
    }
}
