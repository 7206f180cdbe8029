use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::assets::decode::decode_size;
use crate::foundation::error::{BackdropError, BackdropResult};

/// A tiny lossy WebP (2x2) used to test whether the client can decode the format.
pub const WEBP_PROBE_PAYLOAD_B64: &str =
    "UklGRjoAAABXRUJQVlA4IC4AAACyAgCdASoCAAIALmk0mk0iIiIiIgBoSygABc6WWgAA/veff/0PP8bA//LwYAAA";

/// Height the probe payload reports when decoded correctly.
pub const PROBE_EXPECTED_HEIGHT: u32 = 2;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

pub fn probe_payload() -> BackdropResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(WEBP_PROBE_PAYLOAD_B64)
        .map_err(|e| BackdropError::validation(format!("decode probe payload base64: {e}")))
}

/// Answers "can this client decode the modern format?".
///
/// A probe never errors: anything that goes wrong counts as unsupported.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn supports_modern(&self) -> bool;
}

/// Probe that decodes a payload and checks the decoded height.
#[derive(Clone, Debug)]
pub struct DecodeProbe {
    payload: Vec<u8>,
    expected_height: u32,
}

impl DecodeProbe {
    /// Probe with the embedded WebP payload.
    pub fn webp() -> BackdropResult<Self> {
        Ok(Self {
            payload: probe_payload()?,
            expected_height: PROBE_EXPECTED_HEIGHT,
        })
    }

    pub fn with_payload(payload: Vec<u8>, expected_height: u32) -> Self {
        Self {
            payload,
            expected_height,
        }
    }
}

#[async_trait]
impl CapabilityProbe for DecodeProbe {
    async fn supports_modern(&self) -> bool {
        match decode_size(&self.payload) {
            Ok(size) => {
                tracing::debug!(
                    width = size.width,
                    height = size.height,
                    "probe payload decoded"
                );
                size.height == self.expected_height
            }
            Err(e) => {
                tracing::debug!(error = %e, "probe payload failed to decode");
                false
            }
        }
    }
}

/// Probe with a fixed answer.
#[derive(Clone, Copy, Debug)]
pub struct FixedProbe(pub bool);

#[async_trait]
impl CapabilityProbe for FixedProbe {
    async fn supports_modern(&self) -> bool {
        self.0
    }
}

/// Wraps a probe so it resolves unsupported once `timeout` elapses.
#[derive(Clone, Debug)]
pub struct TimeoutProbe<P> {
    inner: P,
    timeout: Duration,
}

impl<P> TimeoutProbe<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: CapabilityProbe> CapabilityProbe for TimeoutProbe<P> {
    async fn supports_modern(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.inner.supports_modern()).await {
            Ok(supported) => supported,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "capability probe timed out, assuming unsupported"
                );
                false
            }
        }
    }
}
