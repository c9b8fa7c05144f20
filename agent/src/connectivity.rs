//! Network reachability probing.
//!
//! A device can have a network interface without being able to reach the
//! internet (captive portals, dead uplinks). The probe reports both facts
//! and the queue store only treats the device as online when both hold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Result of one reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    /// A network interface is up and name resolution works
    pub is_connected: bool,
    /// The probe endpoint actually answered; `None` when not determined
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
        }
    }

    /// Connected and known to reach the internet.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable == Some(true)
    }
}

/// Errors raised while probing.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Invalid probe URL: {0}")]
    InvalidUrl(String),

    #[error("Probe failed: {0}")]
    Failed(String),
}

/// Source of network state.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> Result<NetworkState, ProbeError>;
}

/// Probe that resolves the endpoint host, then issues an HTTP `HEAD`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let url = reqwest::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;
        if url.host_str().is_none() {
            return Err(ProbeError::InvalidUrl(format!("{} has no host", url)));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Failed(e.to_string()))?;

        Ok(Self { client, url })
    }

    async fn resolves(&self) -> bool {
        let Some(host) = self.url.host_str() else {
            return false;
        };
        let port = self.url.port_or_known_default().unwrap_or(80);

        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                tracing::debug!(host = %host, "Probe host did not resolve: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> Result<NetworkState, ProbeError> {
        if !self.resolves().await {
            return Ok(NetworkState::offline());
        }

        // Any HTTP answer, even an error status, proves the path works
        let reachable = match self.client.head(self.url.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, "Probe request failed: {}", e);
                false
            }
        };

        Ok(NetworkState {
            is_connected: true,
            is_internet_reachable: Some(reachable),
        })
    }
}

/// Probe with a fixed, switchable answer.
///
/// Useful for hosts that learn connectivity from the platform and push it in,
/// and for tests.
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe(&self) -> Result<NetworkState, ProbeError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(NetworkState::online())
        } else {
            Ok(NetworkState::offline())
        }
    }
}
