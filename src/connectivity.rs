use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Answers "is the network reachable right now?"
///
/// Every call is a fresh snapshot; implementations must not cache the answer
/// and must never fail, only report `false`.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Reachability check against a content-free HTTP endpoint
///
/// Any HTTP response, whatever its status, means the network is reachable.
/// Timeouts, DNS failures and refused connections mean offline. No retries.
pub struct ConnectivityProbe {
    client: reqwest::Client,
    url: String,
}

impl ConnectivityProbe {
    pub fn new(url: &str, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        ConnectivityProbe {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Connectivity for ConnectivityProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                log::debug!("Probe {} answered {}", self.url, response.status());
                true
            }
            Err(e) => {
                log::debug!("Probe {} failed, treating as offline: {}", self.url, e);
                false
            }
        }
    }
}

/// Connectivity pinned to a value, e.g. for a forced offline mode
#[derive(Debug, Default)]
pub struct FixedConnectivity {
    online: AtomicBool,
}

impl FixedConnectivity {
    pub fn new(online: bool) -> Self {
        FixedConnectivity {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
