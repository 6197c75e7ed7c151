use crate::{prelude::Arc, MapError, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capability to fetch the bytes behind a URL.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("slipmap/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 10_000,
            pool_max_idle_per_host: 16,
        }
    }
}

/// `reqwest` backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()?;
        Ok(Self { client })
    }

    /// Process-wide fetcher built from the default configuration.
    pub fn shared() -> Result<Arc<HttpFetcher>> {
        static SHARED: OnceCell<Arc<HttpFetcher>> = OnceCell::new();
        SHARED
            .get_or_try_init(|| HttpFetcher::new(&HttpConfig::default()).map(Arc::new))
            .cloned()
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MapError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_fetcher_is_reused() {
        let a = HttpFetcher::shared().unwrap();
        let b = HttpFetcher::shared().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_default_user_agent() {
        assert!(HttpConfig::default().user_agent.starts_with("slipmap/"));
    }
}
