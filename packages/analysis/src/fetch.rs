//! Document downloads with periodic client recycling.
//!
//! Long-running workers accumulate connection-pool and TLS state in a
//! reused HTTP client. The fetcher rebuilds its client every
//! `recycle_after` requests to bound that growth.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Total per-request budget; municipal file servers can be very slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

struct ClientSlot {
    client: Client,
    requests: u32,
}

/// HTTP document fetcher.
pub struct DocumentFetcher {
    slot: Mutex<ClientSlot>,
    recycle_after: u32,
}

impl DocumentFetcher {
    /// Create a fetcher that recycles its client every `recycle_after`
    /// requests.
    pub fn new(recycle_after: u32) -> Result<Self> {
        Ok(Self {
            slot: Mutex::new(ClientSlot {
                client: build_client()?,
                requests: 0,
            }),
            recycle_after: recycle_after.max(1),
        })
    }

    /// Download a document, returning its raw bytes.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let client = self.checkout_client().await?;

        let response = client.get(url).send().await.map_err(|e| AnalysisError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AnalysisError::Http {
            url: url.to_string(),
            source: e,
        })?;

        debug!(url, size_kb = bytes.len() / 1024, "document downloaded");
        Ok(bytes.to_vec())
    }

    /// Issue a HEAD request and return `(Content-Length, Last-Modified)`
    /// header values, empty strings when absent. Used by metadata-enhanced
    /// attachment hashing.
    pub async fn head_metadata(&self, url: &str) -> Result<(String, String)> {
        let client = self.checkout_client().await?;

        let response = client
            .head(url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| AnalysisError::Http {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(AnalysisError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        Ok((header("content-length"), header("last-modified")))
    }

    /// Take a clone of the current client, rebuilding it first when the
    /// request count has hit the recycle threshold.
    async fn checkout_client(&self) -> Result<Client> {
        let mut slot = self.slot.lock().await;
        if slot.requests >= self.recycle_after {
            info!(previous_requests = slot.requests, "http client recycled");
            slot.client = build_client()?;
            slot.requests = 0;
        }
        slot.requests += 1;
        Ok(slot.client.clone())
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AnalysisError::Config(format!("failed to build http client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recycles_after_threshold() {
        let fetcher = DocumentFetcher::new(2).expect("build fetcher");

        // Three checkouts across a threshold of two: the counter must reset
        // on the recycle instead of growing unbounded.
        let _ = fetcher.checkout_client().await.unwrap();
        let _ = fetcher.checkout_client().await.unwrap();
        let _ = fetcher.checkout_client().await.unwrap();

        let slot = fetcher.slot.lock().await;
        assert_eq!(slot.requests, 1);
    }

    #[tokio::test]
    async fn zero_threshold_is_clamped() {
        let fetcher = DocumentFetcher::new(0).expect("build fetcher");
        assert_eq!(fetcher.recycle_after, 1);
    }
}
