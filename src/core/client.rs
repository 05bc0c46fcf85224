// src/core/client.rs

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};
use url::Url;

use crate::core::error::JobError;
use crate::core::models::WhoisRecord;
use crate::core::whois::WhoisClient;

/// A response body together with the status it came with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The seam between job handlers and third-party lookup services.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Issues one GET and returns the body verbatim, whatever the status.
    async fn fetch_text(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, JobError>;

    async fn fetch_whois(&self, domain: &str) -> Result<WhoisRecord, JobError>;
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    whois: WhoisClient,
}

impl HttpApiClient {
    pub fn new(whois: WhoisClient) -> Result<Self, JobError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client.");
                JobError::NetworkFailure(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, whois })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_text(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, JobError> {
        info!(%url, "Sending lookup request.");
        let response = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                error!(%url, error = %e, "Lookup request failed.");
                JobError::from(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        info!(%url, status, bytes = body.len(), "Received lookup response.");
        Ok(FetchedBody { status, body })
    }

    async fn fetch_whois(&self, domain: &str) -> Result<WhoisRecord, JobError> {
        self.whois.lookup(domain).await
    }
}
