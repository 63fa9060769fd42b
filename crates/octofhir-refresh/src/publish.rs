//! Remote publishing of written bundles
//!
//! Publishing is best effort: a failure is logged and reported, never turned
//! into an artifact failure.

use async_trait::async_trait;
use octofhir_refresh_diagnostics::{REF0300, REF0301, RefreshError};
use octofhir_refresh_model::Encoding;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Sends one serialized bundle somewhere
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Target shown in logs and errors
    fn endpoint(&self) -> &str;

    async fn publish(&self, name: &str, body: &str, encoding: Encoding) -> Result<(), RefreshError>;
}

/// POSTs bundles to a FHIR server base url
pub struct HttpPublisher {
    client: Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RefreshError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RefreshError::publish(REF0300, format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn publish(&self, name: &str, body: &str, encoding: Encoding) -> Result<(), RefreshError> {
        let fail = |code, message: String| {
            RefreshError::publish(code, format!("{}: {}", name, message)).with_endpoint(&self.base_url)
        };

        let response = self
            .client
            .post(&self.base_url)
            .header(CONTENT_TYPE, encoding.mime_type())
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| fail(REF0300, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fail(REF0300, e.to_string()))?;

        // servers report transaction failures in 200 responses too
        if text.contains("error") {
            return Err(fail(REF0301, format!("server responded with an error ({})", status)));
        }
        if !status.is_success() {
            return Err(fail(REF0300, format!("HTTP {}", status)));
        }
        Ok(())
    }
}

/// Publish with a single retry
pub async fn publish_with_retry(
    publisher: &dyn Publisher,
    name: &str,
    body: &str,
    encoding: Encoding,
) -> Result<(), RefreshError> {
    match publisher.publish(name, body, encoding).await {
        Ok(()) => Ok(()),
        Err(first) => {
            log::warn!("publishing {} failed, retrying once: {}", name, first);
            publisher.publish(name, body, encoding).await.inspect_err(|e| {
                log::error!("publishing {} to {} failed: {}", name, publisher.endpoint(), e)
            })
        }
    }
}
