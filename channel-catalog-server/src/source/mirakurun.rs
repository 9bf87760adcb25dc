//! Mirakurun REST backend.

use std::time::Duration;

use async_trait::async_trait;
use channel_catalog::{CanonicalService, MirakurunService};
use log::{debug, warn};
use reqwest::{Client, StatusCode};

use super::{BackendKind, Result, ServiceSource, SourceError, SourceSnapshot};

/// Fetches `GET {base_url}/api/services`.
pub struct MirakurunSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl MirakurunSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn services_url(&self) -> String {
        format!("{}/api/services", self.base_url)
    }

    fn map_request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else if e.is_connect() {
            SourceError::Unavailable(format!("{}: {}", self.base_url, e))
        } else {
            SourceError::Http(e)
        }
    }
}

/// Decode a `/api/services` body.
///
/// Only a body that is not a JSON array fails; elements that cannot be
/// normalized are logged and dropped.
pub(crate) fn parse_services(body: &[u8]) -> Result<Vec<CanonicalService>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| SourceError::Decode(e.to_string()))?;

    let mut services = Vec::with_capacity(values.len());
    for value in values {
        let record = match serde_json::from_value::<MirakurunService>(value) {
            Ok(record) => record,
            Err(e) => {
                warn!("[Mirakurun] Skipping undecodable service: {}", e);
                continue;
            }
        };
        match record.normalize() {
            Ok(service) => services.push(service),
            Err(e) => warn!("[Mirakurun] Skipping service {:?}: {}", record.name, e),
        }
    }
    Ok(services)
}

#[async_trait]
impl ServiceSource for MirakurunSource {
    fn kind(&self) -> BackendKind {
        BackendKind::Mirakurun
    }

    async fn fetch(&self) -> Result<SourceSnapshot> {
        let url = self.services_url();
        debug!("[Mirakurun] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if response.status() != StatusCode::OK {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.map_request_error(e))?;
        let services = parse_services(&body)?;
        debug!("[Mirakurun] {} services", services.len());

        // Mirakurun lists services in its own configured order, which is
        // the order numbering follows.
        Ok(SourceSnapshot {
            services,
            epg_services: Vec::new(),
        })
    }
}
