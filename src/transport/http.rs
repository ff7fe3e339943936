use super::{RawResponse, Transport, TransportError};
use crate::config::Endpoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(cfg: &Endpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, payload: &Value) -> Result<RawResponse, TransportError> {
        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest)?;
        Ok(RawResponse { status, body })
    }
}

fn classify_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub url: String,
    pub reachable: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Probes the endpoint's health route on its origin. Unreachable is a
/// report, not an error; only a malformed endpoint URL fails.
pub async fn probe_health(cfg: &Endpoint) -> Result<HealthReport> {
    let base = reqwest::Url::parse(&cfg.url)
        .with_context(|| format!("parsing endpoint url: {}", cfg.url))?;
    let url = format!("{}{}", base.origin().ascii_serialization(), cfg.health_path);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.health_timeout_seconds))
        .build()
        .with_context(|| "building HTTP client")?;

    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            Ok(HealthReport {
                url,
                reachable: status.is_success(),
                status: Some(status.as_u16()),
                error: if status.is_success() {
                    None
                } else {
                    Some(format!("health route returned {status}"))
                },
            })
        }
        Err(err) => Ok(HealthReport {
            url,
            reachable: false,
            status: None,
            error: Some(err.to_string()),
        }),
    }
}
