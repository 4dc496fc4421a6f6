//! Client for the agreement statistics service that computes kappa scores.

use reqwest::{header, Certificate, Client};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::StatisticsConfig;
use crate::model::Agreement;

const CALCULATE_KAPPA_PATH: &str = "/hitec/agreement/calculateKappa/";

/// Kappa name to score, as answered by the statistics service.
pub type KappaScores = BTreeMap<String, f64>;

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("statistics request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("statistics service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot read CA certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Source of fresh kappa scores for an agreement.
///
/// `Ok(None)` means no scores are available and the stored statistics stay
/// as they are.
#[async_trait::async_trait]
pub trait KappaSource: Send + Sync {
    async fn calculate_kappa(
        &self,
        agreement: &Agreement,
    ) -> Result<Option<KappaScores>, StatisticsError>;
}

/// Used when no statistics service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledKappa;

#[async_trait::async_trait]
impl KappaSource for DisabledKappa {
    async fn calculate_kappa(
        &self,
        _agreement: &Agreement,
    ) -> Result<Option<KappaScores>, StatisticsError> {
        Ok(None)
    }
}

pub struct HttpKappaClient {
    client: Client,
    url: String,
    bearer_token: String,
}

impl HttpKappaClient {
    pub fn new(config: &StatisticsConfig) -> Result<Self, StatisticsError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|source| StatisticsError::Certificate {
                path: path.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            url: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                CALCULATE_KAPPA_PATH
            ),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait::async_trait]
impl KappaSource for HttpKappaClient {
    async fn calculate_kappa(
        &self,
        agreement: &Agreement,
    ) -> Result<Option<KappaScores>, StatisticsError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.bearer_token)
            .header(header::ACCEPT, "application/json")
            .json(agreement)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StatisticsError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(Some(response.json().await?))
    }
}

/// Picks the kappa source for a configuration: the HTTP client when a base
/// URL is set, otherwise [`DisabledKappa`].
pub fn kappa_source(config: &StatisticsConfig) -> Result<Arc<dyn KappaSource>, StatisticsError> {
    if config.base_url.trim().is_empty() {
        log::info!("No statistics service configured, kappa scores are not refreshed");
        return Ok(Arc::new(DisabledKappa));
    }
    log::info!("Kappa scores computed by {}", config.base_url);
    Ok(Arc::new(HttpKappaClient::new(config)?))
}
