//! Outbound notification to the Iabako workflow-automation webhook.
//!
//! The webhook receives the JSON profile of every account that gets
//! validated. It is fire-and-forget: callers log a [`SyncError`] as a warning
//! and carry on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::IabakoConfig;
use crate::features::accounts::model::UserProfile;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("webhook timed out after {0:?}")]
    Timeout(Duration),

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook answered with status {0}")]
    Status(u16),

    #[error("webhook client could not be built: {0}")]
    Client(String),
}

/// Receiver of validated profiles
#[async_trait]
pub trait ProfileSync: Send + Sync {
    async fn notify(&self, profile: &UserProfile) -> Result<(), SyncError>;
}

/// Posts profiles to the configured webhook URL
pub struct IabakoClient {
    webhook_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl IabakoClient {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            timeout,
            http_client,
        })
    }

    /// Webhook client for the configuration, or a no-op when no URL is set
    pub fn from_config(config: &IabakoConfig) -> Result<Arc<dyn ProfileSync>, SyncError> {
        match &config.webhook_url {
            Some(url) => {
                info!("Iabako sync enabled");
                Ok(Arc::new(Self::new(url.clone(), config.timeout)?))
            }
            None => {
                info!("IABAKO_WEBHOOK_URL not set, account sync disabled");
                Ok(Arc::new(DisabledSync))
            }
        }
    }
}

#[async_trait]
impl ProfileSync for IabakoClient {
    async fn notify(&self, profile: &UserProfile) -> Result<(), SyncError> {
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(profile)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout(self.timeout)
                } else {
                    SyncError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        debug!("Iabako notified for profile {}", profile.id);
        Ok(())
    }
}

/// Used when no webhook is configured
pub struct DisabledSync;

#[async_trait]
impl ProfileSync for DisabledSync {
    async fn notify(&self, profile: &UserProfile) -> Result<(), SyncError> {
        debug!("Iabako sync disabled, skipping profile {}", profile.id);
        Ok(())
    }
}
