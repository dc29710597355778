//! Single-use, time-boxed download authorization.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::db::{DownloadLedger, PaymentOptionStore, StoreError};
use crate::document::artifact::Artifact;
use crate::metrics;
use crate::payment::models::PaymentChoice;
use crate::storage::ObjectStorage;
use crate::token::DocumentToken;

pub const DOWNLOAD_WINDOW_MINUTES: i64 = 30;
pub const DOWNLOAD_URL_TTL_SECS: u64 = 300;
pub const DOWNLOAD_DENIED_MESSAGE: &str =
    "El archivo ya fue descargado o ha expirado por seguridad.";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to sign download url: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadDecision {
    Authorized { url: String, artifact: Artifact },
    Denied,
}

#[derive(Clone)]
pub struct DownloadGate {
    ledger: Arc<dyn DownloadLedger + Send + Sync>,
    window: Duration,
}

impl DownloadGate {
    pub fn new(ledger: Arc<dyn DownloadLedger + Send + Sync>) -> Self {
        Self::with_window(ledger, Duration::minutes(DOWNLOAD_WINDOW_MINUTES))
    }

    pub fn with_window(ledger: Arc<dyn DownloadLedger + Send + Sync>, window: Duration) -> Self {
        Self { ledger, window }
    }

    pub async fn check_and_register_download(
        &self,
        token: &DocumentToken,
    ) -> Result<bool, StoreError> {
        self.check_and_register_download_at(token, Utc::now()).await
    }

    pub async fn check_and_register_download_at(
        &self,
        token: &DocumentToken,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let granted = self.ledger.check_and_register(token, now, self.window).await?;
        metrics::record_download(granted);
        if !granted {
            log::warn!("Download denied for token {}...", token.log_prefix());
        }
        Ok(granted)
    }

    /// Run the gate for a paid token and, when it opens, sign a short-lived
    /// URL for the bundle the client chose. The option is read before the
    /// gate is consumed so a lookup failure never burns the download.
    pub async fn authorize(
        &self,
        token: &DocumentToken,
        options: &(dyn PaymentOptionStore + Send + Sync),
        storage: &(dyn ObjectStorage + Send + Sync),
    ) -> Result<DownloadDecision, DownloadError> {
        let choice = options
            .get_payment_option(token)
            .await?
            .map(|o| o.option)
            .unwrap_or(PaymentChoice::Pdf);

        if !self.check_and_register_download(token).await? {
            return Ok(DownloadDecision::Denied);
        }

        let artifact = Artifact::for_choice(choice);
        let url = storage
            .signed_url(&artifact.path(token), DOWNLOAD_URL_TTL_SECS)
            .await
            .map_err(DownloadError::Storage)?;

        log::info!(
            "Issued {} download for token {}...",
            artifact.filename(),
            token.log_prefix()
        );
        Ok(DownloadDecision::Authorized { url, artifact })
    }
}
