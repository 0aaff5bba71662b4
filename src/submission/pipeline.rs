//! Submission pipeline
//!
//! Drives one report or event through preparing → uploading → finalizing.
//! Every failure comes back as a [`SubmitError`]; nothing is retried.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::payload::SubmissionPayload;
use super::progress::{
    ProgressCell, SubmissionPhase, SubmissionProgress, DONE, PREPARING_TARGET, UPLOADING_TARGET,
};
use crate::config::{ApiConfig, Config, SubmissionConfig};
use crate::identity::{ConfiguredIdentity, IdentityProvider};
use crate::wizard::{FormSnapshot, RequiredField, WizardError};

const DEFAULT_API_URL: &str = "https://api.citizen-report.org";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Champ obligatoire manquant : {0}")]
    Validation(RequiredField),

    #[error("Un envoi est déjà en cours")]
    Busy,

    #[error("Utilisateur non identifié, reconnectez-vous")]
    MissingUser,

    #[error("Photo illisible ({path}) : {message}")]
    Photo { path: String, message: String },

    #[error("Serveur injoignable : {0}")]
    Network(String),

    #[error("Erreur serveur ({status}): {body}")]
    Server { status: u16, body: String },
}

impl From<reqwest::Error> for SubmitError {
    fn from(err: reqwest::Error) -> Self {
        SubmitError::Network(err.to_string())
    }
}

impl From<WizardError> for SubmitError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Validation(field) => SubmitError::Validation(field),
            WizardError::Busy => SubmitError::Busy,
        }
    }
}

/// What the backend acknowledged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub attempt_id: Uuid,
    /// `id` or `_id` from the response body, when present
    pub server_id: Option<String>,
    pub body: Value,
}

impl SubmissionReceipt {
    fn new(attempt_id: Uuid, body: Value) -> Self {
        let server_id = ["id", "_id"]
            .iter()
            .find_map(|key| match body.get(*key) {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            });
        Self {
            attempt_id,
            server_id,
            body,
        }
    }
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SubmissionPipeline {
    client: Client,
    base_url: String,
    pacing: SubmissionConfig,
    identity: Arc<dyn IdentityProvider>,
    progress: ProgressCell,
    in_flight: AtomicBool,
}

impl SubmissionPipeline {
    pub fn new(
        api: &ApiConfig,
        pacing: SubmissionConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let timeout = Duration::from_secs(api.timeout_seconds.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!api.verify_ssl)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: normalize_base_url(&api.base_url),
            pacing,
            identity,
            progress: ProgressCell::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Pipeline using the configured backend and user id.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.api,
            config.submission.clone(),
            Arc::new(ConfiguredIdentity::from_config(&config.user)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn progress(&self) -> watch::Receiver<SubmissionProgress> {
        self.progress.subscribe()
    }

    pub fn current_progress(&self) -> SubmissionProgress {
        self.progress.current()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one attempt. A call made while another is running returns
    /// `Busy` without touching the network.
    pub async fn submit(&self, snapshot: FormSnapshot) -> Result<SubmissionReceipt, SubmitError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("submission rejected, another attempt is in flight");
            return Err(SubmitError::Busy);
        }
        let _flight = FlightGuard(&self.in_flight);

        let attempt_id = Uuid::new_v4();
        let span = info_span!("submission", attempt = %attempt_id, kind = snapshot.kind.as_str());
        self.progress.reset();

        let result = self.run(attempt_id, &snapshot).instrument(span).await;
        match &result {
            Ok(receipt) => info!(
                attempt = %attempt_id,
                server_id = receipt.server_id.as_deref().unwrap_or("-"),
                "submission accepted"
            ),
            Err(err) => {
                self.progress.fail();
                warn!(attempt = %attempt_id, error = %err, "submission failed");
            }
        }
        result
    }

    async fn run(
        &self,
        attempt_id: Uuid,
        snapshot: &FormSnapshot,
    ) -> Result<SubmissionReceipt, SubmitError> {
        self.progress.enter(SubmissionPhase::Preparing);
        snapshot.validate().map_err(SubmitError::Validation)?;

        let user_id = self
            .identity
            .user_id()
            .filter(|id| !id.trim().is_empty())
            .ok_or(SubmitError::MissingUser)?;

        let address = snapshot
            .location
            .payload_address(self.pacing.current_location_wait())
            .await;
        let payload = SubmissionPayload::assemble(snapshot, &user_id, address.as_deref()).await?;
        self.progress
            .reach(SubmissionPhase::Preparing, PREPARING_TARGET);
        sleep(self.pacing.preparing_delay()).await;

        self.progress.enter(SubmissionPhase::Uploading);
        let url = format!("{}{}", self.base_url, payload.endpoint());
        let form = payload.into_form()?;
        let response = self.client.post(&url).multipart(form).send().await?;
        self.progress
            .reach(SubmissionPhase::Uploading, UPLOADING_TARGET);

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SubmitError::Server {
                status: status.as_u16(),
                body,
            });
        }

        self.progress.enter(SubmissionPhase::Finalizing);
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(error = %err, "submission response is not JSON");
                Value::Null
            })
        };
        sleep(self.pacing.finalizing_delay()).await;

        self.progress.reach(SubmissionPhase::Succeeded, DONE);
        Ok(SubmissionReceipt::new(attempt_id, body))
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return DEFAULT_API_URL.to_string();
    }
    trimmed.trim_end_matches('/').to_string()
}
