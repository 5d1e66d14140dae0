//! Consent ledger client
//!
//! Every completed export is recorded in an external compliance ledger.
//! The entry carries hashed data-subject identifiers only; raw PersonalID
//! values never leave the pipeline. Ledger unavailability after the
//! artifact is stored is retryable and job-non-fatal; the orchestrator
//! records the miss for reconciliation instead of failing the job.

use crate::config::{LedgerConfig, RetryConfig};
use crate::domain::errors::LedgerError;
use crate::domain::ids::ExportJobId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

/// One compliance ledger entry for a completed export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentLedgerEntry {
    pub job_id: ExportJobId,
    pub organization_name: String,
    pub coc_code: String,
    /// SHA-256 hashes of the distinct data-subject identifiers
    pub hashed_subject_ids: BTreeSet<String>,
    pub subject_count: u64,
    pub consent_scopes: BTreeSet<String>,
    pub hashed: bool,
    pub period_start: String,
    pub period_end: String,
    pub requested_by: String,
    pub storage_location: String,
    pub artifact_sha256: String,
    pub vawa_suppressed_count: u64,
    pub retention_expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntryResponse {
    ledger_entry_id: String,
}

/// Records completed exports in the external compliance ledger
#[async_trait]
pub trait ConsentLedgerClient: Send + Sync {
    /// Records one entry, returning the ledger's entry ID.
    async fn record(&self, entry: &ConsentLedgerEntry) -> Result<String, LedgerError>;
}

/// HTTP client for the consent ledger API
///
/// Retries transient failures with exponential backoff per the configured
/// retry policy. When the ledger is disabled in configuration, entries are
/// acknowledged locally with a `DISABLED-` entry ID so the rest of the
/// pipeline stays uniform.
pub struct HttpConsentLedgerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    enabled: bool,
}

impl HttpConsentLedgerClient {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().as_ref().to_string()),
            retry: config.retry.clone(),
            enabled: config.enabled,
        })
    }

    async fn post_entry(&self, entry: &ConsentLedgerEntry) -> Result<String, LedgerError> {
        let url = format!("{}/ledger/entries", self.base_url);
        let mut request = self.client.post(&url).json(entry);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: LedgerEntryResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        Ok(body.ledger_entry_id)
    }
}

#[async_trait]
impl ConsentLedgerClient for HttpConsentLedgerClient {
    async fn record(&self, entry: &ConsentLedgerEntry) -> Result<String, LedgerError> {
        if !self.enabled {
            let entry_id = format!("DISABLED-{}", Uuid::new_v4());
            tracing::debug!(
                job_id = %entry.job_id,
                ledger_entry_id = %entry_id,
                "Consent ledger disabled; entry acknowledged locally"
            );
            return Ok(entry_id);
        }

        let mut delay = Duration::from_millis(self.retry.initial_delay_ms);
        let mut attempt = 0usize;
        loop {
            match self.post_entry(entry).await {
                Ok(entry_id) => {
                    tracing::info!(
                        job_id = %entry.job_id,
                        ledger_entry_id = %entry_id,
                        subjects = entry.subject_count,
                        "Consent ledger entry recorded"
                    );
                    return Ok(entry_id);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        job_id = %entry.job_id,
                        attempt = attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Consent ledger call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    let next =
                        (delay.as_millis() as f64 * self.retry.backoff_multiplier) as u64;
                    delay = Duration::from_millis(next.min(self.retry.max_delay_ms));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// In-memory client for tests
#[derive(Default)]
pub struct InMemoryLedgerClient {
    entries: tokio::sync::Mutex<Vec<ConsentLedgerEntry>>,
    fail_with: std::sync::Mutex<Option<u16>>,
}

impl InMemoryLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `record` calls fail with the given HTTP status.
    pub fn fail_with_status(&self, status: u16) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    pub async fn entries(&self) -> Vec<ConsentLedgerEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl ConsentLedgerClient for InMemoryLedgerClient {
    async fn record(&self, entry: &ConsentLedgerEntry) -> Result<String, LedgerError> {
        let failure = *self.fail_with.lock().unwrap();
        if let Some(status) = failure {
            return Err(LedgerError::Rejected {
                status,
                message: "injected failure".to_string(),
            });
        }
        self.entries.lock().await.push(entry.clone());
        Ok(format!("ledger-{}", Uuid::new_v4()))
    }
}
