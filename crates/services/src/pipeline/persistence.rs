use std::sync::Arc;
use std::time::Duration;

use koe_db::models::{ArtifactStatus, NO_SPEECH_SENTINEL, Transcript};
use koe_transcription::ProviderResult;
use tracing::{debug, error, warn};

use super::work_item::{DedupeKey, WorkItem};
use crate::dao::UpsertAck;
use crate::store::{ArtifactRegistry, TranscriptStore};

#[derive(Debug, thiserror::Error)]
#[error("transcript for {key} not persisted after {attempts} attempts: {last_error}")]
pub struct PersistenceError {
    pub key: DedupeKey,
    pub attempts: u32,
    pub last_error: String,
}

/// Writes transcripts idempotently and records artifact status.
pub struct PersistenceCoordinator {
    transcripts: Arc<dyn TranscriptStore>,
    registry: Arc<dyn ArtifactRegistry>,
    attempts: u32,
    backoff: Duration,
}

impl PersistenceCoordinator {
    pub fn new(
        transcripts: Arc<dyn TranscriptStore>,
        registry: Arc<dyn ArtifactRegistry>,
    ) -> Self {
        Self {
            transcripts,
            registry,
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }

    /// Attempts per upsert and the linear backoff unit (n-th retry waits n units).
    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Row for `item` from a recognition result.
    pub fn row_for(
        item: &WorkItem,
        result: &ProviderResult,
        provider: &str,
        model: &str,
    ) -> Transcript {
        let now = bson::DateTime::now();
        let transcription = if result.transcript.is_empty() {
            NO_SPEECH_SENTINEL.to_string()
        } else {
            result.transcript.clone()
        };
        Transcript {
            id: None,
            device_id: item.device_id.clone(),
            local_date: item.local_date.clone(),
            time_block: item.time_block.clone(),
            transcription,
            provider: provider.to_string(),
            model: model.to_string(),
            confidence: f64::from(result.confidence),
            word_count: u32::try_from(result.word_count).unwrap_or(u32::MAX),
            processing_time_seconds: result.processing_time_seconds,
            estimated_duration_seconds: result.estimated_duration_seconds,
            created_at: now,
            updated_at: now,
        }
    }

    /// Upserts `row` by its dedupe key, retrying with linear backoff.
    ///
    /// An unconfirmed or failed write is followed by a read-back; a row that
    /// is present afterwards counts as written.
    pub async fn upsert(&self, row: &Transcript) -> Result<UpsertAck, PersistenceError> {
        let key = DedupeKey {
            device_id: row.device_id.clone(),
            local_date: row.local_date.clone(),
            time_block: row.time_block.clone(),
        };
        let mut last_error = String::from("write not acknowledged");

        for attempt in 1..=self.attempts {
            match self.transcripts.upsert(row).await {
                Ok(ack @ (UpsertAck::Inserted | UpsertAck::Updated)) => {
                    debug!(key = %key, ?ack, attempt, "Transcript persisted");
                    return Ok(ack);
                }
                Ok(UpsertAck::Unconfirmed) => {
                    last_error = "write not acknowledged".to_string();
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            match self.transcripts.find_by_key(&key).await {
                Ok(Some(stored)) if stored.transcription == row.transcription => {
                    debug!(key = %key, attempt, "Transcript confirmed by read-back");
                    return Ok(UpsertAck::Unconfirmed);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Read-back after upsert failed");
                }
            }

            if attempt < self.attempts {
                let delay = self.backoff * attempt;
                warn!(
                    key = %key,
                    attempt,
                    max_attempts = self.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Transcript upsert failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!(key = %key, error = %last_error, "Transcript upsert gave up");
        Err(PersistenceError {
            key,
            attempts: self.attempts,
            last_error,
        })
    }

    /// Best-effort status write. Failures are logged, never returned.
    pub async fn update_status(&self, artifact_path: &str, status: ArtifactStatus) -> bool {
        match self.registry.update_status(artifact_path, status).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(artifact_path, %status, "No registry row for artifact");
                false
            }
            Err(e) => {
                warn!(artifact_path, %status, error = %e, "Status update failed");
                false
            }
        }
    }
}
