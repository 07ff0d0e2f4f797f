use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::StreamExt;
use koe_config::Settings;
use koe_db::models::ArtifactStatus;
use koe_transcription::{ConfigurationError, RecognitionOptions, RecognitionProvider};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use super::persistence::PersistenceCoordinator;
use super::quota::{Classification, QuotaHeuristic};
use super::resolver::BatchRequestResolver;
use super::scheduling::SchedulingPolicy;
use super::work_item::{BatchRequest, BatchResult, BatchShape, DedupeKey, WorkItem, WorkItemRef};
use crate::dao::DaoError;
use crate::providers::ProviderSource;
use crate::storage::{ObjectStore, StagedArtifact};
use crate::store::{ArtifactRegistry, TranscriptStore};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Invalid batch request: {0}")]
    Validation(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to resolve batch: {0}")]
    Resolution(#[from] DaoError),
}

/// Async locks per dedupe key, shared by every batch on this orchestrator.
#[derive(Default)]
pub struct KeyLocks {
    locks: Arc<DashMap<DedupeKey, Arc<Mutex<()>>>>,
}

/// Held while a key is being processed. The map entry is dropped with the
/// last holder.
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<DedupeKey, Arc<Mutex<()>>>>,
    key: DedupeKey,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: DedupeKey) -> KeyGuard {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            key,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

struct ItemOutcome {
    item_ref: WorkItemRef,
    quota_exceeded: bool,
}

/// Runs batches: resolve, gate, fetch, recognize, classify, persist.
pub struct Orchestrator {
    resolver: BatchRequestResolver,
    objects: Arc<dyn ObjectStore>,
    providers: Arc<dyn ProviderSource>,
    scheduling: SchedulingPolicy,
    quota: QuotaHeuristic,
    persistence: PersistenceCoordinator,
    locks: KeyLocks,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn ArtifactRegistry>,
        transcripts: Arc<dyn TranscriptStore>,
        objects: Arc<dyn ObjectStore>,
        providers: Arc<dyn ProviderSource>,
    ) -> Self {
        Self {
            resolver: BatchRequestResolver::new(registry.clone()),
            objects,
            providers,
            scheduling: SchedulingPolicy::default(),
            quota: QuotaHeuristic::default(),
            persistence: PersistenceCoordinator::new(transcripts, registry),
            locks: KeyLocks::new(),
            concurrency: 1,
        }
    }

    /// Applies pipeline, quota and scheduling settings.
    pub fn configured(self, settings: &Settings) -> Self {
        self.with_concurrency(settings.pipeline.concurrency)
            .with_persist_retry(
                settings.pipeline.persist_attempts,
                Duration::from_millis(settings.pipeline.persist_backoff_ms),
            )
            .with_quota(QuotaHeuristic::from_settings(&settings.quota))
            .with_scheduling(SchedulingPolicy::from_settings(&settings.scheduling.blackouts))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_persist_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.persistence = self.persistence.with_retry(attempts, backoff);
        self
    }

    pub fn with_quota(mut self, quota: QuotaHeuristic) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingPolicy) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Processes every item the request resolves to.
    ///
    /// Only validation, provider selection and resolution errors abort the
    /// batch; per-item failures are reported in the result.
    pub async fn run_batch(&self, request: &BatchRequest) -> Result<BatchResult, BatchError> {
        let started = Instant::now();
        let shape = request.shape().map_err(BatchError::Validation)?;

        let provider = match request.model.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => self.providers.select(name, None)?,
            _ => self.providers.current()?,
        };

        let items = self.resolver.resolve(&shape).await?;
        info!(
            items = items.len(),
            provider = provider.provider_name(),
            concurrency = self.concurrency,
            "Starting batch"
        );

        let outcomes: Vec<ItemOutcome> = futures::stream::iter(
            items
                .into_iter()
                .map(|item| self.process_item(item, provider.clone())),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut result = BatchResult {
            total_items: outcomes.len(),
            provider: provider.provider_name().to_string(),
            model: provider.model_name(),
            ..BatchResult::default()
        };
        match shape {
            BatchShape::Paths(paths) => result.requested_paths = Some(paths),
            BatchShape::DeviceDate {
                device_id,
                local_date,
                time_blocks,
            } => {
                result.device_id = Some(device_id);
                result.local_date = Some(local_date);
                result.requested_time_blocks = time_blocks.map(|b| b.into_iter().collect());
            }
        }

        for outcome in outcomes {
            if outcome.quota_exceeded {
                result.quota_exceeded += 1;
            }
            match outcome.item_ref.status {
                ArtifactStatus::Completed => result.succeeded.push(outcome.item_ref),
                ArtifactStatus::Skipped => result.skipped.push(outcome.item_ref),
                _ => result.failed.push(outcome.item_ref),
            }
        }
        result.elapsed_seconds = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        result.message = result.summary_message();

        info!(
            total = result.total_items,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            quota_exceeded = result.quota_exceeded,
            elapsed = result.elapsed_seconds,
            "Batch finished"
        );
        Ok(result)
    }

    async fn process_item(
        &self,
        item: WorkItem,
        provider: Arc<dyn RecognitionProvider>,
    ) -> ItemOutcome {
        if let Some(window) = self.scheduling.blackout_for(&item) {
            info!(
                key = %item.key(),
                start_hour = window.start_hour,
                end_hour = window.end_hour,
                reason = window.reason.as_deref().unwrap_or(""),
                "Skipping item inside blackout window"
            );
            self.persistence
                .update_status(&item.artifact_path, ArtifactStatus::Skipped)
                .await;
            return ItemOutcome {
                item_ref: item.to_ref(ArtifactStatus::Skipped, None),
                quota_exceeded: false,
            };
        }

        let _guard = self.locks.acquire(item.key()).await;
        self.persistence
            .update_status(&item.artifact_path, ArtifactStatus::Processing)
            .await;

        let (status, error) = match self.transcribe(&item, provider.as_ref()).await {
            Ok(status) => (status, None),
            Err(message) => {
                warn!(key = %item.key(), error = %message, "Item failed");
                (ArtifactStatus::Failed, Some(message))
            }
        };
        let (status, error) = match status {
            ArtifactStatus::QuotaExceeded => (
                status,
                Some("empty transcript before the daily quota reset".to_string()),
            ),
            ArtifactStatus::Failed if error.is_none() => (
                status,
                Some("empty transcript without a silence signal".to_string()),
            ),
            _ => (status, error),
        };

        self.persistence
            .update_status(&item.artifact_path, status)
            .await;
        ItemOutcome {
            item_ref: item.to_ref(status, error),
            quota_exceeded: status == ArtifactStatus::QuotaExceeded,
        }
    }

    /// Fetch, recognize, classify and persist one item. Returns the final
    /// status, or the failure message.
    async fn transcribe(
        &self,
        item: &WorkItem,
        provider: &dyn RecognitionProvider,
    ) -> Result<ArtifactStatus, String> {
        let result = {
            let staged = StagedArtifact::fetch(self.objects.as_ref(), &item.artifact_path)
                .await
                .map_err(|e| format!("fetch failed: {e}"))?;
            let audio = staged
                .read()
                .await
                .map_err(|e| format!("fetch failed: {e}"))?;
            provider
                .recognize(&audio, item.filename(), RecognitionOptions::default())
                .await
                .map_err(|e| format!("recognition failed: {e}"))?
        };

        match self.quota.classify(&result) {
            Classification::QuotaExceeded => {
                warn!(key = %item.key(), "Empty result before quota reset, marking quota_exceeded");
                Ok(ArtifactStatus::QuotaExceeded)
            }
            Classification::Unexplained => {
                warn!(key = %item.key(), "Empty result without silence signal");
                Ok(ArtifactStatus::Failed)
            }
            Classification::Transcribed | Classification::Silence => {
                let row = PersistenceCoordinator::row_for(
                    item,
                    &result,
                    provider.provider_name(),
                    &provider.model_name(),
                );
                self.persistence
                    .upsert(&row)
                    .await
                    .map_err(|e| e.to_string())?;
                info!(
                    key = %item.key(),
                    chars = result.transcript.chars().count(),
                    no_speech = result.no_speech_detected,
                    "Item transcribed"
                );
                Ok(ArtifactStatus::Completed)
            }
        }
    }
}
