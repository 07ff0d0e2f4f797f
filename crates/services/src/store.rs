//! Persistence seams consumed by the pipeline. MongoDB DAOs and the
//! in-memory stores both implement these.

use std::collections::BTreeSet;

use async_trait::async_trait;
use koe_db::models::{ArtifactStatus, AudioFile, Transcript};

use crate::dao::base::{DaoResult, UpsertAck};
use crate::pipeline::DedupeKey;

#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// All artifacts for a device and day, any status, sorted by `time_block`.
    /// `time_blocks` narrows the result when given.
    async fn find_for_device_date(
        &self,
        device_id: &str,
        local_date: &str,
        time_blocks: Option<&BTreeSet<String>>,
    ) -> DaoResult<Vec<AudioFile>>;

    /// Sets `transcriptions_status` for the artifact at `file_path`.
    /// Returns whether a registry row matched.
    async fn update_status(&self, file_path: &str, status: ArtifactStatus) -> DaoResult<bool>;
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Insert-or-overwrite keyed by the row's dedupe key.
    async fn upsert(&self, row: &Transcript) -> DaoResult<UpsertAck>;

    async fn find_by_key(&self, key: &DedupeKey) -> DaoResult<Option<Transcript>>;
}
