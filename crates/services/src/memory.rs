//! In-process stores for tests and dry runs.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use koe_db::models::{ArtifactStatus, AudioFile, Transcript};

use crate::dao::{DaoError, DaoResult, UpsertAck};
use crate::pipeline::DedupeKey;
use crate::pipeline::resolver::parse_artifact_path;
use crate::storage::{ObjectStore, StorageError};
use crate::store::{ArtifactRegistry, TranscriptStore};

/// Artifact registry keyed by `file_path`.
#[derive(Default)]
pub struct MemoryArtifactRegistry {
    files: DashMap<String, AudioFile>,
    status_history: DashMap<String, Vec<ArtifactStatus>>,
    fail_status_updates: AtomicBool,
}

impl MemoryArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: AudioFile) {
        self.files.insert(file.file_path.clone(), file);
    }

    /// Registers a `pending` artifact from a positional path. Paths that do
    /// not follow the layout are ignored.
    pub fn register(&self, path: &str) {
        if let Some(item) = parse_artifact_path(path) {
            let now = bson::DateTime::now();
            self.insert(AudioFile {
                id: None,
                file_path: item.artifact_path,
                device_id: item.device_id,
                local_date: item.local_date,
                time_block: item.time_block,
                transcriptions_status: ArtifactStatus::Pending,
                created_at: now,
                updated_at: now,
            });
        }
    }

    pub fn status_of(&self, file_path: &str) -> Option<ArtifactStatus> {
        self.files.get(file_path).map(|f| f.transcriptions_status)
    }

    /// Every status written for `file_path`, oldest first.
    pub fn status_history(&self, file_path: &str) -> Vec<ArtifactStatus> {
        self.status_history
            .get(file_path)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactRegistry for MemoryArtifactRegistry {
    async fn find_for_device_date(
        &self,
        device_id: &str,
        local_date: &str,
        time_blocks: Option<&BTreeSet<String>>,
    ) -> DaoResult<Vec<AudioFile>> {
        let mut files: Vec<AudioFile> = self
            .files
            .iter()
            .filter(|f| f.device_id == device_id && f.local_date == local_date)
            .filter(|f| time_blocks.is_none_or(|blocks| blocks.contains(&f.time_block)))
            .map(|f| f.value().clone())
            .collect();
        files.sort_by(|a, b| a.time_block.cmp(&b.time_block));
        Ok(files)
    }

    async fn update_status(&self, file_path: &str, status: ArtifactStatus) -> DaoResult<bool> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(DaoError::Unavailable("status updates disabled".to_string()));
        }
        self.status_history
            .entry(file_path.to_string())
            .or_default()
            .push(status);
        match self.files.get_mut(file_path) {
            Some(mut file) => {
                file.transcriptions_status = status;
                file.updated_at = bson::DateTime::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Transcript store keyed by dedupe key, with fault injection.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    rows: DashMap<DedupeKey, Transcript>,
    fail_next: AtomicU32,
    drop_acks: AtomicU32,
    upsert_calls: AtomicUsize,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` upserts fail without writing.
    pub fn fail_next_upserts(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// The next `n` upserts write but report `Unconfirmed`.
    pub fn drop_next_acks(&self, n: u32) {
        self.drop_acks.store(n, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &DedupeKey) -> Option<Transcript> {
        self.rows.get(key).map(|r| r.clone())
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn upsert(&self, row: &Transcript) -> DaoResult<UpsertAck> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.fail_next) {
            return Err(DaoError::Unavailable("injected upsert failure".to_string()));
        }

        let key = DedupeKey {
            device_id: row.device_id.clone(),
            local_date: row.local_date.clone(),
            time_block: row.time_block.clone(),
        };
        let now = bson::DateTime::now();
        let ack = match self.rows.get_mut(&key) {
            Some(mut existing) => {
                let created_at = existing.created_at;
                *existing = row.clone();
                existing.created_at = created_at;
                existing.updated_at = now;
                UpsertAck::Updated
            }
            None => {
                self.rows.insert(key, row.clone());
                UpsertAck::Inserted
            }
        };

        if take_one(&self.drop_acks) {
            return Ok(UpsertAck::Unconfirmed);
        }
        Ok(ack)
    }

    async fn find_by_key(&self, key: &DedupeKey) -> DaoResult<Option<Transcript>> {
        Ok(self.get(key))
    }
}

/// Object store over a map of key to bytes.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
    downloads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.insert(key.to_string(), bytes);
    }

    /// Download attempts so far, including misses.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<u64, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .objects
            .get(key)
            .map(|b| b.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
