use std::collections::BTreeSet;
use std::fmt;

use koe_db::models::{ArtifactStatus, AudioFile};
use serde::{Deserialize, Serialize};

/// At most one transcript exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupeKey {
    pub device_id: String,
    pub local_date: String,
    pub time_block: String,
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device_id, self.local_date, self.time_block)
    }
}

/// One artifact to process within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub artifact_path: String,
    pub device_id: String,
    pub local_date: String,
    pub time_block: String,
}

impl WorkItem {
    pub fn key(&self) -> DedupeKey {
        DedupeKey {
            device_id: self.device_id.clone(),
            local_date: self.local_date.clone(),
            time_block: self.time_block.clone(),
        }
    }

    /// Last path segment, used as the upload filename.
    pub fn filename(&self) -> &str {
        self.artifact_path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(self.artifact_path.as_str())
    }

    pub fn to_ref(&self, status: ArtifactStatus, error: Option<String>) -> WorkItemRef {
        WorkItemRef {
            artifact_path: self.artifact_path.clone(),
            device_id: self.device_id.clone(),
            local_date: self.local_date.clone(),
            time_block: self.time_block.clone(),
            status,
            error,
        }
    }
}

impl From<AudioFile> for WorkItem {
    fn from(file: AudioFile) -> Self {
        Self {
            artifact_path: file.file_path,
            device_id: file.device_id,
            local_date: file.local_date,
            time_block: file.time_block,
        }
    }
}

/// A processed item as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemRef {
    pub artifact_path: String,
    pub device_id: String,
    pub local_date: String,
    pub time_block: String,
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /fetch-and-transcribe`. Exactly one shape is populated:
/// explicit paths, or a device and local date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default, alias = "artifact_paths", skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_blocks: Option<BTreeSet<String>>,
    /// Vendor to use for this batch instead of the configured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchShape {
    Paths(Vec<String>),
    DeviceDate {
        device_id: String,
        local_date: String,
        time_blocks: Option<BTreeSet<String>>,
    },
}

impl BatchRequest {
    pub fn for_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_paths: Some(paths.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn for_device_date(device_id: &str, local_date: &str) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            local_date: Some(local_date.to_string()),
            ..Self::default()
        }
    }

    pub fn with_time_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_blocks = Some(blocks.into_iter().map(Into::into).collect());
        self
    }

    /// Validates that exactly one request shape is populated.
    pub fn shape(&self) -> Result<BatchShape, String> {
        let device_shape = self.device_id.is_some() || self.local_date.is_some();
        match (&self.file_paths, device_shape) {
            (Some(_), true) => Err(
                "specify either file_paths or device_id/local_date, not both".to_string(),
            ),
            (Some(paths), false) => {
                if self.time_blocks.is_some() {
                    return Err("time_blocks requires device_id and local_date".to_string());
                }
                Ok(BatchShape::Paths(paths.clone()))
            }
            (None, true) => {
                let device_id = non_empty(&self.device_id)
                    .ok_or_else(|| "device_id is required with local_date".to_string())?;
                let local_date = non_empty(&self.local_date)
                    .ok_or_else(|| "local_date is required with device_id".to_string())?;
                Ok(BatchShape::DeviceDate {
                    device_id,
                    local_date,
                    time_blocks: self.time_blocks.clone(),
                })
            }
            (None, false) => {
                Err("either file_paths or device_id and local_date are required".to_string())
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Summary of one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_items: usize,
    pub succeeded: Vec<WorkItemRef>,
    pub failed: Vec<WorkItemRef>,
    pub skipped: Vec<WorkItemRef>,
    pub quota_exceeded: usize,
    pub elapsed_seconds: f64,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_time_blocks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_paths: Option<Vec<String>>,
    pub message: String,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    pub fn summary_message(&self) -> String {
        if self.is_empty() {
            return "No audio files matched the request".to_string();
        }
        let mut message = format!(
            "Processed {} of {} items: {} succeeded, {} failed, {} skipped",
            self.succeeded.len() + self.failed.len(),
            self.total_items,
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len(),
        );
        if self.quota_exceeded > 0 {
            message.push_str(&format!(" ({} quota exceeded)", self.quota_exceeded));
        }
        message
    }
}
