use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A recorded audio artifact registered by the upload side.
///
/// Rows are created externally with status `pending`; this service only
/// moves `transcriptions_status` forward after each processing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Object-storage key, `{prefix}/{device_id}/{local_date}/{time_block}/{filename}`.
    pub file_path: String,
    pub device_id: String,
    pub local_date: String,
    pub time_block: String,
    #[serde(default)]
    pub transcriptions_status: ArtifactStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    QuotaExceeded,
    Skipped,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Processing => "processing",
            ArtifactStatus::Completed => "completed",
            ArtifactStatus::Failed => "failed",
            ArtifactStatus::QuotaExceeded => "quota_exceeded",
            ArtifactStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AudioFile {
    pub const COLLECTION: &'static str = "audio_files";
}
