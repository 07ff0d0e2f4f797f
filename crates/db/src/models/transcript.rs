use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Stored instead of an empty string so that "processed, nothing said" can be
/// told apart from "not processed yet".
pub const NO_SPEECH_SENTINEL: &str = "no speech";

/// One transcript per `(device_id, local_date, time_block)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub device_id: String,
    pub local_date: String,
    pub time_block: String,
    pub transcription: String,
    pub provider: String,
    pub model: String,
    pub confidence: f64,
    pub word_count: u32,
    pub processing_time_seconds: f64,
    pub estimated_duration_seconds: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Transcript {
    pub const COLLECTION: &'static str = "transcripts";

    pub fn is_no_speech(&self) -> bool {
        self.transcription == NO_SPEECH_SENTINEL
    }
}
