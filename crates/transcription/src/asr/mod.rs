pub mod azure;
pub mod openai_compatible;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Max wait for one recognition in normal mode.
pub const NORMAL_MAX_WAIT_SECS: u64 = 300;
/// Max wait for one recognition in high-accuracy mode.
pub const HIGH_ACCURACY_MAX_WAIT_SECS: u64 = 600;

/// Per-call recognition options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    /// Include per-segment / per-word detail in the result.
    pub detailed: bool,
    /// Slower, stricter vendor configuration with a longer max wait.
    pub high_accuracy: bool,
}

impl RecognitionOptions {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs())
    }

    pub fn max_wait_secs(&self) -> u64 {
        if self.high_accuracy {
            HIGH_ACCURACY_MAX_WAIT_SECS
        } else {
            NORMAL_MAX_WAIT_SECS
        }
    }
}

/// Normalized outcome of one recognition call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub transcript: String,
    pub confidence: f32,
    pub processing_time_seconds: f64,
    pub word_count: usize,
    pub estimated_duration_seconds: f64,
    /// Set only on an explicit "nothing was said" signal from the vendor.
    pub no_speech_detected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RecognitionWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<RecognitionDetail>,
    #[serde(default)]
    pub detailed_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_used_seconds: Option<u64>,
}

impl ProviderResult {
    /// Result for a vendor that explicitly reported silence.
    pub fn no_speech(processing_time_seconds: f64) -> Self {
        Self {
            transcript: String::new(),
            confidence: 0.0,
            processing_time_seconds: round2(processing_time_seconds),
            word_count: 0,
            estimated_duration_seconds: 0.0,
            no_speech_detected: true,
            warnings: Vec::new(),
            detail: None,
            detailed_mode: false,
            mode: None,
            timeout_used_seconds: None,
        }
    }

    /// Result carrying recognized text. `duration` is the vendor's native audio
    /// duration when it reports one.
    pub fn recognized(
        transcript: String,
        confidence: f32,
        processing_time_seconds: f64,
        duration: Option<f64>,
    ) -> Self {
        let word_count = transcript.split_whitespace().count();
        let estimated_duration_seconds =
            duration.unwrap_or_else(|| round2(processing_time_seconds * 0.8));
        Self {
            transcript,
            confidence: confidence.clamp(0.0, 1.0),
            processing_time_seconds: round2(processing_time_seconds),
            word_count,
            estimated_duration_seconds: estimated_duration_seconds.max(0.0),
            no_speech_detected: false,
            warnings: Vec::new(),
            detail: None,
            detailed_mode: false,
            mode: None,
            timeout_used_seconds: None,
        }
    }

    /// Records which options produced this result.
    pub fn with_options(mut self, options: RecognitionOptions) -> Self {
        if options.detailed {
            self.detailed_mode = true;
        }
        if options.high_accuracy {
            self.mode = Some("high_accuracy".to_string());
            self.timeout_used_seconds = Some(options.max_wait_secs());
        }
        self
    }

    /// Empty text with no explicit silence signal: either quota exhaustion or
    /// an unexplained failure, never genuine silence.
    pub fn is_unexplained_empty(&self) -> bool {
        self.transcript.is_empty() && !self.no_speech_detected
    }
}

/// A partial failure reported next to an otherwise successful transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionWarning {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionDetail {
    pub segments: Vec<DetailSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionErrorKind {
    /// The vendor heard audio but could not match it to speech.
    NoMatch,
    /// The vendor aborted the request (auth, service-side error).
    Canceled,
    /// Network failure, throttling, 5xx or timeout. Retried.
    Transport,
    Unknown,
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecognitionErrorKind::NoMatch => "NoMatch",
            RecognitionErrorKind::Canceled => "Canceled",
            RecognitionErrorKind::Transport => "Transport",
            RecognitionErrorKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    pub message: String,
}

impl RecognitionError {
    pub fn new(kind: RecognitionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::NoMatch, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::Canceled, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::Transport, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::Unknown, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == RecognitionErrorKind::Transport
    }

    /// Classifies a vendor HTTP status that is not a success.
    pub fn from_status(vendor: &str, status: u16, body: &str) -> Self {
        let message = format!("{vendor} returned {status}: {body}");
        match status {
            401 | 403 => Self::canceled(message),
            408 | 429 | 500..=599 => Self::transport(message),
            _ => Self::unknown(message),
        }
    }

    /// Classifies a failed `reqwest` send.
    pub fn from_reqwest(vendor: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::transport(format!("{vendor} request failed: {err}"))
        } else {
            Self::unknown(format!("{vendor} request failed: {err}"))
        }
    }
}

/// Uniform contract over recognition vendors.
#[async_trait]
pub trait RecognitionProvider: Send + Sync + 'static {
    /// Transcribes one complete audio artifact.
    async fn recognize(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<ProviderResult, RecognitionError>;

    /// Vendor name, e.g. "azure".
    fn provider_name(&self) -> &str;

    /// Vendor-qualified model, e.g. "azure/ja-JP".
    fn model_name(&self) -> String;
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// MIME type for an upload, from the file extension.
pub(crate) fn audio_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
