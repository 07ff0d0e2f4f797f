use axum::{
    Json,
    extract::{Multipart, Query, State},
};
use koe_transcription::{
    ProviderResult, RecognitionDetail, RecognitionOptions, RecognitionProvider,
    RecognitionWarning,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{error::ApiError, state::AppState};

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["wav", "mp3", "m4a"];

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeParams {
    #[serde(default)]
    pub detailed: bool,
    #[serde(default)]
    pub high_accuracy: bool,
    /// Vendor override for this request only.
    pub provider: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub transcription: String,
    pub confidence: f32,
    pub processing_time: f64,
    pub word_count: usize,
    pub estimated_duration: f64,
    pub no_speech_detected: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RecognitionWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<RecognitionDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_used: Option<u64>,
    pub detailed_mode: bool,
    pub provider_name: String,
    pub model_name: String,
}

impl AnalyzeResponse {
    fn new(result: ProviderResult, provider: &dyn RecognitionProvider) -> Self {
        Self {
            transcription: result.transcript,
            confidence: result.confidence,
            processing_time: result.processing_time_seconds,
            word_count: result.word_count,
            estimated_duration: result.estimated_duration_seconds,
            no_speech_detected: result.no_speech_detected,
            warnings: result.warnings,
            detail: result.detail,
            mode: result.mode,
            timeout_used: result.timeout_used_seconds,
            detailed_mode: result.detailed_mode,
            provider_name: provider.provider_name().to_string(),
            model_name: provider.model_name(),
        }
    }
}

/// Checks an upload's filename before any bytes reach a provider.
pub fn validate_filename(filename: Option<&str>) -> Result<String, ApiError> {
    let filename = filename
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type. Allowed: {}",
            ALLOWED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(filename.to_string())
}

fn select_provider(
    state: &AppState,
    params: &AnalyzeParams,
) -> Result<Arc<dyn RecognitionProvider>, ApiError> {
    let provider = non_empty(params.provider.as_deref());
    let model = non_empty(params.model.as_deref());
    let selected = match (provider, model) {
        (Some(name), model) => state.providers.select(name, model)?,
        (None, Some(model)) => {
            let (current, _) = state.providers.describe_current();
            state.providers.select(&current, Some(model))?
        }
        (None, None) => state.providers.current()?,
    };
    Ok(selected)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Transcribes a single uploaded file.
/// Fields: `file` (binary). Query: `detailed`, `high_accuracy`, `provider`, `model`.
pub async fn analyze(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = validate_filename(field.file_name())?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(
                "File size exceeds the 25MB limit".to_string(),
            ));
        }
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, audio) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    let provider = select_provider(&state, &params)?;
    let options = RecognitionOptions {
        detailed: params.detailed,
        high_accuracy: params.high_accuracy,
    };

    info!(
        filename = %filename,
        bytes = audio.len(),
        provider = provider.provider_name(),
        detailed = options.detailed,
        high_accuracy = options.high_accuracy,
        "Transcribing upload"
    );
    let result = provider.recognize(&audio, &filename, options).await?;

    Ok(Json(AnalyzeResponse::new(result, provider.as_ref())))
}
