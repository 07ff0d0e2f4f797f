use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    DetailSegment, ProviderResult, RecognitionDetail, RecognitionError, RecognitionOptions,
    RecognitionProvider, RecognitionWarning, WordTiming, audio_mime,
};
use crate::confidence::derived_confidence;
use crate::retry::{RetryPolicy, with_deadline};

/// Azure reports offsets and durations in 100-nanosecond ticks.
const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Azure Speech Services over the short-audio REST API.
///
/// The model is the recognition language (e.g. "ja-JP").
pub struct AzureSpeechProvider {
    client: Client,
    base_url: String,
    key: String,
    language: String,
    retry: RetryPolicy,
}

/// Vendor configuration chosen per call from [`RecognitionOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecognitionProfile {
    mode: &'static str,
    format: &'static str,
    word_timestamps: bool,
}

impl RecognitionProfile {
    fn for_options(options: RecognitionOptions) -> Self {
        if options.high_accuracy {
            Self {
                mode: "dictation",
                format: "detailed",
                word_timestamps: true,
            }
        } else {
            Self {
                mode: "conversation",
                format: if options.detailed { "detailed" } else { "simple" },
                word_timestamps: false,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AzureResponse {
    #[serde(rename = "RecognitionStatus")]
    recognition_status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: Option<String>,
    #[serde(rename = "Duration", default)]
    duration: Option<u64>,
    #[serde(rename = "NBest", default)]
    n_best: Vec<AzureCandidate>,
}

#[derive(Debug, Deserialize)]
struct AzureCandidate {
    #[serde(rename = "Confidence", default)]
    confidence: Option<f64>,
    #[serde(rename = "Display", default)]
    display: Option<String>,
    #[serde(rename = "Words", default)]
    words: Vec<AzureWord>,
}

#[derive(Debug, Deserialize)]
struct AzureWord {
    #[serde(rename = "Word")]
    word: String,
    #[serde(rename = "Offset", default)]
    offset: u64,
    #[serde(rename = "Duration", default)]
    duration: u64,
    #[serde(rename = "Confidence", default)]
    confidence: Option<f64>,
}

impl AzureSpeechProvider {
    pub const NAME: &'static str = "azure";
    pub const DEFAULT_MODEL: &'static str = "ja-JP";

    pub fn new(key: &str, region: &str, language: &str) -> Self {
        Self::with_base_url(
            key,
            &format!("https://{region}.stt.speech.microsoft.com"),
            language,
        )
    }

    pub fn with_base_url(key: &str, base_url: &str, language: &str) -> Self {
        info!(base_url, language, "Azure Speech provider initialised");
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            language: language.to_string(),
            retry: RetryPolicy::new(2, Duration::from_secs(2), Duration::from_secs(5)),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, profile: RecognitionProfile) -> String {
        let mut url = format!(
            "{}/speech/recognition/{}/cognitiveservices/v1?language={}&format={}",
            self.base_url,
            profile.mode,
            urlencoding::encode(&self.language),
            profile.format,
        );
        if profile.word_timestamps {
            url.push_str("&wordLevelTimestamps=true");
        }
        url
    }

    async fn call_once(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<ProviderResult, RecognitionError> {
        let profile = RecognitionProfile::for_options(options);
        let endpoint = self.endpoint(profile);
        debug!(%endpoint, bytes = audio.len(), "Sending audio to Azure Speech");

        let started = Instant::now();
        let response = self
            .client
            .post(&endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", audio_mime(filename))
            .header("Accept", "application/json")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| RecognitionError::from_reqwest(Self::NAME, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::from_status(Self::NAME, status, &body));
        }

        let body: AzureResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::unknown(format!("azure response parse: {e}")))?;
        let elapsed = started.elapsed().as_secs_f64();

        interpret(body, elapsed, options)
    }
}

fn interpret(
    body: AzureResponse,
    processing_time: f64,
    options: RecognitionOptions,
) -> Result<ProviderResult, RecognitionError> {
    match body.recognition_status.as_str() {
        "Success" => {}
        "InitialSilenceTimeout" => {
            debug!("Azure reported initial silence timeout");
            return Ok(ProviderResult::no_speech(processing_time).with_options(options));
        }
        "NoMatch" => {
            return Err(RecognitionError::no_match(
                "speech was detected but could not be recognized",
            ));
        }
        other => {
            return Err(RecognitionError::canceled(format!(
                "azure recognition status {other}"
            )));
        }
    }

    let best = body.n_best.first();
    let transcript = best
        .and_then(|c| c.display.clone())
        .or(body.display_text)
        .unwrap_or_default()
        .trim()
        .to_string();

    let confidence = if transcript.is_empty() {
        0.0
    } else {
        best.and_then(|c| c.confidence)
            .map(|c| c as f32)
            .unwrap_or_else(|| derived_confidence(&transcript, options.high_accuracy))
    };
    let duration = body.duration.map(|ticks| ticks as f64 / TICKS_PER_SECOND);

    let mut result =
        ProviderResult::recognized(transcript, confidence, processing_time, duration)
            .with_options(options);

    if options.detailed {
        let words: Vec<WordTiming> = best
            .map(|c| {
                c.words
                    .iter()
                    .map(|w| WordTiming {
                        word: w.word.clone(),
                        start: w.offset as f64 / TICKS_PER_SECOND,
                        end: w.offset.saturating_add(w.duration) as f64 / TICKS_PER_SECOND,
                        confidence: w.confidence,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let segments = if result.transcript.is_empty() {
            Vec::new()
        } else {
            vec![DetailSegment {
                start: 0.0,
                end: result.estimated_duration_seconds,
                text: result.transcript.clone(),
                confidence: best.and_then(|c| c.confidence),
                speaker: None,
            }]
        };
        result.detail = Some(RecognitionDetail { segments, words });
    }

    if body.n_best.len() > 1 {
        result.warnings.push(RecognitionWarning {
            kind: "Alternatives".to_string(),
            reason: None,
            detail: format!("{} candidates returned, best used", body.n_best.len()),
        });
    }

    Ok(result)
}

#[async_trait]
impl RecognitionProvider for AzureSpeechProvider {
    async fn recognize(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<ProviderResult, RecognitionError> {
        let result = with_deadline(
            options.max_wait(),
            self.retry
                .run(Self::NAME, || self.call_once(audio, filename, options)),
        )
        .await?;

        info!(
            chars = result.transcript.chars().count(),
            no_speech = result.no_speech_detected,
            processing_time = result.processing_time_seconds,
            "Azure transcription completed"
        );
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn model_name(&self) -> String {
        format!("{}/{}", Self::NAME, self.language)
    }
}
