//! Whisper-style vendors sharing the OpenAI transcription wire format
//! (multipart upload, bearer token, `verbose_json` response): Groq and OpenAI.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    DetailSegment, ProviderResult, RecognitionDetail, RecognitionError, RecognitionOptions,
    RecognitionProvider, WordTiming, audio_mime,
};
use crate::confidence::derived_confidence;
use crate::retry::{RetryPolicy, with_deadline};

/// A segment whose no-speech probability reaches this is treated as silence.
const NO_SPEECH_PROB_THRESHOLD: f64 = 0.6;

/// Steers Whisper away from hallucinating text over silence or noise.
const JA_SILENCE_PROMPT: &str =
    "日本語の会話。無音や雑音のみの場合は空文字を返してください。";

pub struct OpenAiCompatibleProvider {
    client: Client,
    vendor: &'static str,
    endpoint: String,
    api_key: String,
    model: String,
    language: Option<String>,
    prompt: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    /// Absent unless the vendor produced segment-level output.
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
    #[serde(default)]
    words: Vec<VerboseWord>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
    #[serde(default)]
    no_speech_prob: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VerboseWord {
    word: String,
    start: f64,
    end: f64,
}

impl OpenAiCompatibleProvider {
    pub const GROQ: &'static str = "groq";
    pub const GROQ_DEFAULT_MODEL: &'static str = "whisper-large-v3-turbo";
    pub const OPENAI: &'static str = "openai";
    pub const OPENAI_DEFAULT_MODEL: &'static str = "whisper-1";

    pub fn groq(api_key: &str, base_url: &str, model: &str, language: &str) -> Self {
        let prompt = (language == "ja").then(|| JA_SILENCE_PROMPT.to_string());
        Self::new(
            Self::GROQ,
            format!(
                "{}/openai/v1/audio/transcriptions",
                base_url.trim_end_matches('/')
            ),
            api_key,
            model,
            Some(language),
            prompt,
            RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10)),
        )
    }

    pub fn openai(api_key: &str, base_url: &str, model: &str, language: &str) -> Self {
        Self::new(
            Self::OPENAI,
            format!("{}/v1/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key,
            model,
            Some(language),
            None,
            RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10)),
        )
    }

    fn new(
        vendor: &'static str,
        endpoint: String,
        api_key: &str,
        model: &str,
        language: Option<&str>,
        prompt: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        info!(vendor, %endpoint, model, "Whisper-compatible provider initialised");
        Self {
            client: Client::new(),
            vendor,
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
            language: language.filter(|l| !l.is_empty()).map(str::to_string),
            prompt,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn form(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<multipart::Form, RecognitionError> {
        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(audio_mime(filename))
            .map_err(|e| RecognitionError::unknown(format!("mime: {e}")))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("temperature", "0")
            .text("response_format", "verbose_json");

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &self.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if options.detailed {
            form = form.text("timestamp_granularities[]", "segment");
        }
        if options.detailed && options.high_accuracy {
            form = form.text("timestamp_granularities[]", "word");
        }
        Ok(form)
    }

    async fn call_once(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<ProviderResult, RecognitionError> {
        let form = self.form(audio, filename, options)?;
        debug!(vendor = self.vendor, endpoint = %self.endpoint, model = %self.model, "Sending audio");

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionError::from_reqwest(self.vendor, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::from_status(self.vendor, status, &body));
        }

        let body: VerboseResponse = response.json().await.map_err(|e| {
            RecognitionError::unknown(format!("{} response parse: {e}", self.vendor))
        })?;
        let elapsed = started.elapsed().as_secs_f64();

        Ok(interpret(body, elapsed, options))
    }
}

fn is_explicit_silence(body: &VerboseResponse) -> bool {
    match &body.segments {
        Some(segments) => segments.iter().all(|s| {
            s.text.trim().is_empty()
                || s.no_speech_prob.unwrap_or(0.0) >= NO_SPEECH_PROB_THRESHOLD
        }),
        None => false,
    }
}

fn interpret(body: VerboseResponse, processing_time: f64, options: RecognitionOptions) -> ProviderResult {
    let transcript = body.text.as_deref().unwrap_or("").trim().to_string();

    if transcript.is_empty() {
        if is_explicit_silence(&body) {
            return ProviderResult::no_speech(processing_time).with_options(options);
        }
        return ProviderResult::recognized(transcript, 0.0, processing_time, body.duration)
            .with_options(options);
    }

    let confidence = derived_confidence(&transcript, options.high_accuracy);
    let mut result =
        ProviderResult::recognized(transcript, confidence, processing_time, body.duration)
            .with_options(options);

    if options.detailed {
        let segments = body
            .segments
            .unwrap_or_default()
            .into_iter()
            .map(|s| DetailSegment {
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
                confidence: s.avg_logprob.map(|lp| lp.exp().clamp(0.0, 1.0)),
                speaker: None,
            })
            .collect();
        let words = body
            .words
            .into_iter()
            .map(|w| WordTiming {
                word: w.word,
                start: w.start,
                end: w.end,
                confidence: None,
            })
            .collect();
        result.detail = Some(RecognitionDetail { segments, words });
    }

    result
}

#[async_trait]
impl RecognitionProvider for OpenAiCompatibleProvider {
    async fn recognize(
        &self,
        audio: &[u8],
        filename: &str,
        options: RecognitionOptions,
    ) -> Result<ProviderResult, RecognitionError> {
        let result = with_deadline(
            options.max_wait(),
            self.retry
                .run(self.vendor, || self.call_once(audio, filename, options)),
        )
        .await?;

        info!(
            vendor = self.vendor,
            chars = result.transcript.chars().count(),
            no_speech = result.no_speech_detected,
            processing_time = result.processing_time_seconds,
            "Transcription completed"
        );
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        self.vendor
    }

    fn model_name(&self) -> String {
        format!("{}/{}", self.vendor, self.model)
    }
}
