use std::time::Duration;

use koe_transcription::asr::azure::AzureSpeechProvider;
use koe_transcription::asr::openai_compatible::OpenAiCompatibleProvider;
use koe_transcription::config::{ApiCredentials, AzureCredentials};
use koe_transcription::{
    ProviderRegistry, RecognitionErrorKind, RecognitionOptions, RecognitionProvider, RetryPolicy,
    TranscriptionConfig,
};

use crate::fixtures::mock_vendor::MockVendor;

const FAST_RETRY: RetryPolicy =
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));

const WHISPER_OK: &str = r#"{
    "text": "こんにちは",
    "duration": 2.5,
    "segments": [
        {"start": 0.0, "end": 2.5, "text": "こんにちは", "avg_logprob": -0.1, "no_speech_prob": 0.01}
    ],
    "words": [
        {"word": "こんにちは", "start": 0.1, "end": 2.4}
    ]
}"#;

const WHISPER_SILENCE: &str = r#"{
    "text": "",
    "duration": 10.0,
    "segments": [
        {"start": 0.0, "end": 10.0, "text": " ", "avg_logprob": -1.2, "no_speech_prob": 0.93}
    ]
}"#;

const AZURE_SIMPLE: &str = r#"{
    "RecognitionStatus": "Success",
    "DisplayText": "こんにちは。",
    "Offset": 1000000,
    "Duration": 25000000
}"#;

const AZURE_DETAILED: &str = r#"{
    "RecognitionStatus": "Success",
    "Offset": 0,
    "Duration": 20000000,
    "NBest": [
        {
            "Confidence": 0.87,
            "Display": "今日は晴れ",
            "Words": [
                {"Word": "今日", "Offset": 0, "Duration": 5000000, "Confidence": 0.9},
                {"Word": "晴れ", "Offset": 5000000, "Duration": 10000000, "Confidence": 0.8}
            ]
        },
        {"Confidence": 0.4, "Display": "京は晴れ"}
    ]
}"#;

fn groq(base_url: &str) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::groq(
        "groq-key",
        base_url,
        OpenAiCompatibleProvider::GROQ_DEFAULT_MODEL,
        "ja",
    )
    .with_retry_policy(FAST_RETRY)
}

fn azure(base_url: &str) -> AzureSpeechProvider {
    AzureSpeechProvider::with_base_url("azure-key", base_url, "ja-JP").with_retry_policy(FAST_RETRY)
}

fn detailed() -> RecognitionOptions {
    RecognitionOptions {
        detailed: true,
        high_accuracy: false,
    }
}

fn high_accuracy() -> RecognitionOptions {
    RecognitionOptions {
        detailed: true,
        high_accuracy: true,
    }
}

#[tokio::test]
async fn groq_sends_whisper_form_and_parses_transcript() {
    let mock = MockVendor::start(vec![(200, WHISPER_OK)]).await;

    let result = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transcript, "こんにちは");
    assert_eq!(result.word_count, 1);
    assert_eq!(result.estimated_duration_seconds, 2.5);
    assert!(!result.no_speech_detected);
    assert!(result.confidence > 0.0);
    assert!(result.detail.is_none());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.path, "/openai/v1/audio/transcriptions");
    assert_eq!(req.header("authorization"), Some("Bearer groq-key"));
    assert_eq!(
        req.form_field("model").as_deref(),
        Some("whisper-large-v3-turbo")
    );
    assert_eq!(req.form_field("response_format").as_deref(), Some("verbose_json"));
    assert_eq!(req.form_field("temperature").as_deref(), Some("0"));
    assert_eq!(req.form_field("language").as_deref(), Some("ja"));
    assert!(req.form_field("prompt").unwrap().contains("日本語"));
    assert_eq!(req.form_field_count("timestamp_granularities[]"), 0);
    assert!(req.body.contains("filename=\"clip.wav\""));
}

#[tokio::test]
async fn groq_detail_requests_segment_and_word_timestamps() {
    let mock = MockVendor::start(vec![(200, WHISPER_OK)]).await;

    let result = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", high_accuracy())
        .await
        .unwrap();

    let detail = result.detail.unwrap();
    assert_eq!(detail.segments.len(), 1);
    let confidence = detail.segments[0].confidence.unwrap();
    assert!((confidence - (-0.1f64).exp()).abs() < 1e-9);
    assert_eq!(detail.words.len(), 1);
    assert_eq!(result.mode.as_deref(), Some("high_accuracy"));

    let requests = mock.requests();
    let req = &requests[0];
    assert_eq!(req.form_field_count("timestamp_granularities[]"), 2);
}

#[tokio::test]
async fn groq_detailed_mode_requests_segments_only() {
    let mock = MockVendor::start(vec![(200, WHISPER_OK)]).await;

    groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", detailed())
        .await
        .unwrap();

    let requests = mock.requests();
    let req = &requests[0];
    assert_eq!(req.form_field_count("timestamp_granularities[]"), 1);
    assert_eq!(
        req.form_field("timestamp_granularities[]").as_deref(),
        Some("segment")
    );
}

#[tokio::test]
async fn groq_high_no_speech_probability_is_explicit_silence() {
    let mock = MockVendor::start(vec![(200, WHISPER_SILENCE)]).await;

    let result = groq(&mock.base_url)
        .recognize(b"RIFF", "quiet.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert!(result.no_speech_detected);
    assert_eq!(result.transcript, "");
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn groq_empty_text_without_segments_is_not_silence() {
    let mock = MockVendor::start(vec![(200, r#"{"text": ""}"#)]).await;

    let result = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert!(!result.no_speech_detected);
    assert!(result.is_unexplained_empty());
}

#[tokio::test]
async fn groq_retries_throttling_then_succeeds() {
    let mock = MockVendor::start(vec![
        (429, r#"{"error": "rate limited"}"#),
        (503, "unavailable"),
        (200, WHISPER_OK),
    ])
    .await;

    let result = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transcript, "こんにちは");
    assert_eq!(mock.hits(), 3);
}

#[tokio::test]
async fn groq_gives_up_after_the_attempt_budget() {
    let mock = MockVendor::start(vec![(503, "unavailable")]).await;

    let err = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, RecognitionErrorKind::Transport);
    assert_eq!(mock.hits(), 3);
}

#[tokio::test]
async fn auth_failures_are_not_retried() {
    let mock = MockVendor::start(vec![(401, r#"{"error": "invalid key"}"#)]).await;

    let err = groq(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, RecognitionErrorKind::Canceled);
    assert!(err.message.contains("401"));
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn openai_uses_its_own_path_and_no_prompt() {
    let mock = MockVendor::start(vec![(200, WHISPER_OK)]).await;

    let provider = OpenAiCompatibleProvider::openai(
        "openai-key",
        &mock.base_url,
        OpenAiCompatibleProvider::OPENAI_DEFAULT_MODEL,
        "ja",
    )
    .with_retry_policy(FAST_RETRY);
    let result = provider
        .recognize(b"ID3", "clip.mp3", RecognitionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transcript, "こんにちは");
    assert_eq!(provider.model_name(), "openai/whisper-1");

    let requests = mock.requests();
    let req = &requests[0];
    assert_eq!(req.path, "/v1/audio/transcriptions");
    assert_eq!(req.header("authorization"), Some("Bearer openai-key"));
    assert_eq!(req.form_field("model").as_deref(), Some("whisper-1"));
    assert!(req.form_field("prompt").is_none());
}

#[tokio::test]
async fn azure_simple_format_uses_display_text() {
    let mock = MockVendor::start(vec![(200, AZURE_SIMPLE)]).await;

    let result = azure(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transcript, "こんにちは。");
    assert_eq!(result.estimated_duration_seconds, 2.5);
    assert!(result.confidence > 0.0);

    let requests = mock.requests();
    let req = &requests[0];
    assert_eq!(
        req.path,
        "/speech/recognition/conversation/cognitiveservices/v1"
    );
    let query = req.query.as_deref().unwrap();
    assert!(query.contains("language=ja-JP"));
    assert!(query.contains("format=simple"));
    assert!(!query.contains("wordLevelTimestamps"));
    assert_eq!(req.header("ocp-apim-subscription-key"), Some("azure-key"));
    assert_eq!(req.header("content-type"), Some("audio/wav"));
}

#[tokio::test]
async fn azure_high_accuracy_uses_dictation_and_best_candidate() {
    let mock = MockVendor::start(vec![(200, AZURE_DETAILED)]).await;

    let result = azure(&mock.base_url)
        .recognize(b"RIFF", "clip.wav", high_accuracy())
        .await
        .unwrap();

    assert_eq!(result.transcript, "今日は晴れ");
    assert!((result.confidence - 0.87).abs() < 1e-6);
    assert_eq!(result.estimated_duration_seconds, 2.0);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.timeout_used_seconds, Some(600));
    let detail = result.detail.unwrap();
    assert_eq!(detail.words.len(), 2);
    assert_eq!(detail.words[1].start, 0.5);
    assert_eq!(detail.words[1].end, 1.5);

    let requests = mock.requests();
    let req = &requests[0];
    assert_eq!(
        req.path,
        "/speech/recognition/dictation/cognitiveservices/v1"
    );
    let query = req.query.as_deref().unwrap();
    assert!(query.contains("format=detailed"));
    assert!(query.contains("wordLevelTimestamps=true"));
}

#[tokio::test]
async fn azure_initial_silence_is_explicit_silence() {
    let mock = MockVendor::start(vec![(
        200,
        r#"{"RecognitionStatus": "InitialSilenceTimeout", "Offset": 0, "Duration": 0}"#,
    )])
    .await;

    let result = azure(&mock.base_url)
        .recognize(b"RIFF", "quiet.wav", RecognitionOptions::default())
        .await
        .unwrap();

    assert!(result.no_speech_detected);
    assert_eq!(result.transcript, "");
}

#[tokio::test]
async fn azure_no_match_is_reported_without_retry() {
    let mock = MockVendor::start(vec![(200, r#"{"RecognitionStatus": "NoMatch"}"#)]).await;

    let err = azure(&mock.base_url)
        .recognize(b"RIFF", "mumble.wav", RecognitionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, RecognitionErrorKind::NoMatch);
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn registry_builds_the_configured_vendor_against_its_base_url() {
    let mock = MockVendor::start(vec![(200, WHISPER_OK)]).await;

    let registry = ProviderRegistry::new(TranscriptionConfig {
        provider: "GROQ".to_string(),
        model: None,
        language: "ja".to_string(),
        azure: AzureCredentials::default(),
        groq: ApiCredentials {
            api_key: Some("groq-key".to_string()),
            base_url: mock.base_url.clone(),
        },
        openai: ApiCredentials::default(),
    })
    .with_retry_policy(FAST_RETRY);

    let provider = registry.current().unwrap();
    assert_eq!(provider.provider_name(), "groq");
    assert_eq!(provider.model_name(), "groq/whisper-large-v3-turbo");

    let result = provider
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.transcript, "こんにちは");
    assert_eq!(mock.hits(), 1);

    let err = registry.create("azure", None).err().unwrap();
    assert!(err.to_string().contains("azure"));
}

#[tokio::test]
async fn registry_routes_azure_to_an_endpoint_override() {
    let mock = MockVendor::start(vec![(200, AZURE_SIMPLE)]).await;

    let registry = ProviderRegistry::new(TranscriptionConfig {
        provider: "azure".to_string(),
        azure: AzureCredentials {
            key: Some("azure-key".to_string()),
            region: None,
            endpoint: Some(mock.base_url.clone()),
        },
        ..TranscriptionConfig::default()
    })
    .with_retry_policy(FAST_RETRY);

    let provider = registry.current().unwrap();
    assert_eq!(provider.model_name(), "azure/ja-JP");
    provider
        .recognize(b"RIFF", "clip.wav", RecognitionOptions::default())
        .await
        .unwrap();
    assert_eq!(mock.hits(), 1);
}
