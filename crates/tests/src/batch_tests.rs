use koe_config::BlackoutSettings;
use koe_db::models::ArtifactStatus;
use koe_services::pipeline::DedupeKey;
use serde_json::{Value, json};

use crate::fixtures::test_app::TestApp;

const DEVICE: &str = "dev-1";
const DATE: &str = "2025-07-01";

fn path(block: &str) -> String {
    format!("recordings/{DEVICE}/{DATE}/{block}/audio.wav")
}

fn key(block: &str) -> DedupeKey {
    DedupeKey {
        device_id: DEVICE.to_string(),
        local_date: DATE.to_string(),
        time_block: block.to_string(),
    }
}

fn blocks(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["time_block"].as_str().unwrap().to_string())
        .collect()
}

async fn run_device_date(app: &TestApp) -> Value {
    let resp = app
        .fetch_and_transcribe(json!({ "device_id": DEVICE, "local_date": DATE }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn mixed_batch_reports_success_and_failure() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:こんにちは 世界");
    app.seed_artifact(&path("15-00"), "nomatch");

    let json = run_device_date(&app).await;

    assert_eq!(json["total_items"], 2);
    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(blocks(&json["failed"]), vec!["15-00"]);
    assert!(
        json["failed"][0]["error"]
            .as_str()
            .unwrap()
            .contains("NoMatch")
    );
    assert_eq!(json["failed"][0]["status"], "failed");
    assert_eq!(json["device_id"], DEVICE);
    assert_eq!(json["local_date"], DATE);
    assert_eq!(json["provider"], "groq");
    assert_eq!(json["model"], "groq/scripted");
    assert_eq!(
        json["message"],
        "Processed 2 of 2 items: 1 succeeded, 1 failed, 0 skipped"
    );

    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::Completed)
    );
    assert_eq!(
        app.registry.status_history(&path("15-00")),
        vec![ArtifactStatus::Processing, ArtifactStatus::Failed]
    );

    assert_eq!(app.transcripts.len(), 1);
    let row = app.transcripts.get(&key("14-30")).unwrap();
    assert_eq!(row.transcription, "こんにちは 世界");
    assert_eq!(row.provider, "groq");
    assert_eq!(row.model, "groq/scripted");
    assert_eq!(row.word_count, 2);
    assert_eq!(app.provider.filenames(), vec!["audio.wav", "audio.wav"]);
}

#[tokio::test]
async fn explicit_path_batch_splits_success_and_no_match() {
    let app = TestApp::spawn().await;
    let first = "files/dev1/2025-07-19/14-30/a.wav";
    let second = "files/dev1/2025-07-19/15-00/b.wav";
    app.objects.put(first, "say:こんにちは".as_bytes().to_vec());
    app.objects.put(second, b"nomatch".to_vec());

    let resp = app
        .fetch_and_transcribe(json!({ "artifact_paths": [first, second] }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["total_items"], 2);
    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(blocks(&json["failed"]), vec!["15-00"]);
    let stored = DedupeKey {
        device_id: "dev1".to_string(),
        local_date: "2025-07-19".to_string(),
        time_block: "14-30".to_string(),
    };
    assert_eq!(app.transcripts.get(&stored).unwrap().transcription, "こんにちは");
}

#[tokio::test]
async fn late_block_inside_overnight_window_is_skipped() {
    let app = TestApp::spawn_with_settings(|s| {
        s.scheduling.blackouts.push(BlackoutSettings {
            device_id: "d1".to_string(),
            start_hour: 23,
            end_hour: 5,
            reason: Some("overnight".to_string()),
        });
    })
    .await;
    let late = "files/d1/2025-07-19/23-00/a.wav";
    app.seed_artifact(late, "say:night");
    app.seed_artifact("files/d1/2025-07-19/14-00/a.wav", "say:day");

    let resp = app
        .fetch_and_transcribe(json!({
            "device_id": "d1",
            "local_date": "2025-07-19",
            "time_blocks": ["23-00"],
        }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["total_items"], 1);
    assert!(json["succeeded"].as_array().unwrap().is_empty());
    assert!(json["failed"].as_array().unwrap().is_empty());
    assert_eq!(blocks(&json["skipped"]), vec!["23-00"]);
    assert_eq!(app.registry.status_of(late), Some(ArtifactStatus::Skipped));
    assert_eq!(app.provider.calls(), 0);
    assert_eq!(app.objects.downloads(), 0);
}

#[tokio::test]
async fn blackout_window_skips_without_fetching() {
    let app = TestApp::spawn_with_settings(|s| {
        s.scheduling.blackouts.push(BlackoutSettings {
            device_id: DEVICE.to_string(),
            start_hour: 13,
            end_hour: 15,
            reason: Some("office closed".to_string()),
        });
    })
    .await;
    app.seed_artifact(&path("14-30"), "say:hello");

    let json = run_device_date(&app).await;

    assert_eq!(json["total_items"], 1);
    assert!(json["succeeded"].as_array().unwrap().is_empty());
    assert!(json["failed"].as_array().unwrap().is_empty());
    assert_eq!(blocks(&json["skipped"]), vec!["14-30"]);
    assert_eq!(json["skipped"][0]["status"], "skipped");

    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::Skipped)
    );
    assert_eq!(app.provider.calls(), 0);
    assert_eq!(app.objects.downloads(), 0);
    assert!(app.transcripts.is_empty());
}

#[tokio::test]
async fn blackout_only_applies_to_its_device() {
    let app = TestApp::spawn_with_settings(|s| {
        s.scheduling.blackouts.push(BlackoutSettings {
            device_id: "other-device".to_string(),
            start_hour: 0,
            end_hour: 23,
            reason: None,
        });
    })
    .await;
    app.seed_artifact(&path("14-30"), "say:hello");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(app.provider.calls(), 1);
}

#[tokio::test]
async fn resubmitting_a_batch_keeps_one_transcript_per_key() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:first pass");

    run_device_date(&app).await;
    app.objects.put(&path("14-30"), b"say:second pass".to_vec());
    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(app.provider.calls(), 2);
    assert_eq!(app.transcripts.upsert_calls(), 2);
    assert_eq!(app.transcripts.len(), 1);
    assert_eq!(
        app.transcripts.get(&key("14-30")).unwrap().transcription,
        "second pass"
    );
}

#[tokio::test]
async fn overlapping_batches_never_recognize_one_key_concurrently() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "slow:100:overlap");

    let body = json!({ "device_id": DEVICE, "local_date": DATE });
    let (a, b) = tokio::join!(
        app.fetch_and_transcribe(body.clone()),
        app.fetch_and_transcribe(body)
    );
    assert_eq!(a.status().as_u16(), 200);
    assert_eq!(b.status().as_u16(), 200);

    assert_eq!(app.provider.calls(), 2);
    assert_eq!(app.provider.peak_in_flight("audio.wav"), 1);
    assert_eq!(app.transcripts.len(), 1);
}

#[tokio::test]
async fn repeated_path_in_a_parallel_batch_is_processed_serially() {
    let app = TestApp::spawn_with_settings(|s| s.pipeline.concurrency = 4).await;
    app.objects.put(&path("14-30"), b"slow:100:twice".to_vec());

    let resp = app
        .fetch_and_transcribe(json!({ "file_paths": [path("14-30"), path("14-30")] }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["total_items"], 2);
    assert_eq!(blocks(&json["succeeded"]), vec!["14-30", "14-30"]);
    assert_eq!(app.provider.calls(), 2);
    assert_eq!(app.provider.peak_in_flight("audio.wav"), 1);
    assert_eq!(app.transcripts.len(), 1);
}

#[tokio::test]
async fn distinct_keys_still_run_in_parallel() {
    let app = TestApp::spawn_with_settings(|s| s.pipeline.concurrency = 4).await;
    app.objects.put("files/dev1/2025-07-19/14-30/a.wav", b"slow:150:one".to_vec());
    app.objects.put("files/dev1/2025-07-19/15-00/a.wav", b"slow:150:two".to_vec());

    let resp = app
        .fetch_and_transcribe(json!({ "file_paths": [
            "files/dev1/2025-07-19/14-30/a.wav",
            "files/dev1/2025-07-19/15-00/a.wav",
        ] }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    assert_eq!(app.provider.calls(), 2);
    assert_eq!(app.provider.peak_in_flight("a.wav"), 2);
}

#[tokio::test]
async fn explicit_paths_are_parsed_and_echoed() {
    let app = TestApp::spawn().await;
    // Objects only: the registry does not know these paths.
    app.objects.put(&path("09-00"), b"say:morning".to_vec());

    let resp = app
        .fetch_and_transcribe(json!({ "file_paths": [path("09-00"), "too/short.wav"] }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["total_items"], 1);
    assert_eq!(blocks(&json["succeeded"]), vec!["09-00"]);
    assert_eq!(json["requested_paths"][1], "too/short.wav");
    assert!(json.get("device_id").is_none());
    assert_eq!(
        app.transcripts.get(&key("09-00")).unwrap().transcription,
        "morning"
    );
}

#[tokio::test]
async fn artifact_paths_alias_is_accepted() {
    let app = TestApp::spawn().await;
    app.objects.put(&path("09-00"), b"say:alias".to_vec());

    let resp = app
        .fetch_and_transcribe(json!({ "artifact_paths": [path("09-00")] }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(blocks(&json["succeeded"]), vec!["09-00"]);
}

#[tokio::test]
async fn time_blocks_filter_the_device_date_selection() {
    let app = TestApp::spawn().await;
    for block in ["14-30", "15-00", "15-30"] {
        app.seed_artifact(&path(block), "say:x");
    }

    let resp = app
        .fetch_and_transcribe(json!({
            "device_id": DEVICE,
            "local_date": DATE,
            "time_blocks": ["15-30", "14-30"],
        }))
        .await;
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["total_items"], 2);
    assert_eq!(blocks(&json["succeeded"]), vec!["14-30", "15-30"]);
    assert_eq!(json["requested_time_blocks"], json!(["14-30", "15-30"]));
    assert_eq!(
        app.registry.status_of(&path("15-00")),
        Some(ArtifactStatus::Pending)
    );
}

#[tokio::test]
async fn parallel_processing_reports_in_request_order() {
    let app = TestApp::spawn_with_settings(|s| s.pipeline.concurrency = 4).await;
    app.seed_artifact(&path("14-00"), "slow:120:first");
    app.seed_artifact(&path("14-30"), "slow:60:second");
    app.seed_artifact(&path("15-00"), "slow:1:third");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-00", "14-30", "15-00"]);
    assert_eq!(app.transcripts.len(), 3);
}

#[tokio::test]
async fn explicit_silence_is_stored_as_no_speech() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("03-00"), "silence");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["03-00"]);
    let row = app.transcripts.get(&key("03-00")).unwrap();
    assert_eq!(row.transcription, "no speech");
    assert!(row.is_no_speech());
    assert_eq!(row.word_count, 0);
}

#[tokio::test]
async fn unexplained_empty_result_fails_without_a_row() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "empty");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["failed"]), vec!["14-30"]);
    assert_eq!(
        json["failed"][0]["error"],
        "empty transcript without a silence signal"
    );
    assert_eq!(json["quota_exceeded"], 0);
    assert!(app.transcripts.is_empty());
}

#[tokio::test]
async fn empty_result_before_reset_is_quota_exceeded() {
    // Reset hour 24: every local hour is before the reset.
    let app = TestApp::spawn_with_settings(|s| s.quota.reset_hour = 24).await;
    app.seed_artifact(&path("14-30"), "empty");
    app.seed_artifact(&path("15-00"), "say:still works");

    let json = run_device_date(&app).await;

    assert_eq!(json["quota_exceeded"], 1);
    assert_eq!(blocks(&json["failed"]), vec!["14-30"]);
    assert_eq!(json["failed"][0]["status"], "quota_exceeded");
    assert_eq!(blocks(&json["succeeded"]), vec!["15-00"]);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .ends_with("(1 quota exceeded)")
    );
    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::QuotaExceeded)
    );
    assert!(app.transcripts.get(&key("14-30")).is_none());
}

#[tokio::test]
async fn missing_object_fails_the_item_only() {
    let app = TestApp::spawn().await;
    app.registry.register(&path("14-30"));
    app.seed_artifact(&path("15-00"), "say:present");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["failed"]), vec!["14-30"]);
    assert!(
        json["failed"][0]["error"]
            .as_str()
            .unwrap()
            .starts_with("fetch failed")
    );
    assert_eq!(blocks(&json["succeeded"]), vec!["15-00"]);
    assert_eq!(app.provider.calls(), 1);
}

#[tokio::test]
async fn transport_failure_is_reported_per_item() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "down");

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["failed"]), vec!["14-30"]);
    assert!(
        json["failed"][0]["error"]
            .as_str()
            .unwrap()
            .contains("vendor unreachable")
    );
}

#[tokio::test]
async fn transient_write_failure_is_retried() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:retry me");
    app.transcripts.fail_next_upserts(1);

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(app.transcripts.upsert_calls(), 2);
    assert_eq!(app.transcripts.len(), 1);
}

#[tokio::test]
async fn unconfirmed_write_is_verified_by_read_back() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:landed");
    app.transcripts.drop_next_acks(1);

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(app.transcripts.upsert_calls(), 1);
}

#[tokio::test]
async fn exhausted_write_retries_fail_the_item() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:lost");
    app.transcripts.fail_next_upserts(10);

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["failed"]), vec!["14-30"]);
    assert!(
        json["failed"][0]["error"]
            .as_str()
            .unwrap()
            .contains("after 3 attempts")
    );
    assert_eq!(app.transcripts.upsert_calls(), 3);
    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::Failed)
    );
}

#[tokio::test]
async fn status_write_failures_do_not_fail_items() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:ok");
    app.registry.fail_status_updates(true);

    let json = run_device_date(&app).await;

    assert_eq!(blocks(&json["succeeded"]), vec!["14-30"]);
    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::Pending)
    );
}

#[tokio::test]
async fn model_field_selects_another_vendor() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:via azure");

    let resp = app
        .fetch_and_transcribe(json!({
            "device_id": DEVICE,
            "local_date": DATE,
            "model": "Azure",
        }))
        .await;
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["provider"], "azure");
    assert_eq!(app.alternate.calls(), 1);
    assert_eq!(app.provider.calls(), 0);
    assert_eq!(
        app.transcripts.get(&key("14-30")).unwrap().provider,
        "azure"
    );
}

#[tokio::test]
async fn unsupported_model_is_rejected_before_any_work() {
    let app = TestApp::spawn().await;
    app.seed_artifact(&path("14-30"), "say:never");

    let resp = app
        .fetch_and_transcribe(json!({
            "device_id": DEVICE,
            "local_date": DATE,
            "model": "whisperx",
        }))
        .await;

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "bad_request");
    assert!(json["message"].as_str().unwrap().contains("whisperx"));
    assert_eq!(app.objects.downloads(), 0);
    assert_eq!(
        app.registry.status_of(&path("14-30")),
        Some(ArtifactStatus::Pending)
    );
}

#[tokio::test]
async fn malformed_request_shapes_are_rejected() {
    let app = TestApp::spawn().await;

    for body in [
        json!({}),
        json!({ "device_id": DEVICE }),
        json!({ "file_paths": [path("14-30")], "device_id": DEVICE, "local_date": DATE }),
        json!({ "file_paths": [path("14-30")], "time_blocks": ["14-30"] }),
    ] {
        let resp = app.fetch_and_transcribe(body.clone()).await;
        assert_eq!(resp.status().as_u16(), 400, "body {body} should be rejected");
    }
    assert_eq!(app.provider.calls(), 0);
}

#[tokio::test]
async fn empty_selection_returns_an_empty_result() {
    let app = TestApp::spawn().await;

    let json = run_device_date(&app).await;
    assert_eq!(json["total_items"], 0);
    assert_eq!(json["message"], "No audio files matched the request");

    let resp = app.fetch_and_transcribe(json!({ "file_paths": [] })).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total_items"], 0);
}
