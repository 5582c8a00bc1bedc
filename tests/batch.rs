use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use url::Url;
use veo_batch::{
    BatchError, BatchOptions, BatchRunner, CredentialProvider, Credentials, CredentialsError,
    ErrorKind, PromptOutcome, RetryPolicy, SkipReason, Stage, StaticCredentials, Veo,
};
use wiremock::{
    matchers::{body_partial_json, header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

const MODEL: &str = "veo-3.0-generate-preview";
const SUBMIT_PATH: &str = "/v1/projects/proj/locations/us-central1/publishers/google/models/veo-3.0-generate-preview:predictLongRunning";

fn operation_name(id: &str) -> String {
    format!("projects/proj/locations/us-central1/publishers/google/models/{MODEL}/operations/{id}")
}

/// Hands out credentials, except on the given (1-based) call.
struct FlakyCredentials {
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyCredentials {
    fn failing_on(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for FlakyCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(CredentialsError::Token {
                source: gcp_auth::Error::Str("token endpoint unavailable"),
            });
        }
        Ok(Credentials::new("tok", "proj"))
    }
}

fn runner(server: &MockServer) -> BatchRunner {
    runner_with(server, Arc::new(StaticCredentials::new("tok", "proj")))
}

fn runner_with(server: &MockServer, credentials: Arc<dyn CredentialProvider>) -> BatchRunner {
    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let veo = Veo::with_model_and_base_url("us-central1", MODEL, base).unwrap();
    BatchRunner::new(veo, credentials).with_options(
        BatchOptions {
            poll_interval: Duration::ZERO,
            deadline: Duration::from_secs(5),
            retry: RetryPolicy::default().with_delay(Duration::ZERO),
            ..Default::default()
        },
    )
}

async fn mount_submit(server: &MockServer, prompt: &str, operation: &str) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(json!({ "instances": [{ "prompt": prompt }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": operation })))
        .mount(server)
        .await;
}

async fn mount_done(server: &MockServer, operation: &str, video: &[u8]) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/{operation}:fetchPredictOperation")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": operation,
            "done": true,
            "response": {
                "videos": [{ "bytesBase64Encoded": STANDARD.encode(video), "mimeType": "video/mp4" }]
            }
        })))
        .mount(server)
        .await;
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn skips_empty_prompt_and_saves_video() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "").unwrap();

    let operation = operation_name("op-a");
    mount_submit(&server, "cat video", &operation).await;
    mount_done(&server, &operation, b"fake mp4 bytes").await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    assert_eq!(report.saved(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);
    assert!(matches!(
        report.outcome("b"),
        Some(PromptOutcome::Skipped {
            reason: SkipReason::EmptyPrompt
        })
    ));
    match report.outcome("a") {
        Some(PromptOutcome::Saved { operation: name, paths }) => {
            assert_eq!(name, &operation);
            assert_eq!(paths, &[dir.path().join("a.mp4")]);
        }
        other => panic!("expected a.txt to be saved, got {other:?}"),
    }

    assert_eq!(
        std::fs::read(dir.path().join("a.mp4")).unwrap(),
        b"fake mp4 bytes"
    );
    assert_eq!(entries(dir.path()), ["a.mp4", "a.txt", "b.txt"]);
}

#[tokio::test]
async fn folder_without_prompts_fails_and_creates_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("readme.md"), "not a prompt").unwrap();

    let error = runner(&server).run(dir.path()).await.unwrap_err();

    assert!(matches!(error, BatchError::NoPrompts { .. }));
    assert_eq!(entries(dir.path()), ["readme.md"]);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_prompt_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "broken").unwrap();
    std::fs::write(dir.path().join("c.txt"), "ocean waves").unwrap();

    // Transport failure: one retry, then give up on this prompt
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(body_partial_json(json!({ "instances": [{ "prompt": "broken" }] })))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let operation = operation_name("op-c");
    mount_submit(&server, "ocean waves", &operation).await;
    mount_done(&server, &operation, b"waves").await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    assert_eq!(report.saved(), 1);
    assert_eq!(report.failed(), 1);
    match report.outcome("a") {
        Some(PromptOutcome::Failed { error }) => {
            assert_eq!(error.stage(), Stage::Submit);
            assert_eq!(error.kind(), ErrorKind::Transport);
        }
        other => panic!("expected a.txt to fail, got {other:?}"),
    }
    assert!(!dir.path().join("a.mp4").exists());
    assert_eq!(std::fs::read(dir.path().join("c.mp4")).unwrap(), b"waves");
}

#[tokio::test]
async fn protocol_error_on_submit_is_not_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video").unwrap();

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    match report.outcome("a") {
        Some(PromptOutcome::Failed { error }) => {
            assert_eq!(error.stage(), Stage::Submit);
            assert_eq!(error.kind(), ErrorKind::Protocol);
        }
        other => panic!("expected a.txt to fail, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_payload_leaves_no_placeholder_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video").unwrap();

    let operation = operation_name("op-a");
    mount_submit(&server, "cat video", &operation).await;
    Mock::given(method("POST"))
        .and(path_regex(r":fetchPredictOperation$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": true,
            "response": { "videos": [{ "mimeType": "video/mp4" }] }
        })))
        .mount(&server)
        .await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    match report.outcome("a") {
        Some(PromptOutcome::Failed { error }) => assert_eq!(error.stage(), Stage::Save),
        other => panic!("expected a.txt to fail, got {other:?}"),
    }
    assert_eq!(entries(dir.path()), ["a.txt"]);
}

#[tokio::test]
async fn multiple_samples_and_output_dir() {
    let server = MockServer::start().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let videos_dir = output.path().join("videos");
    std::fs::write(input.path().join("city.txt"), "night city").unwrap();

    let operation = operation_name("op-city");
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(body_partial_json(json!({
            "parameters": { "sampleCount": 2, "videoConfig": { "duration": "4s", "generateAudio": false } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": operation })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/{operation}:fetchPredictOperation")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": true,
            "response": {
                "videos": [
                    { "bytesBase64Encoded": STANDARD.encode(b"first") },
                    { "data": STANDARD.encode(b"second") }
                ]
            }
        })))
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let veo = Veo::with_model_and_base_url("us-central1", MODEL, base).unwrap();
    let report = BatchRunner::new(veo, Arc::new(StaticCredentials::new("tok", "proj")))
        .with_options(BatchOptions {
            duration: Duration::from_secs(4),
            sample_count: 2,
            generate_audio: false,
            poll_interval: Duration::ZERO,
            output_dir: Some(videos_dir.clone()),
            ..Default::default()
        })
        .run(input.path())
        .await
        .unwrap();

    assert_eq!(report.saved(), 1);
    assert_eq!(std::fs::read(videos_dir.join("city.mp4")).unwrap(), b"first");
    assert_eq!(std::fs::read(videos_dir.join("city_2.mp4")).unwrap(), b"second");
    assert_eq!(entries(input.path()), ["city.txt"]);
}

#[tokio::test]
async fn bad_sample_leaves_no_videos_for_the_prompt() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video").unwrap();

    let operation = operation_name("op-a");
    mount_submit(&server, "cat video", &operation).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/{operation}:fetchPredictOperation")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": true,
            "response": {
                "videos": [
                    { "bytesBase64Encoded": STANDARD.encode(b"first") },
                    { "mimeType": "video/mp4" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    match report.outcome("a") {
        Some(PromptOutcome::Failed { error }) => {
            assert_eq!(error.stage(), Stage::Save);
            assert_eq!(error.kind(), ErrorKind::Protocol);
        }
        other => panic!("expected a.txt to fail, got {other:?}"),
    }
    assert_eq!(entries(dir.path()), ["a.txt"]);
}

#[tokio::test]
async fn credentials_failure_at_start_aborts_the_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video").unwrap();

    let error = runner_with(&server, Arc::new(FlakyCredentials::failing_on(1)))
        .run(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(error, BatchError::Credentials { .. }));
    assert_eq!(error.kind(), ErrorKind::Credentials);
    assert_eq!(entries(dir.path()), ["a.txt"]);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_refresh_fails_only_that_prompt() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "cat video").unwrap();
    std::fs::write(dir.path().join("b.txt"), "ocean waves").unwrap();

    // Call 1 is the start-of-run check, call 2 the refresh for a.txt
    let operation = operation_name("op-b");
    mount_submit(&server, "ocean waves", &operation).await;
    mount_done(&server, &operation, b"waves").await;

    let report = runner_with(&server, Arc::new(FlakyCredentials::failing_on(2)))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.saved(), 1);
    match report.outcome("a") {
        Some(PromptOutcome::Failed { error }) => {
            assert_eq!(error.stage(), Stage::Credentials);
            assert_eq!(error.kind(), ErrorKind::Credentials);
        }
        other => panic!("expected a.txt to fail, got {other:?}"),
    }
    assert!(!dir.path().join("a.mp4").exists());
    assert_eq!(std::fs::read(dir.path().join("b.mp4")).unwrap(), b"waves");
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_prompt_is_processed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("real.prompt");
    std::fs::write(&target, "cat video").unwrap();
    std::os::unix::fs::symlink(&target, dir.path().join("a.txt")).unwrap();

    let operation = operation_name("op-a");
    mount_submit(&server, "cat video", &operation).await;
    mount_done(&server, &operation, b"linked").await;

    let report = runner(&server).run(dir.path()).await.unwrap();

    assert_eq!(report.saved(), 1);
    assert_eq!(std::fs::read(dir.path().join("a.mp4")).unwrap(), b"linked");
}
