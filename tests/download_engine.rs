//! End-to-end scenarios driven against `wiremock`, covering the
//! resume, size-overflow, and Content-Disposition-rename cases from
//! the component design that unit tests in `src/` don't exercise
//! directly (fresh download, up-to-date, and mirror failover are
//! covered there).

use std::sync::Arc;

use pacboost::{download_one, DownloadEvent, DownloadEventSink, NullSink, Payload, PayloadResult};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RecordingSink {
    events: std::sync::Mutex<Vec<(String, String)>>,
    completed_totals: std::sync::Mutex<Vec<u64>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
            completed_totals: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn kinds(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
    }

    fn completed_totals(&self) -> Vec<u64> {
        self.completed_totals.lock().unwrap().clone()
    }
}

impl DownloadEventSink for RecordingSink {
    fn on_event(&self, remote_name: &str, event: DownloadEvent) {
        let kind = match event {
            DownloadEvent::Init { .. } => "init",
            DownloadEvent::Progress { .. } => "progress",
            DownloadEvent::Completed { total, .. } => {
                self.completed_totals.lock().unwrap().push(total);
                "completed"
            }
        };
        self.events.lock().unwrap().push((remote_name.to_string(), kind.to_string()));
    }
}

#[tokio::test]
async fn resume_issues_a_range_request_at_the_correct_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pkg.tar.zst"))
        .and(header("Range", "bytes=1024-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![5u8; 2048]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pkg.tar.zst.part"), vec![0u8; 1024]).unwrap();

    let mut payload = Payload::new("pkg.tar.zst", vec![server.uri()]);
    payload.allow_resume = true;

    let result = download_one(payload, dir.path(), &reqwest::Client::new(), Arc::new(NullSink), None).await;

    assert!(matches!(result, PayloadResult::Success { .. }));
    let final_size = std::fs::metadata(dir.path().join("pkg.tar.zst")).unwrap().len();
    assert_eq!(final_size, 1024 + 2048);
    assert!(!dir.path().join("pkg.tar.zst.part").exists());
}

#[tokio::test]
async fn oversized_response_aborts_before_exceeding_max_size() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/core.db"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2048]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut payload = Payload::new("core.db", vec![server.uri()]);
    payload.max_size = Some(1024);

    let sink = Arc::new(RecordingSink::new());
    let result = download_one(payload, dir.path(), &reqwest::Client::new(), sink.clone(), None).await;

    assert!(matches!(result, PayloadResult::Failed(_)));
    assert!(!dir.path().join("core.db").exists());
    assert_eq!(sink.kinds(), vec!["init", "completed"]);
}

#[tokio::test]
async fn content_disposition_overrides_the_url_filename() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=\"real.pkg\"")
                .set_body_bytes(vec![9u8; 16]),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut payload = Payload::new("x", vec![server.uri()]);
    payload.trust_remote_name = true;

    let result = download_one(payload, dir.path(), &reqwest::Client::new(), Arc::new(NullSink), None).await;

    match result {
        PayloadResult::Success { basename } => assert_eq!(basename, "real.pkg"),
        other => panic!("expected success, got {other:?}"),
    }
    assert!(dir.path().join("real.pkg").exists());
    assert!(!dir.path().join("x").exists());
}

#[tokio::test]
async fn event_order_is_init_then_progress_then_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/core.db"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 65536]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let payload = Payload::new("core.db", vec![server.uri()]);
    let sink = Arc::new(RecordingSink::new());

    let result = download_one(payload, dir.path(), &reqwest::Client::new(), sink.clone(), None).await;
    assert!(matches!(result, PayloadResult::Success { .. }));

    let kinds = sink.kinds();
    assert_eq!(kinds.first(), Some(&"init".to_string()));
    assert_eq!(kinds.last(), Some(&"completed".to_string()));
}

#[tokio::test]
async fn signature_fetch_emits_no_init_or_completed_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/core.db.sig"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut payload = Payload::new("core.db.sig", vec![server.uri()]);
    payload.signature = true;
    let sink = Arc::new(RecordingSink::new());

    let result = download_one(payload, dir.path(), &reqwest::Client::new(), sink.clone(), None).await;

    assert!(matches!(result, PayloadResult::Success { .. }));
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn resumed_download_reports_only_this_attempts_bytes_in_completed_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pkg.tar.zst"))
        .and(header("Range", "bytes=1024-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![5u8; 2048]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pkg.tar.zst.part"), vec![0u8; 1024]).unwrap();

    let mut payload = Payload::new("pkg.tar.zst", vec![server.uri()]);
    payload.allow_resume = true;
    let sink = Arc::new(RecordingSink::new());

    let result = download_one(payload, dir.path(), &reqwest::Client::new(), sink.clone(), None).await;

    assert!(matches!(result, PayloadResult::Success { .. }));
    // Only the 2048 bytes fetched in this attempt, not 1024 (resumed
    // prefix) + 2048 double-counted.
    assert_eq!(sink.completed_totals(), vec![2048]);
}

