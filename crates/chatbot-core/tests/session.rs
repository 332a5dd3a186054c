use chatbot_core::{
    ChatBackend, ChatError, ChatReply, FilePicker, FileRef, HttpBackend, PathPicker, RejectReason,
    Result, Sender, SessionController, TurnOutcome, UploadReply,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{body_json, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_session(server: &MockServer) -> SessionController<HttpBackend> {
    SessionController::new(HttpBackend::new(&server.uri()))
}

/// Backend whose chat calls block until released.
#[derive(Default)]
struct Gated {
    calls: AtomicUsize,
    release: Notify,
}

#[async_trait::async_trait]
impl ChatBackend for Gated {
    async fn chat(&self, _text: &str) -> Result<ChatReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(ChatReply {
            text: Some("done".to_string()),
            model: None,
        })
    }

    async fn upload(&self, _file: &FileRef) -> Result<UploadReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(UploadReply::default())
    }
}

/// Picker that signals once it has been asked, then waits to be released.
#[derive(Default)]
struct SlowPicker {
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl FilePicker for SlowPicker {
    async fn pick(&self) -> Result<FileRef> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(FileRef::new("a.png", "/tmp/a.png", "image/png"))
    }
}

#[tokio::test]
async fn text_turn_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({ "msg": "hello" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "llm_response": "hi there" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = http_session(&server);
    assert_eq!(session.send_text("hello").await, TurnOutcome::Replied);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender(), Sender::User);
    assert_eq!(messages[0].text(), Some("hello"));
    assert_eq!(messages[1].sender(), Sender::Bot);
    assert_eq!(messages[1].text(), Some("hi there"));
    assert!(!messages[1].is_error());
    assert!(!session.is_busy());

    server.verify().await;
}

#[tokio::test]
async fn whitespace_input_is_a_no_op() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = http_session(&server);
    assert_eq!(
        session.send_text("   ").await,
        TurnOutcome::Rejected(RejectReason::EmptyInput)
    );
    assert!(session.messages().is_empty());
    assert!(!session.is_busy());

    server.verify().await;
}

#[tokio::test]
async fn server_error_detail_lands_in_one_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "server exploded" })),
        )
        .mount(&server)
        .await;

    let session = http_session(&server);
    assert_eq!(session.send_text("hello").await, TurnOutcome::Failed);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    let error = &messages[1];
    assert_eq!(error.sender(), Sender::Bot);
    assert!(error.is_error());
    assert!(error.text().unwrap_or_default().contains("server exploded"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn non_json_success_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
        .mount(&server)
        .await;

    let session = http_session(&server);
    assert_eq!(session.send_text("hello").await, TurnOutcome::Failed);
    assert!(session.messages()[1].is_error());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn unreachable_server_is_reported_and_busy_resets() {
    // Grab a free port, then close it so nothing is listening.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let session = SessionController::new(HttpBackend::new(&uri));
    assert_eq!(session.send_text("hello").await, TurnOutcome::Failed);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].is_error());
    assert!(messages[1]
        .text()
        .unwrap_or_default()
        .starts_with("Error: could not reach the chat server"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "llm_response": "too late" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::with_timeout(&server.uri(), Duration::from_millis(200)).unwrap();
    let session = SessionController::new(backend);

    assert_eq!(session.send_text("hello").await, TurnOutcome::Failed);
    assert!(session.messages()[1].is_error());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn sends_while_busy_are_rejected() {
    let backend = Arc::new(Gated::default());
    let session = SessionController::new(Arc::clone(&backend));

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send_text("first").await }
    });

    let mut rx = session.subscribe();
    rx.wait_for(|state| state.is_busy()).await.unwrap();

    assert_eq!(
        session.send_text("second").await,
        TurnOutcome::Rejected(RejectReason::Busy)
    );
    assert_eq!(
        session
            .send_attachment(FileRef::new("a.png", "/tmp/a.png", "image/png"))
            .await,
        TurnOutcome::Rejected(RejectReason::Busy)
    );
    assert_eq!(
        session.attach_from(&PathPicker::new("/tmp/a.png")).await,
        TurnOutcome::Rejected(RejectReason::Busy)
    );
    assert_eq!(session.messages().len(), 1);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    backend.release.notify_one();
    assert_eq!(first.await.unwrap(), TurnOutcome::Replied);

    let texts: Vec<Option<String>> = session
        .messages()
        .iter()
        .map(|m| m.text().map(str::to_string))
        .collect();
    assert_eq!(texts, vec![Some("first".to_string()), Some("done".to_string())]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn dropping_a_pending_turn_clears_busy() {
    let backend = Arc::new(Gated::default());
    let session = SessionController::new(Arc::clone(&backend));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.send_text("never answered").await }
    });

    let mut rx = session.subscribe();
    rx.wait_for(|state| state.is_busy()).await.unwrap();

    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    assert!(!session.is_busy());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn image_upload_yields_attachment_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains(r#"name="file"; filename="a.png""#))
        .and(body_string_contains("Content-Type: image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "file_url": "https://x/img.png",
            "original_filename": "a.png",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("a.png");
    std::fs::write(&file_path, "png bytes").unwrap();

    let session = http_session(&server);
    let file = FileRef::from_path(&file_path).await.unwrap();
    assert_eq!(session.send_attachment(file).await, TurnOutcome::Replied);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender(), Sender::User);
    assert!(messages[0].text().unwrap_or_default().contains("a.png"));

    let reply = &messages[1];
    assert_eq!(reply.sender(), Sender::Bot);
    assert_eq!(reply.attachment_uri(), Some("https://x/img.png"));
    assert!(reply.text().unwrap_or_default().contains("a.png"));
    assert!(!session.is_busy());

    server.verify().await;
}

#[tokio::test]
async fn turn_started_during_a_pick_wins() {
    let backend = Arc::new(Gated::default());
    let session = SessionController::new(Arc::clone(&backend));
    let picker = Arc::new(SlowPicker::default());

    let attach = tokio::spawn({
        let session = session.clone();
        let picker = Arc::clone(&picker);
        async move { session.attach_from(&*picker).await }
    });
    picker.entered.notified().await;

    let text = tokio::spawn({
        let session = session.clone();
        async move { session.send_text("typed meanwhile").await }
    });
    let mut rx = session.subscribe();
    rx.wait_for(|state| state.is_busy()).await.unwrap();

    picker.release.notify_one();
    assert_eq!(attach.await.unwrap(), TurnOutcome::Rejected(RejectReason::Busy));
    assert_eq!(session.messages().len(), 1);

    backend.release.notify_one();
    assert_eq!(text.await.unwrap(), TurnOutcome::Replied);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn upload_failure_uses_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "An error occurred while processing the file: disk full",
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("notes.txt");
    std::fs::write(&file_path, "hello").unwrap();

    let session = http_session(&server);
    let outcome = session.attach_from(&PathPicker::new(&file_path)).await;
    assert_eq!(outcome, TurnOutcome::Failed);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].is_error());
    assert!(messages[1].text().unwrap_or_default().contains("disk full"));
}

#[tokio::test]
async fn picker_cancellation_leaves_log_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "earlier reply" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = http_session(&server);
    session.send_text("earlier").await;
    let before = session.messages();

    assert_eq!(
        session.attach_from(&PathPicker::cancelled()).await,
        TurnOutcome::Cancelled
    );

    assert_eq!(session.messages(), before);
    assert!(session.messages().iter().all(|m| !m.is_error()));
    assert!(!session.is_busy());

    server.verify().await;
}

#[tokio::test]
async fn unreadable_pick_is_reported() {
    let server = MockServer::start().await;
    let session = http_session(&server);

    let dir = tempfile::tempdir().unwrap();
    let outcome = session
        .attach_from(&PathPicker::new(dir.path().join("missing.png")))
        .await;
    assert_eq!(outcome, TurnOutcome::Failed);

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_error());
    assert!(messages[0].text().unwrap_or_default().contains("missing.png"));
    assert!(!session.is_busy());
}

#[test]
fn cancellation_is_distinguishable() {
    assert!(ChatError::Cancelled.is_cancelled());
    assert!(!ChatError::Status {
        status: 500,
        detail: "x".to_string()
    }
    .is_cancelled());
}
