use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

use crate::backend::Transcriber;
use crate::coach::FallbackCoach;
use crate::config::test_config;
use crate::error::AppError;
use crate::llm::openrouter::tests::ScriptedTransport;
use crate::llm::openrouter::CompletionError;
use crate::llm::{AiProvider, ChatReply};
use crate::models::{ChatMessage, NewTrackingEntry, Role, TrackingEntry, TrackingKind};
use crate::quotes::QuoteCache;
use crate::store::{MockStore, Store};
use crate::voice::{Synthesizer, VoicePipeline};

use super::{build_router, AppState};

/// Replies with fixed extracted data and remembers the context it was given.
#[derive(Default)]
struct StubProvider {
    contexts: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl AiProvider for StubProvider {
    async fn chat(&self, _message: &str, context: Option<&str>) -> ChatReply {
        self.contexts
            .lock()
            .unwrap()
            .push(context.map(ToOwned::to_owned));
        ChatReply {
            response: "Nice work!".into(),
            extracted_data: Some(json!({
                "sleep_hours": 7.5,
                "water_liters": null,
                "mood": "happy",
                "steps": 9000
            })),
            error: None,
        }
    }

    async fn generate_insights(&self, entries: &[TrackingEntry]) -> Vec<String> {
        vec![format!("{} entries reviewed", entries.len())]
    }

    async fn generate_daily_quote(&self, user_name: &str) -> String {
        format!("Keep going, {user_name}.")
    }
}

/// Store with a fixed history that records every write.
#[derive(Default)]
struct RecordingStore {
    history: Vec<ChatMessage>,
    messages: Mutex<Vec<(Role, String)>>,
    entries: Mutex<Vec<NewTrackingEntry>>,
}

#[async_trait]
impl Store for RecordingStore {
    async fn save_tracking_entry(
        &self,
        entry: NewTrackingEntry,
    ) -> Result<TrackingEntry, AppError> {
        self.entries.lock().unwrap().push(entry.clone());
        MockStore.save_tracking_entry(entry).await
    }

    async fn tracking_entries(
        &self,
        _user_id: &str,
        _kind: Option<TrackingKind>,
        _limit: usize,
    ) -> Result<Vec<TrackingEntry>, AppError> {
        Ok(Vec::new())
    }

    async fn save_chat_message(
        &self,
        user_id: &str,
        role: Role,
        message: &str,
    ) -> Result<ChatMessage, AppError> {
        self.messages
            .lock()
            .unwrap()
            .push((role, message.to_string()));
        MockStore.save_chat_message(user_id, role, message).await
    }

    async fn chat_history(
        &self,
        _user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, AppError> {
        Ok(self.history.iter().take(limit).cloned().collect())
    }
}

struct SilentTranscriber;

#[async_trait]
impl Transcriber for SilentTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, AppError> {
        Ok(String::new())
    }
}

/// Reports how many bytes each flush carried.
struct CountingTranscriber;

#[async_trait]
impl Transcriber for CountingTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, AppError> {
        Ok(format!("heard {} bytes", audio.len()))
    }
}

struct FakeSynth;

#[async_trait]
impl Synthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        Ok(format!("RIFF{text}").into_bytes())
    }
}

struct Harness {
    provider: Arc<StubProvider>,
    store: Arc<RecordingStore>,
    coach: Option<FallbackCoach>,
    transcriber: Arc<dyn Transcriber>,
    quote_dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            provider: Arc::new(StubProvider::default()),
            store: Arc::new(RecordingStore::default()),
            coach: None,
            transcriber: Arc::new(SilentTranscriber),
            quote_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn app(self) -> (axum::Router, Arc<StubProvider>, Arc<RecordingStore>, tempfile::TempDir) {
        let cfg = test_config();
        let state = AppState {
            voice: VoicePipeline::new(
                self.transcriber.clone(),
                cfg.voice_flush_chunks,
                cfg.voice_min_audio_bytes,
            ),
            cfg,
            provider: self.provider.clone(),
            store: self.store.clone(),
            coach: self.coach,
            quotes: QuoteCache::new(self.quote_dir.path().join("quote.json")),
            tts: Arc::new(FakeSynth),
        };
        (
            build_router(Arc::new(state)),
            self.provider,
            self.store,
            self.quote_dir,
        )
    }
}

fn app() -> axum::Router {
    Harness::new().app().0
}

fn history_message(role: Role, text: &str) -> ChatMessage {
    ChatMessage {
        id: None,
        user_id: "u1".into(),
        role,
        message: text.into(),
        created_at: None,
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

async fn parse_json_response(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), 1024 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_healthy() {
    let res = app().oneshot(get("/health")).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_json_response(res).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn chat_saves_turns_and_extracted_entries() {
    let mut harness = Harness::new();
    harness.store = Arc::new(RecordingStore {
        history: vec![
            history_message(Role::Assistant, "Great, noted."),
            history_message(Role::User, "I drank water"),
        ],
        ..Default::default()
    });
    let (app, provider, store, _dir) = harness.app();

    let req = json_request(
        Method::POST,
        "/api/chat",
        json!({"message": "Slept 7.5 hours, feeling happy", "user_id": "u1"}),
    );
    let res = app.oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);

    let body = parse_json_response(res).await;
    assert_eq!(body["response"], "Nice work!");
    assert_eq!(body["extracted_data"]["sleep_hours"], 7.5);
    assert!(body["timestamp"].is_string());

    assert_eq!(
        *provider.contexts.lock().unwrap(),
        vec![Some("I drank water Great, noted.".to_string())]
    );
    assert_eq!(
        *store.messages.lock().unwrap(),
        vec![
            (Role::User, "Slept 7.5 hours, feeling happy".to_string()),
            (Role::Assistant, "Nice work!".to_string()),
        ]
    );

    let entries = store.entries.lock().unwrap();
    let kinds: Vec<TrackingKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&TrackingKind::Sleep));
    assert!(kinds.contains(&TrackingKind::Mood));
    assert!(entries.iter().all(|e| e.user_id == "u1" && e.timestamp.is_some()));
}

#[tokio::test]
async fn first_chat_has_no_context() {
    let (app, provider, _store, _dir) = Harness::new().app();
    let req = json_request(Method::POST, "/api/chat", json!({"message": "hi", "user_id": "u1"}));
    let res = app.oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(*provider.contexts.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn tracking_log_fills_timestamp_in_mock_mode() {
    let req = json_request(
        Method::POST,
        "/api/tracking/log",
        json!({"user_id": "u1", "type": "water", "value": 2.0}),
    );
    let res = app().oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);

    let body = parse_json_response(res).await;
    assert_eq!(body["id"], "mock-id-123");
    assert_eq!(body["type"], "water");
    assert_eq!(body["value"], 2.0);
    assert!(!body["timestamp"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn tracking_entries_report_count() {
    let res = app()
        .oneshot(get("/api/tracking/u1?type=sleep&limit=5"))
        .await
        .expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        parse_json_response(res).await,
        json!({"entries": [], "count": 0})
    );
}

#[tokio::test]
async fn chat_history_is_wrapped() {
    let res = app()
        .oneshot(get("/api/chat/history/u1"))
        .await
        .expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_json_response(res).await, json!({"history": []}));
}

#[tokio::test]
async fn dashboard_defaults_and_rejects_negative_days() {
    let res = app()
        .oneshot(get("/api/analytics/dashboard/u1"))
        .await
        .expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_json_response(res).await;
    assert_eq!(body["gym_count"], 0);
    assert_eq!(body["insights"], json!(["0 entries reviewed"]));

    let res = app()
        .oneshot(get("/api/analytics/dashboard/u1?days=-1"))
        .await
        .expect("response");
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(parse_json_response(res).await["detail"]
        .as_str()
        .unwrap_or_default()
        .contains("days"));
}

#[tokio::test]
async fn daily_quote_is_cached_after_first_call() {
    let (app, _provider, _store, _dir) = Harness::new().app();

    let first = app
        .clone()
        .oneshot(get("/api/quotes/daily-quote"))
        .await
        .expect("response");
    let first = parse_json_response(first).await;
    assert_eq!(first["quote"], "Keep going, you.");
    assert_eq!(first["cached"], false);

    let second = app
        .oneshot(get("/api/quotes/daily-quote"))
        .await
        .expect("response");
    let second = parse_json_response(second).await;
    assert_eq!(second["quote"], first["quote"]);
    assert_eq!(second["cached"], true);
}

#[tokio::test]
async fn coach_without_key_is_a_server_error() {
    let req = json_request(
        Method::POST,
        "/api/coach/feedback",
        json!({"message": "How was my day?", "user_id": "u1"}),
    );
    let res = app().oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        parse_json_response(res).await,
        json!({"detail": "OPENROUTER_API_KEY not found"})
    );
}

#[tokio::test]
async fn coach_falls_back_past_unavailable_model() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(CompletionError::Status {
            status: 503,
            body: "busy".into(),
        }),
        Ok("  Sounds like a solid day.  ".into()),
    ]));
    let mut harness = Harness::new();
    harness.coach = Some(FallbackCoach::new(
        transport.clone(),
        test_config().coach_models(),
    ));
    let (app, _provider, _store, _dir) = harness.app();

    let req = json_request(
        Method::POST,
        "/api/coach/feedback",
        json!({"message": "I went running", "user_id": "u1"}),
    );
    let res = app.oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        parse_json_response(res).await,
        json!({"feedback": "Sounds like a solid day."})
    );
    assert_eq!(transport.models_called(), vec!["primary", "backup-a"]);
}

#[tokio::test]
async fn coach_exhaustion_is_503() {
    let busy = || {
        Err(CompletionError::Status {
            status: 503,
            body: "busy".into(),
        })
    };
    let transport = Arc::new(ScriptedTransport::new(vec![busy(), busy(), busy()]));
    let mut harness = Harness::new();
    harness.coach = Some(FallbackCoach::new(transport, test_config().coach_models()));
    let (app, _provider, _store, _dir) = harness.app();

    let req = json_request(
        Method::POST,
        "/api/coach/feedback",
        json!({"message": "hello", "user_id": "u1"}),
    );
    let res = app.oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn tts_returns_wav_attachment() {
    let req = json_request(Method::POST, "/api/voice/tts", json!({"text": "hello"}));
    let res = app().oneshot(req).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=speech.wav"
    );
    let bytes = to_bytes(res.into_body(), 1024).await.expect("body");
    assert_eq!(&bytes[..], b"RIFFhello");
}

#[tokio::test]
async fn cors_allows_dev_origin_with_credentials() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .expect("request");
    let res = app().oneshot(req).await.expect("response");
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn cors_ignores_unknown_origin() {
    let req = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .expect("request");
    let res = app().oneshot(req).await.expect("response");
    assert!(res
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Serves the router on an ephemeral port and opens the voice socket.
async fn connect_voice(app: axum::Router) -> WsClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/voice/stream"))
        .await
        .expect("websocket handshake");
    ws
}

async fn send_json(ws: &mut WsClient, frame: Value) {
    ws.send(WsMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

async fn next_json(ws: &mut WsClient) -> Value {
    match ws.next().await {
        Some(Ok(WsMessage::Text(text))) => serde_json::from_str(text.as_str()).expect("json frame"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn voice_socket_reports_error_then_closes_on_bad_json() {
    let mut ws = connect_voice(app()).await;
    ws.send(WsMessage::Text("{not json".into()))
        .await
        .expect("send frame");

    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].is_string());
    assert!(matches!(ws.next().await, Some(Ok(WsMessage::Close(_)))));
}

#[tokio::test]
async fn voice_socket_ignores_binary_frames_and_answers_ping() {
    let mut ws = connect_voice(app()).await;
    ws.send(WsMessage::Binary(vec![1u8, 2, 3].into()))
        .await
        .expect("send frame");
    send_json(&mut ws, json!({"action": "ping"})).await;

    assert_eq!(next_json(&mut ws).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn voice_socket_transcribes_five_chunks_in_order() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(CountingTranscriber);
    let (app, _provider, _store, _dir) = harness.app();
    let mut ws = connect_voice(app).await;

    send_json(&mut ws, json!({"action": "start_recording"})).await;
    for _ in 0..5 {
        let audio = STANDARD.encode(vec![9u8; 300]);
        send_json(&mut ws, json!({"action": "audio_chunk", "audio": audio})).await;
    }
    send_json(&mut ws, json!({"action": "stop_recording"})).await;

    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "status", "message": "Recording started"})
    );
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "transcription", "text": "heard 1500 bytes"})
    );
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "status", "message": "Recording stopped"})
    );
}
