//! Chat Orchestration Flow Tests
//!
//! Exercise the controller's send/receive flow against a mock backend:
//! optimistic insertion and confirm-or-revert, conversation auto-create,
//! avatar transitions, and the voice-triggered send path.

use async_trait::async_trait;
use iup_chat::api::types::{InputType, Message, Role};
use iup_chat::chat::state::{AvatarState, ChatAction};
use iup_chat::config::AudioConfig;
use iup_chat::error::Result;
use iup_chat::voice::capture::{CaptureSnapshot, Transcriber, VoiceCapture};
use iup_chat::voice::playback::{AudioClip, AudioSink, Synthesizer, VoicePlayback};
use iup_chat::voice::recorder::{MicRecorder, RecordedAudio};
use iup_chat::{ApiClient, ChatController, Navigator, Route, SessionStore};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoopTranscriber;

#[async_trait]
impl Transcriber for NoopTranscriber {
    async fn transcribe(&self, _audio: &RecordedAudio) -> Result<String> {
        Ok(String::new())
    }

    fn describe(&self) -> &'static str {
        "noop"
    }
}

/// Synthesizer that records what it was asked to speak.
struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_owned());
        }
        Ok(AudioClip {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
        })
    }

    fn describe(&self) -> &'static str {
        "recording"
    }
}

struct InstantSink;

impl AudioSink for InstantSink {
    fn play(&self, _clip: &AudioClip, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

fn test_controller(server: &MockServer) -> (Arc<ChatController>, Arc<Mutex<Vec<String>>>) {
    let api = ApiClient::new(
        server.uri(),
        SessionStore::disabled(),
        Navigator::new(Route::Chat),
    );
    let capture = VoiceCapture::with_parts(
        Box::new(NoopTranscriber),
        MicRecorder::new(&AudioConfig::default()),
        false,
    );
    let spoken = Arc::new(Mutex::new(Vec::new()));
    let playback = VoicePlayback::with_parts(
        Arc::new(RecordingSynthesizer {
            spoken: Arc::clone(&spoken),
        }),
        Arc::new(InstantSink),
        true,
    );
    (
        Arc::new(ChatController::new(api, capture, playback)),
        spoken,
    )
}

fn mock_send_response() -> serde_json::Value {
    json!({
        "user_message": {
            "id": "u1", "role": "user", "content": "Hola",
            "created_at": "2025-03-01T10:00:00Z"
        },
        "assistant_message": {
            "id": "a1", "role": "assistant",
            "content": "Hola, ¿en qué puedo ayudarte?",
            "created_at": "2025-03-01T10:00:01Z",
            "response_time_ms": 250
        },
        "sources": []
    })
}

fn existing_message(id: &str, content: &str) -> Message {
    Message {
        id: id.into(),
        conversation_id: "c1".into(),
        role: Role::User,
        content: content.into(),
        input_type: InputType::Text,
        tokens_used: None,
        llm_provider: None,
        llm_model: None,
        response_time_ms: None,
        created_at: "2025-03-01T09:00:00Z".into(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// The submit scenario: optimistic insert, confirm, avatar transitions
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_on_empty_chat_creates_conversation_and_confirms_the_pair() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c1", "title": null, "created_at": "2025-03-01T10:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_send_response())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let send = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            controller
                .send_message("Hola", InputType::Text, None)
                .await
        })
    };

    // While the request is in flight: optimistic message, loading, thinking.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let mid = controller.snapshot();
    assert_eq!(mid.active_conversation_id.as_deref(), Some("c1"));
    assert_eq!(mid.messages.len(), 1);
    assert!(mid.messages[0].id.starts_with("temp-"));
    assert_eq!(mid.messages[0].role, Role::User);
    assert_eq!(mid.messages[0].content, "Hola");
    assert!(mid.is_loading);
    assert_eq!(mid.avatar_state, AvatarState::Thinking);

    let reply = send.await.expect("task").expect("reply");
    assert_eq!(reply, "Hola, ¿en qué puedo ayudarte?");

    let state = controller.snapshot();
    let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["u1", "a1"]);
    assert!(state.sources.is_empty());
    assert!(!state.is_loading);
    assert_eq!(state.avatar_state, AvatarState::Speaking);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn text_send_does_not_trigger_playback() {
    let server = MockServer::start().await;
    let (controller, spoken) = test_controller(&server);
    controller.dispatch(ChatAction::SetActiveConversation(Some("c1".into())));

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_send_response()))
        .mount(&server)
        .await;

    controller
        .send_message("Hola", InputType::Text, None)
        .await
        .expect("reply");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(spoken.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn failed_send_removes_exactly_the_optimistic_message() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    controller.dispatch(ChatAction::SetActiveConversation(Some("c1".into())));
    controller.dispatch(ChatAction::SetMessages(vec![
        existing_message("m1", "mensaje anterior"),
        existing_message("m2", "otro mensaje"),
    ]));

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "Fallo interno"})),
        )
        .mount(&server)
        .await;

    let reply = controller.send_message("Hola", InputType::Text, None).await;
    assert!(reply.is_none());

    let state = controller.snapshot();
    let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2"], "prior messages untouched, order preserved");
    assert_eq!(state.error.as_deref(), Some("Fallo interno"));
    assert!(!state.is_loading);
    // Avatar is left as the send set it; error recovery is the caller's.
    assert_eq!(state.avatar_state, AvatarState::Thinking);
}

#[tokio::test]
async fn failed_conversation_create_aborts_the_whole_send() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "No se pudo crear"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reply = controller.send_message("Hola", InputType::Text, None).await;
    assert!(reply.is_none());

    let state = controller.snapshot();
    assert!(state.messages.is_empty(), "no optimistic message was inserted");
    assert!(state.active_conversation_id.is_none());
    assert_eq!(state.error.as_deref(), Some("No se pudo crear"));
    assert!(!state.is_loading);
    assert_eq!(state.avatar_state, AvatarState::Idle);
}

#[tokio::test]
async fn successful_send_appends_pair_after_existing_messages() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    controller.dispatch(ChatAction::SetActiveConversation(Some("c1".into())));
    controller.dispatch(ChatAction::SetMessages(vec![existing_message(
        "m1",
        "mensaje anterior",
    )]));

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_send_response()))
        .mount(&server)
        .await;

    controller
        .send_message("Hola", InputType::Text, None)
        .await
        .expect("reply");

    let state = controller.snapshot();
    let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m1", "u1", "a1"]);
}

// ────────────────────────────────────────────────────────────────────────────
// Voice events
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_capture_sends_a_voice_message_and_speaks_the_reply() {
    let server = MockServer::start().await;
    let (controller, spoken) = test_controller(&server);
    controller.dispatch(ChatAction::SetActiveConversation(Some("c1".into())));

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .and(body_partial_json(json!({"input_type": "voice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_send_response()))
        .expect(1)
        .mount(&server)
        .await;

    let snap = CaptureSnapshot {
        generation: 1,
        transcript: "Cuándo abren inscripciones".into(),
        is_listening: false,
        error: None,
    };
    let handled = controller.handle_capture_snapshot(&snap, 0).await;
    assert_eq!(handled, 1);

    let state = controller.snapshot();
    assert_eq!(state.avatar_state, AvatarState::Speaking);
    assert_eq!(state.messages.last().map(|m| m.id.as_str()), Some("a1"));

    // The assistant reply goes to the synthesizer.
    let mut attempts = 0;
    loop {
        {
            let spoken = spoken.lock().expect("lock");
            if !spoken.is_empty() {
                assert_eq!(spoken[0], "Hola, ¿en qué puedo ayudarte?");
                break;
            }
        }
        attempts += 1;
        assert!(attempts < 100, "synthesizer was never invoked");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn stale_capture_generation_is_ignored() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);
    controller.dispatch(ChatAction::SetActiveConversation(Some("c1".into())));

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations/c1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_send_response()))
        .expect(0)
        .mount(&server)
        .await;

    let snap = CaptureSnapshot {
        generation: 3,
        transcript: "ya enviado".into(),
        is_listening: false,
        error: None,
    };
    let handled = controller.handle_capture_snapshot(&snap, 3).await;
    assert_eq!(handled, 3);
    assert!(controller.snapshot().messages.is_empty());
}

#[tokio::test]
async fn capture_error_surfaces_and_returns_avatar_to_idle() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);
    controller.dispatch(ChatAction::SetAvatarState(AvatarState::Listening));

    let snap = CaptureSnapshot {
        generation: 0,
        transcript: String::new(),
        is_listening: false,
        error: Some("No se pudo acceder al micrófono. Verifica los permisos.".into()),
    };
    controller.handle_capture_snapshot(&snap, 0).await;

    let state = controller.snapshot();
    assert_eq!(
        state.error.as_deref(),
        Some("No se pudo acceder al micrófono. Verifica los permisos.")
    );
    assert_eq!(state.avatar_state, AvatarState::Idle);
}

#[tokio::test]
async fn playback_finish_reverts_only_a_speaking_avatar() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    controller.dispatch(ChatAction::SetAvatarState(AvatarState::Speaking));
    controller.handle_playback_finished();
    assert_eq!(controller.snapshot().avatar_state, AvatarState::Idle);

    controller.dispatch(ChatAction::SetAvatarState(AvatarState::Thinking));
    controller.handle_playback_finished();
    assert_eq!(controller.snapshot().avatar_state, AvatarState::Thinking);
}

#[tokio::test]
async fn empty_capture_ends_listening_without_a_send() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);
    controller.dispatch(ChatAction::SetAvatarState(AvatarState::Listening));

    let snap = CaptureSnapshot {
        generation: 0,
        transcript: String::new(),
        is_listening: false,
        error: None,
    };
    let handled = controller.handle_capture_snapshot(&snap, 0).await;
    assert_eq!(handled, 0);
    assert_eq!(controller.snapshot().avatar_state, AvatarState::Idle);
    assert!(controller.snapshot().messages.is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation management
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn select_conversation_loads_messages_and_clears_stale_state() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    controller.dispatch(ChatAction::SetMessages(vec![existing_message(
        "old", "viejo",
    )]));

    Mock::given(method("GET"))
        .and(path("/api/v1/chat/conversations/c2/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "n1", "role": "user", "content": "hola", "created_at": "2025-03-01T10:00:00Z"},
            {"id": "n2", "role": "assistant", "content": "buenas", "created_at": "2025-03-01T10:00:01Z"}
        ])))
        .mount(&server)
        .await;

    controller.select_conversation("c2").await;

    let state = controller.snapshot();
    assert_eq!(state.active_conversation_id.as_deref(), Some("c2"));
    let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["n1", "n2"]);
}

#[tokio::test]
async fn delete_conversation_removes_it_from_state() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c1", "title": null, "created_at": "2025-03-01T10:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/chat/conversations/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    controller.create_conversation().await.expect("create");
    assert_eq!(controller.snapshot().conversations.len(), 1);

    controller.delete_conversation("c1").await;
    let state = controller.snapshot();
    assert!(state.conversations.is_empty());
    assert!(state.active_conversation_id.is_none());
}

#[tokio::test]
async fn load_conversations_failure_sets_error() {
    let server = MockServer::start().await;
    let (controller, _spoken) = test_controller(&server);

    Mock::given(method("GET"))
        .and(path("/api/v1/chat/conversations"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"detail": "Puerta de enlace"})))
        .mount(&server)
        .await;

    controller.load_conversations().await;
    assert_eq!(
        controller.snapshot().error.as_deref(),
        Some("Puerta de enlace")
    );
}
