//! Chat orchestration: composes the reducer, the API client, and the
//! voice adapters into the send/receive flow.
//!
//! Message submission is compensating, not transactional: a temporary
//! user message is applied immediately and either replaced by the
//! server-confirmed pair or removed on failure, never left dangling.
//! The [`run`](ChatController::run) loop reacts to voice events: a
//! completed capture becomes a voice send, and playback completion
//! returns the avatar to idle.

use crate::api::types::{InputType, Message, Role};
use crate::api::ApiClient;
use crate::chat::state::{reduce, AvatarState, ChatAction, ChatState};
use crate::config::ClientConfig;
use crate::voice::capture::CaptureSnapshot;
use crate::voice::{VoiceCapture, VoicePlayback};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Seconds the avatar may sit in `Speaking` with no utterance playing
/// before reverting to idle (text sends never start playback).
const SPEAKING_IDLE_REVERT_SECS: u32 = 5;

/// Orchestrates the chat view.
pub struct ChatController {
    state: Mutex<ChatState>,
    api: ApiClient,
    capture: VoiceCapture,
    playback: VoicePlayback,
}

impl ChatController {
    /// Build from already-constructed parts.
    #[must_use]
    pub fn new(api: ApiClient, capture: VoiceCapture, playback: VoicePlayback) -> Self {
        Self {
            state: Mutex::new(ChatState::default()),
            api,
            capture,
            playback,
        }
    }

    /// Probe voice capabilities and build the controller.
    pub async fn from_config(config: &ClientConfig, api: ApiClient) -> Self {
        let capture = VoiceCapture::detect(&api, &config.stt, &config.audio).await;
        let playback = VoicePlayback::detect(&api, &config.tts, &config.audio).await;
        Self::new(api, capture, playback)
    }

    /// The API client in use.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The capture adapter.
    #[must_use]
    pub fn capture(&self) -> &VoiceCapture {
        &self.capture
    }

    /// The playback adapter.
    #[must_use]
    pub fn playback(&self) -> &VoicePlayback {
        &self.playback
    }

    /// A copy of the current chat state.
    #[must_use]
    pub fn snapshot(&self) -> ChatState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Apply an action to the state.
    pub fn dispatch(&self, action: ChatAction) {
        if let Ok(mut state) = self.state.lock() {
            *state = reduce(&state, action);
        }
    }

    // ── Conversations ─────────────────────────────────────────

    /// Load the conversation list.
    pub async fn load_conversations(&self) {
        match self.api.list_conversations(20, 0).await {
            Ok(conversations) => self.dispatch(ChatAction::SetConversations(conversations)),
            Err(e) => self.dispatch(ChatAction::SetError(Some(e.to_string()))),
        }
    }

    /// Create a conversation and make it active. Returns the new id, or
    /// `None` with the error recorded in state.
    pub async fn create_conversation(&self) -> Option<String> {
        match self.api.create_conversation(None).await {
            Ok(conversation) => {
                let id = conversation.id.clone();
                self.dispatch(ChatAction::AddConversation(conversation));
                self.dispatch(ChatAction::SetActiveConversation(Some(id.clone())));
                Some(id)
            }
            Err(e) => {
                self.dispatch(ChatAction::SetError(Some(e.to_string())));
                None
            }
        }
    }

    /// Switch to a conversation and load its messages. The switch clears
    /// messages and sources first, so stale content is never shown.
    pub async fn select_conversation(&self, conversation_id: &str) {
        self.dispatch(ChatAction::SetActiveConversation(Some(
            conversation_id.to_owned(),
        )));
        self.dispatch(ChatAction::SetError(None));

        match self.api.list_messages(conversation_id, 50, 0).await {
            Ok(messages) => self.dispatch(ChatAction::SetMessages(messages)),
            Err(e) => self.dispatch(ChatAction::SetError(Some(e.to_string()))),
        }
    }

    /// Delete a conversation.
    pub async fn delete_conversation(&self, conversation_id: &str) {
        match self.api.delete_conversation(conversation_id).await {
            Ok(_) => self.dispatch(ChatAction::RemoveConversation(conversation_id.to_owned())),
            Err(e) => self.dispatch(ChatAction::SetError(Some(e.to_string()))),
        }
    }

    // ── Send / receive ────────────────────────────────────────

    /// Send a message. Creates a conversation when none is active (and
    /// aborts the send when that fails). Returns the assistant's reply
    /// text on success.
    pub async fn send_message(
        &self,
        content: &str,
        input_type: InputType,
        conversation_id: Option<&str>,
    ) -> Option<String> {
        let active = self.snapshot().active_conversation_id;
        let conv_id = match conversation_id.map(str::to_owned).or(active) {
            Some(id) => id,
            None => self.create_conversation().await?,
        };

        self.dispatch(ChatAction::SetLoading(true));
        self.dispatch(ChatAction::SetAvatarState(AvatarState::Thinking));
        self.dispatch(ChatAction::SetError(None));

        let temp = Message {
            id: format!("temp-{}", uuid::Uuid::new_v4()),
            conversation_id: conv_id.clone(),
            role: Role::User,
            content: content.to_owned(),
            input_type,
            tokens_used: None,
            llm_provider: None,
            llm_model: None,
            response_time_ms: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let temp_id = temp.id.clone();
        self.dispatch(ChatAction::AddMessage(temp));

        match self
            .api
            .send_message(&conv_id, content, input_type, None)
            .await
        {
            Ok(resp) => {
                let assistant_text = resp.assistant_message.content.clone();

                let mut messages: Vec<Message> = self
                    .snapshot()
                    .messages
                    .into_iter()
                    .filter(|m| m.id != temp_id)
                    .collect();
                messages.push(resp.user_message);
                messages.push(resp.assistant_message);
                self.dispatch(ChatAction::SetMessages(messages));

                self.dispatch(ChatAction::SetSources(resp.sources));
                self.dispatch(ChatAction::SetAvatarState(AvatarState::Speaking));
                self.dispatch(ChatAction::SetLoading(false));

                if input_type == InputType::Voice {
                    self.playback.speak(&assistant_text);
                }
                Some(assistant_text)
            }
            Err(e) => {
                // Remove exactly the optimistic message; everything else
                // stays untouched and in order.
                let messages: Vec<Message> = self
                    .snapshot()
                    .messages
                    .into_iter()
                    .filter(|m| m.id != temp_id)
                    .collect();
                self.dispatch(ChatAction::SetMessages(messages));
                self.dispatch(ChatAction::SetError(Some(e.to_string())));
                self.dispatch(ChatAction::SetLoading(false));
                None
            }
        }
    }

    // ── Voice ─────────────────────────────────────────────────

    /// Start a voice turn.
    pub async fn start_voice(&self) {
        if self.capture.is_listening() {
            debug!("voice turn already in progress");
            return;
        }
        self.capture.start_listening().await;
        if self.capture.is_listening() {
            self.dispatch(ChatAction::SetInputMode(InputType::Voice));
            self.dispatch(ChatAction::SetAvatarState(AvatarState::Listening));
        } else if let Some(error) = self.capture.error() {
            self.dispatch(ChatAction::SetError(Some(error)));
        }
    }

    /// End the voice turn; the resulting transcript is picked up by the
    /// event loop and sent as a voice message.
    pub async fn stop_voice(&self) {
        self.capture.stop_listening().await;
    }

    /// Stop any assistant speech.
    pub fn stop_speaking(&self) {
        self.playback.stop();
    }

    // ── Event loop ────────────────────────────────────────────

    /// React to voice events until cancelled: completed captures become
    /// voice sends, playback completion and quiet periods return the
    /// avatar to idle.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut speaking_rx = self.playback.subscribe_speaking();
        let mut capture_rx = self.capture.subscribe();
        let mut last_generation = capture_rx.borrow().generation;
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut quiet_ticks = 0u32;

        info!("chat event loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = speaking_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*speaking_rx.borrow() {
                        self.handle_playback_finished();
                    }
                }
                changed = capture_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = capture_rx.borrow().clone();
                    last_generation = self.handle_capture_snapshot(&snap, last_generation).await;
                }
                _ = ticker.tick() => {
                    if self.snapshot().avatar_state == AvatarState::Speaking
                        && !self.playback.is_speaking()
                    {
                        quiet_ticks += 1;
                        if quiet_ticks >= SPEAKING_IDLE_REVERT_SECS {
                            self.dispatch(ChatAction::SetAvatarState(AvatarState::Idle));
                            quiet_ticks = 0;
                        }
                    } else {
                        quiet_ticks = 0;
                    }
                }
            }
        }
        info!("chat event loop stopped");
    }

    /// Playback finished: a speaking avatar goes back to idle. Any other
    /// mood is left alone.
    pub fn handle_playback_finished(&self) {
        if self.snapshot().avatar_state == AvatarState::Speaking {
            self.dispatch(ChatAction::SetAvatarState(AvatarState::Idle));
        }
    }

    /// Process a capture state change. A fresh non-empty transcript while
    /// not listening triggers a voice send; returns the last generation
    /// already handled.
    pub async fn handle_capture_snapshot(
        &self,
        snap: &CaptureSnapshot,
        last_generation: u64,
    ) -> u64 {
        if let Some(error) = &snap.error {
            warn!("voice capture error: {error}");
            self.dispatch(ChatAction::SetError(Some(error.clone())));
            if self.snapshot().avatar_state == AvatarState::Listening {
                self.dispatch(ChatAction::SetAvatarState(AvatarState::Idle));
            }
            return last_generation;
        }

        if snap.is_listening {
            return last_generation;
        }

        if snap.generation > last_generation && !snap.transcript.is_empty() {
            let transcript = snap.transcript.clone();
            debug!("voice transcript ready, sending");
            self.send_message(&transcript, InputType::Voice, None).await;
            return snap.generation;
        }

        // Listening ended with nothing to send.
        if self.snapshot().avatar_state == AvatarState::Listening {
            self.dispatch(ChatAction::SetAvatarState(AvatarState::Idle));
        }
        last_generation
    }
}
