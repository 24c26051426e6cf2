//! Chat view state and its reducer.
//!
//! A single pure transition function owns every piece of chat state:
//! conversations, the active conversation, messages, retrieved sources,
//! the loading flag, avatar mood, input mode, and the current error.
//! Transitions return a new snapshot and have no side effects; all I/O
//! lives in the controller.

use crate::api::types::{Conversation, InputType, Message, SourceInfo};

/// Mood of the assistant's animated presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
}

impl std::fmt::Display for AvatarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        };
        write!(f, "{name}")
    }
}

/// Complete state of the chat view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatState {
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub sources: Vec<SourceInfo>,
    pub is_loading: bool,
    pub avatar_state: AvatarState,
    pub input_mode: InputType,
    pub error: Option<String>,
}

/// Closed set of state transitions.
#[derive(Debug, Clone)]
pub enum ChatAction {
    SetConversations(Vec<Conversation>),
    AddConversation(Conversation),
    RemoveConversation(String),
    /// Also clears messages and sources: switching conversations must
    /// never show stale content.
    SetActiveConversation(Option<String>),
    SetMessages(Vec<Message>),
    AddMessage(Message),
    SetSources(Vec<SourceInfo>),
    SetLoading(bool),
    SetAvatarState(AvatarState),
    SetInputMode(InputType),
    SetError(Option<String>),
}

/// Apply an action, producing the next state snapshot.
#[must_use]
pub fn reduce(state: &ChatState, action: ChatAction) -> ChatState {
    let mut next = state.clone();
    match action {
        ChatAction::SetConversations(conversations) => {
            next.conversations = conversations;
        }
        ChatAction::AddConversation(conversation) => {
            next.conversations.insert(0, conversation);
        }
        ChatAction::RemoveConversation(id) => {
            next.conversations.retain(|c| c.id != id);
            if next.active_conversation_id.as_deref() == Some(id.as_str()) {
                next.active_conversation_id = None;
            }
        }
        ChatAction::SetActiveConversation(id) => {
            next.active_conversation_id = id;
            next.messages = Vec::new();
            next.sources = Vec::new();
        }
        ChatAction::SetMessages(messages) => {
            next.messages = messages;
        }
        ChatAction::AddMessage(message) => {
            next.messages.push(message);
        }
        ChatAction::SetSources(sources) => {
            next.sources = sources;
        }
        ChatAction::SetLoading(loading) => {
            next.is_loading = loading;
        }
        ChatAction::SetAvatarState(avatar) => {
            next.avatar_state = avatar;
        }
        ChatAction::SetInputMode(mode) => {
            next.input_mode = mode;
        }
        ChatAction::SetError(error) => {
            next.error = error;
        }
    }
    next
}
