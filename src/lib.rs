//! iup-chat: voice-enabled client for the IUP campus assistant.
//!
//! This crate implements the client side of the campus assistant REST
//! API: authentication and session persistence, conversation and message
//! management with optimistic updates, retrieved-source state, and voice
//! input/output.
//!
//! # Architecture
//!
//! State lives in a single pure reducer; everything else feeds it:
//! - **API client**: authenticated `reqwest` wrapper over the backend
//! - **Session store**: bearer token + user record in two key files
//! - **Chat reducer**: the canonical state machine for the chat view
//! - **Voice capture**: local recognition engine or record-and-upload
//! - **Voice playback**: remote synthesis or a local Spanish voice
//! - **Controller**: composes the above into the send/receive flow

pub mod api;
pub mod app_dirs;
pub mod chat;
pub mod config;
pub mod error;
pub mod nav;
pub mod session;
pub mod voice;

pub use api::ApiClient;
pub use chat::{AvatarState, ChatAction, ChatController, ChatState};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use nav::{Navigator, Route};
pub use session::SessionStore;
