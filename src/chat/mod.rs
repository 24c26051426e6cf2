//! Chat state machine and orchestration.

pub mod controller;
pub mod state;

pub use controller::ChatController;
pub use state::{AvatarState, ChatAction, ChatState, reduce};
