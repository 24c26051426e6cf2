//! Voice input/output adapters.
//!
//! Capture produces transcripts from spoken audio; playback speaks
//! assistant replies. Both probe for a local speech service once at
//! construction and otherwise use the backend audio endpoints.

pub mod capture;
pub mod local_speech;
pub mod playback;
pub mod recorder;

pub use capture::{CaptureSnapshot, VoiceCapture};
pub use playback::VoicePlayback;
