//! Error types for the campus assistant client.

/// Top-level error type for the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The API answered with a non-success status. The message is the
    /// server-provided `detail` field when one was present.
    #[error("{message}")]
    Api {
        /// HTTP status code of the failed response.
        status: u16,
        /// User-facing message extracted from the response body.
        message: String,
    },

    /// A 401 outside the login/register endpoints: the stored session was
    /// cleared and the client navigated back to the login screen.
    #[error("Sesión expirada. Inicia sesión de nuevo.")]
    SessionExpired,

    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level HTTP error (connection refused, timeout, TLS).
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ClientError>;
