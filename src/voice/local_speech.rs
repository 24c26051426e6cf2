//! Client for a local speech service.
//!
//! Some installations run an on-device recognition/synthesis daemon
//! (dictation bridge, Piper, Chatterbox, ...) on localhost. The voice
//! adapters probe its health endpoint once at startup and use it when it
//! answers; otherwise they fall back to the backend audio endpoints.

use crate::error::{ClientError, Result};
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A voice advertised by a local synthesis service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoiceDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// BCP-47 language tag, e.g. `es-CO`.
    #[serde(default)]
    pub language: String,
}

/// Pick a Spanish voice: an exact Colombian match first, then any Spanish
/// locale, else nothing.
#[must_use]
pub fn select_spanish_voice(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    voices
        .iter()
        .find(|v| v.language.eq_ignore_ascii_case("es-CO"))
        .or_else(|| {
            voices.iter().find(|v| {
                let lang = v.language.to_ascii_lowercase();
                lang == "es" || lang.starts_with("es-")
            })
        })
}

/// HTTP client for a local speech service.
#[derive(Debug, Clone)]
pub struct LocalSpeechClient {
    http: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl LocalSpeechClient {
    /// Client against a local service base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, probe_timeout_ms: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            probe_timeout: Duration::from_millis(probe_timeout_ms),
        }
    }

    /// Base URL of the probed service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the service answers its health endpoint within the probe
    /// deadline.
    pub async fn probe(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .http
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!("local speech service unhealthy: {} from {url}", resp.status());
                false
            }
            Err(e) => {
                debug!("local speech service not running at {url}: {e}");
                false
            }
        }
    }

    /// Transcribe a WAV recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or answers with a
    /// non-success status.
    pub async fn transcribe(
        &self,
        wav: Vec<u8>,
        language: &str,
        continuous: bool,
        interim_results: bool,
    ) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| ClientError::Stt(format!("invalid audio mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("language", language.to_owned())
            .text("continuous", continuous.to_string())
            .text("interim_results", interim_results.to_string());

        let resp = self
            .http
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Stt(format!("local recognizer unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Stt(format!(
                "local recognizer error: {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct Transcript {
            #[serde(default)]
            transcript: String,
        }
        let body: Transcript = resp
            .json()
            .await
            .map_err(|e| ClientError::Stt(format!("bad recognizer response: {e}")))?;
        Ok(body.transcript)
    }

    /// List the voices a local synthesis service offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or answers with a
    /// non-success status.
    pub async fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        let resp = self
            .http
            .get(format!("{}/voices", self.base_url))
            .send()
            .await
            .map_err(|e| ClientError::Tts(format!("local synthesizer unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Tts(format!(
                "local synthesizer error: {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ClientError::Tts(format!("bad voices response: {e}")))
    }

    /// Synthesize speech locally; returns the raw audio bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or answers with a
    /// non-success status.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes> {
        let resp = self
            .http
            .post(format!("{}/synthesize", self.base_url))
            .json(&serde_json::json!({"text": text, "voice": voice}))
            .send()
            .await
            .map_err(|e| ClientError::Tts(format!("local synthesizer unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Tts(format!(
                "local synthesizer error: {}",
                resp.status()
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ClientError::Tts(format!("bad synthesizer response: {e}")))
    }
}
