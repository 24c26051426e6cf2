//! Configuration types for the chat client.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Campus assistant API settings.
    pub api: ApiConfig,
    /// Audio capture/playback settings.
    pub audio: AudioConfig,
    /// Speech recognition settings.
    pub stt: SttConfig,
    /// Speech synthesis settings.
    pub tts: TtsConfig,
}

/// Campus assistant API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the assistant backend.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
        }
    }
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate recordings are downsampled to before transcription, in Hz.
    pub input_sample_rate: u32,
    /// Playback sample rate in Hz.
    pub output_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            input_device: None,
            output_device: None,
        }
    }
}

/// Speech recognition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Recognition language tag.
    pub language: String,
    /// Whether the engine keeps listening after a final result.
    pub continuous: bool,
    /// Whether partial hypotheses are requested from the engine.
    pub interim_results: bool,
    /// Base URL of a local speech-recognition service, probed at startup.
    pub local_url: String,
    /// Probe deadline in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            language: "es-CO".into(),
            continuous: false,
            interim_results: false,
            local_url: "http://127.0.0.1:8178".into(),
            probe_timeout_ms: 800,
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Voice requested from the remote synthesis endpoint.
    pub voice: String,
    /// Prefer a local synthesis service over the remote endpoint when one
    /// answers the startup probe.
    pub prefer_local: bool,
    /// Base URL of a local speech-synthesis service.
    pub local_url: String,
    /// Probe deadline in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: "es-CO-SalomeNeural".into(),
            prefer_local: false,
            local_url: "http://127.0.0.1:8180".into(),
            probe_timeout_ms: 800,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ClientError::Config(e.to_string()))
    }

    /// Load the config file from the platform config dir, or defaults when
    /// no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> crate::error::Result<Self> {
        match crate::app_dirs::config_file() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ClientError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
