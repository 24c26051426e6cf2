//! Voice capture: produce a transcript from spoken audio.
//!
//! Two strategies behind one seam, chosen once at construction:
//! a local speech-recognition service when one answers the startup probe,
//! otherwise recording plus upload to the backend transcription endpoint.
//! Either way the caller sees the same surface: start/stop, the current
//! transcript, a listening flag, and an error string.

use crate::api::ApiClient;
use crate::config::{AudioConfig, SttConfig};
use crate::error::Result;
use crate::voice::local_speech::LocalSpeechClient;
use crate::voice::recorder::{MicRecorder, RecordedAudio, RecordingHandle};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// User-facing message when the microphone cannot be acquired.
pub const MIC_ACCESS_ERROR: &str = "No se pudo acceder al micrófono. Verifica los permisos.";
/// User-facing message when transcription fails.
pub const TRANSCRIPTION_ERROR: &str = "Error transcribiendo audio. Intenta de nuevo.";

/// Observable capture state. `generation` increments on each completed
/// capture so observers can tell a fresh transcript from an old one.
#[derive(Debug, Clone, Default)]
pub struct CaptureSnapshot {
    pub generation: u64,
    pub transcript: String,
    pub is_listening: bool,
    pub error: Option<String>,
}

/// Turns a finished recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String>;

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}

/// Local speech-recognition service, configured for the assistant's
/// locale with final results only.
pub struct LocalEngineTranscriber {
    client: LocalSpeechClient,
    language: String,
    continuous: bool,
    interim_results: bool,
}

impl LocalEngineTranscriber {
    #[must_use]
    pub fn new(client: LocalSpeechClient, config: &SttConfig) -> Self {
        Self {
            client,
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

#[async_trait]
impl Transcriber for LocalEngineTranscriber {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String> {
        let wav = audio.to_wav_bytes()?;
        self.client
            .transcribe(wav, &self.language, self.continuous, self.interim_results)
            .await
    }

    fn describe(&self) -> &'static str {
        "local engine"
    }
}

/// Record-and-upload fallback against the backend STT endpoint.
pub struct RemoteTranscriber {
    api: ApiClient,
}

impl RemoteTranscriber {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String> {
        let wav = audio.to_wav_bytes()?;
        let resp = self
            .api
            .transcribe_audio("recording.wav", wav, "audio/wav")
            .await?;
        Ok(resp.transcript)
    }

    fn describe(&self) -> &'static str {
        "remote upload"
    }
}

/// Voice capture adapter.
pub struct VoiceCapture {
    transcriber: Box<dyn Transcriber>,
    recorder: MicRecorder,
    snapshot: watch::Sender<CaptureSnapshot>,
    active: tokio::sync::Mutex<Option<RecordingHandle>>,
    supported: bool,
}

impl VoiceCapture {
    /// Probe capabilities and build the adapter. The strategy is fixed
    /// here; later calls never re-probe.
    pub async fn detect(api: &ApiClient, stt: &SttConfig, audio: &AudioConfig) -> Self {
        let local = LocalSpeechClient::new(stt.local_url.as_str(), stt.probe_timeout_ms);
        let transcriber: Box<dyn Transcriber> = if local.probe().await {
            info!("speech recognition: local engine at {}", local.base_url());
            Box::new(LocalEngineTranscriber::new(local, stt))
        } else {
            debug!("no local recognizer, falling back to backend transcription");
            Box::new(RemoteTranscriber::new(api.clone()))
        };

        let recorder = MicRecorder::new(audio);
        let supported = recorder.input_available();
        if !supported {
            info!("voice capture unsupported: no input device");
        }

        Self::with_parts(transcriber, recorder, supported)
    }

    /// Build from explicit parts. Used by [`detect`](Self::detect) and by
    /// tests that substitute a transcriber.
    #[must_use]
    pub fn with_parts(
        transcriber: Box<dyn Transcriber>,
        recorder: MicRecorder,
        supported: bool,
    ) -> Self {
        let (snapshot, _) = watch::channel(CaptureSnapshot::default());
        Self {
            transcriber,
            recorder,
            snapshot,
            active: tokio::sync::Mutex::new(None),
            supported,
        }
    }

    /// Whether any capture strategy is available.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Whether a recording is in progress.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.snapshot.borrow().is_listening
    }

    /// The most recent completed transcript.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.snapshot.borrow().transcript.clone()
    }

    /// The current capture error, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.snapshot.borrow().error.clone()
    }

    /// Watch capture state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshot.subscribe()
    }

    /// Begin recording. Starting while already listening is undefined for
    /// callers and treated as a no-op here; callers gate on
    /// [`is_listening`](Self::is_listening).
    pub async fn start_listening(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("start_listening ignored: already listening");
            return;
        }

        self.snapshot.send_modify(|s| {
            s.error = None;
            s.transcript.clear();
        });

        if !self.supported {
            self.snapshot.send_modify(|s| {
                s.error = Some(MIC_ACCESS_ERROR.to_owned());
                s.is_listening = false;
            });
            return;
        }

        match self.recorder.start().await {
            Ok(handle) => {
                *active = Some(handle);
                self.snapshot.send_modify(|s| s.is_listening = true);
            }
            Err(e) => {
                error!("microphone acquisition failed: {e}");
                self.snapshot.send_modify(|s| {
                    s.error = Some(MIC_ACCESS_ERROR.to_owned());
                    s.is_listening = false;
                });
            }
        }
    }

    /// Stop recording, release the microphone, and transcribe what was
    /// captured. An empty recording just ends the listening state.
    pub async fn stop_listening(&self) {
        let handle = self.active.lock().await.take();
        let Some(handle) = handle else {
            return;
        };

        let audio = match handle.finish().await {
            Ok(audio) => audio,
            Err(e) => {
                error!("recording failed: {e}");
                self.snapshot.send_modify(|s| {
                    s.error = Some(format!("Error de reconocimiento: {e}"));
                    s.is_listening = false;
                });
                return;
            }
        };

        if audio.is_empty() {
            self.snapshot.send_modify(|s| s.is_listening = false);
            return;
        }

        debug!(
            "transcribing {:.1}s of audio via {}",
            audio.samples.len() as f32 / audio.sample_rate as f32,
            self.transcriber.describe()
        );

        match self.transcriber.transcribe(&audio).await {
            Ok(transcript) => {
                self.snapshot.send_modify(|s| {
                    s.generation += 1;
                    s.transcript = transcript;
                    s.is_listening = false;
                });
            }
            Err(e) => {
                error!("transcription failed: {e}");
                self.snapshot.send_modify(|s| {
                    s.error = Some(TRANSCRIPTION_ERROR.to_owned());
                    s.is_listening = false;
                });
            }
        }
    }
}
