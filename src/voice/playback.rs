//! Voice playback: speak a text string aloud.
//!
//! Synthesis is either remote (backend TTS endpoint returning an audio
//! blob) or a local synthesis service with a Spanish voice preference;
//! the choice is made once at construction. At most one utterance plays
//! at a time: `speak` cancels whatever is in flight before starting.

use crate::api::ApiClient;
use crate::config::{AudioConfig, TtsConfig};
use crate::error::{ClientError, Result};
use crate::voice::local_speech::{select_spanish_voice, LocalSpeechClient};
use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Decoded audio ready for the output device.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Produces audio for a text.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}

/// Backend TTS endpoint.
pub struct RemoteSynthesizer {
    api: ApiClient,
    voice: String,
}

impl RemoteSynthesizer {
    #[must_use]
    pub fn new(api: ApiClient, voice: impl Into<String>) -> Self {
        Self {
            api,
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for RemoteSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let bytes = self.api.synthesize_speech(text, &self.voice).await?;
        decode_to_clip(&bytes)
    }

    fn describe(&self) -> &'static str {
        "remote"
    }
}

/// Local synthesis service with a resolved voice.
pub struct LocalSynthesizer {
    client: LocalSpeechClient,
    voice: String,
}

impl LocalSynthesizer {
    #[must_use]
    pub fn new(client: LocalSpeechClient, voice: impl Into<String>) -> Self {
        Self {
            client,
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for LocalSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let bytes = self.client.synthesize(text, &self.voice).await?;
        decode_to_clip(&bytes)
    }

    fn describe(&self) -> &'static str {
        "local engine"
    }
}

/// Plays a clip until it ends or the token is cancelled. Blocking.
pub trait AudioSink: Send + Sync {
    fn play(&self, clip: &AudioClip, cancel: &CancellationToken) -> Result<()>;
}

/// Speaker output via cpal.
pub struct CpalSink {
    output_device: Option<String>,
    output_sample_rate: u32,
}

impl CpalSink {
    #[must_use]
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            output_device: config.output_device.clone(),
            output_sample_rate: config.output_sample_rate,
        }
    }

    fn resolve_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(ref name) = self.output_device {
            host.output_devices()
                .map_err(|e| ClientError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ClientError::Audio(format!("output device '{name}' not found")))
        } else {
            host.default_output_device()
                .ok_or_else(|| ClientError::Audio("no default output device".into()))
        }
    }
}

impl AudioSink for CpalSink {
    fn play(&self, clip: &AudioClip, cancel: &CancellationToken) -> Result<()> {
        let device = self.resolve_device()?;
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: self.output_sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let samples = if clip.sample_rate == self.output_sample_rate {
            clip.samples.clone()
        } else {
            resample_linear(&clip.samples, clip.sample_rate, self.output_sample_rate)
        };

        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples,
            position: 0,
            finished: false,
        }));
        let buffer_cb = Arc::clone(&buffer);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut buf = match buffer_cb.lock() {
                        Ok(b) => b,
                        Err(_) => return,
                    };
                    for sample in data.iter_mut() {
                        if buf.position < buf.samples.len() {
                            *sample = buf.samples[buf.position];
                            buf.position += 1;
                        } else {
                            *sample = 0.0;
                            buf.finished = true;
                        }
                    }
                },
                move |err| {
                    error!("audio output stream error: {err}");
                },
                None,
            )
            .map_err(|e| ClientError::Audio(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| ClientError::Audio(format!("failed to start output stream: {e}")))?;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
            let finished = buffer
                .lock()
                .map(|b| b.finished)
                .map_err(|_| ClientError::Audio("playback buffer lock poisoned".into()))?;
            if finished {
                break;
            }
        }

        drop(stream);
        Ok(())
    }
}

/// Internal buffer for tracking playback progress.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

struct CurrentUtterance {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Voice playback adapter.
pub struct VoicePlayback {
    synthesizer: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
    speaking: watch::Sender<bool>,
    current: Arc<Mutex<CurrentUtterance>>,
    supported: bool,
}

impl VoicePlayback {
    /// Probe capabilities and build the adapter. A local synthesis service
    /// is used only when preferred, probed healthy, and offering a Spanish
    /// voice; otherwise the backend endpoint speaks.
    pub async fn detect(api: &ApiClient, tts: &TtsConfig, audio: &AudioConfig) -> Self {
        let sink: Arc<dyn AudioSink> = Arc::new(CpalSink::new(audio));

        if tts.prefer_local {
            let local = LocalSpeechClient::new(tts.local_url.as_str(), tts.probe_timeout_ms);
            if local.probe().await {
                match local.voices().await {
                    Ok(voices) => {
                        if let Some(voice) = select_spanish_voice(&voices) {
                            info!(
                                "speech synthesis: local voice '{}' at {}",
                                voice.id,
                                local.base_url()
                            );
                            let synthesizer = LocalSynthesizer::new(local, voice.id.clone());
                            return Self::with_parts(Arc::new(synthesizer), sink, true);
                        }
                        info!("local synthesizer offers no Spanish voice, using remote");
                    }
                    Err(e) => debug!("cannot list local voices: {e}"),
                }
            }
        }

        let synthesizer = RemoteSynthesizer::new(api.clone(), tts.voice.clone());
        Self::with_parts(Arc::new(synthesizer), sink, true)
    }

    /// Build from explicit parts. Used by [`detect`](Self::detect) and by
    /// tests that substitute the synthesizer or the sink.
    #[must_use]
    pub fn with_parts(
        synthesizer: Arc<dyn Synthesizer>,
        sink: Arc<dyn AudioSink>,
        supported: bool,
    ) -> Self {
        let (speaking, _) = watch::channel(false);
        Self {
            synthesizer,
            sink,
            speaking,
            current: Arc::new(Mutex::new(CurrentUtterance {
                generation: 0,
                token: None,
            })),
            supported,
        }
    }

    /// Whether any synthesis strategy is available.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Whether an utterance is being synthesized or played.
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        *self.speaking.borrow()
    }

    /// Watch speaking-state changes.
    #[must_use]
    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.speaking.subscribe()
    }

    /// Speak a text. Any in-flight utterance is cancelled first; the new
    /// one fully supersedes it.
    pub fn speak(&self, text: &str) {
        let text = text.to_owned();
        let Some((generation, token)) = self.begin_utterance() else {
            return;
        };
        self.speaking.send_replace(true);
        debug!("speaking via {} synthesizer", self.synthesizer.describe());

        let synthesizer = Arc::clone(&self.synthesizer);
        let sink = Arc::clone(&self.sink);
        let speaking = self.speaking.clone();
        let current = Arc::clone(&self.current);

        tokio::spawn(async move {
            let result: Result<()> = async {
                let clip = synthesizer.synthesize(&text).await?;
                if token.is_cancelled() {
                    return Ok(());
                }
                let play_token = token.clone();
                tokio::task::spawn_blocking(move || {
                    let result = sink.play(&clip, &play_token);
                    // Decoded samples are dropped here regardless of how
                    // playback ended.
                    result
                })
                .await
                .map_err(|e| ClientError::Tts(format!("playback task failed: {e}")))?
            }
            .await;

            if let Err(e) = result {
                error!("speech playback failed: {e}");
            }

            // Reset the speaking flag unless a newer utterance took over.
            if let Ok(mut cur) = current.lock() {
                if cur.generation == generation {
                    cur.token = None;
                    speaking.send_replace(false);
                }
            }
        });
    }

    /// Forcibly end playback and reset the speaking flag.
    pub fn stop(&self) {
        if let Ok(mut cur) = self.current.lock() {
            if let Some(token) = cur.token.take() {
                token.cancel();
            }
            // Orphan any in-flight task so it cannot flip the flag later.
            cur.generation += 1;
        }
        self.speaking.send_replace(false);
    }

    /// Cancel the previous utterance and register a new one.
    fn begin_utterance(&self) -> Option<(u64, CancellationToken)> {
        let mut cur = self.current.lock().ok()?;
        if let Some(previous) = cur.token.take() {
            previous.cancel();
        }
        cur.generation += 1;
        let token = CancellationToken::new();
        cur.token = Some(token.clone());
        Some((cur.generation, token))
    }
}

/// Decode an audio container (mp3 or wav) to a mono f32 clip.
pub fn decode_to_clip(data: &[u8]) -> Result<AudioClip> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let cursor = std::io::Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ClientError::Tts(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| ClientError::Tts("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| ClientError::Tts("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ClientError::Tts(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) => {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    break;
                }
                return Err(ClientError::Tts(format!("audio read error: {e}")));
            }
            Err(e) => return Err(ClientError::Tts(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(ClientError::Tts(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames() as u64;

        let needs_new = match sample_buf.as_ref() {
            Some(b) => (b.capacity() as u64) < frames.saturating_mul(channels as u64),
            None => true,
        };
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        } else if let Some(b) = sample_buf.as_mut() {
            b.clear();
        }

        if let Some(b) = sample_buf.as_mut() {
            b.copy_interleaved_ref(decoded);
        }

        let data = match sample_buf.as_ref() {
            Some(b) => b.samples(),
            None => &[],
        };
        if channels <= 1 {
            out.extend_from_slice(data);
        } else {
            for frame in data.chunks_exact(channels) {
                out.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    if out.is_empty() {
        return Err(ClientError::Tts("decoded audio is empty".into()));
    }

    Ok(AudioClip {
        samples: out,
        sample_rate,
    })
}

/// Linear-interpolation resampler, both directions.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = ((input.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let idx = src_pos.floor() as usize;
        let t = (src_pos - idx as f64) as f32;

        let s0 = input[idx.min(input.len() - 1)];
        let s1 = input[(idx + 1).min(input.len() - 1)];
        out.push(s0 * (1.0 - t) + s1 * t);
    }

    out
}
