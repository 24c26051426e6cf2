//! Microphone recording via cpal.
//!
//! Records from the configured input device at its native rate, downmixes
//! to mono, and downsamples to the configured rate for transcription. The
//! cpal stream lives on a dedicated thread (streams are not `Send`); the
//! handle releases it unconditionally when the recording is finished.

use crate::config::AudioConfig;
use crate::error::{ClientError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Sample formats the recorder accepts, best first.
const FORMAT_PREFERENCE: [cpal::SampleFormat; 3] = [
    cpal::SampleFormat::F32,
    cpal::SampleFormat::I16,
    cpal::SampleFormat::U16,
];

/// A finished recording: mono f32 samples at the target rate.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RecordedAudio {
    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Encode as a 16-bit mono WAV, ready for upload.
    ///
    /// # Errors
    ///
    /// Returns an error if WAV encoding fails.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| ClientError::Audio(format!("failed to create wav writer: {e}")))?;
            for &s in &self.samples {
                let clamped = s.clamp(-1.0, 1.0);
                let v = (clamped * i16::MAX as f32).round() as i16;
                writer
                    .write_sample(v)
                    .map_err(|e| ClientError::Audio(format!("failed to write wav sample: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| ClientError::Audio(format!("failed to finalize wav: {e}")))?;
        }
        Ok(cursor.into_inner())
    }
}

/// Handle to an in-progress recording.
pub struct RecordingHandle {
    stop: CancellationToken,
    done: oneshot::Receiver<RecordedAudio>,
}

impl RecordingHandle {
    /// Stop recording, release the input stream, and collect the audio.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder thread died before delivering.
    pub async fn finish(self) -> Result<RecordedAudio> {
        self.stop.cancel();
        self.done
            .await
            .map_err(|_| ClientError::Audio("recorder thread ended unexpectedly".into()))
    }
}

/// Microphone recorder bound to a device selection.
#[derive(Debug, Clone)]
pub struct MicRecorder {
    input_device: Option<String>,
    target_sample_rate: u32,
}

impl MicRecorder {
    /// Recorder for the configured input device.
    #[must_use]
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            target_sample_rate: config.input_sample_rate,
        }
    }

    /// Whether an input device can be resolved at all. This is a capability
    /// check, not a permission check; acquisition can still fail later.
    #[must_use]
    pub fn input_available(&self) -> bool {
        self.resolve_device().is_ok()
    }

    fn resolve_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(ref name) = self.input_device {
            host.input_devices()
                .map_err(|e| ClientError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ClientError::Audio(format!("input device '{name}' not found")))
        } else {
            host.default_input_device()
                .ok_or_else(|| ClientError::Audio("no default input device".into()))
        }
    }

    /// Accept the device's default config when its sample format is one
    /// the recorder can stream, per [`FORMAT_PREFERENCE`].
    fn pick_input_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig> {
        let default_config = device
            .default_input_config()
            .map_err(|e| ClientError::Audio(format!("no default input config: {e}")))?;

        if FORMAT_PREFERENCE.contains(&default_config.sample_format()) {
            return Ok(default_config);
        }

        Err(ClientError::Audio(format!(
            "no supported input sample format (device offers {:?})",
            default_config.sample_format()
        )))
    }

    /// Start recording. Device and stream errors surface here, before the
    /// handle is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be acquired or the input
    /// stream cannot be built and started.
    pub async fn start(&self) -> Result<RecordingHandle> {
        let device = self.resolve_device()?;
        let supported = Self::pick_input_config(&device)?;

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!(
            "recording from '{device_name}': {}Hz {:?}, {} channels",
            supported.sample_rate(),
            supported.sample_format(),
            supported.channels()
        );

        let stop = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel::<std::result::Result<(), String>>();
        let (done_tx, done_rx) = oneshot::channel::<RecordedAudio>();

        let token = stop.clone();
        let target_rate = self.target_sample_rate;
        std::thread::spawn(move || {
            record_thread(device, supported, target_rate, token, ready_tx, done_tx);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(RecordingHandle { stop, done: done_rx }),
            Ok(Err(msg)) => Err(ClientError::Audio(msg)),
            Err(_) => Err(ClientError::Audio("recorder thread died on startup".into())),
        }
    }
}

/// Owns the cpal stream for the lifetime of one recording.
fn record_thread(
    device: cpal::Device,
    supported: cpal::SupportedStreamConfig,
    target_rate: u32,
    stop: CancellationToken,
    ready_tx: oneshot::Sender<std::result::Result<(), String>>,
    done_tx: oneshot::Sender<RecordedAudio>,
) {
    let native_rate = supported.sample_rate();
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let stream_config = StreamConfig {
        channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buf: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));

    fn err_fn(err: cpal::StreamError) {
        error!("audio input stream error: {err}");
    }

    let stream = {
        let buf = Arc::clone(&buf);
        let build = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    append_mono(&buf, data, channels);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    append_mono(&buf, &converted, channels);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
                        .collect();
                    append_mono(&buf, &converted, channels);
                },
                err_fn,
                None,
            ),
            other => {
                let _ = ready_tx.send(Err(format!("unsupported sample format {other:?}")));
                return;
            }
        };
        match build {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("failed to build input stream: {e}")));
                return;
            }
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("failed to start input stream: {e}")));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while !stop.is_cancelled() {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    // Release the microphone before handing back the samples.
    drop(stream);

    let mono = buf.lock().map(|b| b.clone()).unwrap_or_default();
    debug!(
        "recording stopped: {} samples at {native_rate}Hz",
        mono.len()
    );

    let samples = if native_rate == target_rate {
        mono
    } else {
        downsample(&mono, native_rate, target_rate)
    };

    let _ = done_tx.send(RecordedAudio {
        samples,
        sample_rate: target_rate,
    });
}

/// Downmix interleaved frames to mono and append to the shared buffer.
fn append_mono(buf: &Arc<Mutex<Vec<f32>>>, data: &[f32], channels: u16) {
    let mono = if channels > 1 {
        to_mono(data, channels)
    } else {
        data.to_vec()
    };
    if let Ok(mut guard) = buf.lock() {
        guard.extend(mono);
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler. Sufficient for speech: energy
/// sits below 8kHz, so no anti-alias filter is needed for 48kHz → 16kHz.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_mono_averages_channels() {
        let stereo = [0.2f32, 0.4, -0.6, -0.2];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn downsample_halves_sample_count() {
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 1600.0).sin()).collect();
        let out = downsample(&samples, 32_000, 16_000);
        assert!((out.len() as i64 - 800).abs() <= 1);
    }

    #[test]
    fn downsample_same_rate_is_identity() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(downsample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn wav_bytes_have_riff_header_and_data() {
        let audio = RecordedAudio {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 16_000,
        };
        let bytes = audio.to_wav_bytes().expect("encode");
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header + 4 samples * 2 bytes.
        assert_eq!(bytes.len(), 44 + 8);
    }

    #[test]
    fn empty_recording_reports_empty() {
        let audio = RecordedAudio {
            samples: Vec::new(),
            sample_rate: 16_000,
        };
        assert!(audio.is_empty());
        let bytes = audio.to_wav_bytes().expect("encode");
        assert_eq!(bytes.len(), 44);
    }
}
