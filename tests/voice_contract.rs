//! Voice Strategy Contract Tests
//!
//! Verify both transcription strategies (local engine, backend upload)
//! and both synthesis strategies against mock HTTP services, plus the
//! startup probe semantics.

use iup_chat::config::SttConfig;
use iup_chat::voice::capture::{LocalEngineTranscriber, RemoteTranscriber, Transcriber};
use iup_chat::voice::local_speech::LocalSpeechClient;
use iup_chat::voice::playback::{LocalSynthesizer, RemoteSynthesizer, Synthesizer};
use iup_chat::voice::recorder::RecordedAudio;
use iup_chat::{ApiClient, Navigator, Route, SessionStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_recording() -> RecordedAudio {
    RecordedAudio {
        samples: vec![0.1f32; 1600],
        sample_rate: 16_000,
    }
}

fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::new(
        server.uri(),
        SessionStore::disabled(),
        Navigator::new(Route::Chat),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Probe
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn probe_succeeds_when_health_answers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = LocalSpeechClient::new(server.uri(), 800);
    assert!(client.probe().await);
}

#[tokio::test]
async fn probe_fails_on_unhealthy_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = LocalSpeechClient::new(server.uri(), 800);
    assert!(!client.probe().await);
}

#[tokio::test]
async fn probe_fails_when_nothing_listens() {
    let client = LocalSpeechClient::new("http://127.0.0.1:9", 300);
    assert!(!client.probe().await);
}

// ────────────────────────────────────────────────────────────────────────────
// Transcription strategies
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_transcriber_uploads_and_returns_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/audio/stt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"transcript": "hola mundo"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = RemoteTranscriber::new(api_client(&server));
    let transcript = transcriber
        .transcribe(&sample_recording())
        .await
        .expect("transcribe");
    assert_eq!(transcript, "hola mundo");
}

#[tokio::test]
async fn remote_transcriber_propagates_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/audio/stt"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "modelo no cargado"})),
        )
        .mount(&server)
        .await;

    let transcriber = RemoteTranscriber::new(api_client(&server));
    let err = transcriber
        .transcribe(&sample_recording())
        .await
        .expect_err("500");
    assert_eq!(err.to_string(), "modelo no cargado");
}

#[tokio::test]
async fn local_engine_transcriber_uses_the_local_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"transcript": "buenas tardes"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = LocalEngineTranscriber::new(
        LocalSpeechClient::new(server.uri(), 800),
        &SttConfig::default(),
    );
    let transcript = engine
        .transcribe(&sample_recording())
        .await
        .expect("transcribe");
    assert_eq!(transcript, "buenas tardes");
}

#[tokio::test]
async fn local_engine_missing_transcript_field_reads_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let engine = LocalEngineTranscriber::new(
        LocalSpeechClient::new(server.uri(), 800),
        &SttConfig::default(),
    );
    let transcript = engine
        .transcribe(&sample_recording())
        .await
        .expect("transcribe");
    assert!(transcript.is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Synthesis strategies
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_synthesizer_decodes_returned_audio() {
    let server = MockServer::start().await;
    let wav = sample_recording().to_wav_bytes().expect("wav");
    Mock::given(method("POST"))
        .and(path("/api/v1/audio/tts"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(wav),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = RemoteSynthesizer::new(api_client(&server), "es-CO-SalomeNeural");
    let clip = synthesizer.synthesize("Hola").await.expect("synthesize");
    assert_eq!(clip.sample_rate, 16_000);
    assert_eq!(clip.samples.len(), 1600);
}

#[tokio::test]
async fn remote_synthesizer_surfaces_backend_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/audio/tts"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"detail": "TTS caído"})))
        .mount(&server)
        .await;

    let synthesizer = RemoteSynthesizer::new(api_client(&server), "es-CO-SalomeNeural");
    assert!(synthesizer.synthesize("Hola").await.is_err());
}

#[tokio::test]
async fn local_synthesizer_posts_text_and_voice() {
    let server = MockServer::start().await;
    let wav = sample_recording().to_wav_bytes().expect("wav");
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .and(wiremock::matchers::body_partial_json(json!({
            "text": "Hola",
            "voice": "carla-es-co"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav))
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = LocalSynthesizer::new(
        LocalSpeechClient::new(server.uri(), 800),
        "carla-es-co",
    );
    let clip = synthesizer.synthesize("Hola").await.expect("synthesize");
    assert!(!clip.samples.is_empty());
}

#[tokio::test]
async fn voice_listing_parses_descriptors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/voices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "carla-es-co", "name": "Carla", "language": "es-CO"},
            {"id": "jorge-es", "language": "es-ES"}
        ])))
        .mount(&server)
        .await;

    let client = LocalSpeechClient::new(server.uri(), 800);
    let voices = client.voices().await.expect("voices");
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].language, "es-CO");

    let chosen = iup_chat::voice::local_speech::select_spanish_voice(&voices).expect("voice");
    assert_eq!(chosen.id, "carla-es-co");
}
