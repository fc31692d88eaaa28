//! Realtime STT recognizer
//!
//! Production `SpeechRecognizer`: captures microphone audio, streams it
//! as base64 PCM16 over a WebSocket to the realtime transcription
//! endpoint, and translates server messages into recognizer events.
//! One connection is one utterance segment; the server (or a stop
//! request) ending the connection ends the segment, and the continuous
//! session layer decides whether to start another.

use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use zeroize::Zeroizing;

use super::backend::SpeechRecognizer;
use super::error::{RecognitionError, WS_CONNECT_TIMEOUT_SECS};
use super::messages::{
    ClientMessage, ServerError, ServerErrorKind, ServerMessage, SessionConfig,
    REALTIME_API_VERSION,
};
use super::session::{RecognizerEvent, ResultSlot};
use crate::audio::{self, AudioCaptureHandle, AudioChunk};

/// Ping interval in seconds to keep the WebSocket connection alive
const PING_INTERVAL_SECS: u64 = 30;

/// Configuration for the realtime transcription service
pub struct RealtimeConfig {
    /// HTTPS endpoint of the service; converted to wss for the session
    pub endpoint: String,
    /// Deployment/model name for STT
    pub deployment: String,
    /// Language tag, fixed per session (empty = let the service detect)
    pub language: String,
    /// API key, wiped from memory on drop
    pub api_key: Zeroizing<String>,
}

/// Realtime STT recognizer backend
pub struct RealtimeRecognizer {
    config: RealtimeConfig,
}

impl RealtimeRecognizer {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    /// Whether the host capability is configured at all.
    ///
    /// Checked at initialization so the activation control can be
    /// disabled and relabeled instead of failing on use.
    pub fn is_available(&self) -> bool {
        !self.config.endpoint.is_empty() && !self.config.api_key.is_empty()
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for RealtimeRecognizer {
    async fn start_segment(
        &self,
        stop: Arc<AtomicBool>,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
        if !self.is_available() {
            return Err(RecognitionError::Unsupported(
                "no transcription endpoint configured".to_string(),
            ));
        }

        // Microphone first: an unopenable input device is the native
        // analog of a denied microphone permission.
        let (audio_handle, audio_rx) = audio::start_capture()
            .map_err(|e| RecognitionError::PermissionDenied(e.to_string()))?;

        let ws_url = build_ws_url(&self.config.endpoint, &self.config.deployment);
        info!(
            deployment = %self.config.deployment,
            language = %self.config.language,
            "Connecting to realtime STT"
        );

        let request = build_ws_request(&ws_url, &self.config.api_key)
            .map_err(RecognitionError::Connection)?;

        let ws_stream = match timeout(
            Duration::from_secs(WS_CONNECT_TIMEOUT_SECS),
            connect_async(request),
        )
        .await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(RecognitionError::Connection(e.to_string())),
            Err(_) => return Err(RecognitionError::ConnectionTimeout),
        };

        info!("Connected to realtime STT");
        let (mut ws_sink, ws_source) = ws_stream.split();

        let language = if self.config.language.is_empty() {
            None
        } else {
            Some(self.config.language.as_str())
        };
        send_session_init(&mut ws_sink, &self.config.deployment, language)
            .await
            .map_err(RecognitionError::Connection)?;

        let (event_tx, event_rx) = mpsc::channel(100);
        let (segment_done_tx, segment_done_rx) = mpsc::channel::<()>(1);

        spawn_receive_task(ws_source, event_tx, segment_done_tx);
        spawn_send_task(ws_sink, audio_rx, audio_handle, segment_done_rx, stop);

        Ok(event_rx)
    }
}

/// Build the wss URL for the realtime endpoint
fn build_ws_url(endpoint: &str, deployment: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let ws_endpoint = endpoint
        .replace("https://", "wss://")
        .replace("http://", "ws://");

    format!(
        "{}/openai/realtime?api-version={}&deployment={}",
        ws_endpoint, REALTIME_API_VERSION, deployment
    )
}

/// Build the WebSocket upgrade request with api-key authentication
fn build_ws_request(ws_url: &str, api_key: &str) -> Result<http::Request<()>, String> {
    let parsed = url::Url::parse(ws_url).map_err(|e| e.to_string())?;
    let host = parsed
        .host_str()
        .ok_or_else(|| "invalid URL: no host".to_string())?
        .to_string();

    http::Request::builder()
        .uri(ws_url)
        .header("Host", host)
        .header("api-key", api_key)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Key", generate_ws_key())
        .header("Sec-WebSocket-Version", "13")
        .body(())
        .map_err(|e| e.to_string())
}

/// Generate a random WebSocket key
fn generate_ws_key() -> String {
    use rand::Rng;
    let mut key = [0u8; 16];
    rand::thread_rng().fill(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

/// Send the session configuration after connecting
async fn send_session_init<S>(
    ws_sink: &mut S,
    model: &str,
    language: Option<&str>,
) -> Result<(), String>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let msg = ClientMessage::SessionUpdate {
        session: SessionConfig::new(model, language),
    };
    let json = serde_json::to_string(&msg).map_err(|e| e.to_string())?;
    debug!("Sending session.update: {}", json);

    ws_sink
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

/// Receive task: server messages in, recognizer events out.
///
/// Interim deltas accumulate into one growing interim result per
/// utterance, so every update carries the full in-flight text and
/// supersedes the previous one.
fn spawn_receive_task(
    mut ws_source: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin
        + Send
        + 'static,
    event_tx: mpsc::Sender<RecognizerEvent>,
    segment_done_tx: mpsc::Sender<()>,
) {
    tokio::spawn(async move {
        let mut pending_interim = String::new();

        while let Some(msg_result) = ws_source.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    trace!("Server message: {}", text);
                    let message = match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!("Failed to parse server message: {} - {}", e, text);
                            continue;
                        }
                    };

                    match message {
                        ServerMessage::TranscriptionDelta { delta } => {
                            if let Some(delta) = delta.filter(|d| !d.is_empty()) {
                                pending_interim.push_str(&delta);
                                let slot = ResultSlot::interim(pending_interim.clone());
                                if event_tx
                                    .send(RecognizerEvent::Results(vec![slot]))
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        }
                        ServerMessage::TranscriptionCompleted { transcript } => {
                            pending_interim.clear();
                            if let Some(transcript) = transcript.filter(|t| !t.is_empty()) {
                                let slot = ResultSlot::finalized(transcript);
                                if event_tx
                                    .send(RecognizerEvent::Results(vec![slot]))
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        }
                        ServerMessage::Error { error } => {
                            if handle_server_error(error, &event_tx).await.is_err() {
                                break;
                            }
                        }
                        ServerMessage::SessionCreated => info!("STT session created"),
                        ServerMessage::SessionUpdated => info!("STT session updated"),
                        ServerMessage::InputAudioBufferCommitted => {
                            debug!("Audio buffer committed");
                        }
                        ServerMessage::Other => {}
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("STT connection closed by server");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    trace!("WebSocket keepalive");
                }
                Err(e) => {
                    error!("WebSocket receive error: {}", e);
                    let _ = event_tx
                        .send(RecognizerEvent::Error(e.to_string()))
                        .await;
                    break;
                }
                _ => {}
            }
        }

        let _ = event_tx.send(RecognizerEvent::SegmentEnded).await;
        let _ = segment_done_tx.send(()).await;
    });
}

/// Map a server error onto the recognizer event taxonomy.
///
/// Returns `Err` when the segment must end (the sender is gone or the
/// failure is fatal).
async fn handle_server_error(
    error: Option<ServerError>,
    event_tx: &mpsc::Sender<RecognizerEvent>,
) -> Result<(), ()> {
    let Some(error) = error else {
        return Ok(());
    };

    match error.kind() {
        ServerErrorKind::NoSpeech => {
            event_tx
                .send(RecognizerEvent::NoSpeech)
                .await
                .map_err(|_| ())
        }
        ServerErrorKind::PermissionDenied => {
            error!("STT permission failure: {}", error.describe());
            let _ = event_tx
                .send(RecognizerEvent::PermissionDenied(error.describe()))
                .await;
            Err(())
        }
        ServerErrorKind::Other => {
            warn!("STT error: {}", error.describe());
            event_tx
                .send(RecognizerEvent::Error(error.describe()))
                .await
                .map_err(|_| ())
        }
    }
}

/// Send task: forwards audio chunks, keeps the connection alive, and
/// finalizes the utterance when a stop is requested.
fn spawn_send_task<S>(
    mut ws_sink: S,
    mut audio_rx: mpsc::Receiver<AudioChunk>,
    mut audio_handle: AudioCaptureHandle,
    mut segment_done_rx: mpsc::Receiver<()>,
    stop: Arc<AtomicBool>,
) where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let base64_engine = base64::engine::general_purpose::STANDARD;
        let mut chunks_sent = 0u64;

        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = segment_done_rx.recv() => {
                    debug!("Send task: segment ended by receiver");
                    break;
                }
                _ = ping_interval.tick() => {
                    if ws_sink.send(Message::Ping(Vec::new())).await.is_err() {
                        warn!("Failed to send keepalive ping");
                        break;
                    }
                }
                chunk = audio_rx.recv() => {
                    if stop.load(Ordering::SeqCst) {
                        debug!("Send task: stop requested, committing audio buffer");
                        if let Err(e) = send_commit(&mut ws_sink).await {
                            warn!("Failed to commit audio buffer: {}", e);
                        }
                        let _ = ws_sink.close().await;
                        break;
                    }
                    match chunk {
                        Some(chunk) => {
                            chunks_sent += 1;
                            if chunks_sent == 1 || chunks_sent % 100 == 0 {
                                debug!(
                                    "Sending audio chunk #{} ({} samples)",
                                    chunks_sent,
                                    chunk.samples.len()
                                );
                            }
                            if send_audio_chunk(&mut ws_sink, &chunk, &base64_engine)
                                .await
                                .is_err()
                            {
                                error!("Failed to send audio chunk");
                                break;
                            }
                        }
                        None => {
                            debug!("Audio channel closed after {} chunks", chunks_sent);
                            let _ = send_commit(&mut ws_sink).await;
                            let _ = ws_sink.close().await;
                            break;
                        }
                    }
                }
            }
        }

        audio_handle.stop();
        info!("Send task exiting after {} chunks", chunks_sent);
    });
}

/// Encode one chunk as base64 PCM16 little-endian and send it
async fn send_audio_chunk<S>(
    ws_sink: &mut S,
    chunk: &AudioChunk,
    base64_engine: &base64::engine::GeneralPurpose,
) -> Result<(), ()>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let bytes: Vec<u8> = chunk
        .samples
        .iter()
        .flat_map(|&s| s.to_le_bytes())
        .collect();

    let msg = ClientMessage::InputAudioBufferAppend {
        audio: base64_engine.encode(&bytes),
    };

    if let Ok(json) = serde_json::to_string(&msg) {
        ws_sink.send(Message::Text(json)).await.map_err(|_| ())?;
    }
    Ok(())
}

/// Commit the input buffer so the service finalizes the utterance
async fn send_commit<S>(ws_sink: &mut S) -> Result<(), String>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(&ClientMessage::InputAudioBufferCommit)
        .map_err(|e| e.to_string())?;
    ws_sink
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
