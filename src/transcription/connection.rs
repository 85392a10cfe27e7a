//! Gemini Live WebSocket connection handling
//!
//! Builds the authenticated connection request and runs the send/receive
//! tasks for one recognition session. Connection loss is terminal for the
//! session: the error is reported and the session ends, it is never
//! retried.

use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use super::{append_fragment, TranscriptEvent};
use crate::audio::AudioChunk;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

/// Ping interval in seconds to keep the WebSocket connection alive
const PING_INTERVAL_SECS: u64 = 30;

/// Build the Live API WebSocket URL with key authentication.
///
/// The returned URL embeds the API key; never log it.
pub(super) fn build_ws_url(endpoint: &str, api_key: &str) -> String {
    format!("{}?key={}", endpoint, api_key)
}

/// Build the WebSocket upgrade request
pub(super) fn build_ws_request(ws_url: &str) -> Result<http::Request<()>, String> {
    let parsed = url::Url::parse(ws_url).map_err(|e| e.to_string())?;
    let host = parsed
        .host_str()
        .ok_or_else(|| "Invalid URL: no host".to_string())?
        .to_string();

    http::Request::builder()
        .uri(ws_url)
        .header("Host", host)
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

/// Send the session setup message
pub(super) async fn send_setup<S>(
    ws_sink: &mut S,
    model: &str,
    language_tag: &str,
) -> Result<(), String>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let msg = SetupMessage::new(model, language_tag);
    let json = serde_json::to_string(&msg).map_err(|e| e.to_string())?;
    info!(model = %model, language = %language_tag, "Sending Live session setup");

    ws_sink
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

/// Spawn the receive task that handles incoming Live API frames
pub(super) fn spawn_receive_task(
    mut ws_stream: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin
        + Send
        + 'static,
    segments: Arc<Mutex<Vec<String>>>,
    event_tx: broadcast::Sender<TranscriptEvent>,
    should_stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg_result) = ws_stream.next().await {
            if should_stop.load(Ordering::SeqCst) {
                break;
            }

            match msg_result {
                Ok(Message::Text(text)) => {
                    handle_server_frame(&text, &segments, &event_tx);
                }
                Ok(Message::Binary(bytes)) => {
                    // The Live API frames its JSON as binary messages
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => handle_server_frame(text, &segments, &event_tx),
                        Err(e) => warn!("Non-UTF8 binary frame from Live API: {}", e),
                    }
                }
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        info!(code = ?frame.code, reason = %frame.reason, "Live session closed by server");
                    } else {
                        info!("Live session closed by server");
                    }
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    trace!("WebSocket keepalive frame");
                }
                Err(e) => {
                    error!("Live session receive error: {}", e);
                    let _ = event_tx.send(TranscriptEvent::Error {
                        message: e.to_string(),
                    });
                    break;
                }
                _ => {}
            }
        }

        let _ = event_tx.send(TranscriptEvent::Ended);
    })
}

/// Translate one JSON frame into recognition events
fn handle_server_frame(
    text: &str,
    segments: &Arc<Mutex<Vec<String>>>,
    event_tx: &broadcast::Sender<TranscriptEvent>,
) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(server_msg) => {
            if server_msg.is_setup_complete() {
                info!("Live session setup complete, listening");
                let _ = event_tx.send(TranscriptEvent::Started);
                return;
            }
            if let Some(fragment) = server_msg.transcription_fragment() {
                trace!("Transcription fragment: {}", fragment);
                let full = append_fragment(segments, fragment);
                let _ = event_tx.send(TranscriptEvent::Transcript { text: full });
            }
            if let Some(content) = &server_msg.server_content {
                if content.turn_complete == Some(true) {
                    trace!("Server marked the turn complete");
                }
            }
        }
        Err(e) => {
            warn!("Failed to parse Live API frame: {} - {}", e, text);
        }
    }
}

/// Spawn the send task that forwards audio chunks upstream
///
/// Exits when capture stops (the audio channel closes) or on a sink
/// error, closing the WebSocket so the server finishes the session.
pub(super) fn spawn_send_task<S>(
    mut ws_sink: S,
    mut audio_rx: mpsc::Receiver<AudioChunk>,
    should_stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let base64_engine = base64::engine::general_purpose::STANDARD;
        let mut chunks_sent = 0u64;

        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ping_interval.tick() => {
                    if should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if ws_sink.send(Message::Ping(vec![])).await.is_err() {
                        warn!("Failed to send keepalive ping");
                        break;
                    }
                    trace!("Sent keepalive ping");
                }
                chunk = audio_rx.recv() => {
                    let Some(chunk) = chunk else {
                        info!("Audio capture ended after {} chunks", chunks_sent);
                        break;
                    };
                    if should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    chunks_sent += 1;
                    if chunks_sent == 1 || chunks_sent.is_multiple_of(100) {
                        debug!(
                            chunks_sent,
                            samples = chunk.samples.len(),
                            "Forwarding audio to Live session"
                        );
                    }
                    if send_audio_chunk(&mut ws_sink, &chunk, &base64_engine).await.is_err() {
                        error!("Failed to send audio chunk, ending session");
                        break;
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        info!("Live session send task exiting after {} chunks", chunks_sent);
    })
}

/// Send one audio chunk in the Live API realtime-input format
async fn send_audio_chunk<S>(
    ws_sink: &mut S,
    chunk: &AudioChunk,
    base64_engine: &base64::engine::GeneralPurpose,
) -> Result<(), ()>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    // PCM16 little-endian bytes
    let bytes: Vec<u8> = chunk
        .samples
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect();

    let msg = RealtimeInputMessage::pcm_chunk(base64_engine.encode(&bytes), chunk.sample_rate);
    if let Ok(json) = serde_json::to_string(&msg) {
        ws_sink.send(Message::Text(json)).await.map_err(|_| ())?;
    }
    Ok(())
}
