//! Transcription module for real-time speech-to-text
//!
//! Wraps a continuous, interim-result recognition session against the
//! Gemini Live API: microphone audio streams up, transcription fragments
//! stream down, and every fragment re-derives the full transcript heard
//! so far. Stream errors end the session; there is no reconnection.

mod connection;
mod error;
mod messages;

pub(crate) use error::TranscriptionError;

use crate::audio::{self, AudioCaptureError, AudioCaptureHandle};
use crate::config::RecognizerConfig;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tracing::info;

/// Recognition event for subscribers
#[derive(Clone, Debug)]
pub(crate) enum TranscriptEvent {
    /// The recognition stream is live and listening
    Started,
    /// A fragment was recognized; carries the full transcript so far
    Transcript { text: String },
    /// The recognition stream ended
    Ended,
    /// Stream-level error; the session is over
    Error { message: String },
}

/// Recognition client managing one Live API session at a time
///
/// Constructed once and re-used across sessions; `start` opens a fresh
/// microphone capture and WebSocket session, `stop` ends them.
pub(crate) struct TranscriptionClient {
    config: RecognizerConfig,
    api_key: String,
    /// Recognized fragments, in event order, for the active session
    segments: Arc<Mutex<Vec<String>>>,
    event_tx: broadcast::Sender<TranscriptEvent>,
    should_stop: Arc<AtomicBool>,
    audio_handle: Mutex<Option<AudioCaptureHandle>>,
}

impl TranscriptionClient {
    /// Create a new recognition client
    pub(crate) fn new(config: RecognizerConfig, api_key: String) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            api_key,
            segments: Arc::new(Mutex::new(Vec::new())),
            event_tx,
            should_stop: Arc::new(AtomicBool::new(false)),
            audio_handle: Mutex::new(None),
        }
    }

    /// Subscribe to recognition events
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.event_tx.subscribe()
    }

    /// Start a recognition session: microphone capture plus a Live API
    /// WebSocket session.
    ///
    /// Fails with `CapabilityUnavailable` when the host cannot capture
    /// speech at all; connection failures are reported as such. The
    /// `Started` event fires once the server acknowledges the setup.
    pub(crate) async fn start(&self) -> Result<(), TranscriptionError> {
        use connection::{
            build_ws_request, build_ws_url, send_setup, spawn_receive_task, spawn_send_task,
        };

        self.should_stop.store(false, Ordering::SeqCst);
        if let Ok(mut segments) = self.segments.lock() {
            segments.clear();
        }

        // Microphone first: without capture there is nothing to recognize
        let (mut audio_handle, audio_rx) = audio::start_capture().map_err(|e| match e {
            AudioCaptureError::NoInputDevice | AudioCaptureError::NoSupportedConfig => {
                TranscriptionError::CapabilityUnavailable(e.to_string())
            }
            other => TranscriptionError::Capture(other),
        })?;

        info!(
            endpoint = %self.config.endpoint,
            language = %self.config.language,
            "Connecting to Gemini Live for STT"
        );

        let ws_url = build_ws_url(&self.config.endpoint, &self.api_key);
        let request = match build_ws_request(&ws_url) {
            Ok(request) => request,
            Err(e) => {
                audio_handle.stop();
                return Err(TranscriptionError::ConnectionError(e));
            }
        };

        let ws_result = timeout(
            Duration::from_secs(error::WS_CONNECT_TIMEOUT_SECS),
            connect_async(request),
        )
        .await;

        let ws_stream = match ws_result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                audio_handle.stop();
                return Err(TranscriptionError::ConnectionError(e.to_string()));
            }
            Err(_) => {
                audio_handle.stop();
                return Err(TranscriptionError::ConnectionTimeout);
            }
        };

        info!("Connected to Gemini Live");

        let (mut ws_sink, ws_stream) = ws_stream.split();
        if let Err(e) = send_setup(&mut ws_sink, &self.config.model, &self.config.language).await {
            audio_handle.stop();
            return Err(TranscriptionError::ConnectionError(e));
        }

        // Hold the capture handle so stop() can end the session
        if let Ok(mut slot) = self.audio_handle.lock() {
            if let Some(mut previous) = slot.replace(audio_handle) {
                previous.stop();
            }
        }

        spawn_receive_task(
            ws_stream,
            self.segments.clone(),
            self.event_tx.clone(),
            self.should_stop.clone(),
        );
        spawn_send_task(ws_sink, audio_rx, self.should_stop.clone());

        Ok(())
    }

    /// Stop the active session; a no-op when none is running.
    ///
    /// Stopping capture closes the audio channel, which makes the send
    /// task close the WebSocket; the receive task then emits `Ended`.
    pub(crate) fn stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.audio_handle.lock() {
            if let Some(mut handle) = slot.take() {
                handle.stop();
            }
        }
    }
}

/// Append a recognized fragment and return the full transcript so far.
///
/// The transcript is the concatenation of every fragment in event order;
/// fragments carry their own spacing.
fn append_fragment(segments: &Arc<Mutex<Vec<String>>>, fragment: &str) -> String {
    match segments.lock() {
        Ok(mut segments) => {
            segments.push(fragment.to_string());
            segments.concat()
        }
        Err(_) => fragment.to_string(),
    }
}
