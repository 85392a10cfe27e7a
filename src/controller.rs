//! Listening control and event dispatch
//!
//! Owns the lazily-constructed recognizer, the session state shared with
//! the summarization trigger, and the single dispatch loop that applies
//! stdin commands, recognition events, and summarization outcomes in
//! order. Outcomes are applied as they resolve, which preserves the
//! possibility of two in-flight calls landing out of send order.

use crate::config::Settings;
use crate::display::{self, DisplayState};
use crate::gemini::GeminiClient;
use crate::session::Session;
use crate::summarizer::{SummaryOutcome, SummaryTrigger};
use crate::transcription::{TranscriptEvent, TranscriptionClient, TranscriptionError};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// State the dispatch loop mutates
struct AppState {
    session: Arc<Mutex<Session>>,
    display: DisplayState,
    /// Constructed on first start, then re-used
    recognizer: Option<Arc<TranscriptionClient>>,
}

/// Run the application until stdin closes or the user quits
pub(crate) async fn run(settings: Settings) -> anyhow::Result<()> {
    let client = Arc::new(GeminiClient::new(
        &settings.api_key,
        &settings.config.summary.model,
    )?);
    let session = Arc::new(Mutex::new(Session::default()));
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<SummaryOutcome>(16);
    let trigger = SummaryTrigger::new(
        client,
        settings.config.summary.chunk_threshold,
        session.clone(),
        outcome_tx,
    );

    let mut state = AppState {
        session,
        display: DisplayState::default(),
        recognizer: None,
    };
    let mut event_rx: Option<broadcast::Receiver<TranscriptEvent>> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    display::render(&state.display);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "q" | "quit" => break,
                    _ => toggle(&mut state, &mut event_rx, &settings).await,
                }
                display::render(&state.display);
            }
            event = recv_event(&mut event_rx) => {
                handle_event(&mut state, &trigger, event);
                display::render(&state.display);
            }
            Some(outcome) = outcome_rx.recv() => {
                apply_outcome(&mut state, outcome);
                display::render(&state.display);
            }
        }
    }

    stop_listening(&mut state);
    info!("Exiting");
    Ok(())
}

/// Receive the next recognition event, pending forever while no session
/// has ever started
async fn recv_event(rx: &mut Option<broadcast::Receiver<TranscriptEvent>>) -> TranscriptEvent {
    loop {
        match rx {
            Some(inner) => match inner.recv().await {
                Ok(event) => return event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dropped recognition events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    *rx = None;
                }
            },
            None => std::future::pending::<()>().await,
        }
    }
}

/// Toggle listening: stop when listening, start otherwise
async fn toggle(
    state: &mut AppState,
    event_rx: &mut Option<broadcast::Receiver<TranscriptEvent>>,
    settings: &Settings,
) {
    if state.display.is_listening {
        stop_listening(state);
    } else {
        start_listening(state, event_rx, settings).await;
    }
}

/// Start a listening session
async fn start_listening(
    state: &mut AppState,
    event_rx: &mut Option<broadcast::Receiver<TranscriptEvent>>,
    settings: &Settings,
) {
    // Lazily construct the recognizer once; later starts re-use it
    let recognizer = match &state.recognizer {
        Some(recognizer) => recognizer.clone(),
        None => {
            let recognizer = Arc::new(TranscriptionClient::new(
                settings.config.recognizer.clone(),
                settings.api_key.clone(),
            ));
            state.recognizer = Some(recognizer.clone());
            recognizer
        }
    };
    *event_rx = Some(recognizer.subscribe());

    // A fresh session: empty transcript, zero watermark, seeded history
    if let Ok(mut session) = state.session.lock() {
        session.begin(&settings.config.recognizer.language);
    }

    if let Err(e) = recognizer.start().await {
        report_start_failure(&mut state.display, &e);
    }
}

/// Listening never started; say so and stay idle
fn report_start_failure(display: &mut DisplayState, error: &TranscriptionError) {
    match error {
        TranscriptionError::CapabilityUnavailable(reason) => {
            error!("Speech capture is unavailable: {}", reason);
            display.notice = Some(format!("Speech capture is unavailable: {reason}"));
        }
        other => {
            error!("Failed to start transcription: {}", other);
            display.notice = Some(format!("Could not start transcription: {other}"));
        }
    }
}

/// Stop the active session, if any, and clear session state.
///
/// Safe to call repeatedly; in-flight summarization calls are not
/// aborted, their outcomes land on whatever session state exists when
/// they resolve.
fn stop_listening(state: &mut AppState) {
    if let Some(recognizer) = &state.recognizer {
        recognizer.stop();
    }
    if let Ok(mut session) = state.session.lock() {
        session.reset();
    }
}

/// Apply one recognition event
fn handle_event(state: &mut AppState, trigger: &SummaryTrigger, event: TranscriptEvent) {
    match event {
        TranscriptEvent::Started => {
            info!("Recognition stream started");
            state.display.is_listening = true;
            state.display.notice = None;
        }
        TranscriptEvent::Transcript { text } => {
            if let Ok(mut session) = state.session.lock() {
                session.transcript = text.clone();
            }
            trigger.maybe_summarize(&text);
            state.display.transcription = text;
        }
        TranscriptEvent::Ended => {
            info!("Recognition stream ended");
            state.display.is_listening = false;
        }
        TranscriptEvent::Error { message } => {
            error!("Recognition error: {}", message);
            state.display.is_listening = false;
        }
    }
}

/// Apply one summarization outcome
fn apply_outcome(state: &mut AppState, outcome: SummaryOutcome) {
    match outcome.result {
        Ok(reply) => {
            if let Ok(mut session) = state.session.lock() {
                session.record_exchange(outcome.chunk, reply.clone());
            }
            state.display.chat_response = Some(reply);
        }
        Err(e) => {
            // The window stays skipped: the watermark advanced at issue
            // time and nothing is rolled back
            error!("Summarization failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SummaryError;

    /// Trigger with a threshold no test transcript will ever cross
    fn test_state() -> (AppState, SummaryTrigger) {
        let session = Arc::new(Mutex::new(Session::default()));
        let client = Arc::new(GeminiClient::new("test-key", "gemini-1.5-flash").unwrap());
        let (outcome_tx, _outcome_rx) = mpsc::channel(4);
        let trigger = SummaryTrigger::new(client, usize::MAX / 2, session.clone(), outcome_tx);
        let state = AppState {
            session,
            display: DisplayState::default(),
            recognizer: None,
        };
        (state, trigger)
    }

    #[test]
    fn test_started_and_ended_events_drive_listening_flag() {
        let (mut state, trigger) = test_state();
        assert!(!state.display.is_listening);

        handle_event(&mut state, &trigger, TranscriptEvent::Started);
        assert!(state.display.is_listening);

        handle_event(&mut state, &trigger, TranscriptEvent::Ended);
        assert!(!state.display.is_listening);
    }

    #[test]
    fn test_stream_error_reverts_to_idle() {
        let (mut state, trigger) = test_state();
        handle_event(&mut state, &trigger, TranscriptEvent::Started);
        handle_event(
            &mut state,
            &trigger,
            TranscriptEvent::Error {
                message: "microphone permission denied".to_string(),
            },
        );
        assert!(!state.display.is_listening);
    }

    #[test]
    fn test_transcript_event_updates_session_and_display() {
        let (mut state, trigger) = test_state();
        state.session.lock().unwrap().begin("en");

        handle_event(
            &mut state,
            &trigger,
            TranscriptEvent::Transcript {
                text: "hello everyone".to_string(),
            },
        );
        assert_eq!(state.display.transcription, "hello everyone");
        assert_eq!(state.session.lock().unwrap().transcript, "hello everyone");
    }

    #[test]
    fn test_capability_failure_leaves_idle() {
        let (mut state, _trigger) = test_state();
        report_start_failure(
            &mut state.display,
            &TranscriptionError::CapabilityUnavailable("no input device".to_string()),
        );
        assert!(!state.display.is_listening);
        assert!(state
            .display
            .notice
            .as_deref()
            .unwrap()
            .contains("unavailable"));
    }

    #[test]
    fn test_successful_summary_updates_history_and_display() {
        let (mut state, _trigger) = test_state();
        state.session.lock().unwrap().begin("en");

        apply_outcome(
            &mut state,
            SummaryOutcome {
                chunk: "the chunk".to_string(),
                result: Ok("## Minutes".to_string()),
            },
        );
        assert_eq!(state.display.chat_response.as_deref(), Some("## Minutes"));
        let session = state.session.lock().unwrap();
        assert_eq!(session.history.len(), 4);
        assert_eq!(session.history[2].text, "the chunk");
    }

    #[test]
    fn test_failed_summary_leaves_summary_and_history_unchanged() {
        let (mut state, _trigger) = test_state();
        state.session.lock().unwrap().begin("en");
        state.display.chat_response = Some("previous summary".to_string());

        apply_outcome(
            &mut state,
            SummaryOutcome {
                chunk: "the chunk".to_string(),
                result: Err(SummaryError::InvalidResponse("bad".to_string())),
            },
        );
        assert_eq!(
            state.display.chat_response.as_deref(),
            Some("previous summary")
        );
        assert_eq!(state.session.lock().unwrap().history.len(), 2);
    }

    #[test]
    fn test_stop_listening_twice_matches_stopping_once() {
        let (mut state, _trigger) = test_state();
        {
            let mut session = state.session.lock().unwrap();
            session.begin("en");
            session.transcript = "words".to_string();
            session.watermark = 80;
        }

        stop_listening(&mut state);
        stop_listening(&mut state);

        let session = state.session.lock().unwrap();
        assert!(session.transcript.is_empty());
        assert_eq!(session.watermark, 0);
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_late_reply_after_stop_still_lands() {
        // Stopping does not cancel in-flight calls; a reply resolving
        // afterwards is applied to the reset session state.
        let (mut state, _trigger) = test_state();
        state.session.lock().unwrap().begin("en");
        stop_listening(&mut state);

        apply_outcome(
            &mut state,
            SummaryOutcome {
                chunk: "stale chunk".to_string(),
                result: Ok("stale reply".to_string()),
            },
        );
        assert_eq!(state.display.chat_response.as_deref(), Some("stale reply"));
        assert_eq!(state.session.lock().unwrap().history.len(), 2);
    }
}
