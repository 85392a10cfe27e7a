//! Summarization trigger
//!
//! Decides, on each transcript update, whether enough new content has
//! accumulated to warrant another summarization call, and carries the
//! rolling conversation context across calls.

use crate::error::SummaryError;
use crate::gemini::GeminiClient;
use crate::session::{ChatMessage, Session};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;

/// Outcome of one summarization call, applied by the dispatch loop in
/// arrival order.
pub(crate) struct SummaryOutcome {
    /// The transcript chunk that was sent
    pub chunk: String,
    /// The model reply, or the error that ended the call
    pub result: Result<String, SummaryError>,
}

/// Gates and executes summarization calls.
pub(crate) struct SummaryTrigger {
    client: Arc<GeminiClient>,
    threshold: usize,
    session: Arc<Mutex<Session>>,
    outcome_tx: mpsc::Sender<SummaryOutcome>,
}

impl SummaryTrigger {
    pub(crate) fn new(
        client: Arc<GeminiClient>,
        threshold: usize,
        session: Arc<Mutex<Session>>,
        outcome_tx: mpsc::Sender<SummaryOutcome>,
    ) -> Self {
        Self {
            client,
            threshold,
            session,
            outcome_tx,
        }
    }

    /// Called with every transcript update. Issues a summarization call
    /// when the transcript has grown past the watermark by more than the
    /// threshold; otherwise does nothing.
    ///
    /// The watermark advances before the call is issued, so later updates
    /// inside the same window never re-fire. Two updates that each cross
    /// a widened window can still put two calls in flight; outcomes are
    /// applied in the order they resolve. A pending-call latch would
    /// serialize them, at the cost of delaying the fresher chunk.
    pub(crate) fn maybe_summarize(&self, current_transcript: &str) {
        let length = current_transcript.chars().count();
        let history = {
            let Ok(mut session) = self.session.lock() else {
                return;
            };
            let Some(history) = take_window(&mut session, length, self.threshold) else {
                return;
            };
            history
        };

        info!(length, "Transcript crossed the chunk threshold, requesting summary");

        let client = self.client.clone();
        let chunk = current_transcript.to_string();
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = client.send_message(&history, &chunk).await;
            let _ = outcome_tx.send(SummaryOutcome { chunk, result }).await;
        });
    }
}

/// The chunk gate: true when the transcript has grown past the watermark
/// by more than the threshold.
pub(crate) fn crosses_threshold(length: usize, watermark: usize, threshold: usize) -> bool {
    length > watermark + threshold
}

/// Apply the gate to a session. When a call should be issued, the
/// watermark advances to `length` first and a snapshot of the history to
/// send is returned; a failed call later leaves the advance in place.
pub(crate) fn take_window(
    session: &mut Session,
    length: usize,
    threshold: usize,
) -> Option<Vec<ChatMessage>> {
    if !crosses_threshold(length, session.watermark, threshold) {
        return None;
    }
    session.watermark = length;
    Some(session.history.clone())
}
