//! Terminal display surface
//!
//! Renders the observable state after every change: whether we are
//! listening, the transcript so far, and the latest summary.

use std::io::{self, Write};

/// Observable state rendered after every update
#[derive(Debug, Default, Clone)]
pub(crate) struct DisplayState {
    pub is_listening: bool,
    pub transcription: String,
    /// Latest summary; survives session boundaries until overwritten
    pub chat_response: Option<String>,
    /// One-time notice (e.g. missing capture capability)
    pub notice: Option<String>,
}

/// Redraw the terminal from the current state
pub(crate) fn render(state: &DisplayState) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", render_to_string(state));
    let _ = stdout.flush();
}

/// Build the full screen contents
fn render_to_string(state: &DisplayState) -> String {
    let status = if state.is_listening {
        "[listening] audio is being transcribed"
    } else {
        "[idle] nothing is being transcribed right now"
    };

    let transcript = if state.transcription.is_empty() {
        "No transcript available..."
    } else {
        &state.transcription
    };

    let summary = state
        .chat_response
        .as_deref()
        .unwrap_or("No summary available...");

    let mut screen = format!(
        "{status}\n(press Enter to toggle listening, q to quit)\n\n\
         ## Transcript\n\n{transcript}\n\n## Summary\n\n{summary}\n"
    );
    if let Some(notice) = &state.notice {
        screen.push_str(&format!("\n! {notice}\n"));
    }
    screen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_idle_placeholders() {
        let screen = render_to_string(&DisplayState::default());
        assert!(screen.contains("[idle]"));
        assert!(screen.contains("No transcript available..."));
        assert!(screen.contains("No summary available..."));
    }

    #[test]
    fn test_render_listening_with_content() {
        let state = DisplayState {
            is_listening: true,
            transcription: "bom dia a todos".to_string(),
            chat_response: Some("## Minutes".to_string()),
            notice: None,
        };
        let screen = render_to_string(&state);
        assert!(screen.contains("[listening]"));
        assert!(screen.contains("bom dia a todos"));
        assert!(screen.contains("## Minutes"));
    }

    #[test]
    fn test_render_notice_when_present() {
        let state = DisplayState {
            notice: Some("Speech capture is unavailable".to_string()),
            ..DisplayState::default()
        };
        assert!(render_to_string(&state).contains("! Speech capture is unavailable"));
    }
}
