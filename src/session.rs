//! Session-scoped conversation state
//!
//! One listening session owns the transcript heard so far, the chunk
//! watermark, and the rolling conversation history exchanged with the
//! summarizer. All three reset together; the latest summary lives in
//! display state and survives session boundaries.

/// Message role in the conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    User,
    Model,
}

impl Role {
    /// Wire name of the role
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A role-tagged entry in the conversation history
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// Style directive opening every session's history.
/// Use `{language}` placeholder for the output language.
const STYLE_SEED_TEMPLATE: &str = "You are connected to a live audio transcriber, so keep the summaries restrained. Do not add anything beyond what was asked for; fillers such as \"Here is...\" or \"This is...\" clutter the text. Format the text with markdown. The output MUST be in {language}; do not translate to any other language.";

/// Task directive following the style directive.
const TASK_SEED_TEMPLATE: &str = "What I send next are transcriptions of a meeting in progress. Take the text and write meeting minutes, organized into topics.";

/// Convert a language tag to its full name for use in prompts
pub(crate) fn language_name(tag: &str) -> &str {
    match tag {
        "pt-BR" => "Brazilian Portuguese",
        "pt" => "Portuguese",
        "en" | "en-US" | "en-GB" => "English",
        "es" => "Spanish",
        "de" => "German",
        "fr" => "French",
        _ => tag, // Return the tag itself for unknown languages
    }
}

/// Build the two seed instruction entries for a fresh session
pub(crate) fn seed_history(language_tag: &str) -> Vec<ChatMessage> {
    let language = language_name(language_tag);
    vec![
        ChatMessage {
            role: Role::User,
            text: STYLE_SEED_TEMPLATE.replace("{language}", language),
        },
        ChatMessage {
            role: Role::User,
            text: TASK_SEED_TEMPLATE.to_string(),
        },
    ]
}

/// Session-scoped state with explicit reset semantics
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Full transcript recognized so far
    pub transcript: String,
    /// Transcript length at which the last summarization was triggered
    pub watermark: usize,
    /// Rolling conversation history sent with each summarization call
    pub history: Vec<ChatMessage>,
}

impl Session {
    /// Begin a fresh session: empty transcript, zero watermark, seeded
    /// history. Prior session state, if any, is discarded.
    pub(crate) fn begin(&mut self, language_tag: &str) {
        self.transcript.clear();
        self.watermark = 0;
        self.history = seed_history(language_tag);
    }

    /// Clear all session state
    pub(crate) fn reset(&mut self) {
        self.transcript.clear();
        self.watermark = 0;
        self.history.clear();
    }

    /// Record one successful summarization round-trip: the chunk that was
    /// sent, then the model's reply.
    pub(crate) fn record_exchange(&mut self, chunk: String, reply: String) {
        self.history.push(ChatMessage {
            role: Role::User,
            text: chunk,
        });
        self.history.push(ChatMessage {
            role: Role::Model,
            text: reply,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_history_has_two_user_entries() {
        let seeds = seed_history("pt-BR");
        assert_eq!(seeds.len(), 2);
        assert!(seeds.iter().all(|m| m.role == Role::User));
        assert!(seeds[0].text.contains("Brazilian Portuguese"));
        assert!(!seeds[0].text.contains("{language}"));
        assert!(seeds[1].text.contains("meeting minutes"));
    }

    #[test]
    fn test_begin_resets_regardless_of_prior_state() {
        let mut session = Session::default();
        session.begin("en");
        session.transcript = "old words".to_string();
        session.watermark = 120;
        session.record_exchange("chunk".into(), "reply".into());
        assert_eq!(session.history.len(), 4);

        session.begin("en");
        assert!(session.transcript.is_empty());
        assert_eq!(session.watermark, 0);
        assert_eq!(session.history, seed_history("en"));
    }

    #[test]
    fn test_history_grows_by_pairs_in_call_order() {
        let mut session = Session::default();
        session.begin("en");
        session.record_exchange("first chunk".into(), "first reply".into());
        session.record_exchange("second chunk".into(), "second reply".into());

        // 2 seeds + one user/model pair per round
        assert_eq!(session.history.len(), 2 + 2 * 2);
        assert_eq!(session.history[2].role, Role::User);
        assert_eq!(session.history[2].text, "first chunk");
        assert_eq!(session.history[3].role, Role::Model);
        assert_eq!(session.history[3].text, "first reply");
        assert_eq!(session.history[5].text, "second reply");
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = Session::default();
        session.begin("en");
        session.transcript = "words".to_string();
        session.watermark = 60;

        session.reset();
        let after_first = format!("{:?}", session);
        session.reset();
        assert_eq!(format!("{:?}", session), after_first);
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_language_name_fallback() {
        assert_eq!(language_name("pt-BR"), "Brazilian Portuguese");
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("xx-YY"), "xx-YY");
    }
}
