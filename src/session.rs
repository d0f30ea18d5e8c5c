use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::compose::NEUTRAL_PROFILE;
use crate::llm::{ChatMessage, LlmClient, Role};
use crate::manuscript::{
    extract_book_title, extract_character_details, is_completion, strip_completion,
    FALLBACK_TITLE, START_COMMAND_GATE,
};
use crate::prompts::MASTER_PROMPT;

/// One guided conversation from greeting to finished manuscript. Owns the
/// transcript and everything captured from it; dropped wholesale on reset.
pub struct StorySession {
    llm: Box<dyn LlmClient>,
    transcript: Vec<ChatMessage>,
    character_profile: Option<String>,
    book_title: Option<String>,
    manuscript: Option<String>,
}

fn summary_character() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"we have ([^,]+)").expect("summary character pattern"))
}

impl StorySession {
    pub fn new(llm: Box<dyn LlmClient>) -> Self {
        Self {
            llm,
            transcript: Vec::new(),
            character_profile: None,
            book_title: None,
            manuscript: None,
        }
    }

    /// Kicks off stage 1 with an empty user turn; the reply is the greeting.
    pub async fn start(&mut self) -> Result<String> {
        self.send("").await
    }

    pub async fn send(&mut self, user_text: &str) -> Result<String> {
        self.transcript.push(ChatMessage::user(user_text));
        let reply = match self.llm.chat(MASTER_PROMPT, &self.transcript).await {
            Ok(reply) => reply,
            Err(e) => {
                // The optimistically queued user turn must not survive a
                // failed call, or the next send would double it.
                self.transcript.pop();
                return Err(e);
            }
        };
        self.absorb_reply(&reply);
        Ok(reply)
    }

    fn absorb_reply(&mut self, reply: &str) {
        if self.character_profile.is_none() {
            self.character_profile = extract_character_details(reply);
        }
        if self.book_title.is_none() {
            self.book_title = extract_book_title(reply);
        }

        if is_completion(reply) {
            if self.character_profile.is_none() {
                self.character_profile = self.summary_profile_fallback();
            }
            self.manuscript = Some(strip_completion(reply));
            // The raw manuscript stays out of the visible conversation.
        } else {
            self.transcript.push(ChatMessage::assistant(reply));
        }
    }

    // Last resort: the stage 3 summary usually reads "So we have <character>,
    // a story about ...". Worth one scan before giving up on a profile.
    fn summary_profile_fallback(&self) -> Option<String> {
        let summary = self
            .transcript
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)?;
        summary_character()
            .captures(&summary.content)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// True when the last reply asked the user to type the start command.
    pub fn awaiting_start_command(&self) -> bool {
        matches!(
            self.transcript.last(),
            Some(m) if m.role == Role::Assistant && m.content.contains(START_COMMAND_GATE)
        )
    }

    pub fn is_complete(&self) -> bool {
        self.manuscript.is_some()
    }

    pub fn manuscript(&self) -> Option<&str> {
        self.manuscript.as_deref()
    }

    pub fn profile_or_default(&self) -> &str {
        self.character_profile.as_deref().unwrap_or(NEUTRAL_PROFILE)
    }

    pub fn title_or_default(&self) -> &str {
        self.book_title.as_deref().unwrap_or(FALLBACK_TITLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manuscript::{parse_manuscript, COMPLETION_MESSAGE};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedLlm {
        replies: Mutex<Vec<Result<String, String>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, String>>) -> Box<Self> {
            Box::new(Self {
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _system: &str, _history: &[ChatMessage]) -> Result<String> {
            let mut replies = self.replies.lock().unwrap();
            match replies.remove(0) {
                Ok(r) => Ok(r),
                Err(m) => Err(anyhow!("{}", m)),
            }
        }
    }

    fn manuscript_reply() -> String {
        let mut raw = String::new();
        for n in 1..=16 {
            raw.push_str(&format!(
                "{n}. **PAGE TEXT:** Page {n} hums a tune. **ILLUSTRATION PROMPT:** Rex in scene number {n} on stage.\n"
            ));
        }
        format!("{raw}\n{COMPLETION_MESSAGE}")
    }

    #[tokio::test]
    async fn start_records_greeting_in_transcript() {
        let llm = ScriptedLlm::new(vec![Ok("Welcome! Who is our hero?".to_string())]);
        let mut session = StorySession::new(llm);

        let greeting = session.start().await.unwrap();
        assert_eq!(greeting, "Welcome! Who is our hero?");
        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.transcript[0].role, Role::User);
        assert_eq!(session.transcript[1].role, Role::Assistant);
        assert!(!session.is_complete());
    }

    #[tokio::test]
    async fn captures_profile_and_title_once() {
        let llm = ScriptedLlm::new(vec![
            Ok("CHARACTER DETAILS: a punk rock velociraptor with green spikes\nWhat style?"
                .to_string()),
            Ok("CHARACTER DETAILS: something else entirely\nBOOK TITLE: Rex Rocks Out\nReady?"
                .to_string()),
        ]);
        let mut session = StorySession::new(llm);

        session.send("Rex, a dinosaur who loves music").await.unwrap();
        assert_eq!(
            session.character_profile.as_deref(),
            Some("a punk rock velociraptor with green spikes")
        );

        session.send("rhyming and silly").await.unwrap();
        // First capture wins; the profile is immutable once set.
        assert_eq!(
            session.character_profile.as_deref(),
            Some("a punk rock velociraptor with green spikes")
        );
        assert_eq!(session.book_title.as_deref(), Some("Rex Rocks Out"));
    }

    #[tokio::test]
    async fn gate_opens_when_reply_asks_for_start_command() {
        let llm = ScriptedLlm::new(vec![
            Ok("Sounds great! When ready, type 'START STORY' to begin.".to_string()),
            Ok(manuscript_reply()),
        ]);
        let mut session = StorySession::new(llm);

        session.send("yes, all confirmed").await.unwrap();
        assert!(session.awaiting_start_command());

        session.send("START STORY").await.unwrap();
        assert!(session.is_complete());
        assert!(!session.awaiting_start_command());
    }

    #[tokio::test]
    async fn completion_reply_stays_out_of_transcript() {
        let llm = ScriptedLlm::new(vec![Ok(manuscript_reply())]);
        let mut session = StorySession::new(llm);

        session.send("START STORY").await.unwrap();
        assert!(session.is_complete());

        // Last transcript entry is still the user's command.
        let last = session.transcript.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "START STORY");

        let manuscript = session.manuscript().unwrap();
        assert!(!manuscript.contains("Project Complete!"));
        assert_eq!(parse_manuscript(manuscript).len(), 16);
    }

    #[tokio::test]
    async fn failed_call_rolls_back_the_user_turn() {
        let llm = ScriptedLlm::new(vec![
            Err("API error (429): rate limit".to_string()),
            Ok("Recovered.".to_string()),
        ]);
        let mut session = StorySession::new(llm);

        let err = session.send("hello").await;
        assert!(err.is_err());
        assert_eq!(session.transcript.len(), 0);

        session.send("hello").await.unwrap();
        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.transcript[0].content, "hello");
    }

    #[tokio::test]
    async fn summary_fallback_recovers_profile_at_completion() {
        let llm = ScriptedLlm::new(vec![
            Ok("Perfect! So we have a brave little bunny, a story about sharing. \
                BOOK TITLE: The Sharing Burrow\nType 'START STORY' when ready."
                .to_string()),
            Ok(manuscript_reply()),
        ]);
        let mut session = StorySession::new(llm);

        session.send("confirmed").await.unwrap();
        assert_eq!(session.character_profile.as_deref(), None);

        session.send("START STORY").await.unwrap();
        assert_eq!(session.character_profile.as_deref(), Some("a brave little bunny"));
        assert_eq!(session.book_title.as_deref(), Some("The Sharing Burrow"));
    }

    #[tokio::test]
    async fn defaults_cover_missing_captures() {
        let llm = ScriptedLlm::new(vec![Ok("hello".to_string())]);
        let mut session = StorySession::new(llm);
        session.send("hi").await.unwrap();

        assert_eq!(session.profile_or_default(), NEUTRAL_PROFILE);
        assert_eq!(session.title_or_default(), FALLBACK_TITLE);
    }
}
