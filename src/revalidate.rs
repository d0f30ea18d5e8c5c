use log::{info, warn};

use crate::llm::{ChatMessage, LlmClient};
use crate::manuscript::parse_manuscript;
use crate::prompts::{revalidation_prompt, REVALIDATION_SYSTEM};
use crate::theme::ThemeLabel;

/// One best-effort editorial pass over the finished manuscript. Keeps the
/// original unless the model returns something different that still parses
/// into pages. Never fails: any error downgrades to the input manuscript.
pub async fn revalidate_manuscript(
    llm: &dyn LlmClient,
    manuscript: &str,
    profile: &str,
    theme: ThemeLabel,
) -> String {
    match try_revalidate(llm, manuscript, profile, theme).await {
        Ok(Some(revised)) => {
            info!("Revalidation produced a revised manuscript");
            revised
        }
        Ok(None) => manuscript.to_string(),
        Err(e) => {
            warn!("Revalidation failed, keeping original manuscript: {:#}", e);
            manuscript.to_string()
        }
    }
}

async fn try_revalidate(
    llm: &dyn LlmClient,
    manuscript: &str,
    profile: &str,
    theme: ThemeLabel,
) -> anyhow::Result<Option<String>> {
    let request = revalidation_prompt(manuscript, profile, &theme.to_string());
    let history = vec![ChatMessage::user(request)];
    let reply = llm.chat(REVALIDATION_SYSTEM, &history).await?;

    let revised = reply.trim();
    if revised.is_empty() || revised == manuscript.trim() {
        return Ok(None);
    }
    // A revision the splitter cannot read is worse than no revision.
    if parse_manuscript(revised).is_empty() {
        warn!("Revalidation reply did not parse into pages, discarding it");
        return Ok(None);
    }
    Ok(Some(revised.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const ORIGINAL: &str =
        "1. **PAGE TEXT:** Rex stomps loud. **ILLUSTRATION PROMPT:** Rex watching the show.\n";
    const REVISED: &str =
        "1. **PAGE TEXT:** Rex stomps loud. **ILLUSTRATION PROMPT:** Rex with the show on stage.\n";

    #[derive(Debug)]
    struct CannedLlm {
        reply: Result<String, String>,
        calls: Arc<AtomicUsize>,
    }

    impl CannedLlm {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat(&self, _system: &str, _history: &[ChatMessage]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(m) => Err(anyhow!("{}", m)),
            }
        }
    }

    #[tokio::test]
    async fn accepts_a_differing_parseable_revision() {
        let llm = CannedLlm::ok(REVISED);
        let out = revalidate_manuscript(&llm, ORIGINAL, "a velociraptor", ThemeLabel::Storybook).await;
        assert_eq!(out, REVISED.trim());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keeps_original_when_reply_is_unchanged() {
        let llm = CannedLlm::ok(ORIGINAL);
        let out = revalidate_manuscript(&llm, ORIGINAL, "a velociraptor", ThemeLabel::Storybook).await;
        assert_eq!(out, ORIGINAL);
    }

    #[tokio::test]
    async fn keeps_original_when_reply_has_no_pages() {
        let llm = CannedLlm::ok("I'm sorry, I can't help with that.");
        let out = revalidate_manuscript(&llm, ORIGINAL, "a velociraptor", ThemeLabel::Storybook).await;
        assert_eq!(out, ORIGINAL);
    }

    #[tokio::test]
    async fn keeps_original_when_reply_is_empty() {
        let llm = CannedLlm::ok("   \n");
        let out = revalidate_manuscript(&llm, ORIGINAL, "a velociraptor", ThemeLabel::Storybook).await;
        assert_eq!(out, ORIGINAL);
    }

    #[tokio::test]
    async fn call_failure_falls_back_to_original() {
        let llm = CannedLlm::err("API error (503): overloaded");
        let out = revalidate_manuscript(&llm, ORIGINAL, "a velociraptor", ThemeLabel::Space).await;
        assert_eq!(out, ORIGINAL);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
