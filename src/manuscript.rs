use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Wire contract with the chat model. The manuscript arrives as a numbered
// list, one entry per page, each entry carrying both field markers.
pub const PAGE_TEXT_MARKER: &str = "PAGE TEXT:";
pub const ILLUSTRATION_MARKER: &str = "ILLUSTRATION PROMPT:";
pub const CHARACTER_DETAILS_MARKER: &str = "CHARACTER DETAILS:";
pub const BOOK_TITLE_MARKER: &str = "BOOK TITLE:";
pub const COMPLETION_SENTINEL: &str = "Project Complete!";
pub const COMPLETION_MESSAGE: &str = "Project Complete! The Storyteller's Manuscript is ready.";
pub const START_COMMAND_GATE: &str = "type 'START STORY'";

pub const FALLBACK_TITLE: &str = "A Storyteller Lab Creation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_text: String,
    pub illustration_directive: String,
    /// 1-based, contiguous over the pages that survived extraction.
    pub order: usize,
}

fn page_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\d+\.\s*").expect("page boundary pattern"))
}

fn character_details_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{CHARACTER_DETAILS_MARKER}\s*(.+)"))
            .expect("character details pattern")
    })
}

fn book_title_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{BOOK_TITLE_MARKER}\s*(.+)")).expect("book title pattern")
    })
}

/// Splits a raw manuscript into page segments on the numbered-list boundary.
/// Whatever the model emitted before the first "1." (titles, preamble) is
/// discarded. Empty input yields an empty sequence.
pub fn split_pages(raw: &str) -> impl Iterator<Item = &str> {
    page_boundary().split(raw).skip(1)
}

/// Separates one raw segment into (page_text, illustration_directive).
/// The page text sheds its marker and any emphasis punctuation; the directive
/// is whatever follows the illustration marker, trimmed but otherwise
/// untouched. Returns None when the illustration marker is absent; the caller
/// drops the segment and keeps going.
pub fn extract_fields(segment: &str) -> Option<(String, String)> {
    let (head, tail) = segment.split_once(ILLUSTRATION_MARKER)?;
    let page_text = head
        .replace(PAGE_TEXT_MARKER, "")
        .replace('*', "")
        .trim()
        .to_string();
    let directive = tail.trim().to_string();
    Some((page_text, directive))
}

pub fn parse_manuscript(raw: &str) -> Vec<PageRecord> {
    split_pages(raw)
        .filter_map(extract_fields)
        .enumerate()
        .map(|(i, (page_text, illustration_directive))| PageRecord {
            page_text,
            illustration_directive,
            order: i + 1,
        })
        .collect()
}

/// Captures the profile from a "CHARACTER DETAILS: ..." line in a reply.
pub fn extract_character_details(reply: &str) -> Option<String> {
    character_details_line()
        .captures(reply)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Captures the title from a "BOOK TITLE: ..." line in a reply.
pub fn extract_book_title(reply: &str) -> Option<String> {
    book_title_line()
        .captures(reply)
        .map(|c| c[1].trim().trim_matches('*').trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn is_completion(reply: &str) -> bool {
    reply.contains(COMPLETION_SENTINEL)
}

/// The manuscript is the completion reply minus the completion sentence.
pub fn strip_completion(reply: &str) -> String {
    reply.replace(COMPLETION_MESSAGE, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1. **PAGE TEXT:** Rex stomps loud. **ILLUSTRATION PROMPT:** Rex watching the show from backstage.\n\
        2. **PAGE TEXT:** Rex claps proud. **ILLUSTRATION PROMPT:** Rex clapping on the stage.\n";

    #[test]
    fn splits_numbered_entries_in_order() {
        let pages = parse_manuscript(SAMPLE);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].order, 1);
        assert_eq!(pages[0].page_text, "Rex stomps loud.");
        assert_eq!(
            pages[0].illustration_directive,
            "** Rex watching the show from backstage."
        );
        assert_eq!(pages[1].order, 2);
        assert_eq!(pages[1].page_text, "Rex claps proud.");
    }

    #[test]
    fn sixteen_entries_yield_sixteen_records() {
        let mut raw = String::new();
        for n in 1..=16 {
            raw.push_str(&format!(
                "{n}. **PAGE TEXT:** Page {n} sings along. **ILLUSTRATION PROMPT:** Scene number {n} with sparkles.\n"
            ));
        }
        let pages = parse_manuscript(&raw);
        assert_eq!(pages.len(), 16);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.order, i + 1);
            assert_eq!(page.page_text, format!("Page {} sings along.", i + 1));
        }
    }

    #[test]
    fn preamble_before_first_boundary_is_discarded() {
        let raw = format!("Here is your story!\n\n{SAMPLE}");
        let pages = parse_manuscript(&raw);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_text, "Rex stomps loud.");
    }

    #[test]
    fn segment_without_illustration_marker_is_dropped() {
        let raw = "1. **PAGE TEXT:** Kept. **ILLUSTRATION PROMPT:** A scene.\n\
            2. **PAGE TEXT:** Orphaned text with no directive.\n\
            3. **PAGE TEXT:** Also kept. **ILLUSTRATION PROMPT:** Another scene.\n";
        let pages = parse_manuscript(raw);
        assert_eq!(pages.len(), 2);
        // Order stays contiguous over the survivors.
        assert_eq!(pages[0].order, 1);
        assert_eq!(pages[1].order, 2);
        assert_eq!(pages[1].page_text, "Also kept.");
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert_eq!(parse_manuscript("").len(), 0);
        assert_eq!(split_pages("").count(), 0);
    }

    #[test]
    fn split_is_restartable() {
        let first: Vec<&str> = split_pages(SAMPLE).collect();
        let second: Vec<&str> = split_pages(SAMPLE).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn page_text_never_contains_field_markers() {
        for page in parse_manuscript(SAMPLE) {
            assert!(!page.page_text.contains(PAGE_TEXT_MARKER));
            assert!(!page.page_text.contains(ILLUSTRATION_MARKER));
            assert!(!page.page_text.contains('*'));
        }
    }

    #[test]
    fn directive_preserves_model_emphasis_markers() {
        let (page_text, directive) = extract_fields(
            "**PAGE TEXT:** Rex stomps loud. **ILLUSTRATION PROMPT:** Rex with **neon** drums.",
        )
        .unwrap();
        assert_eq!(page_text, "Rex stomps loud.");
        assert_eq!(directive, "** Rex with **neon** drums.");
    }

    #[test]
    fn captures_character_details_line() {
        let reply = "Great choice!\nCHARACTER DETAILS: a punk rock velociraptor with green spikes\nNow, what style?";
        assert_eq!(
            extract_character_details(reply).as_deref(),
            Some("a punk rock velociraptor with green spikes")
        );
        assert_eq!(extract_character_details("no details here"), None);
    }

    #[test]
    fn captures_book_title_line() {
        let reply = "Confirmed! BOOK TITLE: Rex Rocks Out\nThe manuscript will be 16 pages long.";
        assert_eq!(extract_book_title(reply).as_deref(), Some("Rex Rocks Out"));

        let starred = "BOOK TITLE: **Rex Rocks Out**\n";
        assert_eq!(extract_book_title(starred).as_deref(), Some("Rex Rocks Out"));
    }

    #[test]
    fn strips_completion_message() {
        let reply = format!("{SAMPLE}\n{COMPLETION_MESSAGE}");
        assert!(is_completion(&reply));
        let manuscript = strip_completion(&reply);
        assert!(!manuscript.contains(COMPLETION_SENTINEL));
        assert_eq!(parse_manuscript(&manuscript).len(), 2);
    }
}
