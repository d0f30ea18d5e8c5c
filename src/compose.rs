use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::manuscript::PageRecord;
use crate::repair::sanitize_directive;
use crate::theme::ThemeLabel;

// Every page of one book must look like it came from the same illustrator.
// The style constant, profile clause, and consistency suffix never vary
// within a session.
pub const GLOBAL_IMAGE_STYLE: &str = "children's book illustration, vintage style cartoon, 80s and 90s aesthetic, soft pastel colors, dreamy lighting, crayon texture, grainy texture, soft fuzzy lines, simple shapes, whimsical, fantastical, professional digital painting";

pub const NEUTRAL_PROFILE: &str = "the main character";

const CANONICAL_COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "blue", "purple", "pink", "brown", "black",
];

const CONSISTENCY_CLAUSES: &str =
    "same character design on every page, consistent proportions and outfit, no other characters in frame";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedPrompt {
    pub page: PageRecord,
    pub final_prompt: String,
}

fn color_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(red|orange|yellow|green|blue|purple|pink|brown|black)\b")
            .expect("color pattern")
    })
}

// Lists profile colors in order of appearance, deduplicated. Word boundaries
// keep "covered" from reading as red.
fn color_emphasis(profile: &str) -> Option<String> {
    let mut found: Vec<&'static str> = Vec::new();
    for m in color_pattern().find_iter(profile) {
        if let Some(&canon) = CANONICAL_COLORS
            .iter()
            .find(|c| c.eq_ignore_ascii_case(m.as_str()))
        {
            if !found.contains(&canon) {
                found.push(canon);
            }
        }
    }
    if found.is_empty() {
        None
    } else {
        Some(format!("emphasize the {} color palette", found.join(", ")))
    }
}

/// Final per-image prompt: style, "single character only" with the profile,
/// the sanitized scene, an optional color-emphasis clause derived from the
/// profile, then the consistency suffix.
pub fn compose_prompt(sanitized_directive: &str, profile: &str) -> String {
    let profile = effective_profile(profile);
    let mut parts = vec![
        GLOBAL_IMAGE_STYLE.to_string(),
        format!("single character only: {profile}"),
        sanitized_directive.trim().to_string(),
    ];
    if let Some(clause) = color_emphasis(profile) {
        parts.push(clause);
    }
    parts.push(CONSISTENCY_CLAUSES.to_string());
    parts.retain(|p| !p.is_empty());
    parts.join(", ")
}

pub fn compose_cover_prompt(profile: &str, theme: ThemeLabel) -> String {
    let profile = effective_profile(profile);
    format!(
        "{GLOBAL_IMAGE_STYLE}, book cover illustration, NO text, NO letters, NO words in image, \
        {profile} in a dynamic hero pose, {}, exciting and inviting composition, \
        perfect for a children's book cover",
        theme.cover_context()
    )
}

fn effective_profile(profile: &str) -> &str {
    let trimmed = profile.trim();
    if trimmed.is_empty() {
        NEUTRAL_PROFILE
    } else {
        trimmed
    }
}

/// Sanitizes and composes every page, preserving page order.
pub fn compose_pages(pages: Vec<PageRecord>, profile: &str) -> Vec<ComposedPrompt> {
    pages
        .into_iter()
        .map(|page| {
            let sanitized = sanitize_directive(&page.illustration_directive, profile, page.order);
            let final_prompt = compose_prompt(&sanitized, profile);
            ComposedPrompt { page, final_prompt }
        })
        .collect()
}
