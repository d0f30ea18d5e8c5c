use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

// Image models render exactly what the directive says. A passive protagonist,
// a stray companion, or a "stuck at home" opening all survive into the final
// art unless rewritten here first.

const PASSIVE_REWRITES: &[(&str, &str)] = &[
    ("looking at", "surrounded by"),
    ("looks at", "surrounded by"),
    ("gazing at", "surrounded by"),
    ("staring at", "surrounded by"),
    ("watching", "with"),
    ("watches", "with"),
    ("observing", "with"),
    ("through the window", "with"),
    ("by the window", "inside with"),
    ("from their room", "in the middle of the scene"),
    ("from his room", "in the middle of the scene"),
    ("from her room", "in the middle of the scene"),
    ("from backstage", "on the stage"),
    ("from a distance", "up close"),
    ("from afar", "up close"),
];

const COMPANION_REWRITES: &[(&str, &str)] = &[
    ("with a friend", "alone"),
    ("and a friend", "alone"),
    ("with their friend", "alone"),
    ("with his friend", "alone"),
    ("with her friend", "alone"),
    ("with a companion", "alone"),
    ("with their sibling", "alone"),
    ("and their sibling", "alone"),
    ("with a pet", "alone"),
    ("with a little puppy", "alone"),
    ("and a little puppy", "alone"),
    ("with a puppy", "alone"),
    ("and a puppy", "alone"),
    ("with a little kitten", "alone"),
    ("and a little kitten", "alone"),
    ("with a kitten", "alone"),
    ("and a kitten", "alone"),
    ("with a little bunny", "alone"),
    ("and a little bunny", "alone"),
    ("with a bunny", "alone"),
    ("and a bunny", "alone"),
    ("with friends", "alone"),
    ("and friends", "alone"),
];

// Longest first, so "stuck inside the house" never degrades into
// "in the adventure the house" via the shorter pattern.
const START_LOCATION_REWRITES: &[(&str, &str)] = &[
    ("stuck inside the house", "in the adventure"),
    ("stuck inside their house", "in the adventure"),
    ("stuck inside", "in the adventure"),
    ("still in their bedroom", "in the adventure"),
    ("still in the bedroom", "in the adventure"),
    ("back in their bedroom", "in the adventure"),
    ("still at home", "in the adventure"),
];

/// Pages 1-3 legitimately open at home; the gate only rewrites later pages
/// the story should have moved past.
const START_LOCATION_FIRST_PAGE: usize = 4;

struct RewriteRule {
    pattern: Regex,
    replacement: &'static str,
}

fn compile(table: &[(&str, &'static str)]) -> Vec<RewriteRule> {
    table
        .iter()
        .map(|(phrase, replacement)| RewriteRule {
            pattern: RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
                .case_insensitive(true)
                .build()
                .expect("rewrite pattern"),
            replacement,
        })
        .collect()
}

fn passive_rules() -> &'static [RewriteRule] {
    static RULES: OnceLock<Vec<RewriteRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(PASSIVE_REWRITES))
}

fn companion_rules() -> &'static [RewriteRule] {
    static RULES: OnceLock<Vec<RewriteRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(COMPANION_REWRITES))
}

fn start_location_rules() -> &'static [RewriteRule] {
    static RULES: OnceLock<Vec<RewriteRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(START_LOCATION_REWRITES))
}

fn apply(rules: &[RewriteRule], text: String) -> String {
    rules.iter().fold(text, |acc, rule| {
        rule.pattern.replace_all(&acc, rule.replacement).into_owned()
    })
}

fn rewrite_scene(text: String, order: usize) -> String {
    let mut out = apply(passive_rules(), text);
    out = apply(companion_rules(), out);
    if order >= START_LOCATION_FIRST_PAGE {
        out = apply(start_location_rules(), out);
    }
    out
}

/// Rewrites a raw illustration directive into one safe to hand to an image
/// model: the protagonist is named, active, alone, and (past the opening
/// pages) out of the house. Stable under re-application, so cached and
/// freshly sanitized directives agree.
pub fn sanitize_directive(directive: &str, profile: &str, order: usize) -> String {
    let text = directive.trim().to_string();
    let profile = profile.trim();

    // The profile must reach the image model verbatim; the rewrite passes
    // only ever see the scene text around any occurrence of it.
    let rewritten = if profile.is_empty() {
        rewrite_scene(text, order)
    } else {
        text.split(profile)
            .map(|segment| rewrite_scene(segment.to_string(), order))
            .collect::<Vec<_>>()
            .join(profile)
    };

    let body = tidy(&rewritten);
    if profile.is_empty() || body.to_lowercase().contains(&profile.to_lowercase()) {
        return body;
    }
    if body.is_empty() {
        return profile.to_string();
    }
    tidy(&format!("{profile}, {body}"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn alone_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\balone\b(?:[,\s]+\balone\b)+").expect("alone pattern"))
}

fn comma_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*,)+").expect("comma pattern"))
}

fn period_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(\s*\.)+").expect("period pattern"))
}

// Rewrites leave seams: doubled spaces, orphaned punctuation, stuttered
// "alone, alone". Smooth them out without touching the wording.
fn tidy(text: &str) -> String {
    let mut out = whitespace_runs().replace_all(text, " ").into_owned();
    out = alone_runs().replace_all(&out, "alone").into_owned();
    out = out.replace(" ,", ",").replace(" .", ".");
    out = comma_runs().replace_all(&out, ",").into_owned();
    out = period_runs().replace_all(&out, ".").into_owned();
    out.trim().trim_end_matches(',').trim().to_string()
}
