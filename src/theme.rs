use std::fmt;

// Coarse setting classifier for cover art. One label per manuscript, chosen
// once, never re-scored.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeLabel {
    Space,
    Ocean,
    Forest,
    City,
    Home,
    Playground,
    School,
    Farm,
    Storybook,
}

// Table order is tie-break order.
const THEME_KEYWORDS: &[(ThemeLabel, &[&str])] = &[
    (
        ThemeLabel::Space,
        &["rocket", "planet", "star", "moon", "galaxy", "astronaut", "comet"],
    ),
    (
        ThemeLabel::Ocean,
        &["ocean", "sea", "fish", "wave", "coral", "mermaid", "whale"],
    ),
    (
        ThemeLabel::Forest,
        &["forest", "tree", "woodland", "mushroom", "fern", "owl", "acorn"],
    ),
    (
        ThemeLabel::City,
        &["city", "skyscraper", "sidewalk", "taxi", "subway", "downtown", "traffic"],
    ),
    (
        ThemeLabel::Home,
        &["home", "kitchen", "bedroom", "backyard", "blanket", "cozy", "fireplace"],
    ),
    (
        ThemeLabel::Playground,
        &["playground", "swing", "slide", "seesaw", "sandbox", "monkey bars"],
    ),
    (
        ThemeLabel::School,
        &["school", "classroom", "teacher", "chalkboard", "recess", "homework"],
    ),
    (
        ThemeLabel::Farm,
        &["farm", "barn", "tractor", "chicken", "hay", "scarecrow", "meadow"],
    ),
];

/// Scores the raw manuscript against each theme's keyword list and returns
/// the strictly best one. Ties keep the earlier table entry; an all-zero
/// board falls back to the generic storybook label.
pub fn detect_theme(manuscript: &str) -> ThemeLabel {
    let lower = manuscript.to_lowercase();
    let mut best = ThemeLabel::Storybook;
    let mut best_score = 0usize;
    for (label, keywords) in THEME_KEYWORDS {
        let score: usize = keywords.iter().map(|k| lower.matches(k).count()).sum();
        if score > best_score {
            best = *label;
            best_score = score;
        }
    }
    best
}

impl ThemeLabel {
    /// Backdrop phrase woven into the cover prompt.
    pub fn cover_context(&self) -> &'static str {
        match self {
            ThemeLabel::Space => "a starry outer space backdrop with planets and a rocket",
            ThemeLabel::Ocean => "a colorful underwater backdrop with waves and coral",
            ThemeLabel::Forest => "a lush forest backdrop with tall trees and mushrooms",
            ThemeLabel::City => "a bustling city backdrop with friendly skyscrapers",
            ThemeLabel::Home => "a warm and cozy home backdrop",
            ThemeLabel::Playground => "a sunny playground backdrop with swings and slides",
            ThemeLabel::School => "a cheerful classroom backdrop",
            ThemeLabel::Farm => "a sunny farm backdrop with a big red barn",
            ThemeLabel::Storybook => "a bright and magical storybook backdrop",
        }
    }
}

impl fmt::Display for ThemeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThemeLabel::Space => "space",
            ThemeLabel::Ocean => "ocean",
            ThemeLabel::Forest => "forest",
            ThemeLabel::City => "city",
            ThemeLabel::Home => "home",
            ThemeLabel::Playground => "playground",
            ThemeLabel::School => "school",
            ThemeLabel::Farm => "farm",
            ThemeLabel::Storybook => "storybook",
        };
        f.write_str(name)
    }
}
