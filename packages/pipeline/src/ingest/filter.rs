//! Matter filter: which agenda items are procedural.
//!
//! Procedural items (public comment, closed sessions, ceremonial business)
//! are stored but never tracked as matters and never summarized. The item
//! keeps a `filter_reason` recording why, so the enqueue decider can tell
//! "intentionally skipped" from "not yet processed".

/// Matter types that never identify legislation.
const PROCEDURAL_MATTER_TYPES: &[&str] = &[
    "ceremonial",
    "ceremonial item",
    "proclamation",
    "commendation",
    "presentation",
    "closed session",
    "closed session item",
    "public comment",
    "minutes",
    "communication",
    "information only",
];

/// Titles that mark standing agenda fixtures.
const PROCEDURAL_TITLES: &[&str] = &[
    "public comment",
    "public comments",
    "oral communications",
    "closed session",
    "open forum",
    "adjournment",
    "roll call",
    "call to order",
    "pledge of allegiance",
    "approval of minutes",
    "approval of the minutes",
    "agenda review",
];

/// Title prefixes that mark procedural blocks however they continue
/// ("Public Comment on Non-Agenda Items", "Closed Session: Litigation").
const PROCEDURAL_TITLE_PREFIXES: &[&str] = &[
    "public comment",
    "closed session",
    "oral communications",
];

/// Classifies procedural agenda items. Parameterized by static lists so
/// extending coverage is a one-line change.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatterFilter;

impl MatterFilter {
    pub fn new() -> Self {
        Self
    }

    /// The filter reason for an item, or None when the item may be tracked
    /// and summarized.
    pub fn filter_reason(&self, title: &str, matter_type: Option<&str>) -> Option<String> {
        if let Some(matter_type) = matter_type {
            if self.is_procedural_type(matter_type) {
                return Some(format!("procedural_type:{}", matter_type.trim().to_lowercase()));
            }
        }
        if self.is_procedural_title(title) {
            return Some("procedural_title".to_string());
        }
        None
    }

    pub fn is_procedural_type(&self, matter_type: &str) -> bool {
        let normalized = matter_type.trim().to_lowercase();
        PROCEDURAL_MATTER_TYPES.contains(&normalized.as_str())
    }

    pub fn is_procedural_title(&self, title: &str) -> bool {
        let normalized = title.trim().to_lowercase();
        PROCEDURAL_TITLES.contains(&normalized.as_str())
            || PROCEDURAL_TITLE_PREFIXES
                .iter()
                .any(|prefix| normalized.starts_with(prefix))
    }
}
