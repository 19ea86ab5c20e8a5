//! Topic normalization: collapse LLM tag variants into a controlled
//! vocabulary.
//!
//! The model is asked for short lowercase tags, but it still drifts
//! ("affordable housing", "housing development", "public transit"). The
//! normalizer maps known variants onto canonical tags and passes unknown
//! tags through lowercased, deduplicated, order preserved.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Canonical tag followed by the variants that collapse into it.
const VOCABULARY: &[(&str, &[&str])] = &[
    ("housing", &[
        "affordable housing",
        "housing development",
        "housing policy",
        "residential development",
        "homelessness",
    ]),
    ("transit", &[
        "public transit",
        "transportation",
        "transit-oriented development",
        "bus service",
        "rail",
    ]),
    ("budget", &[
        "finance",
        "fiscal",
        "appropriations",
        "budget amendment",
        "spending",
    ]),
    ("zoning", &[
        "land use",
        "rezoning",
        "planning",
        "general plan",
        "variance",
    ]),
    ("public safety", &[
        "police",
        "fire",
        "emergency services",
        "crime",
        "law enforcement",
    ]),
    ("parks", &[
        "parks and recreation",
        "recreation",
        "open space",
        "trails",
    ]),
    ("utilities", &[
        "water",
        "sewer",
        "stormwater",
        "electric utility",
        "broadband",
    ]),
    ("environment", &[
        "climate",
        "sustainability",
        "climate action",
        "conservation",
    ]),
    ("infrastructure", &[
        "roads",
        "streets",
        "capital improvements",
        "public works",
        "construction",
    ]),
    ("economic development", &[
        "business",
        "small business",
        "downtown revitalization",
        "jobs",
    ]),
    ("education", &["schools", "school district", "library", "libraries"]),
    ("health", &["public health", "mental health", "health services"]),
    ("elections", &["voting", "ballot measure", "redistricting"]),
    ("permits", &["licensing", "permitting", "business license"]),
    ("contracts", &["procurement", "contract award", "purchasing", "agreement"]),
];

lazy_static! {
    static ref VARIANT_MAP: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        for (canonical, variants) in VOCABULARY {
            map.insert(*canonical, *canonical);
            for variant in *variants {
                map.insert(*variant, *canonical);
            }
        }
        map
    };
}

/// Collapses topic tag variants into the controlled vocabulary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicNormalizer;

impl TopicNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one tag. Unknown tags pass through trimmed and lowercased;
    /// empty tags become `None`.
    pub fn normalize_one(&self, topic: &str) -> Option<String> {
        let cleaned = topic.trim().to_lowercase();
        if cleaned.is_empty() {
            return None;
        }
        Some(
            VARIANT_MAP
                .get(cleaned.as_str())
                .map(|c| c.to_string())
                .unwrap_or(cleaned),
        )
    }

    /// Normalize a tag list: canonicalized, deduplicated, order preserved.
    pub fn normalize(&self, topics: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        topics
            .iter()
            .filter_map(|t| self.normalize_one(t))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_collapse_to_canonical() {
        let normalizer = TopicNormalizer::new();
        assert_eq!(normalizer.normalize_one("Affordable Housing").as_deref(), Some("housing"));
        assert_eq!(normalizer.normalize_one("public transit").as_deref(), Some("transit"));
        assert_eq!(normalizer.normalize_one("land use").as_deref(), Some("zoning"));
    }

    #[test]
    fn canonical_tags_are_stable() {
        let normalizer = TopicNormalizer::new();
        assert_eq!(normalizer.normalize_one("housing").as_deref(), Some("housing"));
    }

    #[test]
    fn unknown_tags_pass_through_lowercased() {
        let normalizer = TopicNormalizer::new();
        assert_eq!(
            normalizer.normalize_one("Sister City Program").as_deref(),
            Some("sister city program")
        );
    }

    #[test]
    fn list_deduplicates_after_normalization() {
        let normalizer = TopicNormalizer::new();
        let input = vec![
            "Affordable Housing".to_string(),
            "housing development".to_string(),
            "transit".to_string(),
            "housing".to_string(),
        ];
        assert_eq!(normalizer.normalize(&input), vec!["housing", "transit"]);
    }

    #[test]
    fn empty_tags_are_dropped() {
        let normalizer = TopicNormalizer::new();
        let input = vec!["  ".to_string(), "budget".to_string()];
        assert_eq!(normalizer.normalize(&input), vec!["budget"]);
    }
}
