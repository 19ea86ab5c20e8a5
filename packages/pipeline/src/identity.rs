//! Deterministic identifier generation.
//!
//! Matters and meetings are keyed by pure functions of their inputs so
//! resyncs are idempotent: equal inputs always produce equal IDs, and the
//! city (`banana`) is baked into every key so identical file numbers in
//! different cities never collide.
//!
//! Matter identification falls back through three tiers:
//! 1. `matter_file` — the public legislative file number (preferred)
//! 2. `matter_id` — the vendor's backend identifier
//! 3. a normalized title — last resort for cities without stable IDs;
//!    callers must handle this tier declining ("no matter")

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};

/// Hex chars of SHA-256 kept in a matter ID (64 bits).
const MATTER_HASH_LEN: usize = 16;

/// Hex chars of MD5 kept in a meeting ID.
const MEETING_HASH_LEN: usize = 8;

/// Titles shorter than this never identify a matter; they are procedural
/// noise ("Budget Discussion", "Adjournment").
const TITLE_MIN_LEN: usize = 30;

/// Titles that look like standing agenda fixtures, not legislation.
const GENERIC_TITLES: &[&str] = &[
    "public comment",
    "public comments",
    "staff comments",
    "closed session",
    "open forum",
    "adjournment",
    "roll call",
    "approval of minutes",
    "consent calendar",
    "pledge of allegiance",
    "vta",
];

lazy_static! {
    /// Reading prefixes: "FIRST READING:", "REINTRODUCED SECOND READING -", etc.
    /// Stripped so successive readings of one ordinance share an identity.
    static ref READING_PREFIX_RE: Regex = Regex::new(
        r"(?i)^(?:(?:reintroduced|substitute|amended)\s+)?(?:first|second|third|final)\s+reading\s*[:\-]?\s*"
    )
    .unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Generate a deterministic matter ID: `{banana}_{16-hex-sha256}`.
///
/// Empty strings are treated as missing. Returns `Ok(None)` when only a
/// title is available and it normalizes away (generic or too short);
/// returns an error when no identifier of any tier was provided.
pub fn generate_matter_id(
    banana: &str,
    matter_file: Option<&str>,
    matter_id: Option<&str>,
    title: Option<&str>,
) -> Result<Option<String>> {
    let matter_file = non_empty(matter_file);
    let matter_id = non_empty(matter_id);
    let title = non_empty(title);

    if matter_file.is_some() || matter_id.is_some() {
        let key = format!(
            "{banana}:{}:{}",
            matter_file.unwrap_or(""),
            matter_id.unwrap_or("")
        );
        return Ok(Some(compose(banana, &key)));
    }

    let Some(title) = title else {
        return Err(PipelineError::Validation(
            "matter requires at least one of matter_file, matter_id, or title".into(),
        ));
    };

    // The "title:" prefix keeps this tier's keyspace disjoint from vendor
    // identifiers that happen to equal a normalized title.
    Ok(normalize_title_for_matter_id(title)
        .map(|normalized| compose(banana, &format!("{banana}:title:{normalized}"))))
}

/// Normalize a title for tier-3 matter identification.
///
/// Reading prefixes are stripped, the result is lowercased with whitespace
/// collapsed. Returns `None` for titles under the minimum length or in the
/// generic stop-list — those items are not tracked as matters.
pub fn normalize_title_for_matter_id(title: &str) -> Option<String> {
    let trimmed = title.trim();
    // Length gate applies to the incoming title; "FIRST READING: Ordinance
    // 2025-123" qualifies even though the stripped core is short.
    if trimmed.len() < TITLE_MIN_LEN {
        return None;
    }

    let stripped = READING_PREFIX_RE.replace(trimmed, "");
    let lowered = stripped.to_lowercase();
    let collapsed = WHITESPACE_RE.replace_all(lowered.trim(), " ").to_string();

    if collapsed.is_empty() || GENERIC_TITLES.contains(&collapsed.as_str()) {
        return None;
    }

    Some(collapsed)
}

/// Check matter ID shape: `{alphanumeric banana}_{16 hex chars}`.
pub fn validate_matter_id(matter_id: &str) -> bool {
    let Some((banana, hash)) = matter_id.rsplit_once('_') else {
        return false;
    };

    !banana.is_empty()
        && banana.chars().all(|c| c.is_ascii_alphanumeric())
        && hash.len() == MATTER_HASH_LEN
        && hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Pull the banana back out of a matter ID.
pub fn extract_banana_from_matter_id(matter_id: &str) -> Option<&str> {
    if !validate_matter_id(matter_id) {
        return None;
    }
    matter_id.rsplit_once('_').map(|(banana, _)| banana)
}

/// Whether two identifier sets resolve to the same matter in a city.
pub fn matter_ids_match(
    banana: &str,
    matter_file_1: Option<&str>,
    matter_id_1: Option<&str>,
    matter_file_2: Option<&str>,
    matter_id_2: Option<&str>,
) -> bool {
    let id1 = generate_matter_id(banana, matter_file_1, matter_id_1, None);
    let id2 = generate_matter_id(banana, matter_file_2, matter_id_2, None);
    matches!((id1, id2), (Ok(Some(a)), Ok(Some(b))) if a == b)
}

/// Generate a deterministic meeting ID: `{banana}_{8-hex-md5}` over
/// `banana:vendor_id:date-iso:title`.
///
/// A missing date hashes as the empty string; if the vendor later supplies
/// a date the record becomes a new meeting rather than silently mutating
/// the old identity.
pub fn generate_meeting_id(
    banana: &str,
    vendor_id: &str,
    date: Option<chrono::NaiveDateTime>,
    title: &str,
) -> String {
    let date_iso = date
        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();
    let key = format!("{banana}:{vendor_id}:{date_iso}:{title}");
    let digest = md5::compute(key.as_bytes());
    let hash = format!("{digest:x}");
    format!("{banana}_{}", &hash[..MEETING_HASH_LEN])
}

fn compose(banana: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hash = hex::encode(digest);
    format!("{banana}_{}", &hash[..MATTER_HASH_LEN])
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matter_file_generates_consistent_id() {
        let id1 = generate_matter_id("nashvilleTN", Some("BL2025-1098"), None, None).unwrap();
        let id2 = generate_matter_id("nashvilleTN", Some("BL2025-1098"), None, None).unwrap();
        assert_eq!(id1, id2);
        assert!(id1.is_some());
    }

    #[test]
    fn matter_file_preferred_over_title() {
        let with_title = generate_matter_id(
            "nashvilleTN",
            Some("BL2025-1098"),
            None,
            Some("FIRST READING: Zoning Ordinance"),
        )
        .unwrap();
        let file_only = generate_matter_id("nashvilleTN", Some("BL2025-1098"), None, None).unwrap();
        assert_eq!(with_title, file_only);
    }

    #[test]
    fn different_files_produce_different_ids() {
        let id1 = generate_matter_id("nashvilleTN", Some("BL2025-1098"), None, None).unwrap();
        let id2 = generate_matter_id("nashvilleTN", Some("BL2025-1099"), None, None).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn vendor_id_used_when_no_file() {
        let id = generate_matter_id("paloaltoCA", None, Some("fb36db52-abc-123"), None)
            .unwrap()
            .unwrap();
        assert!(validate_matter_id(&id));
        assert_eq!(extract_banana_from_matter_id(&id), Some("paloaltoCA"));
    }

    #[test]
    fn empty_file_falls_back_to_vendor_id() {
        let explicit = generate_matter_id("nashvilleTN", Some(""), Some("uuid-123"), None).unwrap();
        let implicit = generate_matter_id("nashvilleTN", None, Some("uuid-123"), None).unwrap();
        assert_eq!(explicit, implicit);
        assert!(explicit.is_some());
    }

    #[test]
    fn cross_city_ids_differ() {
        let nashville = generate_matter_id("nashvilleTN", Some("BL2025-1"), None, None).unwrap();
        let memphis = generate_matter_id("memphisTN", Some("BL2025-1"), None, None).unwrap();
        assert_ne!(nashville, memphis);
    }

    #[test]
    fn title_path_works_as_last_resort() {
        let id = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("Approval of Budget Amendments for FY 2025"),
        )
        .unwrap()
        .unwrap();
        assert!(validate_matter_id(&id));
    }

    #[test]
    fn readings_of_one_ordinance_share_identity() {
        let first = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("FIRST READING: Ordinance Amending Zoning Code Section 18.04"),
        )
        .unwrap();
        let second = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("SECOND READING: Ordinance Amending Zoning Code Section 18.04"),
        )
        .unwrap();
        let final_reading = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("FINAL READING: Ordinance Amending Zoning Code Section 18.04"),
        )
        .unwrap();
        assert_eq!(first, second);
        assert_eq!(second, final_reading);
    }

    #[test]
    fn reintroduced_prefix_is_stripped() {
        let reintroduced = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("REINTRODUCED FIRST READING: Ordinance 2025-123"),
        )
        .unwrap();
        let normal = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("FIRST READING: Ordinance 2025-123"),
        )
        .unwrap();
        assert_eq!(reintroduced, normal);
        assert!(reintroduced.is_some());
    }

    #[test]
    fn generic_titles_decline() {
        for title in ["Public Comment", "Staff Comments", "VTA", "Closed Session", "Open Forum"] {
            let result = generate_matter_id("paloaltoCA", None, None, Some(title)).unwrap();
            assert!(result.is_none(), "{title} should not identify a matter");
        }
    }

    #[test]
    fn short_titles_decline() {
        let result =
            generate_matter_id("paloaltoCA", None, None, Some("Budget Discussion")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn title_normalization_is_case_and_space_insensitive() {
        let lower = normalize_title_for_matter_id("approval of budget amendments for fy 2025");
        let upper = normalize_title_for_matter_id("APPROVAL OF BUDGET AMENDMENTS FOR FY 2025");
        let spaced = normalize_title_for_matter_id("Approval   of  Budget Amendments for FY 2025");
        assert_eq!(lower, upper);
        assert_eq!(upper, spaced);
        assert_eq!(lower.as_deref(), Some("approval of budget amendments for fy 2025"));
    }

    #[test]
    fn title_tier_keyspace_is_disjoint_from_vendor_ids() {
        let title = "approval of budget amendments for fiscal year 2025";
        let by_title = generate_matter_id(
            "paloaltoCA",
            None,
            None,
            Some("Approval of Budget Amendments for Fiscal Year 2025"),
        )
        .unwrap();
        let by_vendor_id = generate_matter_id("paloaltoCA", None, Some(title), None).unwrap();
        assert_ne!(by_title, by_vendor_id);
    }

    #[test]
    fn no_identifiers_is_an_error() {
        assert!(generate_matter_id("nashvilleTN", None, None, None).is_err());
        assert!(generate_matter_id("nashvilleTN", Some("  "), Some(""), None).is_err());
    }

    #[test]
    fn validation_accepts_canonical_shape() {
        assert!(validate_matter_id("nashvilleTN_7a8f3b2c1d9e4f5a"));
    }

    #[test]
    fn validation_rejects_bad_shapes() {
        assert!(!validate_matter_id(""));
        assert!(!validate_matter_id("nashvilleTN7a8f3b2c1d9e4f5a"));
        assert!(!validate_matter_id("nashvilleTN_7a8f3b2c"));
        assert!(!validate_matter_id("nashvilleTN_zzzzzzzzzzzzzzzz"));
        assert!(!validate_matter_id("nashville-TN_7a8f3b2c1d9e4f5a"));
    }

    #[test]
    fn matching_detects_same_matter() {
        assert!(matter_ids_match(
            "nashvilleTN",
            Some("BL2025-1098"),
            None,
            Some("BL2025-1098"),
            None
        ));
        assert!(!matter_ids_match(
            "nashvilleTN",
            Some("BL2025-1098"),
            None,
            Some("BL2025-1099"),
            None
        ));
        // Different fallback tiers never match even for the same matter.
        assert!(!matter_ids_match(
            "nashvilleTN",
            Some("BL2025-1098"),
            None,
            None,
            Some("uuid-123")
        ));
    }

    #[test]
    fn meeting_ids_are_deterministic() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        let id1 = generate_meeting_id("paloaltoCA", "12345", Some(date), "City Council");
        let id2 = generate_meeting_id("paloaltoCA", "12345", Some(date), "City Council");
        assert_eq!(id1, id2);
        assert!(id1.starts_with("paloaltoCA_"));
        assert_eq!(id1.len(), "paloaltoCA_".len() + 8);
    }

    #[test]
    fn meeting_id_varies_with_each_input() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        let base = generate_meeting_id("paloaltoCA", "12345", Some(date), "City Council");
        assert_ne!(base, generate_meeting_id("paloaltoCA", "12346", Some(date), "City Council"));
        assert_ne!(base, generate_meeting_id("paloaltoCA", "12345", None, "City Council"));
        assert_ne!(base, generate_meeting_id("paloaltoCA", "12345", Some(date), "Planning"));
        assert_ne!(base, generate_meeting_id("menloparkCA", "12345", Some(date), "City Council"));
    }
}
