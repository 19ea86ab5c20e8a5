//! Participation parsing: contact and streaming info from agenda text.
//!
//! Runs on extracted text before summarization so contact details survive
//! even when the LLM call fails. Heuristic by nature; unmatched fields stay
//! empty rather than guessing.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// An email address plus its inferred purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContext {
    pub address: String,
    pub purpose: String,
}

/// A streaming destination: either a URL or a cable channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingUrl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub platform: String,
}

/// Structured participation info stored on meetings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<EmailContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streaming_urls: Vec<StreamingUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hybrid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_virtual_only: Option<bool>,
}

impl ParticipationInfo {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fill fields that are empty here from `other`. First non-empty value
    /// wins, which gives agenda-level info precedence over item-level when
    /// merged in that order.
    pub fn merge_missing_from(&mut self, other: &ParticipationInfo) {
        if self.email.is_none() {
            self.email = other.email.clone();
        }
        if self.emails.is_empty() {
            self.emails = other.emails.clone();
        }
        if self.phone.is_none() {
            self.phone = other.phone.clone();
        }
        if self.virtual_url.is_none() {
            self.virtual_url = other.virtual_url.clone();
        }
        if self.streaming_urls.is_empty() {
            self.streaming_urls = other.streaming_urls.clone();
        }
        if self.meeting_id.is_none() {
            self.meeting_id = other.meeting_id.clone();
        }
        if self.is_hybrid.is_none() {
            self.is_hybrid = other.is_hybrid;
        }
        if self.is_virtual_only.is_none() {
            self.is_virtual_only = other.is_virtual_only;
        }
    }
}

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_RE: Regex =
        Regex::new(r"(?i)\+?1?[\s.\-]?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}").unwrap();
    static ref URL_RE: Regex = Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap();
    static ref CABLE_RE: Regex = Regex::new(r"(?i)cable\s+tv\s+channel\s+(\d+)").unwrap();
    static ref MEETING_ID_RE: Regex =
        Regex::new(r"(?i)meeting\s*id[:\s]+(\d{3}[\s\-]?\d{3}[\s\-]?\d{3,4})").unwrap();
}

const VIRTUAL_DOMAINS: &[&str] = &[
    "zoom.us",
    "meet.google.com",
    "teams.microsoft.com",
    "webex.com",
    "gotomeeting.com",
];

const STREAMING_PLATFORMS: &[(&str, &str)] = &[
    ("youtube.com", "YouTube"),
    ("youtu.be", "YouTube"),
    ("facebook.com", "Facebook Live"),
    ("granicus.com", "Granicus"),
    ("vimeo.com", "Vimeo"),
];

const EMAIL_SKIP_MARKERS: &[&str] = &["example.com", "test@", "noreply"];

const HYBRID_MARKERS: &[&str] = &[
    "hybrid",
    "in-person and virtual",
    "attend in person or",
    "zoom or in person",
];

/// Extract participation info from meeting text. Returns `None` when
/// nothing useful was found.
pub fn parse_participation_info(text: &str) -> Option<ParticipationInfo> {
    if text.is_empty() {
        return None;
    }

    let text_lower = text.to_lowercase();
    let mut info = ParticipationInfo::default();

    parse_emails(text, &mut info);
    parse_phone(text, &mut info);
    parse_urls(text, &mut info);

    if let Some(caps) = CABLE_RE.captures(text) {
        info.streaming_urls.push(StreamingUrl {
            url: None,
            channel: Some(caps[1].to_string()),
            platform: "Cable TV".to_string(),
        });
    }

    if text_lower.contains("zoom") || info.virtual_url.is_some() {
        if let Some(caps) = MEETING_ID_RE.captures(text) {
            info.meeting_id = Some(caps[1].trim().to_string());
        }
    }

    if HYBRID_MARKERS.iter().any(|kw| text_lower.contains(kw)) {
        info.is_hybrid = Some(true);
    } else if info.virtual_url.is_some() {
        info.is_virtual_only = Some(true);
    }

    if info.is_empty() {
        None
    } else {
        Some(info)
    }
}

fn parse_emails(text: &str, info: &mut ParticipationInfo) {
    let valid: Vec<&str> = EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|e| {
            let lower = e.to_lowercase();
            !EMAIL_SKIP_MARKERS.iter().any(|skip| lower.contains(skip))
        })
        .collect();

    let Some(first) = valid.first() else {
        return;
    };
    info.email = Some(first.to_string());

    let mut seen = std::collections::HashSet::new();
    let mut with_context = Vec::new();
    for email in &valid {
        if !seen.insert(email.to_lowercase()) {
            continue;
        }
        with_context.push(EmailContext {
            address: email.to_string(),
            purpose: infer_email_purpose(text, email),
        });
    }

    if with_context.len() > 1 {
        info.emails = with_context;
    }
}

fn parse_phone(text: &str, info: &mut ParticipationInfo) {
    let Some(m) = PHONE_RE.find(text) else {
        return;
    };

    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    info.phone = match digits.len() {
        10 => Some(format!("+1{digits}")),
        11 if digits.starts_with('1') => Some(format!("+{digits}")),
        _ => None,
    };
}

fn parse_urls(text: &str, info: &mut ParticipationInfo) {
    for m in URL_RE.find_iter(text) {
        // Agendas tend to end URLs with sentence punctuation.
        let cleaned = m.as_str().trim_end_matches(['.', ',', ';', ':', ')']);
        let Ok(parsed) = Url::parse(cleaned) else {
            continue;
        };
        let Some(host) = parsed.host_str() else {
            continue;
        };

        if info.virtual_url.is_none() && VIRTUAL_DOMAINS.iter().any(|d| host.contains(d)) {
            info.virtual_url = Some(cleaned.to_string());
        }

        for (domain, platform) in STREAMING_PLATFORMS {
            if host.contains(domain) {
                info.streaming_urls.push(StreamingUrl {
                    url: Some(cleaned.to_string()),
                    channel: None,
                    platform: platform.to_string(),
                });
                break;
            }
        }
    }
}

/// Infer an email's purpose from the surrounding ±100 characters.
fn infer_email_purpose(text: &str, email: &str) -> String {
    let lower = text.to_lowercase();
    let Some(idx) = lower.find(&email.to_lowercase()) else {
        return "general contact".to_string();
    };

    let start = idx.saturating_sub(100);
    let end = (idx + email.len() + 100).min(lower.len());
    // Clamp to char boundaries; agendas occasionally contain multibyte text.
    let start = (0..=start).rev().find(|i| lower.is_char_boundary(*i)).unwrap_or(0);
    let end = (end..=lower.len()).find(|i| lower.is_char_boundary(*i)).unwrap_or(lower.len());
    let context = &lower[start..end];

    let purpose_for = |keywords: &[&str]| keywords.iter().any(|kw| context.contains(kw));

    if purpose_for(&["written comment", "public comment", "submit comment"]) {
        "written comments"
    } else if purpose_for(&["powerpoint", "video", "media", "presentation"]) {
        "media submissions"
    } else if purpose_for(&["clerk", "city clerk"]) {
        "city clerk"
    } else if purpose_for(&["council", "city council"]) {
        "city council"
    } else {
        "general contact"
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_email_and_phone() {
        let text = "Submit written comments to clerk@cityofpaloalto.org \
                    or call (650) 329-2571 before noon.";
        let info = parse_participation_info(text).unwrap();
        assert_eq!(info.email.as_deref(), Some("clerk@cityofpaloalto.org"));
        assert_eq!(info.phone.as_deref(), Some("+16503292571"));
    }

    #[test]
    fn filters_placeholder_emails() {
        let text = "Contact test@example.com or noreply@city.gov for details";
        assert!(parse_participation_info(text).is_none());
    }

    #[test]
    fn detects_zoom_with_meeting_id() {
        let text = "Join via https://cityofpaloalto.zoom.us/j/362027238. \
                    Meeting ID: 362 027 238";
        let info = parse_participation_info(text).unwrap();
        assert!(info.virtual_url.unwrap().contains("zoom.us"));
        assert_eq!(info.meeting_id.as_deref(), Some("362 027 238"));
        assert_eq!(info.is_virtual_only, Some(true));
    }

    #[test]
    fn strips_trailing_punctuation_from_urls() {
        let text = "Watch at https://www.youtube.com/cityofpaloalto.";
        let info = parse_participation_info(text).unwrap();
        assert_eq!(
            info.streaming_urls[0].url.as_deref(),
            Some("https://www.youtube.com/cityofpaloalto")
        );
        assert_eq!(info.streaming_urls[0].platform, "YouTube");
    }

    #[test]
    fn detects_cable_channel() {
        let text = "The meeting airs on Cable TV Channel 26 and streams online.";
        let info = parse_participation_info(text).unwrap();
        assert_eq!(info.streaming_urls[0].channel.as_deref(), Some("26"));
        assert_eq!(info.streaming_urls[0].platform, "Cable TV");
    }

    #[test]
    fn hybrid_beats_virtual_only() {
        let text = "This is a hybrid meeting. Join via https://zoom.us/j/123";
        let info = parse_participation_info(text).unwrap();
        assert_eq!(info.is_hybrid, Some(true));
        assert_eq!(info.is_virtual_only, None);
    }

    #[test]
    fn infers_email_purpose_from_context() {
        let text = "Submit public comment to comments@city.gov. \
                    For agenda questions email cityclerk@city.gov (City Clerk).";
        let info = parse_participation_info(text).unwrap();
        assert_eq!(info.emails.len(), 2);
        assert_eq!(info.emails[0].purpose, "written comments");
        assert_eq!(info.emails[1].purpose, "city clerk");
    }

    #[test]
    fn empty_text_returns_none() {
        assert!(parse_participation_info("").is_none());
        assert!(parse_participation_info("Nothing useful here").is_none());
    }

    #[test]
    fn merge_keeps_existing_fields() {
        let mut base = ParticipationInfo {
            email: Some("clerk@city.gov".into()),
            ..Default::default()
        };
        let other = ParticipationInfo {
            email: Some("other@city.gov".into()),
            phone: Some("+16503292571".into()),
            ..Default::default()
        };
        base.merge_missing_from(&other);
        assert_eq!(base.email.as_deref(), Some("clerk@city.gov"));
        assert_eq!(base.phone.as_deref(), Some("+16503292571"));
    }
}
