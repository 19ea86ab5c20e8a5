//! Attachment fingerprinting for change detection.
//!
//! A matter's canonical summary is regenerated only when its attachments
//! change; this hash is the change signal. The default mode covers sorted
//! `(url, name)` pairs so attachment order never matters. The
//! metadata-enhanced mode folds `Content-Length` and `Last-Modified` from
//! HEAD requests into the hash for hosts that rotate content behind stable
//! URLs, trading latency for fidelity.

use sha2::{Digest, Sha256};
use tracing::debug;

use analysis::DocumentFetcher;

use crate::models::Attachment;

/// Hash a set of attachments into a stable fingerprint.
///
/// Empty input hashes to the empty string, which downstream treats as "no
/// attachments" rather than a real fingerprint.
pub fn hash_attachments(attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return String::new();
    }

    let mut pairs: Vec<(&str, &str)> = attachments
        .iter()
        .map(|a| (a.url.as_str(), a.name.as_str()))
        .collect();
    pairs.sort();

    digest_tuples(pairs.iter().map(|(url, name)| [*url, *name, "", ""]))
}

/// Metadata-enhanced hashing: include `Content-Length` and `Last-Modified`
/// per attachment. HEAD failures degrade that attachment to URL-only
/// fields, matching the plain mode's shape.
pub async fn hash_attachments_with_metadata(
    attachments: &[Attachment],
    fetcher: &DocumentFetcher,
) -> String {
    if attachments.is_empty() {
        return String::new();
    }

    let mut tuples: Vec<[String; 4]> = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let (length, modified) = match fetcher.head_metadata(&attachment.url).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(url = %attachment.url, error = %e, "metadata probe failed, hashing url only");
                (String::new(), String::new())
            }
        };
        tuples.push([
            attachment.url.clone(),
            attachment.name.clone(),
            length,
            modified,
        ]);
    }
    tuples.sort();

    digest_tuples(tuples.iter().map(|t| [t[0].as_str(), t[1].as_str(), t[2].as_str(), t[3].as_str()]))
}

fn digest_tuples<'a>(tuples: impl Iterator<Item = [&'a str; 4]>) -> String {
    let mut hasher = Sha256::new();
    for tuple in tuples {
        for field in tuple {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xff]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttachmentKind;

    fn attachment(url: &str, name: &str) -> Attachment {
        Attachment {
            name: name.into(),
            url: url.into(),
            kind: AttachmentKind::Pdf,
        }
    }

    #[test]
    fn order_does_not_change_the_hash() {
        let forward = vec![
            attachment("https://city.gov/a.pdf", "Staff Report"),
            attachment("https://city.gov/b.pdf", "Ordinance"),
        ];
        let reversed: Vec<Attachment> = forward.iter().rev().cloned().collect();
        assert_eq!(hash_attachments(&forward), hash_attachments(&reversed));
    }

    #[test]
    fn content_changes_change_the_hash() {
        let original = vec![attachment("https://city.gov/o.pdf", "Ordinance")];
        let revised = vec![attachment("https://city.gov/o-v2.pdf", "Ordinance")];
        assert_ne!(hash_attachments(&original), hash_attachments(&revised));
    }

    #[test]
    fn name_changes_change_the_hash() {
        let a = vec![attachment("https://city.gov/o.pdf", "Ordinance")];
        let b = vec![attachment("https://city.gov/o.pdf", "Ordinance v2")];
        assert_ne!(hash_attachments(&a), hash_attachments(&b));
    }

    #[test]
    fn empty_input_hashes_to_empty_string() {
        assert_eq!(hash_attachments(&[]), "");
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // ("ab", "c") must not collide with ("a", "bc").
        let a = vec![attachment("ab", "c")];
        let b = vec![attachment("a", "bc")];
        assert_ne!(hash_attachments(&a), hash_attachments(&b));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = hash_attachments(&[attachment("https://city.gov/a.pdf", "Report")]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
