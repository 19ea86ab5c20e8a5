//! Meeting-level document handling: version filtering, low-value
//! detection, and the shared document cache.
//!
//! Each unique attachment URL is fetched and extracted exactly once per
//! meeting, however many items reference it. Documents referenced by more
//! than one item become the meeting's shared context.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use analysis::{Analyzer, Extraction};

use crate::models::AgendaItem;

/// Public-comment compilations balloon page counts without adding
/// summarizable content.
const COMPILATION_PAGE_THRESHOLD: u32 = 1000;
const COMPILATION_LARGE_DOC_THRESHOLD: u32 = 50;
const COMPILATION_OCR_RATIO_THRESHOLD: f64 = 0.3;
const COMPILATION_SIGNATURE_THRESHOLD: usize = 20;
const COMPILATION_MIN_TEXT_LEN: usize = 5_000;

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"(?i)(.+?)\s+Ver(\d+)").unwrap();
}

/// Attachment names that flag low-value content up front.
const LOW_VALUE_MARKERS: &[&str] = &[
    "public comment",
    "public comments",
    "written comment",
    "written comments",
    "correspondence received",
    "parcel list",
    "parcel table",
];

/// One fetched-and-extracted document.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub text: String,
    pub page_count: u32,
    pub name: String,
}

impl CachedDocument {
    /// The `=== name ===` block format used to join documents into prompts.
    pub fn as_block(&self) -> String {
        format!("=== {} ===\n{}", self.name, self.text)
    }
}

/// The per-meeting document cache.
#[derive(Debug, Default)]
pub struct DocumentCache {
    /// Extracted documents keyed by URL.
    pub documents: HashMap<String, CachedDocument>,
    /// Version-filtered attachment URLs per item ID.
    pub item_urls: HashMap<String, Vec<String>>,
    /// URLs referenced by more than one item (and successfully extracted).
    pub shared_urls: HashSet<String>,
}

impl DocumentCache {
    /// The shared context string: every shared document, deterministic
    /// order, passed once per LLM call.
    pub fn shared_context(&self) -> Option<String> {
        if self.shared_urls.is_empty() {
            return None;
        }
        let mut urls: Vec<&String> = self.shared_urls.iter().collect();
        urls.sort();
        let blocks: Vec<String> = urls
            .iter()
            .filter_map(|url| self.documents.get(*url))
            .map(|doc| doc.as_block())
            .collect();
        Some(blocks.join("\n\n"))
    }

    /// Item-specific text: this item's documents minus the shared ones.
    /// Returns the combined text and its total page count.
    pub fn item_text(&self, item_id: &str) -> Option<(String, u32)> {
        let urls = self.item_urls.get(item_id)?;
        let mut blocks = Vec::new();
        let mut pages = 0;
        for url in urls {
            if self.shared_urls.contains(url) {
                continue;
            }
            if let Some(doc) = self.documents.get(url) {
                blocks.push(doc.as_block());
                pages += doc.page_count;
            }
        }
        if blocks.is_empty() {
            return None;
        }
        Some((blocks.join("\n\n"), pages))
    }
}

/// Build the document cache for the items that still need processing.
pub async fn build_document_cache(analyzer: &Analyzer, items: &[AgendaItem]) -> DocumentCache {
    let mut cache = DocumentCache::default();
    let mut url_to_name: HashMap<String, String> = HashMap::new();
    let mut url_refs: HashMap<String, usize> = HashMap::new();

    for item in items {
        let urls: Vec<String> = item
            .attachments()
            .iter()
            .filter(|att| att.kind.is_extractable() && !att.url.is_empty())
            .map(|att| {
                if !att.name.is_empty() {
                    url_to_name.entry(att.url.clone()).or_insert_with(|| att.name.clone());
                }
                att.url.clone()
            })
            .collect();

        let filtered = filter_document_versions(&urls);
        for url in &filtered {
            *url_refs.entry(url.clone()).or_default() += 1;
        }
        cache.item_urls.insert(item.id.clone(), filtered);
    }

    info!(
        unique_urls = url_refs.len(),
        item_count = items.len(),
        "building meeting-level document cache"
    );

    for (url, refs) in &url_refs {
        let name = url_to_name.get(url).cloned().unwrap_or_else(|| url.clone());
        if is_low_value_name(&name) {
            info!(attachment = %name, "skipping low-value attachment");
            continue;
        }

        match analyzer.extract_document(url).await {
            Ok(extraction) => {
                if is_likely_public_comment_compilation(&extraction, &name) {
                    continue;
                }
                debug!(
                    attachment = %name,
                    pages = extraction.page_count,
                    shared = *refs > 1,
                    "document extracted"
                );
                cache.documents.insert(
                    url.clone(),
                    CachedDocument {
                        text: extraction.text,
                        page_count: extraction.page_count,
                        name,
                    },
                );
                if *refs > 1 {
                    cache.shared_urls.insert(url.clone());
                }
            }
            Err(e) => {
                warn!(attachment = %name, error = %e, "failed to extract document");
            }
        }
    }

    info!(
        cached = cache.documents.len(),
        shared = cache.shared_urls.len(),
        "document cache built"
    );

    cache
}

/// Keep only the latest `VerN` of versioned documents; unversioned URLs
/// pass through untouched.
pub fn filter_document_versions(urls: &[String]) -> Vec<String> {
    let mut groups: HashMap<String, Vec<(u32, &String)>> = HashMap::new();
    let mut result = Vec::new();

    for url in urls {
        let filename = url.rsplit('/').next().unwrap_or("");
        match VERSION_RE.captures(filename) {
            Some(caps) => {
                let base = caps[1].trim().to_string();
                let version: u32 = caps[2].parse().unwrap_or(0);
                groups.entry(base).or_default().push((version, url));
            }
            None => result.push(url.clone()),
        }
    }

    for versions in groups.values() {
        if let Some((_, url)) = versions.iter().max_by_key(|(v, _)| *v) {
            result.push((*url).clone());
        }
    }

    result
}

/// Whether an attachment or item name flags low-value content.
pub fn is_low_value_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    LOW_VALUE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Detect public-comment compilations worth skipping: huge page counts,
/// mostly-scanned large documents, or stacks of signed letters.
pub fn is_likely_public_comment_compilation(extraction: &Extraction, label: &str) -> bool {
    if extraction.page_count > COMPILATION_PAGE_THRESHOLD {
        info!(
            attachment = label,
            pages = extraction.page_count,
            "skipping likely compilation, excessive page count"
        );
        return true;
    }

    if extraction.page_count > COMPILATION_LARGE_DOC_THRESHOLD
        && extraction.ocr_ratio() > COMPILATION_OCR_RATIO_THRESHOLD
    {
        info!(
            attachment = label,
            ocr_ratio = extraction.ocr_ratio(),
            "skipping likely scanned compilation, high OCR ratio"
        );
        return true;
    }

    if extraction.text.len() > COMPILATION_MIN_TEXT_LEN {
        let signatures = extraction.text.to_lowercase().matches("sincerely,").count();
        if signatures > COMPILATION_SIGNATURE_THRESHOLD {
            info!(
                attachment = label,
                signatures,
                "skipping likely comment compilation, repetitive signatures"
            );
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction(pages: u32, ocr: u32, text: &str) -> Extraction {
        Extraction {
            text: text.to_string(),
            page_count: pages,
            ocr_pages: ocr,
        }
    }

    #[test]
    fn version_filter_keeps_highest() {
        let urls = vec![
            "https://city.gov/docs/Staff Report Ver1.pdf".to_string(),
            "https://city.gov/docs/Staff Report Ver2.pdf".to_string(),
            "https://city.gov/docs/Ordinance.pdf".to_string(),
        ];
        let filtered = filter_document_versions(&urls);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains(&"https://city.gov/docs/Staff Report Ver2.pdf".to_string()));
        assert!(filtered.contains(&"https://city.gov/docs/Ordinance.pdf".to_string()));
    }

    #[test]
    fn version_filter_passes_unversioned_through() {
        let urls = vec!["https://city.gov/a.pdf".to_string(), "https://city.gov/b.pdf".to_string()];
        assert_eq!(filter_document_versions(&urls).len(), 2);
    }

    #[test]
    fn excessive_pages_flag_compilation() {
        assert!(is_likely_public_comment_compilation(
            &extraction(1500, 0, "text"),
            "comments.pdf"
        ));
        assert!(!is_likely_public_comment_compilation(
            &extraction(900, 0, "text"),
            "packet.pdf"
        ));
    }

    #[test]
    fn high_ocr_ratio_on_large_docs_flags_compilation() {
        assert!(is_likely_public_comment_compilation(
            &extraction(100, 40, "text"),
            "scans.pdf"
        ));
        // Small documents are never flagged on OCR ratio alone.
        assert!(!is_likely_public_comment_compilation(
            &extraction(30, 20, "text"),
            "memo.pdf"
        ));
    }

    #[test]
    fn repeated_signatures_flag_compilation() {
        let letters = "Dear Council, please act. Sincerely, a resident.\n".repeat(200);
        assert!(is_likely_public_comment_compilation(&extraction(10, 0, &letters), "letters.pdf"));
    }

    #[test]
    fn short_text_is_never_signature_flagged() {
        let text = "Sincerely, ".repeat(30);
        assert!(!is_likely_public_comment_compilation(&extraction(10, 0, &text), "memo.pdf"));
    }

    #[test]
    fn low_value_names_are_detected() {
        assert!(is_low_value_name("Public Comments Received 11-05"));
        assert!(is_low_value_name("Parcel List Exhibit B"));
        assert!(!is_low_value_name("Staff Report"));
    }

    #[test]
    fn shared_context_is_deterministic() {
        let mut cache = DocumentCache::default();
        for (url, name) in [("https://b", "B"), ("https://a", "A")] {
            cache.documents.insert(
                url.to_string(),
                CachedDocument {
                    text: "body".into(),
                    page_count: 1,
                    name: name.into(),
                },
            );
            cache.shared_urls.insert(url.to_string());
        }
        let context = cache.shared_context().unwrap();
        let a_idx = context.find("=== A ===").unwrap();
        let b_idx = context.find("=== B ===").unwrap();
        assert!(a_idx < b_idx);
    }

    #[test]
    fn item_text_excludes_shared_documents() {
        let mut cache = DocumentCache::default();
        cache.documents.insert(
            "https://shared".to_string(),
            CachedDocument { text: "shared".into(), page_count: 5, name: "Shared".into() },
        );
        cache.documents.insert(
            "https://own".to_string(),
            CachedDocument { text: "own".into(), page_count: 3, name: "Own".into() },
        );
        cache.shared_urls.insert("https://shared".to_string());
        cache.item_urls.insert(
            "item-1".to_string(),
            vec!["https://shared".to_string(), "https://own".to_string()],
        );

        let (text, pages) = cache.item_text("item-1").unwrap();
        assert!(text.contains("own"));
        assert!(!text.contains("shared"));
        assert_eq!(pages, 3);
    }

    #[test]
    fn item_with_only_shared_documents_has_no_own_text() {
        let mut cache = DocumentCache::default();
        cache.documents.insert(
            "https://shared".to_string(),
            CachedDocument { text: "shared".into(), page_count: 5, name: "Shared".into() },
        );
        cache.shared_urls.insert("https://shared".to_string());
        cache
            .item_urls
            .insert("item-1".to_string(), vec!["https://shared".to_string()]);

        assert!(cache.item_text("item-1").is_none());
    }
}
