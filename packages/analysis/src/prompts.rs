//! Prompt templates and response parsing for agenda summarization.
//!
//! Every prompt asks for a structured response with a "Summary" section so
//! downstream consumers can locate it, and item prompts end with a single
//! `TOPICS:` line carrying comma-separated tags.

/// Preamble shared by all summarization calls.
pub const PREAMBLE: &str = "You are a civic analyst who explains municipal \
government documents to residents in plain language. Be specific about \
dollar amounts, addresses, dates, and who is affected. Never speculate \
beyond the documents.";

const TOPICS_MARKER: &str = "TOPICS:";

/// Build the prompt for a monolithic meeting-packet summary.
pub fn meeting_prompt(text: &str) -> String {
    format!(
        "Summarize this city meeting agenda packet for residents.\n\
         \n\
         Respond with these sections:\n\
         ## Summary\n\
         Two or three paragraphs covering the decisions on the table and why \
         they matter.\n\
         ## Key Items\n\
         A bulleted list of the most consequential agenda items with their \
         dollar amounts and locations where given.\n\
         \n\
         AGENDA PACKET:\n{text}"
    )
}

/// Build the prompt for a single agenda item.
///
/// `shared_context` holds meeting-level documents referenced by multiple
/// items; it is included once, ahead of the item-specific material.
pub fn item_prompt(
    title: &str,
    text: &str,
    shared_context: Option<&str>,
    page_count: Option<u32>,
) -> String {
    let length_hint = match page_count {
        Some(pages) if pages > 100 => {
            "The source material is long; keep the summary to four or five \
             sentences covering only what changes and for whom."
        }
        _ => "Keep the summary to two or three sentences.",
    };

    let mut prompt = String::new();
    if let Some(shared) = shared_context {
        prompt.push_str("MEETING-LEVEL DOCUMENTS (shared by several items):\n");
        prompt.push_str(shared);
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!(
        "Summarize this agenda item for residents.\n\
         \n\
         ## Summary\n\
         {length_hint}\n\
         \n\
         After the summary, finish with exactly one line of the form\n\
         {TOPICS_MARKER} tag1, tag2, tag3\n\
         using short lowercase policy-area tags (housing, transit, budget, \
         zoning, public safety, parks, utilities, ...).\n\
         \n\
         ITEM TITLE: {title}\n\
         \n\
         ITEM DOCUMENTS:\n{text}"
    ));

    prompt
}

/// Split a model response into (summary, topics).
///
/// The summary is everything before the final `TOPICS:` line; the topics
/// are its comma-separated values. A response without the marker is all
/// summary with no tags.
pub fn parse_item_response(response: &str) -> (String, Vec<String>) {
    match response.rfind(TOPICS_MARKER) {
        Some(idx) => {
            let summary = response[..idx].trim().to_string();
            let topics = response[idx + TOPICS_MARKER.len()..]
                .lines()
                .next()
                .unwrap_or("")
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            (summary, topics)
        }
        None => (response.trim().to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_topics_trailer() {
        let response = "The council will vote on a rezoning.\n\nTOPICS: zoning, housing";
        let (summary, topics) = parse_item_response(response);
        assert_eq!(summary, "The council will vote on a rezoning.");
        assert_eq!(topics, vec!["zoning", "housing"]);
    }

    #[test]
    fn missing_marker_yields_no_topics() {
        let (summary, topics) = parse_item_response("Just a summary.");
        assert_eq!(summary, "Just a summary.");
        assert!(topics.is_empty());
    }

    #[test]
    fn topics_are_lowercased_and_trimmed() {
        let (_, topics) = parse_item_response("s\nTOPICS:  Housing , TRANSIT,, ");
        assert_eq!(topics, vec!["housing", "transit"]);
    }

    #[test]
    fn uses_last_marker_when_document_text_contains_one() {
        let response = "Quotes a doc saying TOPICS: ignored\nReal summary.\nTOPICS: budget";
        let (summary, topics) = parse_item_response(response);
        assert!(summary.contains("Real summary."));
        assert_eq!(topics, vec!["budget"]);
    }

    #[test]
    fn item_prompt_places_shared_context_first() {
        let prompt = item_prompt("Ordinance 12", "item text", Some("shared docs"), None);
        let shared_idx = prompt.find("shared docs").unwrap();
        let item_idx = prompt.find("item text").unwrap();
        assert!(shared_idx < item_idx);
    }

    #[test]
    fn long_documents_get_longer_summaries() {
        let long = item_prompt("t", "x", None, Some(400));
        let short = item_prompt("t", "x", None, Some(4));
        assert!(long.contains("four or five"));
        assert!(short.contains("two or three"));
    }
}
