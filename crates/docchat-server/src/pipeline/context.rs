//! Document context assembly and prompt composition.

/// Placed between consecutive segments.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Segments of one document joined and cut to the character cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentContext {
    /// Joined, possibly truncated, text.
    pub text: String,
    /// Whether the cap cut anything off.
    pub truncated: bool,
    /// Segments that went into the join.
    pub segment_count: usize,
}

/// Join `segments` in order and hard-cut the result to `char_cap` characters.
///
/// Returns `None` when there is nothing to answer from: no segments, or only
/// whitespace.
pub fn build_context(segments: &[String], char_cap: usize) -> Option<DocumentContext> {
    if segments.is_empty() {
        return None;
    }
    let joined = segments.join(SEGMENT_SEPARATOR);
    if joined.trim().is_empty() {
        return None;
    }
    let (text, truncated) = truncate_chars(&joined, char_cap);
    Some(DocumentContext {
        text: text.to_owned(),
        truncated,
        segment_count: segments.len(),
    })
}

/// The first `cap` Unicode scalar values of `text`, and whether any were cut.
pub fn truncate_chars(text: &str, cap: usize) -> (&str, bool) {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Prompt sent to the answer service. The question is embedded verbatim.
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following document content, please answer the user's question accurately and concisely.\n\n\
         Document Content:\n{context}\n\n\
         User Question: {question}\n\n\
         Please provide a helpful and accurate answer based on the document content above."
    )
}
