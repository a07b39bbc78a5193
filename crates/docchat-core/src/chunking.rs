//! Splitting extracted document text into ordered segments.

/// Chunk size used when a caller passes `0`.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Split `text` into whitespace-delimited chunks of at most `max_chunk_size`
/// bytes.
///
/// Words are packed greedily and joined with a single space. A word longer
/// than the limit is emitted as its own chunk rather than split. Empty or
/// whitespace-only input yields no chunks.
#[must_use]
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let limit = if max_chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        max_chunk_size
    };

    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
