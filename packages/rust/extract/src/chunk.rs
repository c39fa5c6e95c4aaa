//! Splitting rendered text into bounded chunks.

/// Stand-in emitted for blank lines so downstream consumers that collapse
/// empty messages still show the paragraph break.
pub const EMPTY_LINE_PLACEHOLDER: &str = "_ _";

/// Split `text` into chunks of at most `max_len` characters.
///
/// The text is cut on newlines first; a line that fits becomes one chunk and
/// a blank line becomes [`EMPTY_LINE_PLACEHOLDER`]. Oversized lines are cut
/// at the last sentence boundary (`". "`) inside each window, falling back
/// to a hard cut at `max_len` characters when no boundary exists.
///
/// Concatenating the chunks (with placeholders mapped back to empty lines)
/// reproduces the input lines in order.
///
/// # Panics
///
/// Panics if `max_len` is zero.
pub fn split_chunks(text: &str, max_len: usize) -> Vec<String> {
    assert!(max_len > 0, "chunk length must be positive");

    let mut chunks = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            chunks.push(EMPTY_LINE_PLACEHOLDER.to_string());
            continue;
        }
        if line.chars().count() <= max_len {
            chunks.push(line.to_string());
            continue;
        }

        let mut rest = line;
        while !rest.is_empty() {
            let window_end = rest
                .char_indices()
                .nth(max_len)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let cut = if window_end == rest.len() {
                window_end
            } else {
                let window = &rest[..window_end];
                window.rfind(". ").map(|p| p + 2).unwrap_or(window_end)
            };
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
    }
    chunks
}
