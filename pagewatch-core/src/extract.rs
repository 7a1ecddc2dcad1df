//! Marker-bounded slicing and whitespace normalization.
//!
//! The extractor turns a plain-text page rendering into the canonical
//! snapshot used for change comparison. It is pure: no I/O, and the same
//! input always yields the same output.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The start marker does not occur in the page; its structure changed.
    #[error("start marker not found: {marker:?}")]
    MarkerNotFound { marker: String },

    /// An empty start marker would match at offset zero and hide breakage.
    #[error("start marker is empty")]
    EmptyMarker,
}

/// Slice `raw` between the first `start_marker` and the first following
/// `end_marker`, then [`normalize`] the region.
///
/// A missing end marker is not an error: the whole remainder is used. An
/// empty `end_marker` means "no end marker".
///
/// ```
/// use pagewatch_core::extract::extract;
///
/// let page = "Header\n<S>\n  Apt A  \n\n Apt B\n<E>\nFooter";
/// assert_eq!(extract(page, "<S>", "<E>").unwrap(), "Apt A\nApt B");
/// ```
pub fn extract(raw: &str, start_marker: &str, end_marker: &str) -> Result<String, ExtractionError> {
    if start_marker.is_empty() {
        return Err(ExtractionError::EmptyMarker);
    }

    let start = raw
        .find(start_marker)
        .ok_or_else(|| ExtractionError::MarkerNotFound {
            marker: start_marker.to_string(),
        })?;
    let after = &raw[start + start_marker.len()..];

    let region = if end_marker.is_empty() {
        after
    } else {
        match after.find(end_marker) {
            Some(end) => &after[..end],
            None => after,
        }
    };

    Ok(normalize(region))
}

/// Trim every line, drop the ones left empty, and join the rest with `\n`.
///
/// Lone `\r`, form feeds and the Unicode line/paragraph separators also end
/// a line. Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}'
            | '\u{2029}'
    )
}
