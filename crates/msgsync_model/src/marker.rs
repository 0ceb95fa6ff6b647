//! Media placeholder marker.
//!
//! A message whose media has not been downloaded yet carries
//! `"firebase <sequence>"` as its data. `<sequence>` is the per-account
//! upload index assigned by the uploading device.

use crate::error::{ModelError, ModelResult};

/// Leading word of a placeholder.
pub const MEDIA_MARKER_PREFIX: &str = "firebase";

/// Builds the placeholder for an upload sequence.
pub fn placeholder(sequence: i64) -> String {
    format!("{MEDIA_MARKER_PREFIX} {sequence}")
}

/// Returns true if `data` is a placeholder (well-formed or not).
pub fn is_placeholder(data: &str) -> bool {
    data.strip_prefix(MEDIA_MARKER_PREFIX)
        .is_some_and(|rest| rest.starts_with(' '))
}

/// Extracts the sequence from a placeholder.
pub fn parse_placeholder(data: &str) -> ModelResult<i64> {
    if !is_placeholder(data) {
        return Err(ModelError::NotPlaceholder(data.to_string()));
    }

    data.split(' ')
        .nth(1)
        .and_then(|token| token.parse::<i64>().ok())
        .ok_or_else(|| ModelError::InvalidSequence(data.to_string()))
}
