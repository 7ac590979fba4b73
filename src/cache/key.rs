//! Key Codec Module
//!
//! Cache keys are namespaced as `namespace:category[:params]`. Both
//! routines here are pure and never touch storage.

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

// == Validate ==
/// Returns true if `key` has at least two colon-delimited segments and
/// none of them is empty.
///
/// `"usage:daily"` and `"analytics:range:7d"` are valid; `"usage"`,
/// `"usage:"`, `":daily"` and `"a::b"` are not.
pub fn is_valid_key(key: &str) -> bool {
    let mut segments = 0;
    for segment in key.split(KEY_SEPARATOR) {
        if segment.is_empty() {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

// == Extract Params ==
/// Extracts the parameter segment of a key.
///
/// - two segments: the second segment (`"analytics:7d"` -> `"7d"`)
/// - three or more: everything after the category, rejoined with colons
///   (`"analytics:range:7d:utc"` -> `"7d:utc"`)
/// - fewer than two: `None`
///
/// This does not validate the key. Malformed keys still produce a result
/// (possibly empty) instead of failing.
pub fn extract_params(key: &str) -> Option<String> {
    let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match segments.len() {
        0 | 1 => None,
        2 => Some(segments[1].to_string()),
        _ => Some(segments[2..].join(":")),
    }
}
