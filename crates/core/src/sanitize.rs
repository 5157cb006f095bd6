//! Layer-name sanitizing and content addressing.
//!
//! Every name that ends up in a path, manifest entry or archive member goes
//! through [`sanitize`], so output identifiers contain only ASCII letters and
//! digits.

use sha2::{Digest, Sha256};

/// Trims surrounding whitespace and drops every character that is not an
/// ASCII letter or digit.
///
/// `"  Play Button (hover)! "` becomes `"PlayButtonhover"`. An all-symbol name
/// sanitizes to the empty string, which callers must treat as invalid.
pub fn sanitize(raw: &str) -> String {
    raw.trim().chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Sanitizes every segment of a group path, or returns `None` if any segment
/// sanitizes to nothing.
pub fn sanitize_path<'a, I>(segments: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .map(|segment| {
            let clean = sanitize(segment);
            (!clean.is_empty()).then_some(clean)
        })
        .collect()
}

/// Joins sanitized hierarchy segments and the leaf name with `_`.
pub fn qualified_name(hierarchy: &[String], leaf: &str) -> String {
    let mut qualified = String::new();
    for segment in hierarchy {
        qualified.push_str(segment);
        qualified.push('_');
    }
    qualified.push_str(leaf);
    qualified
}

/// Lower-case hex SHA-256 of a qualified name.
pub fn content_address(qualified: &str) -> String {
    hex::encode(Sha256::digest(qualified.as_bytes()))
}
