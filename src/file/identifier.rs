//! Object identifiers.
//!
//! An identifier is `<token>-<sanitized original name>`, where the token is
//! 128 random bits rendered as 32 lowercase hex characters. The token never
//! contains the separator, so the original name is always the text after the
//! first `-`.

/// Separator between the random token and the sanitized name.
pub const ID_SEPARATOR: char = '-';

/// Length of the hex token prefix.
pub const TOKEN_LENGTH: usize = 32;

/// Character substituted for anything outside `[A-Za-z0-9_.-]`.
pub const PLACEHOLDER: char = '_';

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Sanitize a user-supplied filename.
///
/// Every character outside `[A-Za-z0-9_.-]` is replaced by `_`, one for one,
/// so the name keeps its length (in characters) and its extension. An empty
/// name becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return PLACEHOLDER.to_string();
    }

    name.chars()
        .map(|c| if is_safe_char(c) { c } else { PLACEHOLDER })
        .collect()
}

/// Generate a new unique identifier for an upload.
pub fn generate_id(original_name: &str) -> String {
    let token: u128 = rand::random();
    format!(
        "{token:0width$x}{ID_SEPARATOR}{}",
        sanitize_name(original_name),
        width = TOKEN_LENGTH
    )
}

/// Recover the sanitized original name embedded in an identifier.
pub fn original_name(id: &str) -> Option<&str> {
    id.split_once(ID_SEPARATOR)
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
}
