//! UTF-8 safe previews for log fields.
//!
//! User queries, agent replies and error bodies are only ever logged as short
//! previews, and bearer tokens only as a length/prefix fingerprint.

/// Return a preview of `s` up to `n` characters, with a trailing `...` when
/// anything was cut. Never slices inside a multibyte character.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix: String = s.chars().take(n).collect();
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Fingerprint a bearer token for debug logging: first four characters plus
/// the total length. Short tokens are fully masked.
pub fn token_fingerprint(token: &str) -> String {
    let len = token.chars().count();
    if len <= 8 {
        return format!("[{} chars]", len);
    }
    let head: String = token.chars().take(4).collect();
    format!("{}…[{} chars]", head, len)
}
