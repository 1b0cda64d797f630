//! String helpers for logging and error reporting
//!
//! Backend bodies and tokens end up in error values and tracing events.
//! These helpers keep them short and keep credentials out of logs.

/// Maximum number of body bytes kept in error values
pub const MAX_BODY_BYTES: usize = 512;

/// Safely truncate a string at a UTF-8 character boundary.
///
/// # Example
/// ```
/// use fitlink_pairing_sdk::utils::safe_truncate;
///
/// // Emoji is 4 bytes - truncating at byte 10 would cut it in half
/// let text = "Status: 🔍 Active";
/// assert_eq!(safe_truncate(text, 10), "Status: ");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    &s[..boundary]
}

/// Truncate a string for display, appending "..." if anything was cut.
///
/// # Example
/// ```
/// use fitlink_pairing_sdk::utils::truncate_for_display;
///
/// assert_eq!(truncate_for_display("This is a long message", 10), "This is a ...");
/// ```
#[must_use]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Mask a credential for logging, keeping only a short prefix.
///
/// # Example
/// ```
/// use fitlink_pairing_sdk::utils::redact;
///
/// assert_eq!(redact("abcdef123456"), "abcd…");
/// assert_eq!(redact("abc"), "…");
/// ```
#[must_use]
pub fn redact(secret: &str) -> String {
    const VISIBLE: usize = 4;
    if secret.chars().count() <= VISIBLE {
        return "…".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{prefix}…")
}

/// Strip query and fragment from a URL so it can be logged without secrets.
#[must_use]
pub fn redact_url(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    if end < raw.len() {
        format!("{}?…", &raw[..end])
    } else {
        raw.to_string()
    }
}
