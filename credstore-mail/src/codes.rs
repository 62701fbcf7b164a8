//! Verification-code extraction from free-form message text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Digits that follow the word "code", allowing a little prose between
/// the keyword and the digits ("code is 123456", "code: 8341").
static KEYWORD_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcode\b\D{0,16}?(\d{4,8})").unwrap());

/// A bare six-digit token, the common OTP shape.
static BARE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{6})\b").unwrap());

/// Extract a verification code from free-form text.
///
/// Keyword-scoped matches win over the bare six-digit fallback, so a
/// message that mentions other numbers still yields the right code.
pub fn extract_verification_code(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = KEYWORD_CODE_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    BARE_CODE_RE.captures(text).map(|caps| caps[1].to_string())
}
