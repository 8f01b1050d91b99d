//! Secret handling for connection parameters.
//!
//! # Security Guarantees
//! - Passwords are held in `Zeroizing` containers
//! - Passwords never appear in `Debug` output, logs or user-facing messages
//! - Messages that may echo a password pass through [`scrub_secret`]

mod credentials;

pub use credentials::Credentials;

/// Secrets this short are only masked where they stand alone as a token.
const SHORT_SECRET_LEN: usize = 3;

/// Replaces occurrences of `secret` in `text` with `****`.
///
/// Secrets of three or more characters are masked everywhere. Shorter ones
/// are masked only where no letter or digit touches them on either side, so
/// a password of `pw` is hidden in `password 'pw'` without mangling the
/// surrounding words.
///
/// # Example
///
/// ```rust
/// use dbprobe_core::security::scrub_secret;
///
/// let msg = scrub_secret("login failed for s3cr3t", Some("s3cr3t"));
/// assert_eq!(msg, "login failed for ****");
///
/// let msg = scrub_secret("password 'pw' rejected", Some("pw"));
/// assert_eq!(msg, "password '****' rejected");
/// ```
pub fn scrub_secret(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if secret.is_empty() || !text.contains(secret) => text.to_string(),
        Some(secret) if secret.chars().count() >= SHORT_SECRET_LEN => text.replace(secret, "****"),
        Some(secret) => scrub_standalone(text, secret),
        None => text.to_string(),
    }
}

fn scrub_standalone(text: &str, secret: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(secret) {
        let end = start + secret.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        if before.is_some_and(char::is_alphanumeric) || after.is_some_and(char::is_alphanumeric) {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str("****");
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
