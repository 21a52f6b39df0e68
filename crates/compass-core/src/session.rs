//! Anonymous session identity.
//!
//! A visitor is identified by an opaque random identifier carried in an
//! http-only cookie. Identifiers are minted once per cookie lifetime and
//! never reused across reset cycles: "start over" deletes the session's
//! data and the next request mints a fresh identifier.

use rand::Rng;

/// Cookie carrying the anonymous session identifier.
pub const SESSION_COOKIE: &str = "sessionId";

/// Routing marker cookie set after successful onboarding submission.
/// Only branches the landing page; not a security control.
pub const HAS_PREFERENCES_COOKIE: &str = "hasPreferences";

/// Session cookie lifetime: one year.
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365;

/// Length of generated identifiers (nanoid-compatible).
pub const SESSION_ID_LEN: usize = 21;

/// URL-safe alphabet for identifiers (nanoid's default 64 symbols).
const SESSION_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Mint a new collision-resistant session identifier.
///
/// 21 symbols over a 64-character alphabet (126 bits), matching the format
/// existing cookies in the wild carry. Generation never blocks.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SESSION_ID_ALPHABET.len());
            SESSION_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Whether an inbound cookie value is a plausible session identifier.
///
/// Accepts any non-empty value up to 64 characters drawn from the identifier
/// alphabet. Anything else is treated as absent and a fresh identifier is
/// minted rather than propagating a malformed key into the store.
pub fn is_valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .bytes()
            .all(|b| SESSION_ID_ALPHABET.contains(&b))
}
