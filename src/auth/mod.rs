//! API key credentials
//!
//! Keys are issued once at registration and only their sha256 digest is
//! stored. Requests present the key as `Authorization: Bearer <key>`.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix on every issued key
pub const API_KEY_PREFIX: &str = "madang_";

/// Random bytes behind a key (48 hex characters)
const API_KEY_BYTES: usize = 24;

/// Generate a fresh API key
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, hex::encode(bytes))
}

/// Digest stored in place of the key
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the key from an Authorization header value.
///
/// The scheme is case-insensitive and may be followed by any run of spaces.
pub fn extract_bearer(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?.trim();
    let (scheme, token) = header.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Whether a presented key has the issued shape: prefix plus 48 lowercase hex
pub fn is_well_formed_key(api_key: &str) -> bool {
    api_key
        .strip_prefix(API_KEY_PREFIX)
        .map(|body| {
            body.len() == API_KEY_BYTES * 2
                && body.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        })
        .unwrap_or(false)
}

/// Short random id for new records
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
