//! Request fingerprinting.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// SHA-256 hex digest over the canonical request tuple: method, URL,
/// headers, body. Headers are folded in sorted by name so semantically
/// equal requests fingerprint identically regardless of insertion order.
pub fn fingerprint(
    method: &str,
    url: &str,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(url.as_bytes());

    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(headers[name].as_bytes());
    }

    hasher.update(body);
    format!("{:x}", hasher.finalize())
}
