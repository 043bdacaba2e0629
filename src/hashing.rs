//! SHA-256 comparison of request/response texts against signed digests

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Outcome of comparing both texts against their expected digests
///
/// A mismatch is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashVerification {
    pub request_match: bool,
    pub response_match: bool,
    pub computed_request_hash: String,
    pub computed_response_hash: String,
}

impl HashVerification {
    pub fn both_match(&self) -> bool {
        self.request_match && self.response_match
    }
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Hash both texts and compare against the expected hex digests
///
/// Both sides are lowercased before comparison. Pure and idempotent.
pub fn verify_hashes(
    request_text: &str,
    response_text: &str,
    expected_request_hash: &str,
    expected_response_hash: &str,
) -> HashVerification {
    let computed_request_hash = sha256_hex(request_text);
    let computed_response_hash = sha256_hex(response_text);

    let request_match = digests_equal(&computed_request_hash, expected_request_hash);
    let response_match = digests_equal(&computed_response_hash, expected_response_hash);

    tracing::debug!(
        expected = expected_request_hash,
        computed = %computed_request_hash,
        matched = request_match,
        "request hash comparison"
    );
    tracing::debug!(
        expected = expected_response_hash,
        computed = %computed_response_hash,
        matched = response_match,
        "response hash comparison"
    );

    HashVerification {
        request_match,
        response_match,
        computed_request_hash,
        computed_response_hash,
    }
}

fn digests_equal(computed: &str, expected: &str) -> bool {
    computed.to_ascii_lowercase() == expected.trim().to_ascii_lowercase()
}
