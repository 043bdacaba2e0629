//! Ethereum personal-sign signature recovery
//!
//! The enclave signs the hash-pair text with a secp256k1 key using the
//! `personal_sign` convention (EIP-191 version `0x45`):
//!
//! ```text
//! digest = keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)
//! ```
//!
//! where `len(message)` is the ASCII decimal byte length. The signature is
//! 65 bytes `r || s || v` with `v` in `{27, 28}` (or `{0, 1}`). Recovery
//! yields the signer's public key, whose account address is the last 20
//! bytes of the Keccak-256 of the uncompressed point without its `0x04` tag.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::RecoveryError;

const PERSONAL_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// r (32) || s (32) || v (1)
const SIGNATURE_LEN: usize = 65;

/// Outcome of checking a signature against an expected signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerification {
    pub is_valid: bool,
    /// Lowercase `0x` address, empty when recovery failed
    pub recovered_address: String,
    pub error: Option<String>,
}

/// Keccak-256 digest of a message under the personal-sign preamble
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_SIGN_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Lowercase `0x`-prefixed account address of a public key
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the lowercase signing address of a personal-sign signature
pub fn recover_signing_address(
    message: &str,
    signature_hex: &str,
) -> Result<String, RecoveryError> {
    let bytes = hex::decode(strip_hex_prefix(signature_hex.trim()))
        .map_err(|e| RecoveryError::InvalidHex(e.to_string()))?;

    if bytes.len() != SIGNATURE_LEN {
        return Err(RecoveryError::InvalidLength {
            expected: SIGNATURE_LEN,
            actual: bytes.len(),
        });
    }

    let y_odd = match bytes[64] {
        0 | 27 => false,
        1 | 28 => true,
        other => return Err(RecoveryError::InvalidRecoveryId(other)),
    };

    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| RecoveryError::InvalidSignature(e.to_string()))?;

    // k256 only accepts low-S; negating s mirrors R, flipping its y parity
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (normalized, RecoveryId::new(!y_odd, false)),
        None => (signature, RecoveryId::new(y_odd, false)),
    };

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| RecoveryError::Unrecoverable(e.to_string()))?;

    Ok(address_from_key(&key))
}

/// Check that `signature_hex` over `message` was produced by `expected_address`
///
/// Never fails: recovery errors are captured in the `error` field with
/// `is_valid = false`. Addresses are compared case-insensitively.
pub fn verify_signature(
    message: &str,
    signature_hex: &str,
    expected_address: &str,
) -> SignatureVerification {
    match recover_signing_address(message, signature_hex) {
        Ok(recovered_address) => {
            let is_valid = recovered_address == normalize_address(expected_address);
            tracing::debug!(
                expected = expected_address,
                recovered = %recovered_address,
                is_valid,
                "signature recovered"
            );
            SignatureVerification {
                is_valid,
                recovered_address,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "signature recovery failed");
            SignatureVerification {
                is_valid: false,
                recovered_address: String::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn normalize_address(address: &str) -> String {
    format!("0x{}", strip_hex_prefix(address.trim()).to_ascii_lowercase())
}
