//! Verification run over a fetched proof
//!
//! A run moves `NotStarted -> Incomplete | Running -> Completed`:
//!
//! 1. Gate on completeness. A proof missing any input (raw texts, either
//!    hash, signature, signing address, hash-pair text) is returned
//!    unchanged with no steps. That means "not yet verifiable", not failure.
//! 2. Request and response hash steps.
//! 3. Signature step over the hash-pair text.
//! 4. Aggregate into a [`VerificationStatus`].
//!
//! Mismatches are recorded as failed steps and never abort the run. An
//! `Err` from the [`Verifier`] seam is a fault: it ends the run with a
//! terminal "Verification Process" step, keeping the flags computed so far.
//! Every call returns a new proof with a fresh step sequence.

use crate::error::Result;
use crate::hashing::{self, HashVerification};
use crate::proof::{VerificationProof, VerificationStatus, VerificationStep};
use crate::signature::{self, SignatureVerification};

pub const STEP_REQUEST_HASH: &str = "Request Hash Verification";
pub const STEP_RESPONSE_HASH: &str = "Response Hash Verification";
pub const STEP_SIGNATURE: &str = "Signature Verification";
pub const STEP_PROCESS: &str = "Verification Process";

/// The checks a run delegates to
pub trait Verifier {
    fn verify_hashes(
        &self,
        request_text: &str,
        response_text: &str,
        expected_request_hash: &str,
        expected_response_hash: &str,
    ) -> Result<HashVerification>;

    fn verify_signature(
        &self,
        message: &str,
        signature_hex: &str,
        expected_address: &str,
    ) -> Result<SignatureVerification>;
}

/// In-process SHA-256 and secp256k1 checks
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVerifier;

impl Verifier for LocalVerifier {
    fn verify_hashes(
        &self,
        request_text: &str,
        response_text: &str,
        expected_request_hash: &str,
        expected_response_hash: &str,
    ) -> Result<HashVerification> {
        Ok(hashing::verify_hashes(
            request_text,
            response_text,
            expected_request_hash,
            expected_response_hash,
        ))
    }

    fn verify_signature(
        &self,
        message: &str,
        signature_hex: &str,
        expected_address: &str,
    ) -> Result<SignatureVerification> {
        Ok(signature::verify_signature(message, signature_hex, expected_address))
    }
}

/// Everything a run needs, borrowed from the proof and the exchange
struct RunInputs<'a> {
    raw_request: &'a str,
    raw_response: &'a str,
    request_hash: &'a str,
    response_hash: &'a str,
    text: &'a str,
    signature: &'a str,
    signing_address: &'a str,
}

impl<'a> RunInputs<'a> {
    fn gather(
        proof: &'a VerificationProof,
        raw_request: Option<&'a str>,
        raw_response: Option<&'a str>,
    ) -> Option<Self> {
        Some(Self {
            raw_request: present(raw_request)?,
            raw_response: present(raw_response)?,
            request_hash: present(proof.request_hash.as_deref())?,
            response_hash: present(proof.response_hash.as_deref())?,
            text: present(proof.text.as_deref())?,
            signature: present(proof.signature.as_deref())?,
            signing_address: present(proof.signing_address.as_deref())?,
        })
    }
}

/// An empty text counts as not fetched
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

#[derive(Default)]
struct RunLog {
    steps: Vec<VerificationStep>,
    hash_verified: bool,
    signature_verified: bool,
}

/// Sequences hash and signature checks into an auditable run
#[derive(Debug, Clone, Default)]
pub struct Orchestrator<V = LocalVerifier> {
    verifier: V,
}

impl Orchestrator<LocalVerifier> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Verifier> Orchestrator<V> {
    pub fn with_verifier(verifier: V) -> Self {
        Self { verifier }
    }

    /// Verify `proof` against the exact request/response texts
    ///
    /// Only call once the exchange is fully materialized; a partially
    /// streamed response just produces a hash mismatch.
    pub fn run(
        &self,
        proof: &VerificationProof,
        raw_request: Option<&str>,
        raw_response: Option<&str>,
    ) -> VerificationProof {
        let Some(inputs) = RunInputs::gather(proof, raw_request, raw_response) else {
            tracing::warn!(chat_id = %proof.chat_id, "cannot verify yet: proof or raw texts incomplete");
            return proof.clone();
        };

        tracing::info!(chat_id = %proof.chat_id, "starting verification");

        let mut log = RunLog::default();
        if let Err(e) = self.run_steps(&inputs, &mut log) {
            tracing::error!(chat_id = %proof.chat_id, error = %e, "verification process faulted");
            log.steps.push(VerificationStep::failed(STEP_PROCESS, None, e.to_string()));
        }

        let status = VerificationStatus::new(log.hash_verified, log.signature_verified);
        if status.is_verified {
            tracing::info!(chat_id = %proof.chat_id, "response is cryptographically verified");
        } else {
            tracing::warn!(
                chat_id = %proof.chat_id,
                hash_verified = status.hash_verified,
                signature_verified = status.signature_verified,
                "response could not be verified"
            );
        }

        VerificationProof {
            verification_status: Some(status),
            verification_steps: Some(log.steps),
            ..proof.clone()
        }
    }

    fn run_steps(&self, inputs: &RunInputs<'_>, log: &mut RunLog) -> Result<()> {
        let hashes = self.verifier.verify_hashes(
            inputs.raw_request,
            inputs.raw_response,
            inputs.request_hash,
            inputs.response_hash,
        )?;

        log.steps.push(hash_step(
            STEP_REQUEST_HASH,
            inputs.request_hash,
            &hashes.computed_request_hash,
            hashes.request_match,
        ));
        log.steps.push(hash_step(
            STEP_RESPONSE_HASH,
            inputs.response_hash,
            &hashes.computed_response_hash,
            hashes.response_match,
        ));
        log.hash_verified = hashes.both_match();

        let sig = self.verifier.verify_signature(
            inputs.text,
            inputs.signature,
            inputs.signing_address,
        )?;

        let details = format!(
            "Expected Address: {}\nRecovered Address: {}",
            inputs.signing_address, sig.recovered_address
        );
        log.steps.push(if sig.is_valid {
            VerificationStep::passed(STEP_SIGNATURE, details)
        } else {
            let error = sig.error.unwrap_or_else(|| "Address mismatch".to_string());
            VerificationStep::failed(STEP_SIGNATURE, Some(details), error)
        });
        log.signature_verified = sig.is_valid;

        Ok(())
    }
}

fn hash_step(name: &str, expected: &str, computed: &str, matched: bool) -> VerificationStep {
    let details = format!("Expected: {}\nComputed: {}", expected, computed);
    if matched {
        VerificationStep::passed(name, details)
    } else {
        VerificationStep::failed(name, Some(details), "Hash mismatch")
    }
}

/// Run a verification with the in-process verifier
pub fn run_verification(
    proof: &VerificationProof,
    raw_request: Option<&str>,
    raw_response: Option<&str>,
) -> VerificationProof {
    Orchestrator::new().run(proof, raw_request, raw_response)
}
