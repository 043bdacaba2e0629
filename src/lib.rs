//! # Phala Verify
//!
//! Client-side verification that a chat completion was produced, unmodified,
//! inside a TEE and signed by a known enclave key.
//!
//! ## Three-Step Verification
//!
//! ### Step 1: Request Hash
//! - The request body is sent in canonical JSON (keys sorted, no whitespace)
//! - Its SHA-256 must equal the request half of the signed hash pair
//!
//! ### Step 2: Response Hash
//! - The response is re-encoded in the server's own field order (not sorted)
//! - Its SHA-256 must equal the response half of the signed hash pair
//!
//! ### Step 3: Signature Recovery
//! - The hash pair `"<request>:<response>"` is the signed message
//! - An Ethereum personal-sign signature is recovered to an address
//! - The address must match the enclave's signing address
//!
//! The response counts as verified only if all three steps pass. Mismatches
//! and malformed signatures are reported as failed steps, never as errors.
//!
//! ## Attestation
//!
//! The attestation report for the signing address is fetched and kept on the
//! proof for display. It is not parsed here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use phala_verify::{ChatClient, ChatMessage, VerificationState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::from_env()?;
//!
//!     let mut exchange = client
//!         .send_message(vec![ChatMessage::user("What is 2+2?")])
//!         .await?;
//!
//!     match exchange.verify() {
//!         VerificationState::Verified => println!("verified: {}", exchange.content),
//!         VerificationState::Failed => println!("verification failed"),
//!         VerificationState::Pending => println!("proof not available yet"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod canonical;
pub mod client;
pub mod error;
pub mod exchange;
pub mod hashing;
pub mod orchestrator;
pub mod proof;
pub mod reconstruct;
pub mod signature;

pub use api::{ChatMessage, ChatRequest, ChatResponse, Role, StreamChunk, Usage};
pub use canonical::canonicalize;
pub use client::{ChatClient, ClientConfig};
pub use error::{Error, RecoveryError, Result};
pub use exchange::{Exchange, StreamAccumulator};
pub use hashing::{verify_hashes, HashVerification};
pub use orchestrator::{run_verification, LocalVerifier, Orchestrator, Verifier};
pub use proof::{
    AttestationReport, SignatureRecord, StepStatus, VerificationProof, VerificationState,
    VerificationStatus, VerificationStep,
};
pub use reconstruct::reconstruct;
pub use signature::{recover_signing_address, verify_signature, SignatureVerification};
