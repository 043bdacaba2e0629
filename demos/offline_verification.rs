//! Verify a recorded exchange without network access
//!
//! Rebuilds the request and response texts from their parts, then checks
//! them against a hash pair signed by a fixed test key.

use phala_verify::{
    run_verification, ChatMessage, ChatRequest, SignatureRecord, VerificationProof,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const SIGNATURE: &str = "644d97b558a284ae9ff0ecd1124ce3724f90a301659dc59bfb9c633a5b7088785e32177bf6c0fae8239acc45fa9270221928acebc774a53f2a65cc5202a78d761b";
const SIGNING_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const SIGNED_TEXT: &str = "fb189d2239d1804310417d49b1551155c57322dfac2ea073eb821493d262e9f2:4c4a38d43d64848315d8cff457bfcde4a4fbba7d8c5880f6e58a46c1669a3117";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phala_verify=debug")),
        )
        .init();

    let request = ChatRequest::new(
        "phala/deepseek-chat-v3-0324",
        vec![ChatMessage::user("What is 2+2?")],
    );
    let raw_request = request.canonical_json()?;

    let usage = json!({"prompt_tokens": 12, "total_tokens": 13, "completion_tokens": 1, "prompt_tokens_details": null});
    let raw_response = phala_verify::reconstruct(
        "chatcmpl-7f3a",
        "4",
        Some(1_730_000_000),
        Some("phala/deepseek-chat-v3-0324"),
        Some(&usage),
    )?;

    println!("Request:  {}", raw_request);
    println!("Response: {}...\n", &raw_response[..80]);

    let proof = VerificationProof::from_signature(
        "chatcmpl-7f3a",
        SignatureRecord {
            text: SIGNED_TEXT.to_string(),
            signature: SIGNATURE.to_string(),
            signing_address: SIGNING_ADDRESS.to_string(),
            signing_algo: Some("ecdsa".to_string()),
        },
    )?;

    let verified = run_verification(&proof, Some(&raw_request), Some(&raw_response));

    for step in verified.verification_steps.iter().flatten() {
        println!("═══ {} ({:?}) ═══", step.name, step.status);
        if let Some(details) = &step.details {
            println!("{}\n", details);
        }
    }

    println!("State: {:?}", verified.state());
    println!("{}", serde_json::to_string_pretty(&verified)?);

    Ok(())
}
