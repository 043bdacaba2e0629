//! Send one message to the confidential inference API and verify the reply

use phala_verify::{ChatClient, ChatMessage, StepStatus, VerificationState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phala_verify=info")),
        )
        .init();

    let client = ChatClient::from_env()?;
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is 2+2? Reply with just the number.".to_string());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           Confidential Chat Verification Demo                ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Model:  {}", client.config().model);
    println!("Prompt: {}\n", prompt);

    let mut exchange = client.send_message(vec![ChatMessage::user(prompt)]).await?;
    println!("Response: {}\n", exchange.content.trim());

    let state = exchange.verify();

    if let Some(proof) = exchange.proof() {
        for step in proof.verification_steps.iter().flatten() {
            let mark = match step.status {
                StepStatus::Success => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Pending => "…",
            };
            println!("   {} {}", mark, step.name);
            if let Some(details) = &step.details {
                for line in details.lines() {
                    println!("       {}", line);
                }
            }
            if let Some(error) = &step.error {
                println!("       error: {}", error);
            }
        }
        if proof.attestation.is_some() {
            println!("\n   Attestation report attached for {}", proof.signing_address.as_deref().unwrap_or("?"));
        }
    }

    println!();
    match state {
        VerificationState::Verified => println!("✅ VERIFIED - response is bound to the TEE signing key"),
        VerificationState::Failed => println!("❌ FAILED - response could not be verified"),
        VerificationState::Pending => println!("⏳ PENDING - signature not available yet"),
    }

    Ok(())
}
