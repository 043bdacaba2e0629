//! Finished chat exchanges, handed by value to verification

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ChatResponse, StreamChunk};
use crate::error::Result;
use crate::orchestrator;
use crate::proof::{VerificationProof, VerificationState};
use crate::reconstruct;

/// One completed request/response pair and the proof that covers it
///
/// The exchange owns its proof. Only fetch enrichment ([`attach_proof`])
/// and verification ([`verify`]) replace it; [`clear_proof`] is the only
/// way to drop it.
///
/// [`attach_proof`]: Exchange::attach_proof
/// [`verify`]: Exchange::verify
/// [`clear_proof`]: Exchange::clear_proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub chat_id: String,
    pub content: String,
    /// Exact text the request hash covers
    pub raw_request: String,
    /// Exact text the response hash covers
    pub raw_response: String,
    proof: Option<VerificationProof>,
}

impl Exchange {
    pub fn new(
        chat_id: impl Into<String>,
        content: impl Into<String>,
        raw_request: impl Into<String>,
        raw_response: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            raw_request: raw_request.into(),
            raw_response: raw_response.into(),
            proof: None,
        }
    }

    /// Build from a non-streaming response body
    pub fn from_response(raw_request: impl Into<String>, body: &str) -> Result<Self> {
        let response: ChatResponse = serde_json::from_str(body)?;
        let raw_response = reconstruct::reserialize_response(body)?;
        Ok(Self::new(
            response.id.clone(),
            response.content(),
            raw_request,
            raw_response,
        ))
    }

    pub fn proof(&self) -> Option<&VerificationProof> {
        self.proof.as_ref()
    }

    pub fn attach_proof(&mut self, proof: VerificationProof) {
        self.proof = Some(proof);
    }

    pub fn clear_proof(&mut self) {
        self.proof = None;
    }

    /// Run verification and replace the proof with the result
    ///
    /// Without a proof there is nothing to check and the state stays
    /// [`VerificationState::Pending`].
    pub fn verify(&mut self) -> VerificationState {
        if let Some(proof) = &self.proof {
            let updated = orchestrator::run_verification(
                proof,
                Some(&self.raw_request),
                Some(&self.raw_response),
            );
            self.proof = Some(updated);
        }
        self.state()
    }

    pub fn state(&self) -> VerificationState {
        self.proof
            .as_ref()
            .map(VerificationProof::state)
            .unwrap_or(VerificationState::Pending)
    }
}

/// Collects streamed chunks until the completion is fully materialized
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    chat_id: Option<String>,
    created: Option<u64>,
    model: Option<String>,
    content: String,
    usage: Option<Value>,
    finished: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &StreamChunk) {
        if self.chat_id.is_none() && !chunk.id.is_empty() {
            self.chat_id = Some(chunk.id.clone());
        }
        if self.created.is_none() {
            self.created = chunk.created.filter(|&c| c != 0);
        }
        if self.model.is_none() {
            self.model = chunk.model.clone();
        }

        for choice in chunk.choices.iter().filter(|c| c.index == 0) {
            if let Some(text) = &choice.delta.content {
                self.content.push_str(text);
            }
            if choice.finish_reason.is_some() {
                self.finished = true;
            }
        }

        if chunk.usage.is_some() {
            self.usage = chunk.usage.clone();
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// True once a chunk carried a finish reason
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Close the stream and rebuild the hashed response text
    pub fn finish(self, raw_request: impl Into<String>) -> Result<Exchange> {
        let chat_id = self.chat_id.unwrap_or_default();
        let raw_response = reconstruct::reconstruct(
            &chat_id,
            &self.content,
            self.created,
            self.model.as_deref(),
            self.usage.as_ref(),
        )?;
        Ok(Exchange::new(chat_id, self.content, raw_request, raw_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha256_hex;
    use crate::proof::SignatureRecord;

    const RAW_REQUEST: &str = r#"{"messages":[{"content":"What is 2+2?","role":"user"}],"model":"phala/deepseek-chat-v3-0324","stream":false}"#;
    const RESPONSE_HASH: &str = "4c4a38d43d64848315d8cff457bfcde4a4fbba7d8c5880f6e58a46c1669a3117";
    const SIGNED_TEXT: &str = "fb189d2239d1804310417d49b1551155c57322dfac2ea073eb821493d262e9f2:4c4a38d43d64848315d8cff457bfcde4a4fbba7d8c5880f6e58a46c1669a3117";
    const SIGNATURE: &str = "644d97b558a284ae9ff0ecd1124ce3724f90a301659dc59bfb9c633a5b7088785e32177bf6c0fae8239acc45fa9270221928acebc774a53f2a65cc5202a78d761b";
    const SIGNING_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn chunk(json: &str) -> StreamChunk {
        serde_json::from_str(json).unwrap()
    }

    fn streamed() -> StreamAccumulator {
        let mut acc = StreamAccumulator::new();
        acc.push(&chunk(
            r#"{"id":"chatcmpl-7f3a","object":"chat.completion.chunk","created":1730000000,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
        ));
        acc.push(&chunk(
            r#"{"id":"chatcmpl-7f3a","object":"chat.completion.chunk","created":1730000000,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"delta":{"content":"4"},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"total_tokens":13,"completion_tokens":1,"prompt_tokens_details":null}}"#,
        ));
        acc
    }

    fn signed_proof() -> VerificationProof {
        VerificationProof::from_signature(
            "chatcmpl-7f3a",
            SignatureRecord {
                text: SIGNED_TEXT.into(),
                signature: SIGNATURE.into(),
                signing_address: SIGNING_ADDRESS.into(),
                signing_algo: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_accumulator_rebuilds_hashed_response() {
        let acc = streamed();
        assert!(acc.is_finished());
        assert_eq!(acc.content(), "4");

        let exchange = acc.finish(RAW_REQUEST).unwrap();
        assert_eq!(exchange.chat_id, "chatcmpl-7f3a");
        assert_eq!(sha256_hex(&exchange.raw_response), RESPONSE_HASH);
    }

    #[test]
    fn test_accumulator_skips_zero_created() {
        let mut acc = StreamAccumulator::new();
        acc.push(&chunk(
            r#"{"id":"chatcmpl-7f3a","created":0,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
        ));
        acc.push(&chunk(
            r#"{"id":"chatcmpl-7f3a","created":1730000000,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"delta":{"content":"4"},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"total_tokens":13,"completion_tokens":1,"prompt_tokens_details":null}}"#,
        ));

        let exchange = acc.finish(RAW_REQUEST).unwrap();
        assert_eq!(sha256_hex(&exchange.raw_response), RESPONSE_HASH);
    }

    #[test]
    fn test_exchange_verify_replaces_proof() {
        let mut exchange = streamed().finish(RAW_REQUEST).unwrap();
        assert_eq!(exchange.verify(), VerificationState::Pending);

        exchange.attach_proof(signed_proof());
        assert_eq!(exchange.state(), VerificationState::Pending);
        assert_eq!(exchange.verify(), VerificationState::Verified);
        assert_eq!(exchange.proof().unwrap().verification_steps.as_ref().unwrap().len(), 3);

        exchange.clear_proof();
        assert!(exchange.proof().is_none());
        assert_eq!(exchange.state(), VerificationState::Pending);
    }

    #[test]
    fn test_partial_stream_fails_hash() {
        let mut acc = StreamAccumulator::new();
        acc.push(&chunk(
            r#"{"id":"chatcmpl-7f3a","created":1730000000,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"delta":{"content":""},"finish_reason":null}]}"#,
        ));
        assert!(!acc.is_finished());

        let mut exchange = acc.finish(RAW_REQUEST).unwrap();
        exchange.attach_proof(signed_proof());
        assert_eq!(exchange.verify(), VerificationState::Failed);
    }

    #[test]
    fn test_from_response_body() {
        let body = r#"{"id": "c9", "object": "chat.completion", "created": 3, "model": "m",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]}"#;
        let exchange = Exchange::from_response("{}", body).unwrap();
        assert_eq!(exchange.chat_id, "c9");
        assert_eq!(exchange.content, "hi");
        assert_eq!(
            exchange.raw_response,
            r#"{"id":"c9","object":"chat.completion","created":3,"model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"hi"},"finish_reason":"stop"}]}"#
        );
    }
}
