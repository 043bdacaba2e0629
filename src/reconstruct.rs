//! Rebuild the exact response body the upstream signer hashed
//!
//! The signer hashes the non-streaming completion object as its server
//! emitted it: fixed field order, several always-null placeholder fields,
//! and no key sorting. The shape below is that emission order and is a
//! fixed constant. It is never derived from caller input, and a change
//! upstream shows up as an ordinary response-hash mismatch.

use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::Usage;
use crate::canonical;
use crate::client::DEFAULT_MODEL;
use crate::error::Result;

/// Always serialized as `null`
type Placeholder = Option<Value>;

#[derive(Serialize)]
struct CompletionRecord<'a> {
    id: &'a str,
    object: &'static str,
    created: u64,
    model: &'a str,
    choices: [CompletionChoice<'a>; 1],
    service_tier: Placeholder,
    system_fingerprint: Placeholder,
    usage: Value,
    prompt_logprobs: Placeholder,
    prompt_token_ids: Placeholder,
    kv_transfer_params: Placeholder,
}

#[derive(Serialize)]
struct CompletionChoice<'a> {
    index: u32,
    message: CompletionMessage<'a>,
    logprobs: Placeholder,
    finish_reason: &'static str,
    stop_reason: Placeholder,
    token_ids: Placeholder,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
    refusal: Placeholder,
    annotations: Placeholder,
    audio: Placeholder,
    function_call: Placeholder,
    tool_calls: Vec<Value>,
    reasoning: Placeholder,
    reasoning_content: Placeholder,
}

/// Reconstruct the hashed response text of a completed exchange
///
/// Fallbacks: a missing or zero `created` becomes the current Unix time, a
/// missing or empty model becomes [`DEFAULT_MODEL`], and missing usage becomes zeroed
/// counters. Server-supplied usage is emitted with its own field order.
pub fn reconstruct(
    chat_id: &str,
    content: &str,
    created: Option<u64>,
    model: Option<&str>,
    usage: Option<&Value>,
) -> Result<String> {
    let usage = match usage {
        Some(u) => u.clone(),
        None => serde_json::to_value(Usage::default())?,
    };

    let record = CompletionRecord {
        id: chat_id,
        object: "chat.completion",
        created: created.filter(|&c| c != 0).unwrap_or_else(unix_secs),
        model: model.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MODEL),
        choices: [CompletionChoice {
            index: 0,
            message: CompletionMessage {
                role: "assistant",
                content,
                refusal: None,
                annotations: None,
                audio: None,
                function_call: None,
                tool_calls: Vec::new(),
                reasoning: None,
                reasoning_content: None,
            },
            logprobs: None,
            finish_reason: "stop",
            stop_reason: None,
            token_ids: None,
        }],
        service_tier: None,
        system_fingerprint: None,
        usage,
        prompt_logprobs: None,
        prompt_token_ids: None,
        kv_transfer_params: None,
    };

    let value = serde_json::to_value(&record)?;
    Ok(canonical::to_insertion_order_json(&value))
}

/// Re-encode a received non-streaming body compactly, keeping its key order
pub fn reserialize_response(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)?;
    Ok(canonical::to_insertion_order_json(&value))
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE_RESPONSE: &str = r#"{"id":"chatcmpl-7f3a","object":"chat.completion","created":1730000000,"model":"phala/deepseek-chat-v3-0324","choices":[{"index":0,"message":{"role":"assistant","content":"4","refusal":null,"annotations":null,"audio":null,"function_call":null,"tool_calls":[],"reasoning":null,"reasoning_content":null},"logprobs":null,"finish_reason":"stop","stop_reason":null,"token_ids":null}],"service_tier":null,"system_fingerprint":null,"usage":{"prompt_tokens":12,"total_tokens":13,"completion_tokens":1,"prompt_tokens_details":null},"prompt_logprobs":null,"prompt_token_ids":null,"kv_transfer_params":null}"#;

    fn fixture_usage() -> Value {
        json!({"prompt_tokens": 12, "total_tokens": 13, "completion_tokens": 1, "prompt_tokens_details": null})
    }

    #[test]
    fn test_reconstruct_matches_upstream_layout() {
        let usage = fixture_usage();
        let text = reconstruct(
            "chatcmpl-7f3a",
            "4",
            Some(1_730_000_000),
            Some("phala/deepseek-chat-v3-0324"),
            Some(&usage),
        )
        .unwrap();
        assert_eq!(text, FIXTURE_RESPONSE);
    }

    #[test]
    fn test_reconstruct_deterministic() {
        let usage = fixture_usage();
        let a = reconstruct("id", "hello", Some(5), Some("m"), Some(&usage)).unwrap();
        let b = reconstruct("id", "hello", Some(5), Some("m"), Some(&usage)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reconstruct_zeroed_usage_fallback() {
        let text = reconstruct("id", "x", Some(1), None, None).unwrap();
        assert!(text.contains(
            r#""usage":{"prompt_tokens":0,"total_tokens":0,"completion_tokens":0,"prompt_tokens_details":null}"#
        ));
        assert!(text.contains(&format!(r#""model":"{}""#, DEFAULT_MODEL)));
    }

    #[test]
    fn test_reconstruct_zero_created_uses_now() {
        let before = unix_secs();
        let text = reconstruct("id", "x", Some(0), Some(""), None).unwrap();
        let record: Value = serde_json::from_str(&text).unwrap();
        assert!(record["created"].as_u64().unwrap() >= before);
        assert_eq!(record["model"], DEFAULT_MODEL);
    }

    #[test]
    fn test_reconstruct_keeps_server_usage_order() {
        let usage = json!({"completion_tokens": 2, "prompt_tokens": 1, "total_tokens": 3});
        let text = reconstruct("id", "x", Some(1), Some("m"), Some(&usage)).unwrap();
        assert!(text.contains(r#""usage":{"completion_tokens":2,"prompt_tokens":1,"total_tokens":3}"#));
    }

    #[test]
    fn test_reconstruct_is_not_sorted() {
        let text = reconstruct("id", "x", Some(1), Some("m"), None).unwrap();
        assert!(text.starts_with(r#"{"id":"id","object":"chat.completion","created":1,"model":"m","choices":"#));
        assert!(text.ends_with(r#""prompt_logprobs":null,"prompt_token_ids":null,"kv_transfer_params":null}"#));
    }

    #[test]
    fn test_reserialize_response_compacts() {
        let body = "{\n  \"id\": \"c\",\n  \"object\": \"chat.completion\",\n  \"created\": 7\n}";
        assert_eq!(
            reserialize_response(body).unwrap(),
            r#"{"id":"c","object":"chat.completion","created":7}"#
        );
    }
}
