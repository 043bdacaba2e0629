//! Chat client that collects everything a verification run needs
//!
//! For each message the client:
//! 1. Sends the request body in canonical form (`stream = false`)
//! 2. Keeps the exact request and response texts the signer hashed
//! 3. Fetches the signed hash pair for the chat id
//! 4. Fetches the attestation report for the signing address
//!
//! Fetch failures after the completion arrived are not errors: the
//! exchange keeps a pending proof and simply cannot be verified yet.

use crate::api::{ChatMessage, ChatRequest};
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::proof::{AttestationReport, SignatureRecord, VerificationProof};

/// Default endpoints
pub const DEFAULT_BASE_URL: &str = "https://api.redpill.ai/v1";
pub const DEFAULT_MODEL: &str = "phala/deepseek-chat-v3-0324";

const API_KEY_VAR: &str = "PHALA_API_KEY";
const BASE_URL_VAR: &str = "PHALA_API_BASE_URL";
const MODEL_VAR: &str = "PHALA_MODEL";
const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

/// Endpoint, credentials and model for a [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read `PHALA_API_KEY` (required), `PHALA_API_BASE_URL` and `PHALA_MODEL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != API_KEY_PLACEHOLDER)
            .ok_or(Error::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Some(url) = lookup(BASE_URL_VAR) {
            config = config.with_base_url(url);
        }
        if let Some(model) = lookup(MODEL_VAR) {
            config = config.with_model(model);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Client for the confidential inference API
pub struct ChatClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a non-streaming chat completion and gather its proof
    ///
    /// The returned exchange is fully materialized and ready for
    /// [`Exchange::verify`].
    pub async fn send_message(&self, messages: Vec<ChatMessage>) -> Result<Exchange> {
        let request = ChatRequest::new(&self.config.model, messages);
        let raw_request = request.canonical_json()?;
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", "application/json")
            .body(raw_request.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message: body });
        }

        let body = response.text().await?;
        let mut exchange = Exchange::from_response(raw_request, &body)?;
        tracing::debug!(chat_id = %exchange.chat_id, "completion received");

        if exchange.chat_id.is_empty() {
            tracing::warn!("response carried no chat id, cannot fetch signature");
        } else {
            let proof = self.fetch_signature(&exchange.chat_id).await;
            exchange.attach_proof(proof);
        }

        Ok(exchange)
    }

    /// Fetch the signed hash pair and attestation for a chat id
    ///
    /// Any failure yields [`VerificationProof::pending`].
    pub async fn fetch_signature(&self, chat_id: &str) -> VerificationProof {
        let record = match self.fetch_signature_record(chat_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "failed to fetch signature");
                return VerificationProof::pending(chat_id);
            }
        };

        let proof = match VerificationProof::from_signature(chat_id, record) {
            Ok(proof) => proof,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "signature record unusable");
                return VerificationProof::pending(chat_id);
            }
        };

        let attestation = match proof.signing_address.as_deref() {
            Some(address) => self.fetch_attestation(address, None).await,
            None => None,
        };
        proof.with_attestation(attestation)
    }

    async fn fetch_signature_record(&self, chat_id: &str) -> Result<SignatureRecord> {
        let url = format!("{}/signature/{}", self.config.base_url, chat_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&[("model", self.config.model.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message: body });
        }

        Ok(response.json().await?)
    }

    /// Fetch the attestation report bound to a signing address
    ///
    /// Returns `None` on any failure; attestation is display-only.
    pub async fn fetch_attestation(
        &self,
        signing_address: &str,
        nonce: Option<&str>,
    ) -> Option<AttestationReport> {
        match self.fetch_attestation_report(signing_address, nonce).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(signing_address, error = %e, "failed to fetch attestation");
                None
            }
        }
    }

    async fn fetch_attestation_report(
        &self,
        signing_address: &str,
        nonce: Option<&str>,
    ) -> Result<AttestationReport> {
        let url = format!("{}/attestation/report", self.config.base_url);

        let mut query = vec![
            ("model", self.config.model.as_str()),
            ("signing_address", signing_address),
        ];
        if let Some(nonce) = nonce {
            query.push(("nonce", nonce));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message: body });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::VerificationState;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PHALA_API_KEY", "sk-test"),
            ("PHALA_API_BASE_URL", "http://localhost:8000/v1/"),
            ("PHALA_MODEL", "phala/qwen"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model, "phala/qwen");
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(Error::MissingApiKey)
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("PHALA_API_KEY", "your_api_key_here")])),
            Err(Error::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_signature_is_pending() {
        let config = ClientConfig::new("key").with_base_url("http://127.0.0.1:9/v1");
        let client = ChatClient::new(config);

        let proof = client.fetch_signature("chat-1").await;
        assert_eq!(proof.chat_id, "chat-1");
        assert!(!proof.is_complete());
        assert!(proof.fetched_at.is_some());
        assert_eq!(proof.state(), VerificationState::Pending);
    }

    #[tokio::test]
    async fn test_unreachable_attestation_is_none() {
        let config = ClientConfig::new("key").with_base_url("http://127.0.0.1:9/v1");
        let client = ChatClient::new(config);
        assert!(client.fetch_attestation("0xabc", Some("n")).await.is_none());
    }
}
