//! Verification proof record and its audit trail

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Signed hash pair as served by `GET /signature/{chat_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// `"<request_hash>:<response_hash>"`
    pub text: String,
    pub signature: String,
    pub signing_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_algo: Option<String>,
}

/// Hardware attestation payload, stored and displayed but never parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationReport(pub Value);

impl AttestationReport {
    /// Look up a top-level field for display, e.g. `intel_quote`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Failed,
}

/// One entry in the ordered log of a verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationStep {
    pub fn passed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Success,
            details: Some(details.into()),
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        details: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Failed,
            details,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Aggregate result of one verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub is_verified: bool,
    pub hash_verified: bool,
    pub signature_verified: bool,
    /// Unix milliseconds
    pub timestamp: u64,
}

impl VerificationStatus {
    /// `is_verified` is always derived from the two flags
    pub fn new(hash_verified: bool, signature_verified: bool) -> Self {
        Self {
            is_verified: hash_verified && signature_verified,
            hash_verified,
            signature_verified,
            timestamp: unix_millis(),
        }
    }
}

/// What a proof currently says about its exchange
///
/// `Pending` covers both "still fetching" and "nothing to check yet"; it is
/// never reported as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Pending,
    Failed,
    Verified,
}

/// Proof material for one chat exchange plus the outcome of checking it
///
/// Created partially right after a completion arrives, enriched as the
/// signature and attestation are fetched, and finally given a status and
/// step log by the orchestrator. Each stage produces a new value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationProof {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationReport>,
    /// Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_steps: Option<Vec<VerificationStep>>,
}

impl VerificationProof {
    /// Proof with nothing fetched yet
    pub fn pending(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            fetched_at: Some(unix_millis()),
            ..Self::default()
        }
    }

    /// Proof carrying a fetched signature record
    ///
    /// Fails when the record's text is not a hash pair.
    pub fn from_signature(chat_id: impl Into<String>, record: SignatureRecord) -> Result<Self> {
        let (request_hash, response_hash) = parse_hash_pair(&record.text)?;
        Ok(Self {
            chat_id: chat_id.into(),
            text: Some(record.text),
            signature: Some(record.signature),
            signing_address: Some(record.signing_address),
            request_hash: Some(request_hash),
            response_hash: Some(response_hash),
            attestation: None,
            fetched_at: Some(unix_millis()),
            verification_status: None,
            verification_steps: None,
        })
    }

    pub fn with_attestation(mut self, attestation: Option<AttestationReport>) -> Self {
        self.attestation = attestation;
        self
    }

    /// True once every field a verification run needs has been fetched
    pub fn is_complete(&self) -> bool {
        [
            &self.text,
            &self.signature,
            &self.signing_address,
            &self.request_hash,
            &self.response_hash,
        ]
        .iter()
        .all(|field| field.as_deref().is_some_and(|s| !s.is_empty()))
    }

    pub fn state(&self) -> VerificationState {
        match &self.verification_status {
            None => VerificationState::Pending,
            Some(status) if status.is_verified => VerificationState::Verified,
            Some(_) => VerificationState::Failed,
        }
    }
}

/// Split `"<request_hash>:<response_hash>"` into its two digests
pub fn parse_hash_pair(text: &str) -> Result<(String, String)> {
    let mut parts = text.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(req), Some(resp), None) if !req.is_empty() && !resp.is_empty() => {
            Ok((req.to_string(), resp.to_string()))
        }
        _ => Err(Error::MalformedHashPair(text.to_string())),
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
