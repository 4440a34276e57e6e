use crate::{
    app::{
        claim::EligibilityBackend,
        relay::{
            AchievementRecord,
            AddressBatch,
            RelayBackend,
        },
    },
    ledger::normalize_address,
};
use alloy::primitives::{
    Address,
    B256,
    U256,
};
use anyhow::Context;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    str::FromStr,
    time::Duration,
};
use tracing::debug;

const NOT_ELIGIBLE_MESSAGE: &str = "Address is not eligible";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("eligibility service unreachable: {0}")]
    Transport(String),
    #[error("eligibility service timed out after {0:?}")]
    Timeout(Duration),
    #[error("eligibility service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid eligibility payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

/// What the service said about an address's claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimLookup {
    Eligible { proof: Vec<B256>, amount: U256 },
    NotEligible,
    /// `success: false` with any message other than "not eligible".
    Refused(String),
}

#[derive(Clone)]
pub struct EligibilityClient {
    base_url: String,
    http: reqwest::Client,
}

impl EligibilityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for eligibility service")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn claim_data(&self, account: Address) -> Result<ClaimLookup, BackendError> {
        let url = format!("{}/api/claim/{}", self.base_url, normalize_address(&account));
        debug!(%url, "fetching claim data");
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let dto: ClaimResponseDto = serde_json::from_slice(&bytes)
            .map_err(|err| BackendError::Malformed(err.to_string()))?;
        dto.try_into()
    }

    pub async fn submit_eligible(
        &self,
        record: &AchievementRecord,
    ) -> Result<(), BackendError> {
        let body = EligibleSubmissionDto {
            player: normalize_address(&record.player),
            achievement_id: achievement_id_json(record.achievement_id),
        };
        self.post_json("/api/submit/eligible", &body).await
    }

    pub async fn submit_addresses(&self, batch: &AddressBatch) -> Result<(), BackendError> {
        let body = AddressBatchDto {
            addresses: batch.addresses.iter().map(normalize_address).collect(),
            total_count: batch.total_count,
        };
        self.post_json("/api/submit/addresses", &body).await
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<(), BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self.http.post(url).json(body).send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable body>".to_string());
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl RelayBackend for EligibilityClient {
    async fn submit_achievement(&self, record: &AchievementRecord) -> Result<(), BackendError> {
        self.submit_eligible(record).await
    }

    async fn submit_addresses(&self, batch: &AddressBatch) -> Result<(), BackendError> {
        EligibilityClient::submit_addresses(self, batch).await
    }
}

impl EligibilityBackend for EligibilityClient {
    async fn lookup_claim(&self, account: Address) -> Result<ClaimLookup, BackendError> {
        self.claim_data(account).await
    }
}

fn achievement_id_json(id: U256) -> serde_json::Value {
    match u64::try_from(id) {
        Ok(small) => serde_json::Value::from(small),
        Err(_) => serde_json::Value::from(id.to_string()),
    }
}

#[derive(Serialize)]
struct EligibleSubmissionDto {
    player: String,
    #[serde(rename = "achievementID")]
    achievement_id: serde_json::Value,
}

#[derive(Serialize)]
struct AddressBatchDto {
    addresses: Vec<String>,
    #[serde(rename = "totalCount")]
    total_count: usize,
}

#[derive(Deserialize)]
struct ClaimResponseDto {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ClaimDataDto>,
    #[serde(default)]
    proof: Option<Vec<String>>,
    #[serde(default)]
    amount: Option<AmountDto>,
}

#[derive(Deserialize)]
struct ClaimDataDto {
    proof: Vec<String>,
    amount: AmountDto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountDto {
    Number(u64),
    Text(String),
}

impl AmountDto {
    fn into_wei(self) -> Result<U256, BackendError> {
        match self {
            AmountDto::Number(n) => Ok(U256::from(n)),
            AmountDto::Text(text) => U256::from_str(text.trim())
                .map_err(|err| BackendError::Malformed(format!("amount {text:?}: {err}"))),
        }
    }
}

impl TryFrom<ClaimResponseDto> for ClaimLookup {
    type Error = BackendError;

    fn try_from(dto: ClaimResponseDto) -> Result<Self, Self::Error> {
        if !dto.success {
            let message = dto.message.unwrap_or_default();
            return if message == NOT_ELIGIBLE_MESSAGE {
                Ok(ClaimLookup::NotEligible)
            } else {
                Ok(ClaimLookup::Refused(message))
            };
        }
        // Older deployments return proof and amount at the top level.
        let (proof, amount) = match (dto.data, dto.proof, dto.amount) {
            (Some(data), _, _) => (data.proof, data.amount),
            (None, Some(proof), Some(amount)) => (proof, amount),
            _ => {
                return Err(BackendError::Malformed(
                    "successful response without proof data".to_string(),
                ));
            }
        };
        let proof = proof
            .iter()
            .map(|node| {
                B256::from_str(node)
                    .map_err(|err| BackendError::Malformed(format!("proof node {node}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClaimLookup::Eligible {
            proof,
            amount: amount.into_wei()?,
        })
    }
}
