use crate::app::relay::RelayPolicy;
use alloy::primitives::Address;
use anyhow::Context;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_ELIGIBILITY_URL: &str = "http://localhost:10001";

/// Participant slots probed per snapshot. Raffles larger than this are truncated.
pub const DEFAULT_PLAYER_CAP: usize = 10;
pub const DEFAULT_CLAIM_TIER: u8 = 5;
pub const DEFAULT_ENTER_GAS_LIMIT: u64 = 1_000_000;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_EVENT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub rpc_url: Url,
    pub raffle_address: Address,
    pub airdrop_address: Option<Address>,
    pub eligibility_url: Url,
    pub player_cap: usize,
    pub rpc_timeout: Duration,
    pub http_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub event_poll_interval: Duration,
    pub refresh_interval: Duration,
    pub claim_tier: u8,
    pub enter_gas_limit: u64,
    pub relay_policy: RelayPolicy,
}

impl SyncConfig {
    pub fn new(rpc_url: Url, raffle_address: Address, eligibility_url: Url) -> Self {
        Self {
            rpc_url,
            raffle_address,
            airdrop_address: None,
            eligibility_url,
            player_cap: DEFAULT_PLAYER_CAP,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            event_poll_interval: DEFAULT_EVENT_POLL_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            claim_tier: DEFAULT_CLAIM_TIER,
            enter_gas_limit: DEFAULT_ENTER_GAS_LIMIT,
            relay_policy: RelayPolicy::BestEffort,
        }
    }

    /// Local devnet node, the default raffle deployment and the local eligibility service.
    pub fn local() -> crate::Result<Self> {
        let rpc_url = Url::parse(DEFAULT_RPC_URL).context("invalid default rpc url")?;
        let eligibility_url = Url::parse(DEFAULT_ELIGIBILITY_URL)
            .context("invalid default eligibility url")?;
        Ok(Self::new(
            rpc_url,
            generated_abi::LOCAL_RAFFLE_ADDRESS,
            eligibility_url,
        ))
    }

    pub fn with_airdrop(mut self, airdrop_address: Address) -> Self {
        self.airdrop_address = Some(airdrop_address);
        self
    }

    pub fn with_player_cap(mut self, player_cap: usize) -> Self {
        self.player_cap = player_cap;
        self
    }

    pub fn with_relay_policy(mut self, relay_policy: RelayPolicy) -> Self {
        self.relay_policy = relay_policy;
        self
    }

    pub fn with_claim_tier(mut self, claim_tier: u8) -> Self {
        self.claim_tier = claim_tier;
        self
    }

    pub fn eligibility_base(&self) -> &str {
        self.eligibility_url.as_str().trim_end_matches('/')
    }
}
