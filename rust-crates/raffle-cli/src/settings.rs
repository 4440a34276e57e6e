use alloy::primitives::Address;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
};
use raffle_sync::{
    app::relay::RelayPolicy,
    config::{
        DEFAULT_ELIGIBILITY_URL,
        DEFAULT_RPC_URL,
        SyncConfig,
    },
};
use std::{
    str::FromStr,
    time::Duration,
};
use url::Url;

const RELAY_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Values given on the command line; each wins over the stored deployment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub rpc_url: Option<String>,
    pub raffle_address: Option<String>,
    pub airdrop_address: Option<String>,
    pub eligibility_url: Option<String>,
    pub player_cap: Option<usize>,
    pub relay_retries: Option<u32>,
}

pub fn resolve_sync_config(
    env: DeploymentEnv,
    overrides: &Overrides,
    record: Option<&DeploymentRecord>,
) -> Result<SyncConfig> {
    let rpc_url = overrides
        .rpc_url
        .clone()
        .or_else(|| record.map(|r| r.network_url.clone()))
        .or_else(|| (env == DeploymentEnv::Local).then(|| DEFAULT_RPC_URL.to_string()))
        .ok_or_else(|| eyre!("no RPC URL for {env}; pass --rpc-url or record a deployment"))?;
    let rpc_url = Url::parse(&rpc_url).wrap_err_with(|| format!("invalid RPC URL {rpc_url}"))?;

    let raffle_address = match overrides
        .raffle_address
        .as_deref()
        .or(record.map(|r| r.raffle_address.as_str()))
    {
        Some(raw) => parse_address(raw, "raffle")?,
        None if env == DeploymentEnv::Local => generated_abi::LOCAL_RAFFLE_ADDRESS,
        None => {
            return Err(eyre!(
                "no raffle address for {env}; pass --raffle-address or record a deployment"
            ));
        }
    };

    let eligibility_url = overrides
        .eligibility_url
        .clone()
        .or_else(|| record.and_then(|r| r.eligibility_url.clone()))
        .unwrap_or_else(|| DEFAULT_ELIGIBILITY_URL.to_string());
    let eligibility_url = Url::parse(&eligibility_url)
        .wrap_err_with(|| format!("invalid eligibility URL {eligibility_url}"))?;

    let mut config = SyncConfig::new(rpc_url, raffle_address, eligibility_url);
    if let Some(raw) = overrides
        .airdrop_address
        .as_deref()
        .or(record.and_then(|r| r.airdrop_address.as_deref()))
    {
        config = config.with_airdrop(parse_address(raw, "airdrop")?);
    }
    if let Some(cap) = overrides.player_cap {
        config = config.with_player_cap(cap);
    }
    if let Some(retries) = overrides.relay_retries
        && retries > 0
    {
        config = config.with_relay_policy(RelayPolicy::BoundedRetry {
            attempts: retries + 1,
            backoff: RELAY_RETRY_BACKOFF,
        });
    }
    Ok(config)
}

pub fn parse_address(raw: &str, what: &str) -> Result<Address> {
    Address::from_str(raw.trim()).map_err(|err| eyre!("invalid {what} address {raw}: {err}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            recorded_at: "2026-01-01T00:00:00Z".to_string(),
            raffle_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            network_url: "https://sepolia.example.org".to_string(),
            airdrop_address: Some("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".to_string()),
            eligibility_url: Some("https://claims.example.org".to_string()),
            deployment_block: None,
        }
    }

    #[test]
    fn resolve_sync_config__local_without_record__uses_devnet_defaults() {
        // when
        let config =
            resolve_sync_config(DeploymentEnv::Local, &Overrides::default(), None).unwrap();

        // then
        assert_eq!(config.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(config.raffle_address, generated_abi::LOCAL_RAFFLE_ADDRESS);
        assert_eq!(config.airdrop_address, None);
        assert_eq!(config.relay_policy, RelayPolicy::BestEffort);
    }

    #[test]
    fn resolve_sync_config__sepolia_without_record__needs_rpc_url() {
        let result = resolve_sync_config(DeploymentEnv::Sepolia, &Overrides::default(), None);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_sync_config__record_present__fills_addresses() {
        // given
        let record = record();

        // when
        let config =
            resolve_sync_config(DeploymentEnv::Sepolia, &Overrides::default(), Some(&record))
                .unwrap();

        // then
        assert_eq!(
            config.raffle_address,
            parse_address(&record.raffle_address, "raffle").unwrap()
        );
        assert!(config.airdrop_address.is_some());
        assert_eq!(config.eligibility_base(), "https://claims.example.org");
    }

    #[test]
    fn resolve_sync_config__flags__override_record() {
        // given
        let overrides = Overrides {
            rpc_url: Some("http://10.0.0.2:8545".to_string()),
            player_cap: Some(50),
            relay_retries: Some(2),
            ..Overrides::default()
        };

        // when
        let config =
            resolve_sync_config(DeploymentEnv::Sepolia, &overrides, Some(&record())).unwrap();

        // then
        assert_eq!(config.rpc_url.as_str(), "http://10.0.0.2:8545/");
        assert_eq!(config.player_cap, 50);
        assert_eq!(
            config.relay_policy,
            RelayPolicy::BoundedRetry {
                attempts: 3,
                backoff: RELAY_RETRY_BACKOFF,
            }
        );
    }

    #[test]
    fn parse_address__garbage__errors() {
        assert!(parse_address("0x1234", "raffle").is_err());
    }
}
