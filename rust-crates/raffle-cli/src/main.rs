mod approval;
mod settings;
mod wallets;

use crate::{
    approval::PromptApproval,
    settings::{
        Overrides,
        resolve_sync_config,
    },
    wallets::{
        find_keystore,
        resolve_keystore_dir,
        unlock_keystore,
    },
};
use alloy::{
    network::EthereumWallet,
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    signers::local::PrivateKeySigner,
};
use clap::{
    ArgGroup,
    Args as ClapArgs,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
    record_deployment,
};
use raffle_sync::{
    app::{
        alloy_contracts::{
            AlloyAirdrop,
            AlloyRaffle,
        },
        alloy_event_source::AlloyEventConnector,
        claim::{
            ClaimOutcome,
            ClaimStatus,
            EligibilityClaim,
            EligibilityClaimService,
        },
        contract_reader::ContractStateReader,
        eligibility_client::EligibilityClient,
        entry::{
            EntryOutcome,
            EntryService,
        },
        relay::AchievementRelay,
        session::RaffleSession,
        subscription::EventSubscriptionManager,
    },
    config::SyncConfig,
    ledger::AchievementLedger,
    snapshot::{
        RaffleSnapshot,
        truncate_address,
    },
};
use std::{
    path::PathBuf,
    sync::Arc,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "raffle-cli",
    about = "Follow a raffle contract, enter it and claim airdrop rewards",
    version,
    group(
        ArgGroup::new("network")
            .args(["local", "sepolia"])
            .required(false)
    )
)]
struct Args {
    /// Local devnet node (default)
    #[arg(long)]
    local: bool,

    /// Sepolia testnet, using the recorded deployment
    #[arg(long)]
    sepolia: bool,

    /// Override RPC URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Override raffle contract address
    #[arg(long, global = true)]
    raffle_address: Option<String>,

    /// Override merkle airdrop contract address
    #[arg(long, global = true)]
    airdrop_address: Option<String>,

    /// Override eligibility service base URL
    #[arg(long, global = true)]
    eligibility_url: Option<String>,

    /// Participant slots read per snapshot
    #[arg(long, global = true)]
    player_cap: Option<usize>,

    /// Write logs to daily files in this directory instead of stdout
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current raffle state once
    Snapshot,
    /// Follow the raffle and relay achievements until interrupted
    Watch {
        /// Extra attempts per eligibility submission (0 keeps best effort)
        #[arg(long)]
        relay_retries: Option<u32>,
    },
    /// Pay the entrance fee and join the raffle
    Enter(WalletArgs),
    /// Check airdrop eligibility and claim it
    Claim {
        #[command(flatten)]
        wallet: WalletArgs,

        /// Airdrop tier passed to claimDefault
        #[arg(long)]
        tier: Option<u8>,

        /// Only report eligibility
        #[arg(long)]
        check_only: bool,
    },
    /// Inspect or record the deployment for the selected network
    #[command(subcommand)]
    Deployments(DeploymentsCommand),
}

#[derive(ClapArgs, Debug)]
struct WalletArgs {
    /// Keystore name
    #[arg(long)]
    wallet: String,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand, Debug)]
enum DeploymentsCommand {
    Show,
    Set {
        #[arg(long)]
        raffle: String,

        #[arg(long)]
        network_url: String,

        #[arg(long)]
        airdrop: Option<String>,

        #[arg(long)]
        eligibility_url: Option<String>,

        #[arg(long)]
        deployment_block: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_ref())?;

    let env = match (args.local, args.sepolia) {
        (_, true) => DeploymentEnv::Sepolia,
        _ => DeploymentEnv::Local,
    };
    let store = DeploymentStore::new(env);

    if let Command::Deployments(cmd) = &args.command {
        return run_deployments(&store, cmd);
    }

    let record = store.load().map_err(|e| eyre!(e))?;
    let overrides = Overrides {
        rpc_url: args.rpc_url.clone(),
        raffle_address: args.raffle_address.clone(),
        airdrop_address: args.airdrop_address.clone(),
        eligibility_url: args.eligibility_url.clone(),
        player_cap: args.player_cap,
        relay_retries: match &args.command {
            Command::Watch { relay_retries } => *relay_retries,
            _ => None,
        },
    };
    let config = resolve_sync_config(env, &overrides, record.as_ref())?;
    info!(%env, rpc = %config.rpc_url, raffle = %config.raffle_address, "starting raffle client");

    match args.command {
        Command::Snapshot => run_snapshot(&config).await,
        Command::Watch { .. } => run_watch(&config).await,
        Command::Enter(wallet) => run_enter(&config, &wallet).await,
        Command::Claim {
            wallet,
            tier,
            check_only,
        } => run_claim(&config, &wallet, tier, check_only).await,
        Command::Deployments(_) => Ok(()),
    }
}

fn init_logging(log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let Some(dir) = log_dir else {
        raffle_sync::init_tracing();
        return Ok(None);
    };
    let appender = tracing_appender::rolling::daily(dir, "raffle-cli.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install file logger: {e}"))?;
    Ok(Some(guard))
}

fn read_provider(config: &SyncConfig) -> DynProvider {
    ProviderBuilder::new()
        .connect_http(config.rpc_url.clone())
        .erased()
}

fn signing_provider(config: &SyncConfig, signer: PrivateKeySigner) -> DynProvider {
    ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(config.rpc_url.clone())
        .erased()
}

fn state_reader(
    config: &SyncConfig,
    provider: DynProvider,
) -> ContractStateReader<AlloyRaffle<DynProvider>> {
    ContractStateReader::new(
        AlloyRaffle::new(config.raffle_address, provider, config.confirmation_timeout),
        config.player_cap,
        config.rpc_timeout,
    )
}

fn unlock(wallet: &WalletArgs) -> Result<PrivateKeySigner> {
    let dir = resolve_keystore_dir(wallet.wallet_dir.as_deref())
        .wrap_err("resolving keystore directory")?;
    let descriptor = find_keystore(&dir, &wallet.wallet).wrap_err("locating keystore")?;
    unlock_keystore(&descriptor).wrap_err("unlocking keystore")
}

fn print_snapshot(snapshot: &RaffleSnapshot) {
    println!("Entrance fee: {}", snapshot.display_entrance_fee());
    println!("Prize pool:   {}", snapshot.display_prize_pool());
    println!("Players ({}):", snapshot.players.len());
    for player in &snapshot.players {
        println!("  {}", truncate_address(player));
    }
    match snapshot.display_winner() {
        Some(winner) => println!("Last winner:  {winner}"),
        None => println!("Last winner:  none yet"),
    }
}

async fn run_snapshot(config: &SyncConfig) -> Result<()> {
    let reader = state_reader(config, read_provider(config));
    let snapshot = reader
        .fetch_snapshot()
        .await
        .wrap_err("reading raffle state")?;
    print_snapshot(&snapshot);
    Ok(())
}

async fn run_watch(config: &SyncConfig) -> Result<()> {
    let provider = read_provider(config);
    let eligibility = EligibilityClient::new(config.eligibility_base(), config.http_timeout)
        .map_err(|e| eyre!(e))?;
    let relay = AchievementRelay::new(
        AchievementLedger::global(),
        Arc::new(eligibility),
        config.relay_policy,
        config.http_timeout,
    );
    let connector = AlloyEventConnector::new(
        provider.clone(),
        config.raffle_address,
        config.event_poll_interval,
    );
    let subscriptions = Arc::new(EventSubscriptionManager::for_contract(
        config.raffle_address,
        connector,
    ));
    let mut session = RaffleSession::new(
        Arc::new(state_reader(config, provider)),
        subscriptions,
        relay.clone(),
        config.refresh_interval,
    );

    session.activate().await;
    let mut updates = session.store().subscribe();
    print_snapshot(&session.store().current());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!();
                print_snapshot(&snapshot);
                println!("Achievement ledger: {} address(es)", relay.ledger().len());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    session.deactivate();
    Ok(())
}

async fn run_enter(config: &SyncConfig, wallet: &WalletArgs) -> Result<()> {
    let signer = unlock(wallet)?;
    let provider = signing_provider(config, signer);
    let writer = PromptApproval::new(
        AlloyRaffle::new(
            config.raffle_address,
            provider.clone(),
            config.confirmation_timeout,
        ),
        wallet.yes,
    );
    let service = EntryService::new(
        state_reader(config, provider.clone()),
        writer,
        config.enter_gas_limit,
    );

    match service.enter().await {
        EntryOutcome::Entered(tx_hash) => {
            println!("Entered the raffle in {tx_hash}");
            let snapshot = state_reader(config, provider)
                .fetch_snapshot()
                .await
                .wrap_err("refreshing raffle state")?;
            print_snapshot(&snapshot);
            Ok(())
        }
        EntryOutcome::UserRejected => {
            println!("Entry cancelled.");
            Ok(())
        }
        EntryOutcome::OtherFailure(detail) => Err(eyre!("entering the raffle failed: {detail}")),
    }
}

async fn run_claim(
    config: &SyncConfig,
    wallet: &WalletArgs,
    tier: Option<u8>,
    check_only: bool,
) -> Result<()> {
    let airdrop = config
        .airdrop_address
        .ok_or_else(|| eyre!("no airdrop address; pass --airdrop-address or record one"))?;
    let signer = unlock(wallet)?;
    let account = signer.address();
    let provider = signing_provider(config, signer);
    let eligibility = EligibilityClient::new(config.eligibility_base(), config.http_timeout)
        .map_err(|e| eyre!(e))?;
    let chain = PromptApproval::new(
        AlloyAirdrop::new(airdrop, provider, config.confirmation_timeout),
        wallet.yes,
    );
    let service = EligibilityClaimService::new(
        eligibility,
        chain,
        tier.unwrap_or(config.claim_tier),
        config.http_timeout,
    );

    let mut claim = EligibilityClaim::open(account);
    service.refresh(&mut claim).await;
    match &claim.status {
        ClaimStatus::Eligible => println!(
            "{} is eligible for {} wei",
            truncate_address(&account),
            claim.amount
        ),
        ClaimStatus::NotEligible => {
            println!("{} is not eligible.", truncate_address(&account));
            return Ok(());
        }
        ClaimStatus::Error(detail) => return Err(eyre!("eligibility check failed: {detail}")),
        ClaimStatus::Unchecked | ClaimStatus::AlreadyClaimed => return Ok(()),
    }
    if check_only {
        return Ok(());
    }

    match service.claim(&mut claim).await {
        ClaimOutcome::Success(tx_hash) => println!("Claimed in {tx_hash}"),
        ClaimOutcome::AlreadyClaimed => println!("This address has already claimed."),
        ClaimOutcome::UserRejected => println!("Claim cancelled."),
        ClaimOutcome::OtherFailure(detail) => return Err(eyre!("claim failed: {detail}")),
    }
    Ok(())
}

fn run_deployments(store: &DeploymentStore, cmd: &DeploymentsCommand) -> Result<()> {
    match cmd {
        DeploymentsCommand::Show => {
            match store.load().map_err(|e| eyre!(e))? {
                Some(record) => println!(
                    "{}",
                    serde_json::to_string_pretty(&record)
                        .wrap_err("formatting deployment record")?
                ),
                None => println!("No deployment recorded at {}", store.path().display()),
            }
            Ok(())
        }
        DeploymentsCommand::Set {
            raffle,
            network_url,
            airdrop,
            eligibility_url,
            deployment_block,
        } => {
            settings::parse_address(raffle, "raffle")?;
            if let Some(airdrop) = airdrop {
                settings::parse_address(airdrop, "airdrop")?;
            }
            let record = record_deployment(
                store,
                raffle,
                network_url,
                airdrop.as_deref(),
                eligibility_url.as_deref(),
                *deployment_block,
            )
            .map_err(|e| eyre!(e))?;
            println!("Recorded deployment at {}", record.recorded_at);
            Ok(())
        }
    }
}
