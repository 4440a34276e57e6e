use alloy::primitives::{
    Address,
    address,
};

pub mod raffle_types {
    alloy::sol! {
        #[allow(missing_docs)]
        #[sol(rpc)]
        #[derive(Debug, PartialEq, Eq)]
        interface IRaffle {
            event RaffleEntered(address indexed player);
            event WinnerPicked(address indexed winner);
            event AchievementEarned(address indexed player, uint256 indexed achievementId);

            error Raffle_RaffleNotOpen();
            error Raffle_SendMoreToEnterRaffle();
            error Raffle_TransferFailed();
            error Raffle_UpkeepNotNeeded(uint256 balance, uint256 playersLength, uint256 state);
            error ZeroAddress();

            function enterRaffle() external payable;
            function getEntranceFee() external view returns (uint256);
            function getPlayer(uint256 indexOfPlayer) external view returns (address);
            function getWinner() external view returns (address);
            function getRaffleState() external view returns (uint8);
        }
    }
}

pub mod airdrop_types {
    alloy::sol! {
        #[allow(missing_docs)]
        #[sol(rpc)]
        #[derive(Debug, PartialEq, Eq)]
        interface IMerkleAirdrop {
            event Claimed(address indexed account, uint256 amount);

            error MerkleAirdrop__AlreadyClaimed();
            error MerkleAirdrop__InvalidProof();

            function claimDefault(address account, uint8 tier, bytes32[] calldata merkleProof) external;
        }
    }
}

/// Raffle contract address of the local development deployment.
pub const LOCAL_RAFFLE_ADDRESS: Address =
    address!("Dc64a140Aa3E981100a9becA4E685f962f0cF6C9");

/// Name fragment of the airdrop revert raised for an account that already claimed.
pub const ALREADY_CLAIMED_REVERT: &str = "AlreadyClaimed";

pub fn raffle_instance<P>(address: Address, provider: P) -> raffle_types::IRaffle::IRaffleInstance<P>
where
    P: alloy::providers::Provider,
{
    raffle_types::IRaffle::new(address, provider)
}

pub fn airdrop_instance<P>(
    address: Address,
    provider: P,
) -> airdrop_types::IMerkleAirdrop::IMerkleAirdropInstance<P>
where
    P: alloy::providers::Provider,
{
    airdrop_types::IMerkleAirdrop::new(address, provider)
}
