use alloy::{
    primitives::{
        Address,
        B256,
        U256,
    },
    rpc::types::{
        Filter,
        Log,
    },
    sol_types::SolEvent,
};
use generated_abi::raffle_types::IRaffle;

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum RaffleEvent {
    WinnerPicked(WinnerPickedEvent),
    PlayerEntered(PlayerEnteredEvent),
    AchievementEarned(AchievementEarnedEvent),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct WinnerPickedEvent {
    pub winner: Address,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PlayerEnteredEvent {
    pub player: Address,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct AchievementEarnedEvent {
    pub player: Address,
    pub achievement_id: U256,
}

impl RaffleEvent {
    pub fn winner_picked(winner: Address) -> Self {
        RaffleEvent::WinnerPicked(WinnerPickedEvent { winner })
    }

    pub fn player_entered(player: Address) -> Self {
        RaffleEvent::PlayerEntered(PlayerEnteredEvent { player })
    }

    pub fn achievement_earned(player: Address, achievement_id: U256) -> Self {
        RaffleEvent::AchievementEarned(AchievementEarnedEvent {
            player,
            achievement_id,
        })
    }
}

/// Topic0 values of every raffle log the synchronizer consumes.
pub fn raffle_event_signatures() -> Vec<B256> {
    vec![
        IRaffle::WinnerPicked::SIGNATURE_HASH,
        IRaffle::AchievementEarned::SIGNATURE_HASH,
        IRaffle::RaffleEntered::SIGNATURE_HASH,
    ]
}

pub fn raffle_log_filter(raffle: Address) -> Filter {
    Filter::new()
        .address(raffle)
        .event_signature(raffle_event_signatures())
}

pub fn parse_raffle_log(log: &Log) -> Option<RaffleEvent> {
    let topic0 = *log.topic0()?;
    if topic0 == IRaffle::WinnerPicked::SIGNATURE_HASH {
        let decoded = log.log_decode::<IRaffle::WinnerPicked>().ok()?;
        return Some(RaffleEvent::winner_picked(decoded.inner.data.winner));
    }
    if topic0 == IRaffle::AchievementEarned::SIGNATURE_HASH {
        let decoded = log.log_decode::<IRaffle::AchievementEarned>().ok()?;
        let event = decoded.inner.data;
        return Some(RaffleEvent::achievement_earned(
            event.player,
            event.achievementId,
        ));
    }
    if topic0 == IRaffle::RaffleEntered::SIGNATURE_HASH {
        let decoded = log.log_decode::<IRaffle::RaffleEntered>().ok()?;
        return Some(RaffleEvent::player_entered(decoded.inner.data.player));
    }
    tracing::trace!(?topic0, "ignoring unrelated raffle log");
    None
}
