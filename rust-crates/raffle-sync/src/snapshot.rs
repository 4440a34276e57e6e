use alloy::primitives::{
    Address,
    U256,
    utils::format_ether,
};

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// What the raffle screen shows: fee, participants in contract order and the
/// last winner, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaffleSnapshot {
    pub entrance_fee: Option<U256>,
    pub players: Vec<Address>,
    pub winner: Option<Address>,
}

impl RaffleSnapshot {
    pub fn prize_pool(&self) -> U256 {
        match self.entrance_fee {
            Some(fee) => fee.saturating_mul(U256::from(self.players.len())),
            None => U256::ZERO,
        }
    }

    pub fn display_entrance_fee(&self) -> String {
        match self.entrance_fee {
            Some(fee) => format!("{} ETH", format_ether_compact(fee)),
            None => "Loading...".to_string(),
        }
    }

    pub fn display_prize_pool(&self) -> String {
        if self.entrance_fee.is_none() || self.players.is_empty() {
            return "0 ETH".to_string();
        }
        format!("{} ETH", format_ether_two_decimals(self.prize_pool()))
    }

    pub fn display_winner(&self) -> Option<String> {
        self.winner.as_ref().map(truncate_address)
    }

    /// Applies a confirmed draw: the winner is known and the round's entrants are gone.
    pub fn settle_winner(&mut self, winner: Address) {
        self.winner = Some(winner);
        self.players.clear();
    }
}

/// `0x1234...abcd` form of a checksummed address.
pub fn truncate_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Ether amount without trailing zeros, keeping at least one fractional digit.
pub fn format_ether_compact(wei: U256) -> String {
    let formatted = format_ether(wei);
    let Some((whole, fraction)) = formatted.split_once('.') else {
        return format!("{formatted}.0");
    };
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Ether amount rounded half-up to two decimals.
pub fn format_ether_two_decimals(wei: U256) -> String {
    let unit = U256::from(WEI_PER_ETHER);
    let hundredths = (wei.saturating_mul(U256::from(100)) + unit / U256::from(2)) / unit;
    let whole = hundredths / U256::from(100);
    let cents = (hundredths % U256::from(100)).to::<u64>();
    format!("{whole}.{cents:02}")
}
