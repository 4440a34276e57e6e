use alloy::primitives::{
    Address,
    U256,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        OnceLock,
        PoisonError,
    },
};

static GLOBAL_LEDGER: OnceLock<Arc<AchievementLedger>> = OnceLock::new();

/// Every address seen earning an achievement during this process, in first-seen order.
///
/// Entries are only ever added. The highest achievement id per address is kept
/// alongside.
#[derive(Debug, Default)]
pub struct AchievementLedger {
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    order: Vec<Address>,
    highest: HashMap<Address, U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub newly_added: bool,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub address: Address,
    pub highest_achievement: U256,
}

impl AchievementLedger {
    /// Process-wide ledger shared by every screen.
    pub fn global() -> Arc<AchievementLedger> {
        GLOBAL_LEDGER
            .get_or_init(|| Arc::new(AchievementLedger::default()))
            .clone()
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, player: Address, achievement_id: U256) -> LedgerUpdate {
        let mut state = self.lock();
        let newly_added = match state.highest.get_mut(&player) {
            Some(highest) => {
                if achievement_id > *highest {
                    *highest = achievement_id;
                }
                false
            }
            None => {
                state.highest.insert(player, achievement_id);
                state.order.push(player);
                true
            }
        };
        LedgerUpdate {
            newly_added,
            len: state.order.len(),
        }
    }

    pub fn contains(&self, player: &Address) -> bool {
        self.lock().highest.contains_key(player)
    }

    pub fn highest_achievement(&self, player: &Address) -> Option<U256> {
        self.lock().highest.get(player).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.lock().order.clone()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|address| {
                state.highest.get(address).map(|highest| LedgerEntry {
                    address: *address,
                    highest_achievement: *highest,
                })
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lowercase hex form used for every address sent to the eligibility service.
pub fn normalize_address(address: &Address) -> String {
    address.to_string().to_lowercase()
}
