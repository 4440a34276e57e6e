use crate::{
    app::eligibility_client::BackendError,
    ledger::AchievementLedger,
};
use alloy::primitives::{
    Address,
    U256,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{
    debug,
    warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayPolicy {
    /// One attempt per submission; failures are logged and dropped.
    #[default]
    BestEffort,
    BoundedRetry { attempts: u32, backoff: Duration },
}

impl RelayPolicy {
    fn attempts(&self) -> u32 {
        match self {
            RelayPolicy::BestEffort => 1,
            RelayPolicy::BoundedRetry { attempts, .. } => (*attempts).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementRecord {
    pub player: Address,
    pub achievement_id: U256,
}

/// Full ledger contents sent after each accepted achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBatch {
    pub addresses: Vec<Address>,
    pub total_count: usize,
}

impl AddressBatch {
    pub fn from_ledger(ledger: &AchievementLedger) -> Self {
        let addresses = ledger.addresses();
        let total_count = addresses.len();
        Self {
            addresses,
            total_count,
        }
    }
}

pub trait RelayBackend: Send + Sync + 'static {
    fn submit_achievement(
        &self,
        record: &AchievementRecord,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn submit_addresses(
        &self,
        batch: &AddressBatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Achievement,
    Reconciliation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReport {
    Delivered { batch_size: usize },
    Dropped { stage: RelayStage, error: BackendError },
}

pub struct AchievementRelay<B> {
    ledger: Arc<AchievementLedger>,
    backend: Arc<B>,
    policy: RelayPolicy,
    call_timeout: Duration,
}

impl<B> Clone for AchievementRelay<B> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            backend: self.backend.clone(),
            policy: self.policy,
            call_timeout: self.call_timeout,
        }
    }
}

impl<B: RelayBackend> AchievementRelay<B> {
    pub fn new(
        ledger: Arc<AchievementLedger>,
        backend: Arc<B>,
        policy: RelayPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            backend,
            policy,
            call_timeout,
        }
    }

    pub fn ledger(&self) -> &Arc<AchievementLedger> {
        &self.ledger
    }

    /// Records the address in the ledger before returning, then relays in the background.
    pub fn on_achievement_event(
        &self,
        player: Address,
        achievement_id: U256,
    ) -> JoinHandle<RelayReport> {
        let update = self.ledger.record(player, achievement_id);
        debug!(%player, %achievement_id, ledger_len = update.len, "achievement recorded");
        let record = AchievementRecord {
            player,
            achievement_id,
        };
        let relay = self.clone();
        tokio::spawn(async move { relay.relay(record).await })
    }

    /// Submits the achievement and, only if that was accepted, the full address list.
    pub async fn relay(&self, record: AchievementRecord) -> RelayReport {
        let submitted = self
            .with_policy(|| self.backend.submit_achievement(&record))
            .await;
        if let Err(error) = submitted {
            warn!(player = %record.player, %error, "achievement submission dropped");
            return RelayReport::Dropped {
                stage: RelayStage::Achievement,
                error,
            };
        }

        let batch = AddressBatch::from_ledger(&self.ledger);
        match self
            .with_policy(|| self.backend.submit_addresses(&batch))
            .await
        {
            Ok(()) => RelayReport::Delivered {
                batch_size: batch.total_count,
            },
            Err(error) => {
                warn!(total = batch.total_count, %error, "address list submission dropped");
                RelayReport::Dropped {
                    stage: RelayStage::Reconciliation,
                    error,
                }
            }
        }
    }

    async fn with_policy<F, Fut>(&self, submit: F) -> Result<(), BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), BackendError>>,
    {
        let attempts = self.policy.attempts();
        let mut last_error = BackendError::Timeout(self.call_timeout);
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.call_timeout, submit()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => last_error = err,
                Err(_) => last_error = BackendError::Timeout(self.call_timeout),
            }
            if let RelayPolicy::BoundedRetry { backoff, .. } = self.policy
                && attempt < attempts
            {
                debug!(attempt, %last_error, "retrying eligibility submission");
                tokio::time::sleep(backoff).await;
            }
        }
        Err(last_error)
    }
}
