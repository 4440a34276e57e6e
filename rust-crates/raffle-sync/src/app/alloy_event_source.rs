use crate::{
    Result,
    app::event_source::{
        EventConnector,
        EventSource,
    },
    events::{
        RaffleEvent,
        parse_raffle_log,
        raffle_log_filter,
    },
};
use alloy::{
    primitives::Address,
    providers::Provider,
    rpc::types::Log,
};
use anyhow::Context;
use futures::{
    Stream,
    StreamExt,
};
use std::{
    pin::Pin,
    time::Duration,
};
use tracing::info;

/// Installs an `eth_newFilter` for the raffle's events and polls it.
pub struct AlloyEventConnector<P> {
    provider: P,
    raffle: Address,
    poll_interval: Duration,
}

impl<P> AlloyEventConnector<P> {
    pub fn new(provider: P, raffle: Address, poll_interval: Duration) -> Self {
        Self {
            provider,
            raffle,
            poll_interval,
        }
    }
}

impl<P: Provider + Clone + 'static> EventConnector for AlloyEventConnector<P> {
    type Source = AlloyEventSource;

    async fn connect(&self) -> Result<AlloyEventSource> {
        let filter = raffle_log_filter(self.raffle);
        let poller = self
            .provider
            .watch_logs(&filter)
            .await
            .with_context(|| format!("installing log filter for raffle {}", self.raffle))?;
        info!(raffle = %self.raffle, "raffle log filter installed");
        let stream = poller.with_poll_interval(self.poll_interval).into_stream();
        Ok(AlloyEventSource {
            logs: Box::pin(stream),
        })
    }
}

pub struct AlloyEventSource {
    logs: Pin<Box<dyn Stream<Item = Vec<Log>> + Send>>,
}

impl EventSource for AlloyEventSource {
    async fn next_events(&mut self) -> Result<Option<Vec<RaffleEvent>>> {
        let Some(logs) = self.logs.next().await else {
            return Ok(None);
        };
        let events = logs.iter().filter_map(parse_raffle_log).collect();
        Ok(Some(events))
    }
}
