pub mod alloy_contracts;
pub mod alloy_event_source;
pub mod claim;
pub mod contract_reader;
pub mod eligibility_client;
pub mod entry;
pub mod event_source;
pub mod relay;
pub mod session;
pub mod snapshot_store;
pub mod subscription;

#[cfg(test)]
mod tests;
