//! Pharos testnet relay bot: claims the faucet, deploys a storage contract,
//! swaps on the DEX router and sends transfer batches, cycling the configured
//! sequence across every funded wallet.

pub mod client;
pub mod config;
pub mod relay;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;
