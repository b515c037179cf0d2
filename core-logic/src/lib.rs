//! # Core Logic - Shared Utilities for Testnet Bots
//!
//! This crate provides the infrastructure shared by the chain crates:
//! retry policy, persistent counters, wallet and proxy loading, logging.
//!
//! ## Modules
//!
//! - [`config`] - Shared configuration primitives
//! - [`counter_store`] - Durable per-wallet counters in a JSON file
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Step outcome metrics
//! - [`traits`] - Core trait definitions
//! - [`utils`] - Utility modules (retry, wallet, proxy, gas, logging)

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod counter_store;
pub mod error;
pub mod metrics;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{saturating_secs, ProxyConfig, UniformRange};
pub use counter_store::{CounterStore, Counts};
pub use error::{ConfigError, CoreError, NetworkError, StoreError, WalletError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use traits::{FailureKind, Task, TaskResult};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{setup_logger, GasConfig, ProxyManager, WalletKey, WalletManager};

// Export retry utilities for the chain crates and tests
pub use utils::retry::{is_retryable, with_retry, with_retry_if, RetryConfig};
