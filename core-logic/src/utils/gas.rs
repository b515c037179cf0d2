//! # Core Logic - Gas Configuration
//!
//! Gas limits for the operations the bots submit. Fee pricing is left to the
//! node's estimates; only the limits are pinned.

use serde::Deserialize;

/// Configuration for gas management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub limit_deploy: u64,
    pub limit_transfer: u64,
    pub limit_approve: u64,
    pub limit_swap: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            limit_deploy: 1_200_000,
            limit_transfer: 21_000,
            limit_approve: 100_000,
            limit_swap: 500_000,
        }
    }
}
