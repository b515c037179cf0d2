//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("Counter store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Network(NetworkError),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Store(e)
    }
}

impl From<WalletError> for CoreError {
    fn from(e: WalletError) -> Self {
        CoreError::Wallet(e)
    }
}

impl From<NetworkError> for CoreError {
    fn from(e: NetworkError) -> Self {
        CoreError::Network(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Wallet loading errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("No wallets configured: set PRIVATE_KEY_1, PRIVATE_KEY_2, ... or provide pv.txt")]
    NoWallets,

    #[error("Invalid private key format for {label}: expected hex string")]
    InvalidKeyFormat { label: String },

    #[error("Private key too short for {label}: expected 64 hex chars, got {length}")]
    InvalidKeyLength { label: String, length: usize },
}

/// Persistent counter store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Counter file {path} is corrupted: {source}")]
    Corrupted {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {msg}")]
    Write { path: String, msg: String },
}

/// Network, RPC and HTTP errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Connection refused to {endpoint}: {reason}")]
    ConnectionRefused { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// The node answered with a body that is not JSON-RPC at all, typically
    /// a 5xx page from the node or a gateway in front of it.
    #[error("Unreadable reply from {endpoint}: {reason}")]
    UnreadableReply { endpoint: String, reason: String },
}

impl NetworkError {
    /// Transport-level faults that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout { .. }
            | NetworkError::ConnectionRefused { .. }
            | NetworkError::UnreadableReply { .. } => true,
            NetworkError::HttpError { status_code, .. } => *status_code >= 500,
            NetworkError::RateLimited { .. } | NetworkError::InvalidResponse { .. } => false,
        }
    }
}
