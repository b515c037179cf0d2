//! Collaborators the tasks talk to: the chain (signing + RPC), the faucet
//! HTTP API and the DEX router. Tasks only see these traits, so the relay
//! engine runs against in-memory doubles in tests.

pub mod evm;
pub mod faucet;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::fmt;
use std::sync::Arc;

pub use evm::{EvmClient, EvmRouter};
pub use faucet::FaucetClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: H256,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: H256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Token(String),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetStatus {
    pub claimable: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance of the signing wallet, in wei.
    async fn balance(&self) -> Result<U256>;

    /// EIP-191 personal signature, `0x`-prefixed hex.
    async fn sign_message(&self, message: &str) -> Result<String>;

    /// Sends native value and waits for the receipt.
    async fn transfer(&self, to: Address, value: U256) -> Result<TxOutcome>;

    /// Submits a contract creation transaction and waits for the receipt.
    async fn deploy(&self, bytecode: Bytes) -> Result<Deployment>;

    /// Read-only `eth_call`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

#[async_trait]
pub trait FaucetApi: Send + Sync {
    async fn login(&self, address: Address, signature: &str) -> Result<LoginOutcome>;
    async fn status(&self, address: Address, token: &str) -> Result<FaucetStatus>;
    async fn claim(&self, address: Address, token: &str) -> Result<ClaimOutcome>;
}

/// Uniswap-V2 style router plus the ERC-20 calls a swap needs.
#[async_trait]
pub trait SwapRouter: Send + Sync {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    async fn decimals(&self, token: Address) -> Result<u8>;

    /// Approves the router for `U256::MAX` when the current allowance is below
    /// `amount`. Returns the approval hash when a transaction was sent.
    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<Option<H256>>;

    async fn quote(&self, amount_in: U256, path: Vec<Address>) -> Result<Vec<U256>>;

    async fn swap_exact_tokens(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    ) -> Result<TxOutcome>;

    async fn swap_exact_native(
        &self,
        value: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    ) -> Result<TxOutcome>;
}

/// One wallet's identity and connections, built once at startup.
#[derive(Clone)]
pub struct WalletHandle {
    /// Zero-padded index used in log lines (`[WL:001]`).
    pub id: String,
    pub address: Address,
    pub chain: Arc<dyn ChainClient>,
    pub faucet: Arc<dyn FaucetApi>,
    pub router: Arc<dyn SwapRouter>,
}

impl WalletHandle {
    pub fn format_id(index: usize) -> String {
        format!("{:03}", index + 1)
    }

    /// EIP-55 checksummed address, used as the counter store key.
    pub fn checksum_address(&self) -> String {
        ethers::utils::to_checksum(&self.address, None)
    }
}

impl fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// reqwest client routed through the wallet's proxy, shared by the RPC
/// transport and the faucet API.
pub fn proxied_http_client(
    proxy: Option<&core_logic::ProxyConfig>,
    timeout: std::time::Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy_conf) = proxy {
        let mut proxy = reqwest::Proxy::all(&proxy_conf.url)?;
        if let (Some(u), Some(p)) = (&proxy_conf.username, &proxy_conf.password) {
            proxy = proxy.basic_auth(u, p);
        }
        builder = builder.proxy(proxy);
    }
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    Ok(builder.build()?)
}
