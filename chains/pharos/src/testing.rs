//! In-memory collaborators for engine tests.

use crate::client::{
    ChainClient, ClaimOutcome, Deployment, FaucetApi, FaucetStatus, LoginOutcome, SwapRouter,
    TxOutcome, WalletHandle,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::parse_ether;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn tx_hash(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub struct MockChain {
    balance: Mutex<U256>,
    balance_error: Mutex<Option<String>>,
    transfers: Mutex<Vec<(Address, U256)>>,
    transfer_attempts: AtomicU32,
    failing_transfers: AtomicU32,
    deployments: AtomicU32,
    call_value: Mutex<U256>,
    signed: Mutex<Vec<String>>,
}

impl MockChain {
    pub fn with_balance_ether(ether: f64) -> Self {
        Self {
            balance: Mutex::new(parse_ether(format!("{:.8}", ether)).unwrap()),
            balance_error: Mutex::new(None),
            transfers: Mutex::new(Vec::new()),
            transfer_attempts: AtomicU32::new(0),
            failing_transfers: AtomicU32::new(0),
            deployments: AtomicU32::new(0),
            call_value: Mutex::new(U256::from(42u64)),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance_ether(&self, ether: f64) {
        *self.balance.lock().unwrap() = parse_ether(format!("{:.8}", ether)).unwrap();
    }

    pub fn fail_balance(&self, message: &str) {
        *self.balance_error.lock().unwrap() = Some(message.to_string());
    }

    /// The next `n` transfers fail with a gateway error before reaching the chain.
    pub fn fail_next_transfers(&self, n: u32) {
        self.failing_transfers.store(n, Ordering::SeqCst);
    }

    pub fn set_call_value(&self, value: u64) {
        *self.call_value.lock().unwrap() = U256::from(value);
    }

    pub fn transfers(&self) -> Vec<(Address, U256)> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn transfer_attempts(&self) -> u32 {
        self.transfer_attempts.load(Ordering::SeqCst)
    }

    pub fn deployments(&self) -> u32 {
        self.deployments.load(Ordering::SeqCst)
    }

    pub fn signed_messages(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance(&self) -> Result<U256> {
        if let Some(msg) = self.balance_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        self.signed.lock().unwrap().push(message.to_string());
        Ok("0xsigned".to_string())
    }

    async fn transfer(&self, to: Address, value: U256) -> Result<TxOutcome> {
        let attempt = self.transfer_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let pending_failures = self.failing_transfers.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.failing_transfers.store(pending_failures - 1, Ordering::SeqCst);
            bail!("502 Bad Gateway");
        }

        let mut balance = self.balance.lock().unwrap();
        if *balance < value {
            bail!("insufficient funds for transfer");
        }
        *balance -= value;
        self.transfers.lock().unwrap().push((to, value));
        Ok(TxOutcome {
            tx_hash: tx_hash(attempt as u64),
            success: true,
        })
    }

    async fn deploy(&self, _bytecode: Bytes) -> Result<Deployment> {
        let n = self.deployments.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Deployment {
            address: Address::from_low_u64_be(0xC0DE + n as u64),
            tx_hash: tx_hash(1000 + n as u64),
        })
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        let mut word = [0u8; 32];
        self.call_value.lock().unwrap().to_big_endian(&mut word);
        Ok(Bytes::from(word.to_vec()))
    }
}

pub struct MockFaucet {
    login_ok: AtomicBool,
    claimable: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for MockFaucet {
    fn default() -> Self {
        Self {
            login_ok: AtomicBool::new(true),
            claimable: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockFaucet {
    pub fn set_login_ok(&self, ok: bool) {
        self.login_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_claimable(&self, claimable: bool) {
        self.claimable.store(claimable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaucetApi for MockFaucet {
    async fn login(&self, _address: Address, _signature: &str) -> Result<LoginOutcome> {
        self.calls.lock().unwrap().push("login");
        if self.login_ok.load(Ordering::SeqCst) {
            Ok(LoginOutcome::Token("jwt".to_string()))
        } else {
            Ok(LoginOutcome::Rejected("bad signature".to_string()))
        }
    }

    async fn status(&self, _address: Address, _token: &str) -> Result<FaucetStatus> {
        self.calls.lock().unwrap().push("status");
        Ok(FaucetStatus {
            claimable: self.claimable.load(Ordering::SeqCst),
            message: "ok".to_string(),
        })
    }

    async fn claim(&self, _address: Address, _token: &str) -> Result<ClaimOutcome> {
        self.calls.lock().unwrap().push("claim");
        Ok(ClaimOutcome {
            success: true,
            message: "ok".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedSwap {
    pub native: bool,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub path: Vec<Address>,
}

/// Router with 18 decimals everywhere that quotes every pair at 2:1.
#[derive(Default)]
pub struct MockRouter {
    balances: Mutex<HashMap<Address, U256>>,
    allowances: Mutex<HashMap<Address, U256>>,
    approvals: AtomicU32,
    swaps: Mutex<Vec<RecordedSwap>>,
}

impl MockRouter {
    pub fn set_token_balance(&self, token: Address, amount: U256) {
        self.balances.lock().unwrap().insert(token, amount);
    }

    pub fn swaps(&self) -> Vec<RecordedSwap> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn approvals(&self) -> u32 {
        self.approvals.load(Ordering::SeqCst)
    }

    fn record(&self, swap: RecordedSwap) -> TxOutcome {
        let mut swaps = self.swaps.lock().unwrap();
        swaps.push(swap);
        TxOutcome {
            tx_hash: tx_hash(5000 + swaps.len() as u64),
            success: true,
        }
    }
}

#[async_trait]
impl SwapRouter for MockRouter {
    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn decimals(&self, _token: Address) -> Result<u8> {
        Ok(18)
    }

    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<Option<H256>> {
        let mut allowances = self.allowances.lock().unwrap();
        if allowances.get(&token).copied().unwrap_or_default() >= amount {
            return Ok(None);
        }
        allowances.insert(token, U256::MAX);
        let n = self.approvals.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(tx_hash(9000 + n as u64)))
    }

    async fn quote(&self, amount_in: U256, path: Vec<Address>) -> Result<Vec<U256>> {
        Ok(vec![amount_in; path.len().saturating_sub(1)]
            .into_iter()
            .chain(std::iter::once(amount_in * 2))
            .collect())
    }

    async fn swap_exact_tokens(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        _recipient: Address,
        _deadline: U256,
    ) -> Result<TxOutcome> {
        Ok(self.record(RecordedSwap {
            native: false,
            amount_in,
            amount_out_min,
            path,
        }))
    }

    async fn swap_exact_native(
        &self,
        value: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        _recipient: Address,
        _deadline: U256,
    ) -> Result<TxOutcome> {
        Ok(self.record(RecordedSwap {
            native: true,
            amount_in: value,
            amount_out_min,
            path,
        }))
    }
}

/// One wallet's worth of mocks, kept alongside the handle for assertions.
pub struct Mocks {
    pub chain: Arc<MockChain>,
    pub faucet: Arc<MockFaucet>,
    pub router: Arc<MockRouter>,
}

impl Mocks {
    pub fn new(balance_ether: f64) -> Self {
        Self {
            chain: Arc::new(MockChain::with_balance_ether(balance_ether)),
            faucet: Arc::new(MockFaucet::default()),
            router: Arc::new(MockRouter::default()),
        }
    }

    pub fn handle(&self, index: usize) -> WalletHandle {
        WalletHandle {
            id: WalletHandle::format_id(index),
            address: Address::from_low_u64_be(0xA11CE + index as u64),
            chain: self.chain.clone(),
            faucet: self.faucet.clone(),
            router: self.router.clone(),
        }
    }
}
