use crate::client::LoginOutcome;
use crate::task::{Task, TaskContext, TaskResult};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Message the faucet API expects to be signed at login.
pub const LOGIN_MESSAGE: &str = "pharos";

/// Claims the daily faucet through the HTTP API.
///
/// The service's own status check decides whether a claim is possible. The
/// local cache only skips the round trip for wallets that claimed recently
/// in this process.
pub struct ClaimFaucetTask {
    cooldown: Duration,
    last_claims: Mutex<HashMap<Address, Instant>>,
}

impl ClaimFaucetTask {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_claims: Mutex::new(HashMap::new()),
        }
    }

    fn cooldown_remaining(&self, address: Address) -> Option<Duration> {
        let claims = self.last_claims.lock().ok()?;
        let elapsed = claims.get(&address)?.elapsed();
        self.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    fn record_claim(&self, address: Address) {
        if let Ok(mut claims) = self.last_claims.lock() {
            claims.insert(address, Instant::now());
        }
    }
}

#[async_trait]
impl Task<TaskContext> for ClaimFaucetTask {
    fn name(&self) -> &str {
        "claimFaucet"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let wallet = &ctx.wallet;
        let address = wallet.address;

        if let Some(remaining) = self.cooldown_remaining(address) {
            return Ok(TaskResult::rejected(format!(
                "Claimed recently, {:.1}h of cooldown left",
                remaining.as_secs_f64() / 3600.0
            )));
        }

        let signature = wallet.chain.sign_message(LOGIN_MESSAGE).await?;
        let token = match wallet.faucet.login(address, &signature).await? {
            LoginOutcome::Token(token) => token,
            LoginOutcome::Rejected(msg) => {
                return Ok(TaskResult::rejected(format!("Faucet login rejected: {}", msg)));
            }
        };
        debug!("[WL:{}] faucet login ok", wallet.id);

        let status = wallet.faucet.status(address, &token).await?;
        if !status.claimable {
            return Ok(TaskResult::rejected(format!(
                "Faucet on cooldown: {}",
                status.message
            )));
        }

        let claim = wallet.faucet.claim(address, &token).await?;
        if !claim.success {
            return Ok(TaskResult::rejected(format!("Claim refused: {}", claim.message)));
        }

        self.record_claim(address);
        Ok(TaskResult::ok("Daily faucet claimed"))
    }
}
