use crate::config::LimitPolicy;
use crate::task::{Task, TaskContext, TaskResult};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::CounterStore;
use ethers::types::{Bytes, U256};
use serde_json::json;
use tracing::debug;

/// Minimal storage contract. The constructor writes 42 to slot 0 and the
/// runtime returns slot 0 for any call, so `getValue()` reads it back.
pub const STORAGE_CONTRACT_BYTECODE: &str = "602a600055600b8060106000396000f360005460005260206000f3";
pub const STORED_VALUE: u64 = 42;

pub struct DeployContractTask {
    store: CounterStore,
    limit: u32,
    policy: LimitPolicy,
}

impl DeployContractTask {
    pub fn new(store: CounterStore, limit: u32, policy: LimitPolicy) -> Self {
        Self {
            store,
            limit,
            policy,
        }
    }
}

#[async_trait]
impl Task<TaskContext> for DeployContractTask {
    fn name(&self) -> &str {
        "deployContract"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let key = ctx.wallet.checksum_address();
        let count = self.store.count(&key);

        if count >= self.limit {
            let msg = format!("Deployment limit reached ({}/{})", count, self.limit);
            return Ok(match self.policy {
                LimitPolicy::Block => TaskResult::rejected(msg),
                LimitPolicy::Skip => TaskResult::ok(format!("{}, skipped", msg)),
            });
        }

        let bytecode = Bytes::from(ethers::utils::hex::decode(STORAGE_CONTRACT_BYTECODE)?);
        let deployment = ctx.wallet.chain.deploy(bytecode).await?;
        let tx_hash = format!("{:?}", deployment.tx_hash);
        debug!("[WL:{}] deployed at {:?}", ctx.wallet.id, deployment.address);

        // getValue() must return the constructor value
        let selector = Bytes::from(ethers::utils::id("getValue()")[..4].to_vec());
        let raw = ctx.wallet.chain.call(deployment.address, selector).await?;
        let value = if raw.len() >= 32 {
            U256::from_big_endian(&raw[..32])
        } else {
            U256::zero()
        };

        if value != U256::from(STORED_VALUE) {
            return Ok(TaskResult::rejected(format!(
                "Contract at {:?} failed liveness check (getValue = {})",
                deployment.address, value
            ))
            .with_tx(tx_hash));
        }

        let new_count = self.store.increment(&key, self.limit);
        Ok(TaskResult::ok(format!(
            "Deployed storage contract {:?} ({}/{})",
            deployment.address, new_count, self.limit
        ))
        .with_tx(tx_hash)
        .with_data(json!({
            "address": format!("{:?}", deployment.address),
            "deployments": new_count,
        })))
    }
}
