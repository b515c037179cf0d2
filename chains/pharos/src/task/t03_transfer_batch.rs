use crate::task::{param_u64, Task, TaskContext, TaskResult};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::{is_retryable, with_retry_if, UniformRange, RetryConfig};
use ethers::types::{Address, U256};
use ethers::utils::{format_ether, parse_ether};
use rand::Rng;
use serde_json::json;
use std::fmt;
use tracing::{info, warn};

/// Raised inside a transfer attempt when the wallet cannot cover the amount.
/// Never retried; ends the batch.
#[derive(Debug)]
struct InsufficientFunds {
    balance: U256,
    needed: U256,
}

impl fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient balance: have {} PHRS, need {} PHRS",
            format_ether(self.balance),
            format_ether(self.needed)
        )
    }
}

impl std::error::Error for InsufficientFunds {}

fn is_insufficient(error: &anyhow::Error) -> bool {
    error.downcast_ref::<InsufficientFunds>().is_some()
}

pub fn random_recipient<R: Rng + ?Sized>(rng: &mut R) -> Address {
    Address::from(rng.gen::<[u8; 20]>())
}

/// Native amounts are rounded to 8 decimals before conversion to wei.
pub fn ether_to_wei(amount: f64) -> Result<U256> {
    Ok(parse_ether(format!("{:.8}", amount))?)
}

/// Sends `count` small native transfers to fresh random addresses.
pub struct TransferBatchTask {
    amount_range: UniformRange,
    pause: UniformRange,
    retry: RetryConfig,
}

impl TransferBatchTask {
    pub fn new(amount_range: UniformRange, pause: UniformRange, retry: RetryConfig) -> Self {
        Self {
            amount_range,
            pause,
            retry,
        }
    }
}

#[async_trait]
impl Task<TaskContext> for TransferBatchTask {
    fn name(&self) -> &str {
        "transferBatch"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let count = param_u64(&ctx.params, "count").unwrap_or(1);
        let chain = &ctx.wallet.chain;
        let mut sent = 0u64;
        let mut last_tx = None;

        for i in 0..count {
            let (recipient, amount) = {
                let mut rng = rand::thread_rng();
                (random_recipient(&mut rng), self.amount_range.sample(&mut rng))
            };
            let value = ether_to_wei(amount)?;

            let result = with_retry_if(
                &self.retry,
                "transfer",
                |e| !is_insufficient(e) && is_retryable(e),
                || async move {
                    let balance = chain.balance().await?;
                    if balance < value {
                        return Err(InsufficientFunds {
                            balance,
                            needed: value,
                        }
                        .into());
                    }
                    chain.transfer(recipient, value).await
                },
            )
            .await;

            match result {
                Ok(outcome) if outcome.success => {
                    sent += 1;
                    last_tx = Some(format!("{:?}", outcome.tx_hash));
                    info!(
                        "[WL:{}] Transfer {}/{}: {:.8} PHRS to {:?}",
                        ctx.wallet.id,
                        i + 1,
                        count,
                        amount,
                        recipient
                    );
                }
                Ok(outcome) => {
                    warn!(
                        "[WL:{}] Transfer {}/{} reverted ({:?})",
                        ctx.wallet.id,
                        i + 1,
                        count,
                        outcome.tx_hash
                    );
                }
                Err(e) if is_insufficient(&e) => {
                    warn!("[WL:{}] {}, stopping batch", ctx.wallet.id, e);
                    break;
                }
                Err(e) => {
                    warn!(
                        "[WL:{}] Transfer {}/{} failed: {:#}",
                        ctx.wallet.id,
                        i + 1,
                        count,
                        e
                    );
                }
            }

            if i + 1 < count {
                let pause = self.pause.sample_secs(&mut rand::thread_rng());
                tokio::time::sleep(pause).await;
            }
        }

        let mut result = TaskResult::ok(format!("sent {}/{} transfers", sent, count))
            .with_data(json!({ "sent": sent, "requested": count }));
        if let Some(tx) = last_tx {
            result = result.with_tx(tx);
        }
        Ok(result)
    }
}
