use crate::client::WalletHandle;
use crate::task::{ActionKind, ActionRegistry, ActionStep};
use core_logic::{is_retryable, with_retry, FailureKind, MetricsCollector, RetryConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Ordered steps shared read-only by every wallet in a cycle.
pub type TaskSequence = Arc<[ActionStep]>;

const MSG_LIMIT: usize = 125;

#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub kind: ActionKind,
    pub success: bool,
    pub message: String,
    pub tx_hash: Option<String>,
    pub failure: Option<FailureKind>,
    pub duration: Duration,
}

fn clip(message: &str) -> String {
    let flat = message.replace('\n', " | ");
    if flat.chars().count() > MSG_LIMIT {
        let truncated: String = flat.chars().take(MSG_LIMIT - 3).collect();
        format!("{}...", truncated)
    } else {
        flat
    }
}

/// A wallet's position in the sequence. `cursor == sequence.len()` means
/// the wallet is done for this cycle.
pub struct WalletTask {
    wallet: WalletHandle,
    sequence: TaskSequence,
    cursor: usize,
}

impl WalletTask {
    pub fn new(wallet: WalletHandle, sequence: TaskSequence) -> Self {
        Self {
            wallet,
            sequence,
            cursor: 0,
        }
    }

    pub fn wallet(&self) -> &WalletHandle {
        &self.wallet
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.sequence.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Runs the step under the cursor through the retry policy and advances
    /// the cursor whatever the outcome. Returns `None` once finished.
    pub async fn execute_next_step(
        &mut self,
        registry: &ActionRegistry,
        retry: &RetryConfig,
        metrics: &MetricsCollector,
    ) -> Option<StepReport> {
        let sequence = Arc::clone(&self.sequence);
        let index = self.cursor;
        let step = sequence.get(index)?;

        let name = registry.task_name(&step.kind).to_string();
        let wallet = &self.wallet;
        info!(
            target: "relay",
            "[WL:{}] Step {}/{}: {}",
            wallet.id,
            index + 1,
            sequence.len(),
            name
        );

        let start = Instant::now();
        let op_name = format!("[WL:{}] {}", wallet.id, name);
        let result = with_retry(retry, &op_name, || {
            registry.execute(&step.kind, wallet, &step.params)
        })
        .await;
        let duration = start.elapsed();

        let (success, message, tx_hash, failure) = match result {
            Ok(res) => (res.success, res.message, res.tx_hash, res.failure),
            Err(e) => {
                // still retryable here means the attempts ran out
                let kind = if is_retryable(&e) {
                    FailureKind::Transient
                } else {
                    FailureKind::Logical
                };
                (false, format!("{:#}", e), None, Some(kind))
            }
        };

        let detail = match &tx_hash {
            Some(tx) => format!("{} (tx {})", clip(&message), tx),
            None => clip(&message),
        };
        if success {
            info!(
                target: "task_result",
                "[WL:{}] Success [{}] {} in {:.1}s",
                wallet.id,
                name,
                detail,
                duration.as_secs_f64()
            );
        } else {
            warn!(
                target: "task_result",
                "[WL:{}] Failed  [{}] {} in {:.1}s",
                wallet.id,
                name,
                detail,
                duration.as_secs_f64()
            );
        }
        metrics.record_step(duration, success);

        self.cursor += 1;
        Some(StepReport {
            index,
            kind: step.kind.clone(),
            success,
            message,
            tx_hash,
            failure,
            duration,
        })
    }
}
