use super::pacing;
use super::wallet_task::{StepReport, TaskSequence, WalletTask};
use crate::client::WalletHandle;
use crate::config::PharosConfig;
use crate::task::t03_transfer_batch::ether_to_wei;
use crate::task::{ActionRegistry, ActionStep};
use anyhow::Result;
use core_logic::{saturating_secs, with_retry, MetricsCollector, RetryConfig, UniformRange};
use ethers::types::U256;
use ethers::utils::format_ether;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Wallets must hold strictly more than this (wei) to join a cycle.
    pub minimum_balance: U256,
    pub between_steps: UniformRange,
    pub between_cycles: UniformRange,
    pub drained_wait: Duration,
    pub retry: RetryConfig,
}

impl SchedulerSettings {
    pub fn from_config(config: &PharosConfig) -> Result<Self> {
        Ok(Self {
            minimum_balance: ether_to_wei(config.transactions.minimum_balance)?,
            between_steps: config.delay.between_steps_seconds,
            between_cycles: config.delay.between_cycles_minutes,
            drained_wait: saturating_secs(config.delay.drained_wait_minutes * 60.0),
            retry: config.retry.to_retry_config(),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub healthy: usize,
    pub steps_executed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, step: &StepReport) {
        self.steps_executed += 1;
        if step.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Drives every healthy wallet through the sequence, one step per wallet
/// per pass, in a freshly shuffled order each pass.
pub struct CycleScheduler {
    wallets: Vec<WalletHandle>,
    sequence: TaskSequence,
    registry: ActionRegistry,
    settings: SchedulerSettings,
    metrics: Arc<MetricsCollector>,
    rng: StdRng,
}

impl CycleScheduler {
    pub fn new(
        wallets: Vec<WalletHandle>,
        sequence: Vec<ActionStep>,
        registry: ActionRegistry,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            wallets,
            sequence: sequence.into(),
            registry,
            settings,
            metrics: Arc::new(MetricsCollector::new()),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic shuffles and delays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Wallets whose balance is strictly above the minimum. A wallet whose
    /// balance cannot be read sits this cycle out.
    pub async fn healthy_wallets(&self) -> Vec<WalletHandle> {
        let mut healthy = Vec::with_capacity(self.wallets.len());

        for wallet in &self.wallets {
            let op_name = format!("[WL:{}] balance", wallet.id);
            match with_retry(&self.settings.retry, &op_name, || wallet.chain.balance()).await {
                Ok(balance) if balance > self.settings.minimum_balance => {
                    info!(
                        target: "relay",
                        "[WL:{}] {:?} balance {} PHRS",
                        wallet.id,
                        wallet.address,
                        format_ether(balance)
                    );
                    healthy.push(wallet.clone());
                }
                Ok(balance) => {
                    warn!(
                        target: "relay",
                        "[WL:{}] Balance {} PHRS is not above the {} PHRS minimum, skipping",
                        wallet.id,
                        format_ether(balance),
                        format_ether(self.settings.minimum_balance)
                    );
                }
                Err(e) => {
                    warn!(
                        target: "relay",
                        "[WL:{}] Balance check failed, skipping this cycle: {:#}",
                        wallet.id,
                        e
                    );
                }
            }
        }

        healthy
    }

    /// One full cycle: health filter, then shuffled round-robin until every
    /// wallet has walked the whole sequence. Stops early on cancellation.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        let healthy = self.healthy_wallets().await;
        let mut report = CycleReport {
            healthy: healthy.len(),
            ..Default::default()
        };
        if healthy.is_empty() {
            return report;
        }

        info!(
            target: "relay",
            "Starting cycle: {} wallets x {} steps",
            healthy.len(),
            self.sequence.len()
        );
        let mut active: Vec<WalletTask> = healthy
            .into_iter()
            .map(|wallet| WalletTask::new(wallet, self.sequence.clone()))
            .collect();

        while !active.is_empty() {
            active.shuffle(&mut self.rng);

            for task in active.iter_mut() {
                if cancel.is_cancelled() {
                    return report;
                }
                if let Some(step) = task
                    .execute_next_step(&self.registry, &self.settings.retry, &self.metrics)
                    .await
                {
                    report.record(&step);
                }

                let delay = self.settings.between_steps.sample_secs(&mut self.rng);
                if !pacing::pause(delay, cancel).await {
                    return report;
                }
            }

            active.retain(|task| !task.is_finished());
        }

        self.metrics.record_cycle();
        report
    }

    /// Cycles until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            target: "relay",
            "Relay started with {} wallets and {} steps per cycle",
            self.wallets.len(),
            self.sequence.len()
        );

        while !cancel.is_cancelled() {
            let report = self.run_cycle(&cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            if report.healthy == 0 {
                error!(
                    target: "relay",
                    "No wallet holds more than {} PHRS. Waiting {:.0} minutes before retrying.",
                    format_ether(self.settings.minimum_balance),
                    self.settings.drained_wait.as_secs_f64() / 60.0
                );
                if !pacing::countdown(self.settings.drained_wait, "Waiting for funds", &cancel).await
                {
                    break;
                }
                continue;
            }

            info!(
                target: "relay",
                "Cycle complete: {} steps ({} ok, {} failed) | {}",
                report.steps_executed,
                report.succeeded,
                report.failed,
                self.metrics.summary()
            );

            let wait = self.settings.between_cycles.sample_minutes(&mut self.rng);
            if !pacing::countdown(wait, "Next cycle in", &cancel).await {
                break;
            }
        }

        info!(target: "relay", "Relay stopped | {}", self.metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ActionKind, TaskContext};
    use crate::testing::Mocks;
    use async_trait::async_trait;
    use core_logic::{Task, TaskResult};
    use std::sync::Mutex;

    /// Records `(wallet id, step)` for every execution.
    struct RecordingTask {
        step: &'static str,
        log: Arc<Mutex<Vec<(String, &'static str)>>>,
    }

    #[async_trait]
    impl Task<TaskContext> for RecordingTask {
        fn name(&self) -> &str {
            self.step
        }

        async fn run(&self, ctx: TaskContext) -> anyhow::Result<TaskResult> {
            self.log.lock().unwrap().push((ctx.wallet.id.clone(), self.step));
            Ok(TaskResult::ok(self.step))
        }
    }

    /// Records the (paused) clock time of every execution.
    struct StampTask {
        stamps: Arc<Mutex<Vec<tokio::time::Instant>>>,
    }

    #[async_trait]
    impl Task<TaskContext> for StampTask {
        fn name(&self) -> &str {
            "stamp"
        }

        async fn run(&self, _ctx: TaskContext) -> anyhow::Result<TaskResult> {
            self.stamps.lock().unwrap().push(tokio::time::Instant::now());
            Ok(TaskResult::ok("stamped"))
        }
    }

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            minimum_balance: ether_to_wei(0.0099).unwrap(),
            between_steps: UniformRange::new(11.0, 120.0),
            between_cycles: UniformRange::new(5.0, 11.0),
            drained_wait: Duration::from_secs(3600),
            retry: RetryConfig::from_secs(3, 15),
        }
    }

    fn handles(mocks: &[Mocks]) -> Vec<WalletHandle> {
        mocks.iter().enumerate().map(|(i, m)| m.handle(i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_filter_is_strict() {
        let mocks = vec![Mocks::new(0.02), Mocks::new(0.005), Mocks::new(0.0099)];
        let scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("claim_faucet")],
            ActionRegistry::new(),
            settings(),
        );

        let healthy = scheduler.healthy_wallets().await;
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].id, "001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_error_excludes_wallet() {
        let mocks = vec![Mocks::new(1.0), Mocks::new(1.0)];
        mocks[1].chain.fail_balance("connection reset by peer");
        let scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("claim_faucet")],
            ActionRegistry::new(),
            settings(),
        );

        let healthy = scheduler.healthy_wallets().await;
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].id, "001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_wallet_runs_every_step_once() {
        let mocks = vec![Mocks::new(1.0), Mocks::new(1.0), Mocks::new(1.0)];
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry
            .register(
                ActionKind::GetPrice,
                RecordingTask {
                    step: "first",
                    log: log.clone(),
                },
            )
            .register(
                ActionKind::Swap,
                RecordingTask {
                    step: "second",
                    log: log.clone(),
                },
            );

        let mut scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("get_price"), ActionStep::new("swap")],
            registry,
            settings(),
        )
        .with_seed(42);

        let report = scheduler.run_cycle(&CancellationToken::new()).await;
        assert_eq!(report.healthy, 3);
        assert_eq!(report.steps_executed, 6);
        assert_eq!(report.succeeded, 6);

        let log = log.lock().unwrap().clone();
        assert_eq!(log.len(), 6);
        for id in ["001", "002", "003"] {
            let steps: Vec<_> = log.iter().filter(|(w, _)| w == id).map(|(_, s)| *s).collect();
            assert_eq!(steps, vec!["first", "second"]);
        }
        assert_eq!(scheduler.metrics().snapshot().cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drained_wallets_run_nothing() {
        let mocks = vec![Mocks::new(0.001)];
        let mut scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("claim_faucet")],
            ActionRegistry::new(),
            settings(),
        );

        let report = scheduler.run_cycle(&CancellationToken::new()).await;
        assert_eq!(report, CycleReport::default());
        assert!(mocks[0].faucet.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drained_pool_waits_then_recovers() {
        let mocks = vec![Mocks::new(0.001)];
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry.register(
            ActionKind::GetPrice,
            StampTask {
                stamps: stamps.clone(),
            },
        );
        let mut scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("get_price")],
            registry,
            settings(),
        )
        .with_seed(3);

        let start = tokio::time::Instant::now();
        let chain = mocks[0].chain.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30 * 60)).await;
            chain.set_balance_ether(1.0);
        });

        // the first funded cycle ends by 3600 + 120 s and is followed by a
        // wait of at least 5 minutes, so this lands inside that wait
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600 + 150)).await;
            trigger.cancel();
        });

        scheduler.run(cancel).await;

        let stamps = stamps.lock().unwrap().clone();
        assert_eq!(stamps.len(), 1);
        assert!(stamps[0].duration_since(start) >= Duration::from_secs(3600));
        assert_eq!(scheduler.metrics().snapshot().cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_rechecked_every_cycle() {
        let mocks = vec![Mocks::new(1.0), Mocks::new(1.0)];
        let mut scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("bridge")],
            ActionRegistry::new(),
            settings(),
        );
        let cancel = CancellationToken::new();

        let first = scheduler.run_cycle(&cancel).await;
        assert_eq!(first.healthy, 2);
        assert_eq!(first.steps_executed, 2);

        mocks[1].chain.set_balance_ether(0.005);
        let second = scheduler.run_cycle(&cancel).await;
        assert_eq!(second.healthy, 1);
        assert_eq!(second.steps_executed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_returns() {
        let mocks = vec![Mocks::new(1.0)];
        let mut scheduler = CycleScheduler::new(
            handles(&mocks),
            vec![ActionStep::new("bridge"), ActionStep::new("bridge")],
            ActionRegistry::new(),
            settings(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        scheduler.run(cancel).await;
        // cancelled during the first inter-step pause
        assert_eq!(scheduler.metrics().steps_total(), 1);
    }
}
