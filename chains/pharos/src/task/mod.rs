use crate::client::WalletHandle;
use crate::config::PharosConfig;
use anyhow::Result;
use core_logic::{saturating_secs, CounterStore};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub mod t01_claim_faucet;
pub mod t02_deploy_contract;
pub mod t03_transfer_batch;
pub mod t04_swap;
pub mod t05_get_price;

pub use self::t01_claim_faucet::ClaimFaucetTask;
pub use self::t02_deploy_contract::DeployContractTask;
pub use self::t03_transfer_batch::TransferBatchTask;
pub use self::t04_swap::{SwapTask, Token, TokenBook};
pub use self::t05_get_price::GetPriceTask;

pub use core_logic::traits::{Task, TaskResult};

pub type StepParams = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ClaimFaucet,
    DeployContract,
    TransferBatch,
    Swap,
    GetPrice,
    Unknown(String),
}

impl ActionKind {
    /// Maps a step's `type` (and the `action` of a `faroswap` step) to a kind.
    /// Anything unrecognized becomes [`ActionKind::Unknown`].
    pub fn parse(kind: &str, action: Option<&str>) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "claim_faucet" => Self::ClaimFaucet,
            "deploy_contract" => Self::DeployContract,
            "transfer_batch" => Self::TransferBatch,
            "swap" => Self::Swap,
            "get_price" | "getprice" => Self::GetPrice,
            "faroswap" => match action.map(str::to_ascii_lowercase).as_deref() {
                None | Some("swap") => Self::Swap,
                Some("getprice") | Some("get_price") => Self::GetPrice,
                Some(other) => Self::Unknown(format!("faroswap:{}", other)),
            },
            _ => Self::Unknown(kind.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ClaimFaucet => "claim_faucet",
            Self::DeployContract => "deploy_contract",
            Self::TransferBatch => "transfer_batch",
            Self::Swap => "swap",
            Self::GetPrice => "get_price",
            Self::Unknown(kind) => kind,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the configured sequence: `type` plus free-form params.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawStep")]
pub struct ActionStep {
    pub kind: ActionKind,
    pub params: StepParams,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    params: StepParams,
}

impl From<RawStep> for ActionStep {
    fn from(raw: RawStep) -> Self {
        let action = raw.params.get("action").and_then(Value::as_str);
        Self {
            kind: ActionKind::parse(&raw.kind, action),
            params: raw.params,
        }
    }
}

impl ActionStep {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: ActionKind::parse(kind, None),
            params: StepParams::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        param_str(&self.params, key)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        param_u64(&self.params, key)
    }
}

pub fn param_str<'a>(params: &'a StepParams, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Numeric params may arrive as integers, floats or strings (env overrides).
pub fn param_f64(params: &StepParams, key: &str) -> Option<f64> {
    match params.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn param_u64(params: &StepParams, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct TaskContext {
    pub wallet: WalletHandle,
    pub params: StepParams,
}

pub type PharosTask = dyn Task<TaskContext> + Send + Sync;

/// Dispatch table from action kind to its task. Built once at startup.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<PharosTask>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PharosConfig) -> Result<Self> {
        let tokens = TokenBook::from_config(&config.contracts)?;
        let cooldown = saturating_secs(config.faucet.cooldown_hours * 3600.0);

        let mut registry = Self::new();
        registry
            .register(ActionKind::ClaimFaucet, ClaimFaucetTask::new(cooldown))
            .register(
                ActionKind::DeployContract,
                DeployContractTask::new(
                    CounterStore::new(&config.deploy.counts_file),
                    config.deploy.limit,
                    config.deploy.limit_policy,
                ),
            )
            .register(
                ActionKind::TransferBatch,
                TransferBatchTask::new(
                    config.transactions.amount_range,
                    config.delay.between_transfers_seconds,
                    config.retry.to_retry_config(),
                ),
            )
            .register(
                ActionKind::Swap,
                SwapTask::new(
                    tokens.clone(),
                    config.transactions.amount_range,
                    config.transactions.slippage,
                ),
            )
            .register(ActionKind::GetPrice, GetPriceTask::new(tokens));
        Ok(registry)
    }

    pub fn register<T>(&mut self, kind: ActionKind, task: T) -> &mut Self
    where
        T: Task<TaskContext> + 'static,
    {
        self.handlers.insert(kind, Arc::new(task));
        self
    }

    /// Display name for log lines: the task's own name when registered.
    pub fn task_name<'a>(&'a self, kind: &'a ActionKind) -> &'a str {
        self.handlers
            .get(kind)
            .map(|task| task.name())
            .unwrap_or_else(|| kind.as_str())
    }

    /// Runs the task registered for `kind`. An unregistered kind is reported
    /// as a success so it never stalls the wallet's sequence.
    pub async fn execute(
        &self,
        kind: &ActionKind,
        wallet: &WalletHandle,
        params: &StepParams,
    ) -> Result<TaskResult> {
        let Some(task) = self.handlers.get(kind) else {
            warn!(
                target: "task_result",
                "[WL:{}] Unknown step type '{}', skipping",
                wallet.id,
                kind
            );
            return Ok(TaskResult::ok(format!("Skipped unknown step '{}'", kind)));
        };

        let ctx = TaskContext {
            wallet: wallet.clone(),
            params: params.clone(),
        };
        task.run(ctx).await
    }
}
