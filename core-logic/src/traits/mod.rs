use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Why a task reported `success: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Infrastructure fault that outlived its retries.
    Transient,
    /// Business-level refusal (no funds, cooldown, limit reached). Never retried.
    Logical,
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub success: bool,
    pub message: String,
    pub tx_hash: Option<String>,
    pub data: Option<serde_json::Value>,
    pub failure: Option<FailureKind>,
}

impl TaskResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            tx_hash: None,
            data: None,
            failure: None,
        }
    }

    /// Logical failure: surfaced to the caller as an outcome, not an error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            tx_hash: None,
            data: None,
            failure: Some(FailureKind::Logical),
        }
    }

    pub fn with_tx(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait Task<Ctx>: Send + Sync {
    /// Returns the name of the task
    fn name(&self) -> &str;

    /// Executes the task
    async fn run(&self, ctx: Ctx) -> Result<TaskResult>;
}
