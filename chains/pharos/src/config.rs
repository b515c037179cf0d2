use crate::task::ActionStep;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use core_logic::{ConfigError, UniformRange, GasConfig, RetryConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct PharosConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_sequence")]
    pub sequence: Vec<ActionStep>,
    #[serde(default)]
    pub transactions: TransactionsConfig,
    #[serde(default)]
    pub delay: DelayConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub faucet: FaucetConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default = "default_proxies_file")]
    pub proxies_file: String,
}

fn default_rpc_url() -> String {
    "https://testnet.dplabs-internal.com".to_string()
}

fn default_chain_id() -> u64 {
    688688
}

fn default_proxies_file() -> String {
    core_logic::ProxyManager::PROXY_FILE.to_string()
}

fn default_sequence() -> Vec<ActionStep> {
    vec![
        ActionStep::new("claim_faucet"),
        ActionStep::new("deploy_contract"),
        ActionStep::new("transfer_batch").with_param("count", 25),
        ActionStep::new("deploy_contract"),
    ]
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransactionsConfig {
    /// Native amount per transfer or swap, in ether.
    pub amount_range: UniformRange,
    /// Wallets at or below this balance (ether) sit the cycle out.
    pub minimum_balance: f64,
    pub slippage: f64,
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            amount_range: UniformRange::new(0.0012, 0.0025),
            minimum_balance: 0.0099,
            slippage: 0.05,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DelayConfig {
    pub between_steps_seconds: UniformRange,
    pub between_cycles_minutes: UniformRange,
    pub between_transfers_seconds: UniformRange,
    pub drained_wait_minutes: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            between_steps_seconds: UniformRange::new(11.0, 120.0),
            between_cycles_minutes: UniformRange::new(5.0, 11.0),
            between_transfers_seconds: UniformRange::new(1.0, 5.0),
            drained_wait_minutes: 60.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_seconds: 15,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::from_secs(self.attempts, self.delay_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContractsConfig {
    pub router: String,
    pub wphrs: String,
    pub usdc: String,
    pub usdt: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            router: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0".to_string(),
            wphrs: "0x76aaada469d23216be5f7c596fa25f282ff9b364".to_string(),
            usdc: "0xad902cf99c2de2f1ba5ec4d642fd7e49cae9ee37".to_string(),
            usdt: "0xed59de2d7ad9c043442e381231ee3646fc3c2939".to_string(),
        }
    }
}

/// What a deploy step reports once the wallet has reached its deployment limit.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    #[default]
    Block,
    Skip,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeployConfig {
    pub limit: u32,
    pub limit_policy: LimitPolicy,
    pub counts_file: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            limit: 2,
            limit_policy: LimitPolicy::Block,
            counts_file: "deployment_counts.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FaucetConfig {
    pub base_url: String,
    pub invite_code: String,
    pub cooldown_hours: f64,
    pub timeout_seconds: u64,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pharosnetwork.xyz".to_string(),
            invite_code: "S6NGMzXSCDBxhnwo".to_string(),
            cooldown_hours: 24.0,
            timeout_seconds: 30,
        }
    }
}

impl PharosConfig {
    /// Loads `path` when it exists, then applies `PHAROS__*` overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path));
        } else {
            tracing::warn!("Config file {} not found, using built-in defaults", path);
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("PHAROS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PharosConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(content, config::FileFormat::Toml))
            .build()?;
        let config: PharosConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ConfigError::InvalidRpcUrl {
                url: self.rpc_url.clone(),
            });
        }
        if self.sequence.is_empty() {
            return Err(ConfigError::MissingField {
                field: "sequence".to_string(),
            });
        }
        if self.retry.attempts == 0 {
            return Err(invalid("retry.attempts", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.transactions.slippage) {
            return Err(invalid("transactions.slippage", "must be in [0, 1)"));
        }
        for (field, value) in [
            ("transactions.minimum_balance", self.transactions.minimum_balance),
            ("faucet.cooldown_hours", self.faucet.cooldown_hours),
            ("delay.drained_wait_minutes", self.delay.drained_wait_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "must be a finite, non-negative number"));
            }
        }

        self.transactions.amount_range.validate("transactions.amount_range")?;
        self.delay.between_steps_seconds.validate("delay.between_steps_seconds")?;
        self.delay.between_cycles_minutes.validate("delay.between_cycles_minutes")?;
        self.delay
            .between_transfers_seconds
            .validate("delay.between_transfers_seconds")?;
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
