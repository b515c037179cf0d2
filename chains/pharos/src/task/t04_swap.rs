use crate::client::SwapRouter;
use crate::config::ContractsConfig;
use crate::task::t03_transfer_batch::ether_to_wei;
use crate::task::{param_f64, param_str, Task, TaskContext, TaskResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::UniformRange;
use ethers::types::{Address, U256};
use ethers::utils::{format_ether, format_units, parse_units};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

const DEADLINE_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// PHRS, the chain's gas token.
    Native,
    Erc20(Address),
}

/// Symbol table for the tokens the router trades.
#[derive(Debug, Clone)]
pub struct TokenBook {
    wphrs: Address,
    usdc: Address,
    usdt: Address,
}

impl TokenBook {
    pub fn from_config(contracts: &ContractsConfig) -> Result<Self> {
        let parse = |name: &str, value: &str| -> Result<Address> {
            value
                .parse::<Address>()
                .with_context(|| format!("Invalid {} address '{}'", name, value))
        };
        Ok(Self {
            wphrs: parse("contracts.wphrs", &contracts.wphrs)?,
            usdc: parse("contracts.usdc", &contracts.usdc)?,
            usdt: parse("contracts.usdt", &contracts.usdt)?,
        })
    }

    pub fn resolve(&self, symbol: &str) -> Option<Token> {
        match symbol.to_ascii_uppercase().as_str() {
            "PHRS" => Some(Token::Native),
            "WPHRS" => Some(Token::Erc20(self.wphrs)),
            "USDC" => Some(Token::Erc20(self.usdc)),
            "USDT" => Some(Token::Erc20(self.usdt)),
            _ => None,
        }
    }

    /// Address used in router paths; native PHRS routes through WPHRS.
    pub fn route_address(&self, token: Token) -> Address {
        match token {
            Token::Native => self.wphrs,
            Token::Erc20(address) => address,
        }
    }
}

pub async fn token_decimals(router: &dyn SwapRouter, token: Token) -> Result<u8> {
    match token {
        Token::Native => Ok(18),
        Token::Erc20(address) => router.decimals(address).await,
    }
}

/// Converts a human amount to base units, keeping at most 8 decimals.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<U256> {
    let precision = decimals.min(8) as usize;
    Ok(parse_units(format!("{:.*}", precision, amount), decimals as u32)?.into())
}

/// `quote` reduced by `slippage` (fraction, 0.05 = 5%).
pub fn min_amount_out(quote: U256, slippage: f64) -> U256 {
    let bps = (slippage * 10_000.0).round().clamp(0.0, 10_000.0) as u64;
    let keep = U256::from(10_000 - bps);
    quote
        .checked_mul(keep)
        .map(|v| v / 10_000)
        .unwrap_or_else(|| quote / 10_000 * keep)
}

fn deadline() -> Result<U256> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(U256::from(now + DEADLINE_SECS))
}

/// Swaps through the Uniswap-V2 style router. Native PHRS in uses
/// `swapExactETHForTokens`; token in uses approve + quote +
/// `swapExactTokensForTokens`.
pub struct SwapTask {
    tokens: TokenBook,
    amount_range: UniformRange,
    slippage: f64,
}

impl SwapTask {
    pub fn new(tokens: TokenBook, amount_range: UniformRange, slippage: f64) -> Self {
        Self {
            tokens,
            amount_range,
            slippage,
        }
    }
}

#[async_trait]
impl Task<TaskContext> for SwapTask {
    fn name(&self) -> &str {
        "swap"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let (Some(from_sym), Some(to_sym)) =
            (param_str(&ctx.params, "from"), param_str(&ctx.params, "to"))
        else {
            return Ok(TaskResult::rejected("swap step needs 'from' and 'to'"));
        };
        let (Some(from), Some(to)) = (self.tokens.resolve(from_sym), self.tokens.resolve(to_sym))
        else {
            return Ok(TaskResult::rejected(format!(
                "Unknown token pair {} -> {}",
                from_sym, to_sym
            )));
        };
        if from == to || to == Token::Native {
            return Ok(TaskResult::rejected(format!(
                "Unsupported swap {} -> {}",
                from_sym, to_sym
            )));
        }

        let amount = param_f64(&ctx.params, "amount")
            .unwrap_or_else(|| self.amount_range.sample(&mut rand::thread_rng()));
        let recipient = ctx.wallet.address;
        let router = ctx.wallet.router.as_ref();
        let target = self.tokens.route_address(to);

        let outcome = match from {
            Token::Native => {
                let value = ether_to_wei(amount)?;
                let balance = ctx.wallet.chain.balance().await?;
                if balance < value {
                    return Ok(TaskResult::rejected(format!(
                        "Insufficient PHRS: have {}, need {:.8}",
                        format_ether(balance),
                        amount
                    )));
                }
                let path = vec![self.tokens.route_address(Token::Native), target];
                router
                    .swap_exact_native(value, U256::zero(), path, recipient, deadline()?)
                    .await?
            }
            Token::Erc20(token) => {
                let decimals = router.decimals(token).await?;
                let amount_in = to_base_units(amount, decimals)?;
                let balance = router.token_balance(token, recipient).await?;
                if balance < amount_in {
                    return Ok(TaskResult::rejected(format!(
                        "Insufficient {}: have {}, need {}",
                        from_sym.to_ascii_uppercase(),
                        format_units(balance, decimals as u32)?,
                        amount
                    )));
                }

                router.ensure_allowance(token, amount_in).await?;
                let path = vec![token, target];
                let quote = router
                    .quote(amount_in, path.clone())
                    .await?
                    .last()
                    .copied()
                    .context("Router returned an empty quote")?;
                let amount_out_min = min_amount_out(quote, self.slippage);
                router
                    .swap_exact_tokens(amount_in, amount_out_min, path, recipient, deadline()?)
                    .await?
            }
        };

        let tx_hash = format!("{:?}", outcome.tx_hash);
        if !outcome.success {
            return Ok(TaskResult::rejected(format!(
                "Swap {} -> {} reverted",
                from_sym, to_sym
            ))
            .with_tx(tx_hash));
        }

        Ok(TaskResult::ok(format!(
            "Swapped {} {} -> {}",
            amount,
            from_sym.to_ascii_uppercase(),
            to_sym.to_ascii_uppercase()
        ))
        .with_tx(tx_hash)
        .with_data(json!({ "from": from_sym, "to": to_sym, "amount": amount })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ActionStep;
    use crate::testing::Mocks;
    use core_logic::FailureKind;

    fn book() -> TokenBook {
        TokenBook::from_config(&ContractsConfig::default()).unwrap()
    }

    fn task() -> SwapTask {
        SwapTask::new(book(), UniformRange::new(0.0012, 0.0025), 0.05)
    }

    fn ctx(mocks: &Mocks, step: ActionStep) -> TaskContext {
        TaskContext {
            wallet: mocks.handle(0),
            params: step.params,
        }
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let book = book();
        assert_eq!(book.resolve("phrs"), Some(Token::Native));
        assert!(matches!(book.resolve("Usdt"), Some(Token::Erc20(_))));
        assert_eq!(book.resolve("DOGE"), None);
        assert_eq!(book.route_address(Token::Native), book.wphrs);
    }

    #[test]
    fn test_min_amount_out() {
        assert_eq!(min_amount_out(U256::from(1_000_000u64), 0.05), U256::from(950_000u64));
        assert_eq!(min_amount_out(U256::from(1_000u64), 0.0), U256::from(1_000u64));
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(1.5, 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            to_base_units(0.1, 18).unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_native_swap_uses_wrapped_path() {
        let mocks = Mocks::new(1.0);
        let step = ActionStep::new("swap")
            .with_param("from", "phrs")
            .with_param("to", "usdt");

        let result = task().run(ctx(&mocks, step)).await.unwrap();
        assert!(result.success, "{}", result.message);

        let swaps = mocks.router.swaps();
        assert_eq!(swaps.len(), 1);
        assert!(swaps[0].native);
        assert_eq!(swaps[0].path[0], book().wphrs);
    }

    #[tokio::test]
    async fn test_token_swap_applies_slippage_and_approves() {
        let mocks = Mocks::new(1.0);
        let usdt = book().usdt;
        mocks.router.set_token_balance(usdt, to_base_units(10.0, 18).unwrap());

        let step = ActionStep::new("swap")
            .with_param("from", "usdt")
            .with_param("to", "usdc")
            .with_param("amount", 1.0);
        let result = task().run(ctx(&mocks, step)).await.unwrap();
        assert!(result.success, "{}", result.message);

        let swaps = mocks.router.swaps();
        assert_eq!(swaps.len(), 1);
        assert!(!swaps[0].native);
        // mock router quotes 2:1
        let expected_quote = to_base_units(2.0, 18).unwrap();
        assert_eq!(swaps[0].amount_out_min, min_amount_out(expected_quote, 0.05));
        assert_eq!(mocks.router.approvals(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_token_balance_is_logical() {
        let mocks = Mocks::new(1.0);
        let step = ActionStep::new("swap")
            .with_param("from", "usdc")
            .with_param("to", "usdt")
            .with_param("amount", 5.0);

        let result = task().run(ctx(&mocks, step)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Logical));
        assert!(mocks.router.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol_rejected() {
        let mocks = Mocks::new(1.0);
        let step = ActionStep::new("swap")
            .with_param("from", "phrs")
            .with_param("to", "doge");

        let result = task().run(ctx(&mocks, step)).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("Unknown token pair"));
    }
}
