use crate::task::t04_swap::{to_base_units, token_decimals, TokenBook};
use crate::task::{param_f64, param_str, Task, TaskContext, TaskResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::utils::format_units;
use serde_json::json;

/// Read-only router quote for `amount` of `from` in `to`.
pub struct GetPriceTask {
    tokens: TokenBook,
}

impl GetPriceTask {
    pub fn new(tokens: TokenBook) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Task<TaskContext> for GetPriceTask {
    fn name(&self) -> &str {
        "getPrice"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let (Some(from_sym), Some(to_sym)) =
            (param_str(&ctx.params, "from"), param_str(&ctx.params, "to"))
        else {
            return Ok(TaskResult::rejected("price step needs 'from' and 'to'"));
        };
        let (Some(from), Some(to)) = (self.tokens.resolve(from_sym), self.tokens.resolve(to_sym))
        else {
            return Ok(TaskResult::rejected(format!(
                "Unknown token pair {} -> {}",
                from_sym, to_sym
            )));
        };

        let amount = param_f64(&ctx.params, "amount").unwrap_or(1.0);
        let router = ctx.wallet.router.as_ref();
        let decimals_in = token_decimals(router, from).await?;
        let decimals_out = token_decimals(router, to).await?;

        let amount_in = to_base_units(amount, decimals_in)?;
        let path = vec![self.tokens.route_address(from), self.tokens.route_address(to)];
        let amount_out = router
            .quote(amount_in, path)
            .await?
            .last()
            .copied()
            .context("Router returned an empty quote")?;
        let formatted = format_units(amount_out, decimals_out as u32)?;

        Ok(TaskResult::ok(format!(
            "{} {} = {} {}",
            amount,
            from_sym.to_ascii_uppercase(),
            formatted,
            to_sym.to_ascii_uppercase()
        ))
        .with_data(json!({ "amount_in": amount, "amount_out": formatted })))
    }
}
