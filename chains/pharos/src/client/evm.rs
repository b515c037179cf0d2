use super::{proxied_http_client, ChainClient, Deployment, SwapRouter, TxOutcome};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use core_logic::{ConfigError, GasConfig, NetworkError, ProxyConfig, WalletKey};
use ethers::prelude::*;
use ethers::providers::MiddlewareError;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use std::time::Duration;

ethers::contract::abigen!(
    PharosRouter,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] path) view returns (uint256[] amounts)
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[] amounts)
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) payable returns (uint256[] amounts)
    ]"#
);

ethers::contract::abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address owner) view returns (uint256)
        function decimals() view returns (uint8)
        function allowance(address owner, address spender) view returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
    ]"#
);

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

const RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifts an RPC failure into `anyhow`. ethers parses the body whatever the
/// HTTP status, so a 5xx page or an empty reply only shows up as a JSON
/// error; that case becomes a transient [`NetworkError::UnreadableReply`].
fn rpc_failure<E>(err: E, endpoint: &str, action: &str) -> anyhow::Error
where
    E: MiddlewareError + 'static,
{
    let unreadable = err.as_serde_error().map(|e| e.to_string());
    match unreadable {
        Some(reason) => anyhow::Error::new(NetworkError::UnreadableReply {
            endpoint: endpoint.to_string(),
            reason,
        })
        .context(format!("{}: {}", action, err)),
        None => anyhow::Error::new(err).context(action.to_string()),
    }
}

fn outcome(receipt: &TransactionReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: receipt.transaction_hash,
        success: receipt.status == Some(U64::from(1)),
    }
}

/// Signing RPC client for one wallet.
pub struct EvmClient {
    client: Arc<SignerClient>,
    endpoint: String,
    gas: GasConfig,
}

impl EvmClient {
    pub fn connect(
        rpc_url: &str,
        chain_id: u64,
        key: &WalletKey,
        proxy: Option<&ProxyConfig>,
        gas: GasConfig,
    ) -> Result<Self> {
        let wallet = key
            .private_key
            .parse::<LocalWallet>()
            .with_context(|| format!("Invalid private key in {}", key.label))?
            .with_chain_id(chain_id);

        let url = reqwest::Url::parse(rpc_url).map_err(|_| ConfigError::InvalidRpcUrl {
            url: rpc_url.to_string(),
        })?;
        let http = Http::new_with_client(url, proxied_http_client(proxy, RPC_TIMEOUT, None)?);
        let provider = Provider::new(http).interval(Duration::from_millis(1000));

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            endpoint: rpc_url.to_string(),
            gas,
        })
    }

    pub fn address(&self) -> Address {
        self.client.address()
    }

    async fn confirm(&self, tx: TypedTransaction) -> Result<TransactionReceipt> {
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to send transaction"))?;
        pending
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to confirm transaction"))?
            .context("Transaction dropped from mempool")
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn balance(&self) -> Result<U256> {
        self.client
            .get_balance(self.address(), None)
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to fetch balance"))
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self.client.signer().sign_message(message).await?;
        Ok(format!("0x{}", signature))
    }

    async fn transfer(&self, to: Address, value: U256) -> Result<TxOutcome> {
        let tx = TransactionRequest::new()
            .to(to)
            .value(value)
            .gas(self.gas.limit_transfer);
        let receipt = self.confirm(tx.into()).await?;
        Ok(outcome(&receipt))
    }

    async fn deploy(&self, bytecode: Bytes) -> Result<Deployment> {
        let tx = TransactionRequest::new()
            .data(bytecode)
            .gas(self.gas.limit_deploy);
        let receipt = self.confirm(tx.into()).await?;

        if receipt.status != Some(U64::from(1)) {
            bail!("Deployment {:?} reverted", receipt.transaction_hash);
        }
        let address = receipt
            .contract_address
            .context("No contract address in receipt")?;

        Ok(Deployment {
            address,
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.client
            .call(&tx, None)
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "eth_call failed"))
    }
}

/// Router bindings sharing the wallet's signing client.
pub struct EvmRouter {
    client: Arc<SignerClient>,
    router: PharosRouter<SignerClient>,
    endpoint: String,
    gas: GasConfig,
}

impl EvmRouter {
    pub fn new(chain: &EvmClient, router_address: Address, gas: GasConfig) -> Self {
        Self {
            router: PharosRouter::new(router_address, chain.client.clone()),
            client: chain.client.clone(),
            endpoint: chain.endpoint.clone(),
            gas,
        }
    }

    async fn submit(&self, call: ContractCall<SignerClient, Vec<U256>>) -> Result<TxOutcome> {
        let pending = call
            .send()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to send swap"))?;
        let receipt = pending
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to confirm swap"))?
            .context("Swap transaction dropped")?;
        Ok(outcome(&receipt))
    }
}

#[async_trait]
impl SwapRouter for EvmRouter {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = Erc20Token::new(token, self.client.clone());
        erc20
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "balanceOf failed"))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let erc20 = Erc20Token::new(token, self.client.clone());
        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "decimals failed"))
    }

    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<Option<H256>> {
        let erc20 = Erc20Token::new(token, self.client.clone());
        let spender = self.router.address();
        let allowance = erc20
            .allowance(self.client.address(), spender)
            .call()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "allowance failed"))?;
        if allowance >= amount {
            return Ok(None);
        }

        let approve = erc20.approve(spender, U256::MAX).gas(self.gas.limit_approve);
        let pending = approve
            .send()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to send approval"))?;
        let receipt = pending
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "Failed to confirm approval"))?
            .context("Approval dropped")?;
        if receipt.status != Some(U64::from(1)) {
            bail!("Approval of {:?} reverted", token);
        }
        Ok(Some(receipt.transaction_hash))
    }

    async fn quote(&self, amount_in: U256, path: Vec<Address>) -> Result<Vec<U256>> {
        self.router
            .get_amounts_out(amount_in, path)
            .call()
            .await
            .map_err(|e| rpc_failure(e, &self.endpoint, "getAmountsOut failed"))
    }

    async fn swap_exact_tokens(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    ) -> Result<TxOutcome> {
        let call = self
            .router
            .swap_exact_tokens_for_tokens(amount_in, amount_out_min, path, recipient, deadline)
            .gas(self.gas.limit_swap);
        self.submit(call).await
    }

    async fn swap_exact_native(
        &self,
        value: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    ) -> Result<TxOutcome> {
        let call = self
            .router
            .swap_exact_eth_for_tokens(amount_out_min, path, recipient, deadline)
            .value(value)
            .gas(self.gas.limit_swap);
        self.submit(call).await
    }
}
