use super::{proxied_http_client, ClaimOutcome, FaucetApi, FaucetStatus, LoginOutcome};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::{NetworkError, ProxyConfig};
use ethers::types::Address;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
];

pub fn random_user_agent<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    USER_AGENTS.choose(rng).copied().unwrap_or(USER_AGENTS[0])
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://testnet.pharosnetwork.xyz/"));
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
    headers
}

/// `{code, msg, data}` wrapper used by every endpoint of the faucet API.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn message(&self, fallback: &str) -> String {
        self.msg
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    #[serde(default)]
    is_able_to_faucet: bool,
}

pub struct FaucetClient {
    http: reqwest::Client,
    base_url: String,
    invite_code: String,
    timeout: Duration,
}

impl FaucetClient {
    pub fn new(
        base_url: &str,
        invite_code: &str,
        proxy: Option<&ProxyConfig>,
        timeout: Duration,
    ) -> Result<Self> {
        let agent = random_user_agent(&mut rand::thread_rng());
        Ok(Self {
            http: proxied_http_client(proxy, timeout, Some(agent))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            invite_code: invite_code.to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error, endpoint: &str) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: endpoint.to_string(),
            }
        } else if let Some(status) = err.status() {
            status_error(status, endpoint)
        } else if err.is_decode() {
            NetworkError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        } else {
            NetworkError::ConnectionRefused {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<ApiEnvelope<T>, NetworkError> {
        let response = request
            .headers(browser_headers())
            .send()
            .await
            .map_err(|e| self.transport_error(e, endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, endpoint));
        }

        let envelope = response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        debug!("{} -> code {}", endpoint, envelope.code);
        Ok(envelope)
    }
}

fn status_error(status: StatusCode, endpoint: &str) -> NetworkError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        NetworkError::RateLimited {
            endpoint: endpoint.to_string(),
        }
    } else {
        NetworkError::HttpError {
            status_code: status.as_u16(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl FaucetApi for FaucetClient {
    async fn login(&self, address: Address, signature: &str) -> Result<LoginOutcome> {
        let endpoint = self.url("/user/login");
        let address = format!("{:?}", address);
        let request = self.http.post(&endpoint).query(&[
            ("address", address.as_str()),
            ("signature", signature),
            ("invite_code", self.invite_code.as_str()),
        ]);

        let envelope: ApiEnvelope<LoginData> = self.send(request, &endpoint).await?;
        let token = envelope.data.as_ref().and_then(|d| d.jwt.clone());
        Ok(match token {
            Some(jwt) if envelope.code == 0 && !jwt.is_empty() => LoginOutcome::Token(jwt),
            _ => LoginOutcome::Rejected(envelope.message("no JWT token received")),
        })
    }

    async fn status(&self, address: Address, token: &str) -> Result<FaucetStatus> {
        let endpoint = self.url("/faucet/status");
        let address = format!("{:?}", address);
        let request = self
            .http
            .get(&endpoint)
            .query(&[("address", address.as_str())])
            .bearer_auth(token);

        let envelope: ApiEnvelope<StatusData> = self.send(request, &endpoint).await?;
        let claimable = envelope.code == 0
            && envelope
                .data
                .as_ref()
                .map(|d| d.is_able_to_faucet)
                .unwrap_or(false);
        Ok(FaucetStatus {
            claimable,
            message: envelope.message("faucet still on cooldown"),
        })
    }

    async fn claim(&self, address: Address, token: &str) -> Result<ClaimOutcome> {
        let endpoint = self.url("/faucet/daily");
        let address = format!("{:?}", address);
        let request = self
            .http
            .post(&endpoint)
            .query(&[("address", address.as_str())])
            .bearer_auth(token);

        let envelope: ApiEnvelope<serde_json::Value> = self.send(request, &endpoint).await?;
        Ok(ClaimOutcome {
            success: envelope.code == 0,
            message: envelope.message("unknown faucet error"),
        })
    }
}
