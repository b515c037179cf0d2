use crate::config::ProxyConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub struct ProxyManager {
    proxies: Vec<ProxyConfig>,
}

impl ProxyManager {
    pub const PROXY_FILE: &'static str = "proxies.txt";

    /// Loads proxies from `path`. A missing file means "no proxies".
    /// Format expected: independent lines of ip:port[:username:password]
    /// or full `http://` / `socks5://` URLs.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("{} not found. Running without proxies.", path.display());
            return Ok(Self::empty());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let proxies = Self::parse(&content);

        info!("Loaded {} proxies from {}", proxies.len(), path.display());
        Ok(Self { proxies })
    }

    pub fn empty() -> Self {
        Self {
            proxies: Vec::new(),
        }
    }

    pub fn parse(content: &str) -> Vec<ProxyConfig> {
        let mut proxies = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.contains("://") {
                proxies.push(ProxyConfig {
                    url: line.to_string(),
                    username: None,
                    password: None,
                });
                continue;
            }

            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 2 {
                warn!("Skipping invalid proxy line: {}", line);
                continue;
            }

            // ip:port:user:pass -> 4 parts, ip:port -> 2 parts
            let url = format!("http://{}:{}", parts[0], parts[1]);

            let (username, password) = if parts.len() >= 4 {
                (Some(parts[2].to_string()), Some(parts[3].to_string()))
            } else {
                (None, None)
            };

            proxies.push(ProxyConfig {
                url,
                username,
                password,
            });
        }

        proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Round-robin assignment by wallet index.
    pub fn assign(&self, wallet_index: usize) -> Option<&ProxyConfig> {
        if self.proxies.is_empty() {
            return None;
        }
        self.proxies.get(wallet_index % self.proxies.len())
    }
}
