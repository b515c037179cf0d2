use crate::error::WalletError;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A raw private key and where it came from. Key material is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WalletKey {
    pub label: String,
    pub private_key: String,
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("label", &self.label)
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

pub struct WalletManager {
    keys: Vec<WalletKey>,
}

impl WalletManager {
    pub const ENV_PREFIX: &'static str = "PRIVATE_KEY_";
    pub const PV_FILE: &'static str = "pv.txt";

    /// Collects `PRIVATE_KEY_*` variables from the process environment,
    /// falling back to `pv.txt` (one key per line) when none are set.
    pub fn new() -> Result<Self> {
        let manager = Self::from_env_vars(std::env::vars())?;
        if manager.count() > 0 {
            info!("Loaded {} private keys from environment", manager.count());
            return Ok(manager);
        }

        let pv_path = Path::new(Self::PV_FILE);
        if pv_path.exists() {
            info!("No {}* variables set, loading raw keys from {}", Self::ENV_PREFIX, Self::PV_FILE);
            let content = fs::read_to_string(pv_path)
                .with_context(|| format!("Failed to read {}", Self::PV_FILE))?;
            return Self::from_lines(&content);
        }

        Ok(Self { keys: Vec::new() })
    }

    /// Keys ordered by the numeric suffix of their variable (`PRIVATE_KEY_2`
    /// before `PRIVATE_KEY_10`) so wallet indices are stable across runs.
    /// Non-numeric suffixes sort after, by name.
    pub fn from_env_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<(String, String)> = vars
            .into_iter()
            .filter(|(k, v)| k.starts_with(Self::ENV_PREFIX) && !v.trim().is_empty())
            .collect();
        entries.sort_by_cached_key(|(name, _)| Self::env_order(name));

        let keys = entries
            .into_iter()
            .map(|(label, value)| Self::validate(label, value.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { keys })
    }

    fn env_order(name: &str) -> (bool, u64, String) {
        let number = name
            .strip_prefix(Self::ENV_PREFIX)
            .and_then(|suffix| suffix.parse::<u64>().ok());
        (number.is_none(), number.unwrap_or(0), name.to_string())
    }

    pub fn from_lines(content: &str) -> Result<Self> {
        let keys = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .enumerate()
            .map(|(i, line)| Self::validate(format!("pv.txt line {}", i + 1), line))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { keys })
    }

    fn validate(label: String, raw: &str) -> Result<WalletKey, WalletError> {
        let hex_part = raw.strip_prefix("0x").unwrap_or(raw);
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WalletError::InvalidKeyFormat { label });
        }
        if hex_part.len() != 64 {
            return Err(WalletError::InvalidKeyLength {
                label,
                length: hex_part.len(),
            });
        }
        Ok(WalletKey {
            label,
            private_key: hex_part.to_string(),
        })
    }

    /// Returns the number of available wallets
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[WalletKey] {
        &self.keys
    }

    /// Fails with [`WalletError::NoWallets`] when nothing was loaded.
    pub fn require_any(&self) -> Result<(), WalletError> {
        if self.keys.is_empty() {
            Err(WalletError::NoWallets)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const KEY_B: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

    #[test]
    fn test_env_keys_sorted_by_name() {
        let manager = WalletManager::from_env_vars(vec![
            ("PRIVATE_KEY_2".to_string(), KEY_B.to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("PRIVATE_KEY_1".to_string(), KEY_A.to_string()),
        ])
        .unwrap();

        assert_eq!(manager.count(), 2);
        assert_eq!(manager.keys()[0].label, "PRIVATE_KEY_1");
        assert_eq!(manager.keys()[0].private_key, &KEY_A[2..]);
        assert_eq!(manager.keys()[1].label, "PRIVATE_KEY_2");
    }

    #[test]
    fn test_env_keys_sorted_numerically() {
        let manager = WalletManager::from_env_vars(vec![
            ("PRIVATE_KEY_10".to_string(), KEY_A.to_string()),
            ("PRIVATE_KEY_MAIN".to_string(), KEY_B.to_string()),
            ("PRIVATE_KEY_2".to_string(), KEY_B.to_string()),
            ("PRIVATE_KEY_1".to_string(), KEY_A.to_string()),
        ])
        .unwrap();

        let labels: Vec<_> = manager.keys().iter().map(|k| k.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["PRIVATE_KEY_1", "PRIVATE_KEY_2", "PRIVATE_KEY_10", "PRIVATE_KEY_MAIN"]
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = WalletManager::from_env_vars(vec![(
            "PRIVATE_KEY_1".to_string(),
            "0x1234".to_string(),
        )]);
        assert!(err.is_err());
    }

    #[test]
    fn test_pv_lines_skip_comments() {
        let manager = WalletManager::from_lines(&format!("# keys\n{}\n\n", KEY_B)).unwrap();
        assert_eq!(manager.count(), 1);
        assert!(format!("{:?}", manager.keys()[0]).contains("REDACTED"));
    }

    #[test]
    fn test_require_any() {
        let manager = WalletManager::from_env_vars(Vec::new()).unwrap();
        assert!(matches!(manager.require_any(), Err(WalletError::NoWallets)));
    }
}
