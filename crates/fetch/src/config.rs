//! Service configuration, defaults, and account resolution.

use blockfetch_types::{Account, Wallet, WalletError};
use std::{path::PathBuf, time::Duration};

/// Default deadline for any single store request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default number of block identifiers fetched per discovery round.
pub const DEFAULT_OID_BATCH_SIZE: usize = 8000;

/// Default number of parallel block downloaders.
pub const DEFAULT_DOWNLOADER_WORKERS: usize = 100;

/// Wallet-unlock parameters.
#[derive(Clone)]
pub struct UnlockWallet {
    /// Path to the wallet file.
    pub path: PathBuf,
    /// Password tried against each account in the wallet.
    pub password: String,
}

impl std::fmt::Debug for UnlockWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The password stays out of logs.
        f.debug_struct("UnlockWallet").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Fetch service configuration.
///
/// Zero values for `timeout`, `oid_batch_size`, and
/// `downloader_workers_count` select the defaults; see
/// [`FetcherConfig::normalized`].
#[derive(Debug, Clone, Default)]
pub struct FetcherConfig {
    /// Deadline for any single store request.
    pub timeout: Duration,
    /// Number of block identifiers fetched per discovery round.
    pub oid_batch_size: usize,
    /// Number of parallel block downloaders.
    pub downloader_workers_count: usize,
    /// Number of identifiers each index object carries. Required unless
    /// `skip_index_files_search` is set.
    pub index_file_size: u32,
    /// Attribute selecting an index object by ordinal. Required unless
    /// `skip_index_files_search` is set.
    pub index_file_attribute: String,
    /// Numeric attribute carrying a block object's height. Required when
    /// `skip_index_files_search` is set.
    pub block_attribute: String,
    /// Discover block identifiers by searching block objects directly
    /// instead of reading index objects.
    pub skip_index_files_search: bool,
    /// Container namespace passed to every store request.
    pub container_id: String,
    /// Store gateway endpoints. Must be non-empty; the first entry is
    /// dialed.
    pub addresses: Vec<String>,
    /// Optional wallet to unlock for store authentication. When absent an
    /// ephemeral account is generated.
    pub unlock_wallet: Option<UnlockWallet>,
}

impl FetcherConfig {
    /// Apply defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or invalid field.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.oid_batch_size == 0 {
            self.oid_batch_size = DEFAULT_OID_BATCH_SIZE;
        }
        if self.downloader_workers_count == 0 {
            self.downloader_workers_count = DEFAULT_DOWNLOADER_WORKERS;
        }

        if self.addresses.is_empty() {
            return Err(ConfigError::NoAddresses);
        }
        if self.container_id.is_empty() {
            return Err(ConfigError::MissingContainerId);
        }
        if self.skip_index_files_search {
            if self.block_attribute.is_empty() {
                return Err(ConfigError::MissingBlockAttribute);
            }
        } else {
            if self.index_file_attribute.is_empty() {
                return Err(ConfigError::MissingIndexFileAttribute);
            }
            if self.index_file_size == 0 {
                return Err(ConfigError::MissingIndexFileSize);
            }
        }
        Ok(self)
    }

    /// Resolve the account used to authenticate store requests.
    ///
    /// When a wallet is configured, the password is tried against each of
    /// its accounts and the first that decrypts wins. Without a wallet an
    /// ephemeral account is generated.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::NoAccountDecrypted`] when the wallet holds no
    /// account the password opens, or the underlying I/O or parse error
    /// when the wallet file itself is unusable.
    pub fn resolve_account(&self) -> Result<Account, WalletError> {
        match &self.unlock_wallet {
            Some(unlock) => Wallet::open(&unlock.path)?.decrypt_any(&unlock.password),
            None => Ok(Account::ephemeral()),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No store endpoints were provided.
    #[error("no addresses provided")]
    NoAddresses,

    /// No container namespace was provided.
    #[error("no container id provided")]
    MissingContainerId,

    /// Index-file discovery requires the index-file attribute.
    #[error("index file attribute is required when index file search is enabled")]
    MissingIndexFileAttribute,

    /// Index-file discovery requires the index file size.
    #[error("index file size is required when index file search is enabled")]
    MissingIndexFileSize,

    /// Direct-search discovery requires the block attribute.
    #[error("block attribute is required when index file search is skipped")]
    MissingBlockAttribute,
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfetch_types::{EncryptedAccount, Wallet};

    fn base_config() -> FetcherConfig {
        FetcherConfig {
            index_file_size: 128,
            index_file_attribute: "index".to_owned(),
            container_id: "container".to_owned(),
            addresses: vec!["http://localhost:8080".to_owned()],
            ..Default::default()
        }
    }

    #[test]
    fn defaults_applied() {
        let cfg = base_config().normalized().unwrap();
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(cfg.oid_batch_size, DEFAULT_OID_BATCH_SIZE);
        assert_eq!(cfg.downloader_workers_count, DEFAULT_DOWNLOADER_WORKERS);
    }

    #[test]
    fn explicit_values_kept() {
        let cfg = FetcherConfig {
            timeout: Duration::from_secs(1),
            oid_batch_size: 16,
            downloader_workers_count: 2,
            ..base_config()
        }
        .normalized()
        .unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(1));
        assert_eq!(cfg.oid_batch_size, 16);
        assert_eq!(cfg.downloader_workers_count, 2);
    }

    #[test]
    fn addresses_required() {
        let cfg = FetcherConfig { addresses: vec![], ..base_config() };
        assert_eq!(cfg.normalized().unwrap_err(), ConfigError::NoAddresses);
    }

    #[test]
    fn index_mode_requirements() {
        let cfg = FetcherConfig { index_file_attribute: String::new(), ..base_config() };
        assert_eq!(cfg.normalized().unwrap_err(), ConfigError::MissingIndexFileAttribute);

        let cfg = FetcherConfig { index_file_size: 0, ..base_config() };
        assert_eq!(cfg.normalized().unwrap_err(), ConfigError::MissingIndexFileSize);
    }

    #[test]
    fn direct_mode_requirements() {
        let cfg = FetcherConfig { skip_index_files_search: true, ..base_config() };
        assert_eq!(cfg.normalized().unwrap_err(), ConfigError::MissingBlockAttribute);

        let cfg = FetcherConfig {
            skip_index_files_search: true,
            block_attribute: "height".to_owned(),
            index_file_attribute: String::new(),
            index_file_size: 0,
            ..base_config()
        };
        assert!(cfg.normalized().is_ok());
    }

    #[test]
    fn ephemeral_account_without_wallet() {
        assert!(base_config().resolve_account().is_ok());
    }

    #[test]
    fn wallet_account_resolution() {
        let account = Account::ephemeral();
        let wallet = Wallet { accounts: vec![EncryptedAccount::seal(&account, "pw").unwrap()] };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, wallet.to_json()).unwrap();

        let cfg = FetcherConfig {
            unlock_wallet: Some(UnlockWallet { path: path.clone(), password: "pw".to_owned() }),
            ..base_config()
        };
        let resolved = cfg.resolve_account().unwrap();
        assert_eq!(resolved.secret_bytes(), account.secret_bytes());

        let cfg = FetcherConfig {
            unlock_wallet: Some(UnlockWallet { path, password: "wrong".to_owned() }),
            ..base_config()
        };
        assert!(matches!(cfg.resolve_account(), Err(WalletError::NoAccountDecrypted)));
    }
}
