//! Wallet and account model for store authentication.
//!
//! A wallet file is a JSON document holding one or more password-encrypted
//! accounts. Account secrets are sealed with XChaCha20-Poly1305 under a key
//! derived from the password; an ephemeral account can be generated when no
//! wallet is configured.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::Path};
use zeroize::Zeroize;

/// Key-derivation context for sealing account secrets under a password.
const WALLET_KEY_CONTEXT: &str = "blockfetch wallet account seal v1";

/// Key-derivation context for the gateway access token.
const TOKEN_CONTEXT: &str = "blockfetch gateway access token v1";

/// An unlocked account.
///
/// Holds the 32-byte secret used to authenticate object-store requests.
/// The secret is zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Account([u8; 32]);

impl Account {
    /// Create an account from a raw secret.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self(secret)
    }

    /// Generate a fresh random account.
    pub fn ephemeral() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self(secret)
    }

    /// Borrow the raw secret.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the bearer token presented to the store gateway.
    ///
    /// The token is a one-way derivation: it authenticates without exposing
    /// the account secret on the wire.
    pub fn access_token(&self) -> String {
        hex::encode(blake3::derive_key(TOKEN_CONTEXT, &self.0))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").finish_non_exhaustive()
    }
}

/// A password-encrypted account as stored in a wallet file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedAccount {
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Nonce used when sealing the secret.
    #[serde(with = "hex::serde")]
    nonce: [u8; 24],
    /// Sealed secret.
    #[serde(with = "hex::serde")]
    ciphertext: Vec<u8>,
}

impl EncryptedAccount {
    /// Seal an account under a password.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::SealFailed`] if the cipher rejects the
    /// secret.
    pub fn seal(account: &Account, password: &str) -> Result<Self, WalletError> {
        let key = blake3::derive_key(WALLET_KEY_CONTEXT, password.as_bytes());
        let cipher = XChaCha20Poly1305::new((&key).into());
        let mut nonce = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), account.secret_bytes().as_slice())
            .map_err(|_| WalletError::SealFailed)?;
        Ok(Self { label: None, nonce, ciphertext })
    }

    /// Attempt to decrypt this account with the given password.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::WrongPassword`] when the password does not
    /// open this account.
    pub fn decrypt(&self, password: &str) -> Result<Account, WalletError> {
        let key = blake3::derive_key(WALLET_KEY_CONTEXT, password.as_bytes());
        let cipher = XChaCha20Poly1305::new((&key).into());
        let mut plaintext = cipher
            .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| WalletError::WrongPassword)?;
        let secret: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::MalformedSecret(plaintext.len()))?;
        plaintext.zeroize();
        Ok(Account::from_secret(secret))
    }
}

/// A wallet file: a set of encrypted accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wallet {
    /// The encrypted accounts, in file order.
    pub accounts: Vec<EncryptedAccount>,
}

impl Wallet {
    /// Read a wallet from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Io`] if the file cannot be read and
    /// [`WalletError::Malformed`] if it is not a valid wallet document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a wallet from its JSON representation.
    pub fn from_json(contents: &str) -> Result<Self, WalletError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Serialize the wallet to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("wallet serialization cannot fail")
    }

    /// Decrypt the first account that opens with the given password.
    ///
    /// Accounts are tried in file order; the first successful decryption
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::NoAccountDecrypted`] when no account opens
    /// with the password.
    pub fn decrypt_any(&self, password: &str) -> Result<Account, WalletError> {
        for account in &self.accounts {
            if let Ok(account) = account.decrypt(password) {
                return Ok(account);
            }
        }
        Err(WalletError::NoAccountDecrypted)
    }
}

/// Error loading or unlocking a wallet.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The wallet file could not be read.
    #[error("failed to read wallet file: {0}")]
    Io(#[from] io::Error),

    /// The wallet file is not a valid wallet document.
    #[error("malformed wallet file: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The password does not open the account.
    #[error("wrong password")]
    WrongPassword,

    /// The account secret could not be sealed.
    #[error("failed to seal account secret")]
    SealFailed,

    /// The sealed secret has an unexpected length.
    #[error("malformed account secret: expected 32 bytes, got {0}")]
    MalformedSecret(usize),

    /// No account in the wallet opened with the supplied password.
    #[error("failed to decrypt any account in the wallet")]
    NoAccountDecrypted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_decrypt() {
        let account = Account::ephemeral();
        let sealed = EncryptedAccount::seal(&account, "hunter2").unwrap();
        let opened = sealed.decrypt("hunter2").unwrap();
        assert_eq!(opened.secret_bytes(), account.secret_bytes());
        assert!(matches!(sealed.decrypt("wrong"), Err(WalletError::WrongPassword)));
    }

    #[test]
    fn first_matching_account_wins() {
        let first = Account::ephemeral();
        let second = Account::ephemeral();
        let wallet = Wallet {
            accounts: vec![
                EncryptedAccount::seal(&first, "other").unwrap(),
                EncryptedAccount::seal(&second, "pass").unwrap(),
                EncryptedAccount::seal(&first, "pass").unwrap(),
            ],
        };
        let opened = wallet.decrypt_any("pass").unwrap();
        assert_eq!(opened.secret_bytes(), second.secret_bytes());
    }

    #[test]
    fn no_account_decrypted() {
        let wallet = Wallet {
            accounts: vec![EncryptedAccount::seal(&Account::ephemeral(), "secret").unwrap()],
        };
        assert!(matches!(wallet.decrypt_any("nope"), Err(WalletError::NoAccountDecrypted)));
        assert!(matches!(Wallet::default().decrypt_any("any"), Err(WalletError::NoAccountDecrypted)));
    }

    #[test]
    fn json_round_trip() {
        let account = Account::ephemeral();
        let wallet = Wallet { accounts: vec![EncryptedAccount::seal(&account, "pw").unwrap()] };
        let parsed = Wallet::from_json(&wallet.to_json()).unwrap();
        let opened = parsed.decrypt_any("pw").unwrap();
        assert_eq!(opened.secret_bytes(), account.secret_bytes());
    }

    #[test]
    fn open_from_file() {
        let account = Account::ephemeral();
        let wallet = Wallet { accounts: vec![EncryptedAccount::seal(&account, "pw").unwrap()] };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, wallet.to_json()).unwrap();

        let loaded = Wallet::open(&path).unwrap();
        assert!(loaded.decrypt_any("pw").is_ok());
        assert!(Wallet::open(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn access_token_is_stable_and_opaque() {
        let account = Account::ephemeral();
        assert_eq!(account.access_token(), account.access_token());
        assert_ne!(account.access_token(), hex::encode(account.secret_bytes()));
        assert_ne!(account.access_token(), Account::ephemeral().access_token());
    }
}
