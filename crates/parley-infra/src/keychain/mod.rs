//! OS keychain adapter for the stored API key.
//!
//! Uses the `keyring` crate to reach the platform store:
//! - macOS Keychain
//! - Linux Secret Service (GNOME Keyring, KDE Wallet)
//! - Windows Credential Manager

use crate::credentials::CredentialError;

/// OS keychain access under one service name.
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a KeychainProvider with the default service name "parley".
    pub fn new() -> Self {
        Self {
            service_name: "parley".to_string(),
        }
    }

    /// Create a KeychainProvider with a custom service name (useful for testing).
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service_name, key)
            .map_err(|e| CredentialError::Keychain(format!("entry error: {e}")))
    }

    /// Read a stored value. `None` when nothing is stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keychain(format!("get error: {e}"))),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| CredentialError::Keychain(format!("set error: {e}")))
    }

    /// Remove the value under `key`. Returns `false` if nothing was stored.
    pub fn delete(&self, key: &str) -> Result<bool, CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(CredentialError::Keychain(format!("delete error: {e}"))),
        }
    }
}

impl Default for KeychainProvider {
    fn default() -> Self {
        Self::new()
    }
}
