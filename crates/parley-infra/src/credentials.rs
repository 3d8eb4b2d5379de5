//! API key resolution and storage.
//!
//! The key is looked up through an ordered chain of sources, first match
//! wins: the environment variable named in `[completion]`, then the OS
//! keychain entry written by `parley key set`. Keys are wrapped in
//! [`SecretString`] as soon as they are read and are never logged. A source
//! holding a blank value counts as missing; a source that fails (no keychain
//! on a headless box, say) is skipped.

use std::sync::Arc;

use parley_types::config::CompletionConfig;
use secrecy::SecretString;
use tracing::debug;

use crate::keychain::KeychainProvider;

/// Keychain account name the API key is stored under.
pub const API_KEY_ENTRY: &str = "ai_api_key";

const API_KEY_PREFIX: &str = "sk-";
const API_KEY_MIN_BODY: usize = 32;

/// Errors from validating, reading or storing an API key.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("API key is required")]
    Missing,

    #[error("Invalid API key format")]
    InvalidFormat,

    #[error("keychain {0}")]
    Keychain(String),
}

/// Check that `key` looks like `sk-` followed by at least 32 ASCII letters or digits.
pub fn validate_api_key(key: &str) -> Result<(), CredentialError> {
    if key.trim().is_empty() {
        return Err(CredentialError::Missing);
    }
    let body = key
        .strip_prefix(API_KEY_PREFIX)
        .ok_or(CredentialError::InvalidFormat)?;
    if body.len() < API_KEY_MIN_BODY || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CredentialError::InvalidFormat);
    }
    Ok(())
}

/// Validate `key` and save it to the keychain.
pub fn store_api_key(keychain: &KeychainProvider, key: &str) -> Result<(), CredentialError> {
    let key = key.trim();
    validate_api_key(key)?;
    keychain.set(API_KEY_ENTRY, key)
}

/// Remove the stored key. Returns `false` if none was stored.
pub fn delete_api_key(keychain: &KeychainProvider) -> Result<bool, CredentialError> {
    keychain.delete(API_KEY_ENTRY)
}

/// Show only the last four characters of a key.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "****".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

/// Wrap a raw key, treating blank values as missing.
pub fn resolve_api_key(raw: Option<String>) -> Option<SecretString> {
    raw.map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

/// One place an API key can come from.
pub trait KeySource: Send + Sync {
    /// Where the key came from, for display (`env OPENAI_API_KEY`, `keychain`).
    fn label(&self) -> String;

    /// The raw stored value, if any.
    fn read(&self) -> Result<Option<String>, CredentialError>;
}

/// Reads the key from an environment variable. Unset or non-Unicode is missing.
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeySource for EnvKeySource {
    fn label(&self) -> String {
        format!("env {}", self.var)
    }

    fn read(&self) -> Result<Option<String>, CredentialError> {
        Ok(std::env::var(&self.var).ok())
    }
}

/// Reads the key from the OS keychain.
pub struct KeychainKeySource {
    keychain: KeychainProvider,
}

impl KeychainKeySource {
    pub fn new(keychain: KeychainProvider) -> Self {
        Self { keychain }
    }
}

impl KeySource for KeychainKeySource {
    fn label(&self) -> String {
        "keychain".to_string()
    }

    fn read(&self) -> Result<Option<String>, CredentialError> {
        self.keychain.get(API_KEY_ENTRY)
    }
}

/// A key found by [`ApiKeyChain::resolve`].
#[derive(Debug)]
pub struct ResolvedKey {
    /// Label of the source that supplied it.
    pub source: String,
    pub key: SecretString,
}

/// Ordered key sources; the first non-blank value wins.
#[derive(Clone)]
pub struct ApiKeyChain {
    sources: Vec<Arc<dyn KeySource>>,
}

impl ApiKeyChain {
    pub fn new(sources: Vec<Arc<dyn KeySource>>) -> Self {
        Self { sources }
    }

    /// Environment variable from `config`, then the keychain.
    pub fn for_config(config: &CompletionConfig, keychain: KeychainProvider) -> Self {
        Self::new(vec![
            Arc::new(EnvKeySource::new(&config.api_key_env)),
            Arc::new(KeychainKeySource::new(keychain)),
        ])
    }

    /// Walk the chain and return the first key found.
    pub fn resolve(&self) -> Option<ResolvedKey> {
        for source in &self.sources {
            match source.read() {
                Ok(raw) => {
                    if let Some(key) = resolve_api_key(raw) {
                        debug!(source = %source.label(), "API key resolved");
                        return Some(ResolvedKey {
                            source: source.label(),
                            key,
                        });
                    }
                }
                Err(e) => debug!(source = %source.label(), error = %e, "Key source unavailable"),
            }
        }
        None
    }
}
