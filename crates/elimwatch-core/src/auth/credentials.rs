use std::fmt;

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "elimwatch";
const TORN_KEY_ACCOUNT: &str = "torn-api-key";
const STATS_KEY_ACCOUNT: &str = "stats-api-key";

/// API keys for the session.
///
/// Debug output is redacted; keys must never reach logs or serialized state.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub stats_key: Option<String>,
}

impl Credentials {
    pub fn new(api_key: String, stats_key: Option<String>) -> Self {
        let stats_key = stats_key.filter(|k| !k.trim().is_empty());
        Self { api_key, stats_key }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("stats_key", &self.stats_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// OS keychain storage for the API keys.
pub struct CredentialStore;

impl CredentialStore {
    /// Store both keys in the keychain. A missing stats key removes any
    /// previously stored one.
    pub fn store(credentials: &Credentials) -> Result<()> {
        set_entry(TORN_KEY_ACCOUNT, &credentials.api_key)?;
        match &credentials.stats_key {
            Some(key) => set_entry(STATS_KEY_ACCOUNT, key)?,
            None => delete_entry(STATS_KEY_ACCOUNT)?,
        }
        Ok(())
    }

    /// Load stored credentials. None when no Torn key was ever saved.
    pub fn load() -> Result<Option<Credentials>> {
        let Some(api_key) = get_entry(TORN_KEY_ACCOUNT)? else {
            return Ok(None);
        };
        let stats_key = get_entry(STATS_KEY_ACCOUNT)?;
        Ok(Some(Credentials::new(api_key, stats_key)))
    }

    /// Remove both keys from the keychain.
    pub fn clear() -> Result<()> {
        delete_entry(TORN_KEY_ACCOUNT)?;
        delete_entry(STATS_KEY_ACCOUNT)?;
        Ok(())
    }
}

fn entry(account: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, account).context("Failed to create keyring entry")
}

fn set_entry(account: &str, value: &str) -> Result<()> {
    entry(account)?
        .set_password(value)
        .context("Failed to store key in keychain")
}

fn get_entry(account: &str) -> Result<Option<String>> {
    match entry(account)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to read key from keychain"),
    }
}

fn delete_entry(account: &str) -> Result<()> {
    match entry(account)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Failed to delete key from keychain"),
    }
}

// ============================================================================
// Tests
// ============================================================================
