use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "pawbase";

/// Refresh-token-at-rest storage in the OS keychain, keyed by account
/// email. Lets a client restore a session across restarts without
/// keeping the password anywhere.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the refresh token for an account in the OS keychain
    pub fn store_refresh_token(email: &str, refresh_token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    /// Look up the stored refresh token for an account.
    ///
    /// `Ok(None)` means nothing is stored for this account; an `Err`
    /// means the keychain itself failed (locked, no backend) and says
    /// nothing about whether a token exists.
    pub fn find_refresh_token(email: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    /// Delete the stored refresh token for an account
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete refresh token from keychain")?;
        Ok(())
    }

    /// Check if a refresh token is stored for an account
    pub fn has_refresh_token(email: &str) -> bool {
        matches!(Self::find_refresh_token(email), Ok(Some(_)))
    }
}
