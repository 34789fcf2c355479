use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "storefront";

/// Account passwords kept in the OS keychain, keyed by email.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an account in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the stored password, if any
    pub fn get_password(email: &str) -> Option<String> {
        Entry::new(SERVICE_NAME, email)
            .and_then(|entry| entry.get_password())
            .ok()
    }

    /// Forget the stored password
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}
