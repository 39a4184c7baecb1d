//! Credential selection for the storage account.
//!
//! Two capabilities only: ambient identity (CLI login, managed identity,
//! environment variables — whatever the identity crate discovers) or an
//! explicit shared account key. Which one to use is decided once, up front,
//! and injected into the catalog backend; nothing downstream branches on it.

use crate::error::{ErrorKind, Result};
use azure_storage::StorageCredentials;
use exn::ResultExt;

/// How to authenticate against the storage account.
#[derive(Clone, Debug)]
pub enum Credential {
    /// Discover a token credential from the ambient environment.
    AmbientIdentity,
    /// Explicit shared key for the storage account.
    AccountKey(String),
}

impl Credential {
    /// Pick the credential variant: an explicit key wins over ambient identity.
    pub fn from_key(key: Option<String>) -> Self {
        match key {
            Some(key) => Self::AccountKey(key),
            None => Self::AmbientIdentity,
        }
    }

    /// Build the SDK-level credentials for `account`.
    ///
    /// Ambient discovery can fail outright (no CLI login, no managed
    /// identity endpoint); that surfaces as [`Access`](ErrorKind::Access)
    /// here rather than on the first request.
    pub(crate) fn into_storage_credentials(self, account: &str) -> Result<StorageCredentials> {
        Ok(match self {
            Self::AccountKey(key) => StorageCredentials::access_key(account.to_string(), key),
            Self::AmbientIdentity => {
                let token = azure_identity::create_credential()
                    .or_raise(|| ErrorKind::Access("no ambient credential available".to_string()))?;
                StorageCredentials::token_credential(token)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let credential = Credential::from_key(Some("hunter2".to_string()));
        assert!(matches!(credential, Credential::AccountKey(key) if key == "hunter2"));
    }

    #[test]
    fn test_no_key_means_ambient() {
        assert!(matches!(Credential::from_key(None), Credential::AmbientIdentity));
    }
}
