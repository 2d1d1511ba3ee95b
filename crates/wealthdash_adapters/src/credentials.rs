use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use wealthdash_core::entities::{AccountCredential, AccountId};
use wealthdash_core::ports::CredentialStore;
use wealthdash_core::Error;

/// Accounts file: a JSON array of credential records
pub struct JsonCredentialStore {
    path: PathBuf,
    // serializes read-modify-write against concurrent saves
    lock: Mutex<()>,
}

impl JsonCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// `config.json` inside `config_dir`
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<AccountCredential>, Error> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(Error::Configuration(format!(
                "accounts file {} not found",
                self.path.display()
            )));
        }

        let content = fs::read_to_string(&self.path).await?;
        let credentials: Vec<AccountCredential> = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "failed to parse accounts file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        self.check_unique(&credentials)?;
        Ok(credentials)
    }

    fn check_unique(&self, credentials: &[AccountCredential]) -> Result<(), Error> {
        let mut seen = HashSet::with_capacity(credentials.len());
        match credentials.iter().find(|c| !seen.insert(&c.account_id)) {
            Some(dup) => Err(Error::Configuration(format!(
                "duplicate account id '{}' in {}",
                dup.account_id,
                self.path.display()
            ))),
            None => Ok(()),
        }
    }

    /// Writes a sibling temp file and renames it over the accounts file
    async fn save(&self, credentials: &[AccountCredential]) -> Result<(), Error> {
        self.check_unique(credentials)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Persistence(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(credentials)
            .map_err(|e| Error::Persistence(format!("failed to serialize accounts: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_credentials(&self) -> Result<Vec<AccountCredential>, Error> {
        let _guard = self.lock.lock().await;
        let credentials = self.load().await?;
        debug!(count = credentials.len(), "loaded accounts");
        Ok(credentials)
    }

    #[instrument(skip(self, credentials), fields(path = %self.path.display()))]
    async fn save_credentials(&self, credentials: &[AccountCredential]) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        self.save(credentials).await
    }

    #[instrument(skip(self, token))]
    async fn update_session_token(&self, account_id: &AccountId, token: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        let mut credentials = self.load().await?;

        let Some(credential) = credentials
            .iter_mut()
            .find(|c| &c.account_id == account_id)
        else {
            warn!("no such account, access token not stored");
            return Err(Error::AccountNotFound(account_id.clone()));
        };

        credential.access_token = token.to_string();
        self.save(&credentials).await?;
        debug!("access token stored");
        Ok(())
    }
}
