//! Key manager - the only path that writes a credential

use async_trait::async_trait;
use screenblock_config::KeyConfig;
use screenblock_core::{generate_salt, verifiers_match, Credential, Pattern, PatternPolicy};
use screenblock_store::CredentialStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::{DerivationWorker, KeyError, Result};

/// Answers whether a traced pattern unlocks the screen
#[async_trait]
pub trait PatternVerifier: Send + Sync {
    /// `true` only if a credential exists and `candidate` derives to its hash
    async fn compare_key(&self, candidate: &Pattern) -> bool;
}

/// Creates credentials and compares candidate patterns against the stored one
pub struct KeyManager {
    store: Arc<dyn CredentialStore>,
    view: watch::Receiver<Option<Credential>>,
    worker: DerivationWorker,
    iterations: u32,
    policy: PatternPolicy,
}

impl KeyManager {
    pub fn new(store: Arc<dyn CredentialStore>, keys: KeyConfig, policy: PatternPolicy) -> Result<Self> {
        let worker = DerivationWorker::spawn()?;
        Ok(Self::with_worker(store, worker, keys, policy))
    }

    /// Share an existing derivation thread
    pub fn with_worker(
        store: Arc<dyn CredentialStore>,
        worker: DerivationWorker,
        keys: KeyConfig,
        policy: PatternPolicy,
    ) -> Self {
        let view = store.subscribe();
        Self {
            store,
            view,
            worker,
            iterations: keys.iterations,
            policy,
        }
    }

    pub fn policy(&self) -> &PatternPolicy {
        &self.policy
    }

    pub fn is_key_present(&self) -> bool {
        self.view.borrow().is_some()
    }

    /// Presence now, then again after every credential write
    pub fn key_presence(&self) -> impl Stream<Item = bool> + Send + 'static {
        self.store.stream().map(|credential| credential.is_some())
    }

    /// Replace the stored credential with one derived from `pattern`
    ///
    /// Resolves only once the store reports back the credential just written.
    pub async fn create_new_key(&self, pattern: &Pattern) -> Result<()> {
        self.policy.check(pattern)?;

        let salt = generate_salt()?;
        let hash = self.worker.derive(pattern.clone(), salt, self.iterations).await?;
        let credential = Credential::new(salt, *hash, self.iterations);

        self.store.write(credential.clone()).await?;

        let stored = self.view.borrow().clone();
        match stored {
            Some(stored) if stored == credential => {
                info!(credential = ?stored, "new pattern registered");
                Ok(())
            }
            _ => {
                warn!("credential write not visible in store");
                Err(KeyError::WriteNotVerified)
            }
        }
    }

    pub async fn compare_key(&self, candidate: &Pattern) -> bool {
        let stored = self.view.borrow().clone();
        let Some(stored) = stored else {
            debug!("no credential registered, nothing can match");
            return false;
        };

        match self
            .worker
            .derive(candidate.clone(), *stored.salt(), stored.iterations())
            .await
        {
            Ok(derived) => {
                let matched = verifiers_match(stored.hash(), &derived[..]);
                debug!(matched, "pattern compared");
                matched
            }
            Err(e) => {
                warn!(error = %e, "pattern comparison failed");
                false
            }
        }
    }
}

#[async_trait]
impl PatternVerifier for KeyManager {
    async fn compare_key(&self, candidate: &Pattern) -> bool {
        KeyManager::compare_key(self, candidate).await
    }
}
