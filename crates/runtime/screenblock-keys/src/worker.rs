//! Background derivation thread

use screenblock_core::{derive_verifier, Pattern, Salt, Verifier};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::{KeyError, Result};

const QUEUE_DEPTH: usize = 8;

struct DeriveJob {
    pattern: Pattern,
    salt: Salt,
    iterations: u32,
    reply: oneshot::Sender<screenblock_core::Result<Zeroizing<Verifier>>>,
}

/// One long-lived thread running PBKDF2 jobs in arrival order
///
/// The thread exits once every handle to the worker is dropped. Jobs whose
/// caller stopped waiting are skipped rather than derived.
#[derive(Clone)]
pub struct DerivationWorker {
    tx: mpsc::Sender<DeriveJob>,
}

impl DerivationWorker {
    pub fn spawn() -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<DeriveJob>(QUEUE_DEPTH);

        std::thread::Builder::new()
            .name("screenblock-derive".into())
            .spawn(move || {
                debug!("derivation worker started");
                while let Some(job) = rx.blocking_recv() {
                    if job.reply.is_closed() {
                        trace!("skipping abandoned derivation");
                        continue;
                    }
                    let result = derive_verifier(&job.pattern, &job.salt, job.iterations);
                    let _ = job.reply.send(result);
                }
                debug!("derivation worker stopped");
            })
            .map_err(|e| KeyError::Worker(e.to_string()))?;

        Ok(Self { tx })
    }

    /// Derive the verifier for `pattern` under `salt` on the worker thread
    pub async fn derive(
        &self,
        pattern: Pattern,
        salt: Salt,
        iterations: u32,
    ) -> Result<Zeroizing<Verifier>> {
        let (reply, response) = oneshot::channel();
        let job = DeriveJob {
            pattern,
            salt,
            iterations,
            reply,
        };

        self.tx
            .send(job)
            .await
            .map_err(|_| KeyError::Worker("worker has shut down".into()))?;

        let result = response
            .await
            .map_err(|_| KeyError::Worker("worker dropped the request".into()))?;
        Ok(result?)
    }
}
