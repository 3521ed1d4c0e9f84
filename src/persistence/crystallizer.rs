use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::PensieveStore;

/// The periodic snapshot task.
///
/// One per process. Snapshots immediately, then once per interval until
/// [`Crystallizer::shutdown`] is called. A failed snapshot is logged and the
/// loop carries on with the next tick.
#[derive(Debug)]
pub struct Crystallizer {
    store: PensieveStore,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Crystallizer {
    pub fn spawn(store: PensieveStore, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let join = tokio::spawn(run_loop(store.clone(), interval, token.clone()));
        info!(
            name: "crystallizer.started",
            interval_secs = interval.as_secs(),
            "Periodic crystallization started"
        );
        Self { store, token, join }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop the loop, wait for it, then take one final snapshot.
    pub async fn shutdown(self) -> Result<PathBuf> {
        self.token.cancel();
        if let Err(error) = self.join.await {
            warn!(%error, "crystallizer task ended abnormally");
        }
        info!(name: "crystallizer.stopped", "Periodic crystallization stopped");
        self.store.crystallize().await
    }
}

async fn run_loop(store: PensieveStore, interval: Duration, token: CancellationToken) {
    loop {
        match store.crystallize().await {
            Ok(path) => debug!(path = %path.display(), "periodic snapshot written"),
            Err(error) => warn!(%error, "periodic snapshot failed"),
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
}
