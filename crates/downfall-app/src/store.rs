// Configuration context.
//
// `ConfigStore` is the only writer of the settings document. Mutations are
// applied in memory and published immediately; a background task persists
// the latest snapshot once no further mutation has arrived for
// `SAVE_DEBOUNCE`.

use std::sync::Arc;
use std::time::Duration;

use downfall_core::config::{AppConfig, Mutation, SettingsStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Quiet period after the last mutation before the document is written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct ConfigStore {
    tx: watch::Sender<AppConfig>,
    persist: Option<JoinHandle<()>>,
}

impl ConfigStore {
    /// Load the document from `store`. A failed load leaves the defaults in
    /// place.
    pub async fn load<S: SettingsStore>(store: Arc<S>) -> Self {
        let config = match store.load().await {
            Ok(config) => {
                info!("Settings loaded");
                config
            }
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppConfig::default()
            }
        };
        Self::with_config(store, config)
    }

    /// Start from an already loaded document.
    pub fn with_config<S: SettingsStore>(store: Arc<S>, config: AppConfig) -> Self {
        let (tx, rx) = watch::channel(config);
        let persist = tokio::spawn(persist_loop(store, rx));
        Self {
            tx,
            persist: Some(persist),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AppConfig {
        self.tx.borrow().clone()
    }

    /// Apply a mutation, publish the new snapshot, and schedule a write.
    pub fn apply(&self, mutation: Mutation) {
        debug!("Applying settings mutation {:?}", mutation);
        self.tx.send_modify(|config| mutation.apply(config));
    }

    /// Stop accepting mutations and flush any pending write.
    pub async fn shutdown(mut self) {
        let persist = self.persist.take();
        drop(self);
        if let Some(persist) = persist {
            if let Err(e) = persist.await {
                warn!("Settings writer ended abnormally: {}", e);
            }
        }
    }
}

/// Persist the latest snapshot after each burst of changes. When the store
/// is dropped, a pending burst is written before the task ends.
async fn persist_loop<S: SettingsStore>(store: Arc<S>, mut rx: watch::Receiver<AppConfig>) {
    while rx.changed().await.is_ok() {
        loop {
            tokio::select! {
                res = rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(SAVE_DEBOUNCE) => break,
            }
        }

        let config = rx.borrow_and_update().clone();
        match store.save(&config).await {
            Ok(()) => debug!("Settings saved"),
            Err(e) => warn!("Failed to save settings: {}", e),
        }
    }
    debug!("Settings writer stopped");
}
