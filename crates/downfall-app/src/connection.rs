// Connection monitor: polls the game client's session status.
//
// Runs for the whole lifetime of the process. Every other poller gates on
// the state it publishes.

use std::sync::Arc;
use std::time::Duration;

use downfall_core::protocol::ConnectionState;
use downfall_core::GameClient;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::poller::fetch;

/// How often the session status is queried.
pub const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ConnectionMonitor<C> {
    client: Arc<C>,
    tx: watch::Sender<ConnectionState>,
}

impl<C: GameClient> ConnectionMonitor<C> {
    /// Create a monitor and the receiver on which it publishes. The initial
    /// state is `disconnected`.
    pub fn new(client: Arc<C>) -> (Self, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::disconnected());
        (Self { client, tx }, rx)
    }

    /// Query the status once and publish the result. A failed query
    /// publishes `disconnected` with no identity so a stale `connected`
    /// never survives an error.
    pub async fn poll_once(&self) {
        let next = match fetch("get_connection_state", self.client.connection_state()).await {
            Ok(state) => state,
            Err(e) => {
                debug!("Connection status query failed: {}", e);
                ConnectionState::disconnected()
            }
        };

        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.status != next.status {
                info!("Connection status {:?} -> {:?}", current.status, next.status);
            }
            *current = next;
            true
        });
    }

    /// Poll forever at `CONNECTION_POLL_INTERVAL`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(CONNECTION_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}
