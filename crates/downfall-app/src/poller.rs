// Gated periodic polling.
//
// Every synchronizer runs as its own task driven by `run_gated`. The task
// re-derives whether it should be polling each time the connection state or
// the settings change, and resets its poller whenever the gate closes.
// A poll is always awaited to completion before the next tick is considered,
// so a slow RPC can never overlap with the next invocation of the same poller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use downfall_core::config::AppConfig;
use downfall_core::protocol::ConnectionState;
use downfall_core::{ClientError, ClientResult};
use tokio::sync::{watch, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Upper bound on a single poll fetch. A fetch that exceeds it is treated
/// like any other transient poll failure.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a lock or dodge command. Longer than `FETCH_TIMEOUT`
/// because the service may queue the request behind the pregame update.
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(15);

/// A synchronizer driven by `run_gated`.
#[async_trait]
pub trait Poller: Send + 'static {
    /// Name used in log output.
    const NAME: &'static str;

    /// One scheduled poll.
    async fn poll(&mut self);

    /// A forced poll. Runs when the gate opens and on explicit refresh
    /// requests.
    async fn refresh(&mut self) {
        self.poll().await;
    }

    /// Return to the idle baseline. Called whenever the gate closes.
    fn reset(&mut self);
}

/// Predicate deciding whether a poller should be running.
pub type GateFn = fn(&ConnectionState, &AppConfig) -> bool;

/// Watches the connection state and the settings and evaluates a predicate
/// over both.
pub struct Gate {
    connection: watch::Receiver<ConnectionState>,
    config: watch::Receiver<AppConfig>,
    predicate: GateFn,
}

impl Gate {
    pub fn new(
        connection: watch::Receiver<ConnectionState>,
        config: watch::Receiver<AppConfig>,
        predicate: GateFn,
    ) -> Self {
        Self {
            connection,
            config,
            predicate,
        }
    }

    /// Open while the game client is connected.
    pub fn connected(
        connection: watch::Receiver<ConnectionState>,
        config: watch::Receiver<AppConfig>,
    ) -> Self {
        Self::new(connection, config, |conn, _| conn.is_connected())
    }

    pub fn is_open(&self) -> bool {
        (self.predicate)(&self.connection.borrow(), &self.config.borrow())
    }

    /// Wait for either input to change. Returns `false` once an input's
    /// sender has been dropped.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            res = self.connection.changed() => res.is_ok(),
            res = self.config.changed() => res.is_ok(),
        }
    }
}

/// Drive `poller` every `period` while `gate` is open.
///
/// When the gate opens the poller is refreshed immediately, then polled on
/// each tick. Ticks missed while a poll is still running are skipped. A
/// notification on `refresh` forces a refresh between ticks. When the gate
/// closes the poller is reset and the task waits for the gate to reopen.
/// Returns once the gate's inputs are gone.
pub async fn run_gated<P: Poller>(
    mut poller: P,
    mut gate: Gate,
    period: Duration,
    refresh: Arc<Notify>,
) {
    loop {
        while !gate.is_open() {
            if !gate.changed().await {
                debug!("{} poller inputs closed", P::NAME);
                return;
            }
        }

        info!("{} poller started", P::NAME);
        poller.refresh().await;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => poller.poll().await,
                _ = refresh.notified() => poller.refresh().await,
                alive = gate.changed() => {
                    if !alive {
                        poller.reset();
                        debug!("{} poller inputs closed", P::NAME);
                        return;
                    }
                    if !gate.is_open() {
                        break;
                    }
                }
            }
        }

        info!("{} poller stopped", P::NAME);
        poller.reset();
    }
}

/// Await a poll fetch, bounded by `FETCH_TIMEOUT`.
pub async fn fetch<T, F>(command: &'static str, call: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    match tokio::time::timeout(FETCH_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout { command }),
    }
}

/// Await an automation command, bounded by `ACTION_TIMEOUT`. A timed out
/// command counts as failed, so the engine leaves the match unhandled.
pub async fn act<F>(command: &'static str, call: F) -> ClientResult<()>
where
    F: Future<Output = ClientResult<()>>,
{
    match tokio::time::timeout(ACTION_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout { command }),
    }
}
