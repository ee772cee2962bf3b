// Top-level application context.
//
// `Companion` owns the configuration context and one task per synchronizer:
//
//   connection monitor  always running
//   lock engine         connected && instalock.active
//   dodge engine        connected && mapDodge.active
//   live match          connected
//   party               connected
//   session catalog     connected
//
// Consumers read state through watch receivers and request changes through
// `apply` and the party handle.

use std::sync::Arc;

use downfall_core::config::{AppConfig, Mutation};
use downfall_core::protocol::{ConnectionState, LiveMatch};
use downfall_core::GameClient;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::info;

use crate::connection::ConnectionMonitor;
use crate::dodge::{DodgeEngine, DodgeView};
use crate::live_match::{LiveMatchSync, LIVE_MATCH_POLL_INTERVAL};
use crate::lock::{LockEngine, LockView, PREGAME_POLL_INTERVAL};
use crate::party::{PartySync, PartyView, PARTY_POLL_INTERVAL};
use crate::poller::{run_gated, Gate, GateFn};
use crate::session::{SessionSync, SessionView, SESSION_POLL_INTERVAL};
use crate::store::ConfigStore;

fn lock_gate(conn: &ConnectionState, config: &AppConfig) -> bool {
    conn.is_connected() && config.instalock.active
}

fn dodge_gate(conn: &ConnectionState, config: &AppConfig) -> bool {
    conn.is_connected() && config.map_dodge.active
}

pub struct Companion<C> {
    config: ConfigStore,
    connection: watch::Receiver<ConnectionState>,
    lock: watch::Receiver<LockView>,
    dodge: watch::Receiver<DodgeView>,
    live_match: watch::Receiver<Option<LiveMatch>>,
    party: PartySync<C>,
    session: watch::Receiver<SessionView>,
    live_match_refresh: Arc<Notify>,
    party_refresh: Arc<Notify>,
    session_refresh: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: GameClient> Companion<C> {
    /// Spawn every synchronizer. Must be called from within a tokio runtime.
    pub fn start(client: Arc<C>, config: ConfigStore) -> Self {
        let mut tasks = Vec::new();

        let (monitor, connection) = ConnectionMonitor::new(client.clone());
        tasks.push(tokio::spawn(monitor.run()));

        let gate = |predicate: GateFn| Gate::new(connection.clone(), config.subscribe(), predicate);

        let (lock_engine, lock) = LockEngine::new(client.clone(), config.subscribe());
        tasks.push(tokio::spawn(run_gated(
            lock_engine,
            gate(lock_gate),
            PREGAME_POLL_INTERVAL,
            Arc::new(Notify::new()),
        )));

        let (dodge_engine, dodge) = DodgeEngine::new(client.clone(), config.subscribe());
        tasks.push(tokio::spawn(run_gated(
            dodge_engine,
            gate(dodge_gate),
            PREGAME_POLL_INTERVAL,
            Arc::new(Notify::new()),
        )));

        let live_match_refresh = Arc::new(Notify::new());
        let (live_sync, live_match) = LiveMatchSync::new(client.clone());
        tasks.push(tokio::spawn(run_gated(
            live_sync,
            Gate::connected(connection.clone(), config.subscribe()),
            LIVE_MATCH_POLL_INTERVAL,
            live_match_refresh.clone(),
        )));

        let party_refresh = Arc::new(Notify::new());
        let (party, _) = PartySync::new(client.clone());
        tasks.push(tokio::spawn(run_gated(
            party.clone(),
            Gate::connected(connection.clone(), config.subscribe()),
            PARTY_POLL_INTERVAL,
            party_refresh.clone(),
        )));

        let session_refresh = Arc::new(Notify::new());
        let (session_sync, session) = SessionSync::new(client);
        tasks.push(tokio::spawn(run_gated(
            session_sync,
            Gate::connected(connection.clone(), config.subscribe()),
            SESSION_POLL_INTERVAL,
            session_refresh.clone(),
        )));

        info!("Companion started ({} tasks)", tasks.len());
        Self {
            config,
            connection,
            lock,
            dodge,
            live_match,
            party,
            session,
            live_match_refresh,
            party_refresh,
            session_refresh,
            tasks,
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn config(&self) -> watch::Receiver<AppConfig> {
        self.config.subscribe()
    }

    pub fn lock(&self) -> watch::Receiver<LockView> {
        self.lock.clone()
    }

    pub fn dodge(&self) -> watch::Receiver<DodgeView> {
        self.dodge.clone()
    }

    pub fn live_match(&self) -> watch::Receiver<Option<LiveMatch>> {
        self.live_match.clone()
    }

    pub fn party_view(&self) -> watch::Receiver<PartyView> {
        self.party.subscribe()
    }

    pub fn session(&self) -> watch::Receiver<SessionView> {
        self.session.clone()
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    pub fn apply(&self, mutation: Mutation) {
        self.config.apply(mutation);
    }

    /// Handle for party mutations.
    pub fn party(&self) -> &PartySync<C> {
        &self.party
    }

    /// Refetch the live match from scratch, dropping merged state.
    pub fn refresh_live_match(&self) {
        self.live_match_refresh.notify_one();
    }

    pub fn refresh_party(&self) {
        self.party_refresh.notify_one();
    }

    pub fn refresh_session(&self) {
        self.session_refresh.notify_one();
    }

    /// Stop every synchronizer and flush pending settings.
    pub async fn shutdown(self) {
        info!("Companion shutting down");
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
        self.config.shutdown().await;
    }
}
