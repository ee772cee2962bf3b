// Lock engine: locks the configured agent once per pregame.
//
// States: idle -> locking -> locked -> idle. The engine remembers the last
// match it locked successfully so repeated polls of the same pregame never
// issue a second lock. A failed lock leaves the match unhandled and is
// retried on the next poll. Switching instalock off during the select delay
// abandons the attempt before the command is sent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use downfall_core::config::{AppConfig, TimingConfig, TimingPreset};
use downfall_core::protocol::PregameState;
use downfall_core::GameClient;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::poller::{act, fetch, Poller};

/// How often the pregame state is polled.
pub const PREGAME_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Select-delay range for the humanized preset, in milliseconds.
const HUMANIZED_SELECT_MS: std::ops::Range<u64> = 400..1200;

/// Lock-delay range for the humanized preset, in milliseconds.
const HUMANIZED_LOCK_MS: std::ops::Range<u64> = 200..800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LockStatus {
    #[default]
    Idle,
    Locking,
    Locked,
}

/// What the lock engine publishes after every poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    pub status: LockStatus,
    pub pregame: Option<PregameState>,
    /// Agent chosen for the current pregame, once resolved.
    pub target_agent: Option<String>,
}

/// Delays applied before and after the lock command.
///
/// `instant` never waits. `humanized` draws both delays independently on
/// every call. `custom` uses the configured literal values.
pub fn lock_delays<R: Rng>(timing: &TimingConfig, rng: &mut R) -> (Duration, Duration) {
    match timing.preset {
        TimingPreset::Instant => (Duration::ZERO, Duration::ZERO),
        TimingPreset::Humanized => (
            Duration::from_millis(rng.random_range(HUMANIZED_SELECT_MS)),
            Duration::from_millis(rng.random_range(HUMANIZED_LOCK_MS)),
        ),
        TimingPreset::Custom => (
            Duration::from_millis(timing.select_delay),
            Duration::from_millis(timing.lock_delay),
        ),
    }
}

pub struct LockEngine<C> {
    client: Arc<C>,
    config: watch::Receiver<AppConfig>,
    view: watch::Sender<LockView>,
    /// Match id of the last successful lock.
    handled_match: Option<String>,
    rng: StdRng,
}

impl<C: GameClient> LockEngine<C> {
    pub fn new(
        client: Arc<C>,
        config: watch::Receiver<AppConfig>,
    ) -> (Self, watch::Receiver<LockView>) {
        Self::with_rng(client, config, StdRng::from_os_rng())
    }

    /// Construct with a specific random source for the humanized delays.
    pub fn with_rng(
        client: Arc<C>,
        config: watch::Receiver<AppConfig>,
        rng: StdRng,
    ) -> (Self, watch::Receiver<LockView>) {
        let (view, rx) = watch::channel(LockView::default());
        let engine = Self {
            client,
            config,
            view,
            handled_match: None,
            rng,
        };
        (engine, rx)
    }

    pub fn status(&self) -> LockStatus {
        self.view.borrow().status
    }

    pub fn handled_match(&self) -> Option<&str> {
        self.handled_match.as_deref()
    }

    fn set_status(&self, status: LockStatus) {
        self.view.send_if_modified(|v| {
            if v.status == status {
                return false;
            }
            debug!("Lock status {:?} -> {:?}", v.status, status);
            v.status = status;
            true
        });
    }

    fn publish_pregame(&self, pregame: Option<PregameState>) {
        self.view.send_if_modified(|v| {
            if v.pregame == pregame {
                return false;
            }
            if pregame.is_none() {
                v.target_agent = None;
            }
            v.pregame = pregame;
            true
        });
    }

    /// Sleep for `delay`. Returns `false` as soon as instalock is switched
    /// off, in which case the lock command must not be sent.
    async fn wait_while_active(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return self.config.borrow().instalock.active,
                res = self.config.changed() => {
                    if res.is_err() {
                        (&mut sleep).await;
                        return self.config.borrow().instalock.active;
                    }
                    if !self.config.borrow_and_update().instalock.active {
                        return false;
                    }
                }
            }
        }
    }

    async fn lock(&mut self, pregame: &PregameState, agent_id: String, timing: &TimingConfig) {
        self.view.send_modify(|v| {
            v.status = LockStatus::Locking;
            v.target_agent = Some(agent_id.clone());
        });

        let (select_delay, lock_delay) = lock_delays(timing, &mut self.rng);
        info!(
            "Locking {} for match {} on {} (select delay {:?}, lock delay {:?})",
            agent_id, pregame.match_id, pregame.map_name, select_delay, lock_delay
        );

        if !select_delay.is_zero() && !self.wait_while_active(select_delay).await {
            info!(
                "Instalock turned off before locking match {}, skipping",
                pregame.match_id
            );
            self.view.send_modify(|v| {
                v.status = LockStatus::Idle;
                v.target_agent = None;
            });
            return;
        }

        let call = self.client.instalock_agent(&pregame.match_id, &agent_id);
        match act("instalock_agent", call).await {
            Ok(()) => {
                if !lock_delay.is_zero() {
                    tokio::time::sleep(lock_delay).await;
                }
                self.handled_match = Some(pregame.match_id.clone());
                self.set_status(LockStatus::Locked);
                info!("Locked {} for match {}", agent_id, pregame.match_id);
            }
            Err(e) => {
                warn!("Lock failed for match {}: {}", pregame.match_id, e);
                self.set_status(LockStatus::Idle);
            }
        }
    }
}

#[async_trait]
impl<C: GameClient> Poller for LockEngine<C> {
    const NAME: &'static str = "lock";

    async fn poll(&mut self) {
        let config = self.config.borrow().clone();
        if !config.instalock.active {
            self.reset();
            return;
        }

        let pregame = match fetch("get_pregame_state", self.client.pregame_state()).await {
            Ok(pregame) => pregame,
            Err(e) => {
                debug!("Pregame poll failed: {}", e);
                self.publish_pregame(None);
                return;
            }
        };
        self.publish_pregame(pregame.clone());

        let Some(pregame) = pregame else {
            if self.status() == LockStatus::Locked {
                self.set_status(LockStatus::Idle);
            }
            if let Some(done) = self.handled_match.take() {
                debug!("Pregame for match {} ended", done);
            }
            return;
        };

        if pregame.locked {
            self.set_status(LockStatus::Locked);
            return;
        }

        if self.handled_match.as_deref() == Some(pregame.match_id.as_str()) {
            return;
        }

        let Some(agent_id) = config
            .instalock
            .agent_for_map(&pregame.map_name)
            .map(str::to_owned)
        else {
            debug!("No agent configured for {}", pregame.map_name);
            return;
        };

        self.lock(&pregame, agent_id, &config.timing).await;
    }

    fn reset(&mut self) {
        self.handled_match = None;
        self.view.send_if_modified(|v| {
            if *v == LockView::default() {
                return false;
            }
            *v = LockView::default();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::ACTION_TIMEOUT;
    use crate::test_support::{pregame, FakeClient};
    use downfall_core::config::Mutation;
    use tokio::time::Instant;

    fn lock_config(default_agent: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        Mutation::SetLockActive(true).apply(&mut config);
        Mutation::SetDefaultAgent(default_agent.map(str::to_owned)).apply(&mut config);
        config
    }

    fn engine(
        client: &Arc<FakeClient>,
        config: AppConfig,
    ) -> (
        LockEngine<FakeClient>,
        watch::Receiver<LockView>,
        watch::Sender<AppConfig>,
    ) {
        let (config_tx, config_rx) = watch::channel(config);
        let (engine, view) =
            LockEngine::with_rng(client.clone(), config_rx, StdRng::seed_from_u64(7));
        (engine, view, config_tx)
    }

    #[test]
    fn instant_preset_has_no_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let timing = TimingConfig {
            preset: TimingPreset::Instant,
            select_delay: 900,
            lock_delay: 900,
        };
        for _ in 0..20 {
            assert_eq!(
                lock_delays(&timing, &mut rng),
                (Duration::ZERO, Duration::ZERO)
            );
        }
    }

    #[test]
    fn custom_preset_uses_literal_values() {
        let mut rng = StdRng::seed_from_u64(1);
        let timing = TimingConfig {
            preset: TimingPreset::Custom,
            select_delay: 350,
            lock_delay: 120,
        };
        assert_eq!(
            lock_delays(&timing, &mut rng),
            (Duration::from_millis(350), Duration::from_millis(120))
        );
    }

    #[test]
    fn humanized_delays_stay_in_range_and_vary() {
        let mut rng = StdRng::seed_from_u64(42);
        let timing = TimingConfig {
            preset: TimingPreset::Humanized,
            ..TimingConfig::default()
        };
        let mut selects = std::collections::HashSet::new();
        for _ in 0..200 {
            let (select, lock) = lock_delays(&timing, &mut rng);
            assert!(select >= Duration::from_millis(400) && select < Duration::from_millis(1200));
            assert!(lock >= Duration::from_millis(200) && lock < Duration::from_millis(800));
            selects.insert(select);
        }
        assert!(selects.len() > 1, "humanized delays should be drawn per attempt");
    }

    #[tokio::test(start_paused = true)]
    async fn locks_once_then_tracks_match_lifecycle() {
        let client = FakeClient::new();
        let (mut engine, view, _config) = engine(&client, lock_config(Some("Jett")));

        // Poll 1: unlocked pregame -> immediate lock.
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        let started = Instant::now();
        engine.poll().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(client.calls_to("instalock_agent"), vec!["instalock_agent(m1,Jett)"]);
        assert_eq!(view.borrow().status, LockStatus::Locked);
        assert_eq!(view.borrow().target_agent.as_deref(), Some("Jett"));
        assert_eq!(engine.handled_match(), Some("m1"));

        // Poll 2: service reports the lock.
        client.set_pregame(Some(pregame("m1", "Ascent", true)));
        engine.poll().await;
        assert_eq!(view.borrow().status, LockStatus::Locked);

        // Poll 3: pregame over.
        client.set_pregame(None);
        engine.poll().await;
        assert_eq!(view.borrow().status, LockStatus::Idle);
        assert!(view.borrow().pregame.is_none());
        assert_eq!(engine.handled_match(), None);
        assert_eq!(client.calls_to("instalock_agent").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_unlocked_snapshots_do_not_relock() {
        let client = FakeClient::new();
        let (mut engine, _view, _config) = engine(&client, lock_config(Some("Jett")));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        for _ in 0..5 {
            engine.poll().await;
        }
        assert_eq!(client.calls_to("instalock_agent").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_match_after_null_locks_again() {
        let client = FakeClient::new();
        let (mut engine, _view, _config) = engine(&client, lock_config(Some("Jett")));

        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        engine.poll().await;
        client.set_pregame(None);
        engine.poll().await;
        client.set_pregame(Some(pregame("m2", "Bind", false)));
        engine.poll().await;

        assert_eq!(
            client.calls_to("instalock_agent"),
            vec!["instalock_agent(m1,Jett)", "instalock_agent(m2,Jett)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn map_override_wins_over_default_agent() {
        let client = FakeClient::new();
        let mut config = lock_config(Some("Jett"));
        Mutation::SetMapOverride {
            map: "Breeze".into(),
            agent: Some("Viper".into()),
        }
        .apply(&mut config);
        let (mut engine, _view, _config) = engine(&client, config);

        client.set_pregame(Some(pregame("m1", "Breeze", false)));
        engine.poll().await;
        assert_eq!(client.calls_to("instalock_agent"), vec!["instalock_agent(m1,Viper)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_configured_agent_stays_idle() {
        let client = FakeClient::new();
        let (mut engine, view, _config) = engine(&client, lock_config(None));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        engine.poll().await;
        assert!(client.calls_to("instalock_agent").is_empty());
        assert_eq!(view.borrow().status, LockStatus::Idle);
        assert!(view.borrow().pregame.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lock_reverts_to_idle_and_retries() {
        let client = FakeClient::new();
        let (mut engine, view, _config) = engine(&client, lock_config(Some("Jett")));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        client.fail("instalock_agent");

        engine.poll().await;
        assert_eq!(view.borrow().status, LockStatus::Idle);
        assert_eq!(engine.handled_match(), None);

        client.recover("instalock_agent");
        engine.poll().await;
        assert_eq!(view.borrow().status, LockStatus::Locked);
        assert_eq!(client.calls_to("instalock_agent").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_lock_times_out_to_idle() {
        let client = FakeClient::new();
        let (mut engine, view, _config) = engine(&client, lock_config(Some("Jett")));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        client.stall("instalock_agent");

        let started = Instant::now();
        engine.poll().await;
        assert_eq!(started.elapsed(), ACTION_TIMEOUT);
        assert_eq!(view.borrow().status, LockStatus::Idle);
        assert_eq!(engine.handled_match(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_timing_waits_around_the_lock() {
        let client = FakeClient::new();
        let mut config = lock_config(Some("Jett"));
        Mutation::SetTiming(TimingConfig {
            preset: TimingPreset::Custom,
            select_delay: 300,
            lock_delay: 200,
        })
        .apply(&mut config);
        let (mut engine, _view, _config) = engine(&client, config);

        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        let started = Instant::now();
        engine.poll().await;
        assert_eq!(started.elapsed(), Duration::from_millis(500));
        assert_eq!(engine.handled_match(), Some("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn locking_is_published_during_select_delay() {
        let client = FakeClient::new();
        let mut config = lock_config(Some("Jett"));
        Mutation::SetTiming(TimingConfig {
            preset: TimingPreset::Custom,
            select_delay: 1000,
            lock_delay: 0,
        })
        .apply(&mut config);
        let (mut engine, view, _config) = engine(&client, config);
        client.set_pregame(Some(pregame("m1", "Ascent", false)));

        let handle = tokio::spawn(async move {
            engine.poll().await;
            engine
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(view.borrow().status, LockStatus::Locking);
        assert!(client.calls_to("instalock_agent").is_empty());

        let engine = handle.await.unwrap();
        assert_eq!(engine.status(), LockStatus::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_during_select_delay_skips_lock() {
        let client = FakeClient::new();
        let mut config = lock_config(Some("Jett"));
        Mutation::SetTiming(TimingConfig {
            preset: TimingPreset::Custom,
            select_delay: 3000,
            lock_delay: 0,
        })
        .apply(&mut config);
        let (mut engine, view, config_tx) = engine(&client, config);
        client.set_pregame(Some(pregame("m1", "Ascent", false)));

        let handle = tokio::spawn(async move {
            engine.poll().await;
            engine
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(view.borrow().status, LockStatus::Locking);

        config_tx.send_modify(|c| Mutation::SetLockActive(false).apply(c));
        let started = Instant::now();
        let engine = handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(2500));

        assert!(client.calls_to("instalock_agent").is_empty());
        assert_eq!(engine.status(), LockStatus::Idle);
        assert!(view.borrow().target_agent.is_none());
        assert_eq!(engine.handled_match(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_settings_change_during_select_delay_still_locks() {
        let client = FakeClient::new();
        let mut config = lock_config(Some("Jett"));
        Mutation::SetTiming(TimingConfig {
            preset: TimingPreset::Custom,
            select_delay: 1000,
            lock_delay: 0,
        })
        .apply(&mut config);
        let (mut engine, _view, config_tx) = engine(&client, config);
        client.set_pregame(Some(pregame("m1", "Ascent", false)));

        let started = Instant::now();
        let handle = tokio::spawn(async move {
            engine.poll().await;
            engine
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        config_tx.send_modify(|c| Mutation::SetDodgeActive(true).apply(c));

        let engine = handle.await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
        assert_eq!(client.calls_to("instalock_agent"), vec!["instalock_agent(m1,Jett)"]);
        assert_eq!(engine.handled_match(), Some("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_feature_resets_without_polling() {
        let client = FakeClient::new();
        let (mut engine, view, config_tx) = engine(&client, lock_config(Some("Jett")));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        engine.poll().await;
        assert_eq!(view.borrow().status, LockStatus::Locked);

        config_tx.send_modify(|c| Mutation::SetLockActive(false).apply(c));
        engine.poll().await;
        assert_eq!(*view.borrow(), LockView::default());
        assert_eq!(engine.handled_match(), None);
        assert_eq!(client.calls_to("instalock_agent").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_failure_keeps_handled_marker() {
        let client = FakeClient::new();
        let (mut engine, view, _config) = engine(&client, lock_config(Some("Jett")));
        client.set_pregame(Some(pregame("m1", "Ascent", false)));
        engine.poll().await;

        client.fail("get_pregame_state");
        engine.poll().await;
        assert!(view.borrow().pregame.is_none());

        client.recover("get_pregame_state");
        engine.poll().await;
        assert_eq!(client.calls_to("instalock_agent").len(), 1);
    }
}
