// Live match synchronizer.
//
// Snapshots of the same match are merged into the published state rather
// than replacing it: once the enemy roster has been revealed it is never
// hidden again, even if a later snapshot comes back with an empty roster.
// A new match id replaces the published state wholesale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use downfall_core::protocol::{LiveMatch, LiveMatchPlayer};
use downfall_core::GameClient;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::poller::{fetch, Poller};

/// How often the live match is polled.
pub const LIVE_MATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Merge a newer snapshot of the same match into `current`.
///
/// The phase is always taken from `next`. Existing roster entries receive
/// updated agent fields by `puuid`; entries are never added or removed this
/// way. The one exception is an enemy roster that was still empty and is now
/// revealed, which is adopted as a whole.
pub fn merge_snapshot(current: &mut LiveMatch, next: LiveMatch) {
    current.phase = next.phase;
    merge_agents(&mut current.ally_team, &next.ally_team);
    if current.enemy_team.is_empty() && !next.enemy_team.is_empty() {
        current.enemy_team = next.enemy_team;
    } else {
        merge_agents(&mut current.enemy_team, &next.enemy_team);
    }
}

fn merge_agents(roster: &mut [LiveMatchPlayer], updates: &[LiveMatchPlayer]) {
    let by_puuid: HashMap<&str, &LiveMatchPlayer> =
        updates.iter().map(|p| (p.puuid.as_str(), p)).collect();
    for player in roster.iter_mut() {
        if let Some(update) = by_puuid.get(player.puuid.as_str()) {
            player.agent_id.clone_from(&update.agent_id);
            player.agent_name.clone_from(&update.agent_name);
            player.agent_icon.clone_from(&update.agent_icon);
        }
    }
}

pub struct LiveMatchSync<C> {
    client: Arc<C>,
    view: watch::Sender<Option<LiveMatch>>,
    cached_match_id: Option<String>,
}

impl<C: GameClient> LiveMatchSync<C> {
    pub fn new(client: Arc<C>) -> (Self, watch::Receiver<Option<LiveMatch>>) {
        let (view, rx) = watch::channel(None);
        let sync = Self {
            client,
            view,
            cached_match_id: None,
        };
        (sync, rx)
    }

    pub fn cached_match_id(&self) -> Option<&str> {
        self.cached_match_id.as_deref()
    }

    /// Apply one poll result to the published state.
    pub fn apply(&mut self, snapshot: Option<LiveMatch>) {
        let Some(snapshot) = snapshot else {
            self.clear();
            return;
        };

        if self.cached_match_id.as_deref() != Some(snapshot.match_id.as_str()) {
            info!(
                "Live match {} on {} ({} allies, {} enemies)",
                snapshot.match_id,
                snapshot.map_name,
                snapshot.ally_team.len(),
                snapshot.enemy_team.len()
            );
            self.cached_match_id = Some(snapshot.match_id.clone());
            self.view.send_replace(Some(snapshot));
            return;
        }

        self.view.send_modify(|current| match current {
            Some(current) => merge_snapshot(current, snapshot),
            None => *current = Some(snapshot),
        });
    }

    fn clear(&mut self) {
        if self.cached_match_id.take().is_some() {
            debug!("Live match cleared");
        }
        self.view.send_if_modified(|current| current.take().is_some());
    }
}

#[async_trait]
impl<C: GameClient> Poller for LiveMatchSync<C> {
    const NAME: &'static str = "live match";

    async fn poll(&mut self) {
        match fetch("get_live_match", self.client.live_match()).await {
            Ok(snapshot) => self.apply(snapshot),
            // Keep the merged state; only an empty result or the gate
            // closing clears it.
            Err(e) => debug!("Live match poll failed, keeping last state: {}", e),
        }
    }

    /// Forget the cached match id so the next snapshot replaces the
    /// published state wholesale.
    async fn refresh(&mut self) {
        self.cached_match_id = None;
        self.poll().await;
    }

    fn reset(&mut self) {
        self.clear();
    }
}
