// Session catalog: the signed-in player's profile and agent roster.
//
// The profile is fetched once per connection. The agent catalog is polled
// so newly unlocked agents show up without a reconnect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use downfall_core::protocol::{AgentInfo, PlayerProfile};
use downfall_core::GameClient;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::poller::{fetch, Poller};

/// How often the agent catalog is polled.
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub profile: Option<PlayerProfile>,
    pub agents: Vec<AgentInfo>,
}

impl SessionView {
    /// Unlocked agents ordered by name.
    pub fn unlocked_agents(&self) -> Vec<AgentInfo> {
        let mut agents: Vec<_> = self.agents.iter().filter(|a| a.unlocked).cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }
}

pub struct SessionSync<C> {
    client: Arc<C>,
    view: watch::Sender<SessionView>,
}

impl<C: GameClient> SessionSync<C> {
    pub fn new(client: Arc<C>) -> (Self, watch::Receiver<SessionView>) {
        let (view, rx) = watch::channel(SessionView::default());
        (Self { client, view }, rx)
    }

    async fn fetch_profile(&self) {
        match fetch("get_player_profile", self.client.player_profile()).await {
            Ok(profile) => {
                info!(
                    "Profile loaded for {}#{}",
                    profile.info.game_name, profile.info.tag_line
                );
                self.view.send_modify(|v| v.profile = Some(profile));
            }
            Err(e) => debug!("Profile fetch failed: {}", e),
        }
    }

    /// Fetch the agent catalog. A failure keeps the previous catalog.
    async fn fetch_agents(&self) {
        match fetch("get_agents", self.client.agents()).await {
            Ok(agents) => {
                self.view.send_if_modified(|v| {
                    if v.agents == agents {
                        return false;
                    }
                    debug!("Agent catalog updated ({} agents)", agents.len());
                    v.agents = agents;
                    true
                });
            }
            Err(e) => debug!("Agent catalog fetch failed: {}", e),
        }
    }
}

#[async_trait]
impl<C: GameClient> Poller for SessionSync<C> {
    const NAME: &'static str = "session";

    async fn poll(&mut self) {
        let has_profile = self.view.borrow().profile.is_some();
        if !has_profile {
            self.fetch_profile().await;
        }
        self.fetch_agents().await;
    }

    async fn refresh(&mut self) {
        tokio::join!(self.fetch_profile(), self.fetch_agents());
    }

    fn reset(&mut self) {
        self.view.send_if_modified(|v| {
            if *v == SessionView::default() {
                return false;
            }
            *v = SessionView::default();
            true
        });
    }
}
