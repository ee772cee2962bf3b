// Dodge engine: leaves a pregame whose map is blacklisted.
//
// Mirrors the lock engine's guard structure over the same pregame source.
// States: idle -> dodging -> dodged -> idle. No delay is applied.

use std::sync::Arc;

use async_trait::async_trait;
use downfall_core::config::AppConfig;
use downfall_core::protocol::PregameState;
use downfall_core::GameClient;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::poller::{act, fetch, Poller};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DodgeStatus {
    #[default]
    Idle,
    Dodging,
    Dodged,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DodgeView {
    pub status: DodgeStatus,
    pub pregame: Option<PregameState>,
}

pub struct DodgeEngine<C> {
    client: Arc<C>,
    config: watch::Receiver<AppConfig>,
    view: watch::Sender<DodgeView>,
    /// Match id of the last successful dodge.
    handled_match: Option<String>,
}

impl<C: GameClient> DodgeEngine<C> {
    pub fn new(
        client: Arc<C>,
        config: watch::Receiver<AppConfig>,
    ) -> (Self, watch::Receiver<DodgeView>) {
        let (view, rx) = watch::channel(DodgeView::default());
        let engine = Self {
            client,
            config,
            view,
            handled_match: None,
        };
        (engine, rx)
    }

    pub fn status(&self) -> DodgeStatus {
        self.view.borrow().status
    }

    pub fn handled_match(&self) -> Option<&str> {
        self.handled_match.as_deref()
    }

    fn set_status(&self, status: DodgeStatus) {
        self.view.send_if_modified(|v| {
            if v.status == status {
                return false;
            }
            debug!("Dodge status {:?} -> {:?}", v.status, status);
            v.status = status;
            true
        });
    }

    fn publish_pregame(&self, pregame: Option<PregameState>) {
        self.view.send_if_modified(|v| {
            if v.pregame == pregame {
                return false;
            }
            v.pregame = pregame;
            true
        });
    }
}

#[async_trait]
impl<C: GameClient> Poller for DodgeEngine<C> {
    const NAME: &'static str = "dodge";

    async fn poll(&mut self) {
        let config = self.config.borrow().clone();
        if !config.map_dodge.active {
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
            if self.status() == DodgeStatus::Dodged {
                self.set_status(DodgeStatus::Idle);
            }
            self.handled_match = None;
            return;
        };

        if self.handled_match.as_deref() == Some(pregame.match_id.as_str()) {
            return;
        }

        if !config.map_dodge.is_blacklisted(&pregame.map_name) {
            return;
        }

        self.set_status(DodgeStatus::Dodging);
        info!("Dodging match {} on {}", pregame.match_id, pregame.map_name);
        let call = self.client.dodge_match(&pregame.match_id);
        match act("dodge_match", call).await {
            Ok(()) => {
                self.handled_match = Some(pregame.match_id.clone());
                self.set_status(DodgeStatus::Dodged);
                info!("Dodged match {}", pregame.match_id);
            }
            Err(e) => {
                warn!("Dodge failed for match {}: {}", pregame.match_id, e);
                self.set_status(DodgeStatus::Idle);
            }
        }
    }

    fn reset(&mut self) {
        self.handled_match = None;
        self.view.send_if_modified(|v| {
            if *v == DodgeView::default() {
                return false;
            }
            *v = DodgeView::default();
            true
        });
    }
}
