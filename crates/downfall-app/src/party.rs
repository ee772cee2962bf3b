// Party synchronizer.
//
// The party is polled and replaced wholesale. Mutations are issued from
// outside the poll task through a cloned `PartySync` handle: each one marks
// its target as pending, awaits the call, clears the marker and refetches
// on success. Friend invites instead leave a short-lived outcome marker
// that expires after `INVITE_STATUS_TTL`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use downfall_core::protocol::{Friend, PartyInvite, PartyState};
use downfall_core::{ClientResult, GameClient};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::poller::{fetch, Poller};

/// How often the party is polled.
pub const PARTY_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// How long a friend invite outcome stays visible.
pub const INVITE_STATUS_TTL: Duration = Duration::from_secs(2);

/// What a mutation acts upon. At most one mutation per target is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    /// A party member, by puuid.
    Member(String),
    /// An incoming invite, by request id.
    Invite(String),
    /// A friend being invited, by puuid.
    Friend(String),
    Accessibility,
    InviteCode,
    Queue,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyAction {
    Kick,
    Promote,
    AcceptInvite,
    DeclineInvite,
    SetAccessibility,
    SetReady,
    SetQueue,
    StartQueue,
    LeaveQueue,
    GenerateCode,
    DisableCode,
    InviteFriend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Pending(PartyAction),
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMarker {
    pub state: ActionState,
    seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyView {
    pub party: Option<PartyState>,
    pub friends: Vec<Friend>,
    pub actions: HashMap<ActionTarget, ActionMarker>,
}

impl PartyView {
    pub fn action(&self, target: &ActionTarget) -> Option<ActionState> {
        self.actions.get(target).map(|m| m.state)
    }

    pub fn invitable_friends(&self, query: &str) -> Vec<Friend> {
        invitable_friends(&self.friends, self.party.as_ref(), query)
    }
}

/// Online friends that are not already in `party`, optionally narrowed by a
/// case-insensitive substring match on name or tag. An empty query matches
/// everyone; the query is not trimmed.
pub fn invitable_friends(friends: &[Friend], party: Option<&PartyState>, query: &str) -> Vec<Friend> {
    let query = query.to_lowercase();
    friends
        .iter()
        .filter(|f| f.is_online)
        .filter(|f| !party.is_some_and(|p| p.has_member(&f.puuid)))
        .filter(|f| {
            query.is_empty()
                || f.game_name.to_lowercase().contains(&query)
                || f.tag_line.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

struct Inner<C> {
    client: Arc<C>,
    view: watch::Sender<PartyView>,
    seq: AtomicU64,
}

pub struct PartySync<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for PartySync<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: GameClient> PartySync<C> {
    pub fn new(client: Arc<C>) -> (Self, watch::Receiver<PartyView>) {
        let (view, rx) = watch::channel(PartyView::default());
        let inner = Inner {
            client,
            view,
            seq: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<PartyView> {
        self.inner.view.subscribe()
    }

    fn party_id(&self) -> Option<String> {
        self.inner
            .view
            .borrow()
            .party
            .as_ref()
            .map(|p| p.party_id.clone())
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    async fn fetch_party(&self) {
        let party = match fetch("get_party", self.inner.client.party()).await {
            Ok(party) => party,
            Err(e) => {
                debug!("Party poll failed: {}", e);
                None
            }
        };
        self.inner.view.send_if_modified(|v| {
            if v.party == party {
                return false;
            }
            v.party = party;
            true
        });
    }

    /// Fetch the friends list. A failure keeps the previous list.
    async fn fetch_friends(&self) {
        match fetch("get_friends", self.inner.client.friends()).await {
            Ok(friends) => {
                self.inner.view.send_if_modified(|v| {
                    if v.friends == friends {
                        return false;
                    }
                    v.friends = friends;
                    true
                });
            }
            Err(e) => debug!("Friends fetch failed: {}", e),
        }
    }

    // -----------------------------------------------------------------------
    // Action markers
    // -----------------------------------------------------------------------

    fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Mark `target` pending. Returns `false` if it already carries a
    /// marker, in which case the mutation must not be issued.
    fn begin(&self, target: &ActionTarget, action: PartyAction) -> bool {
        let seq = self.next_seq();
        let mut started = false;
        self.inner.view.send_if_modified(|v| {
            if v.actions.contains_key(target) {
                return false;
            }
            v.actions.insert(
                target.clone(),
                ActionMarker {
                    state: ActionState::Pending(action),
                    seq,
                },
            );
            started = true;
            true
        });
        if !started {
            debug!("Ignoring {:?} on {:?}: action already in progress", action, target);
        }
        started
    }

    fn clear_marker(&self, target: &ActionTarget) {
        self.inner
            .view
            .send_if_modified(|v| v.actions.remove(target).is_some());
    }

    /// Replace the marker on `target` with an outcome and schedule its
    /// removal after `INVITE_STATUS_TTL`. A newer marker on the same target
    /// is left alone.
    fn settle(&self, target: ActionTarget, state: ActionState) {
        let seq = self.next_seq();
        self.inner.view.send_modify(|v| {
            v.actions.insert(target.clone(), ActionMarker { state, seq });
        });

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INVITE_STATUS_TTL).await;
            inner.view.send_if_modified(|v| {
                if v.actions.get(&target).map(|m| m.seq) != Some(seq) {
                    return false;
                }
                v.actions.remove(&target);
                true
            });
        });
    }

    /// Run one marked mutation: mark, call, unmark, refetch on success.
    async fn mutate<T, F>(
        &self,
        target: ActionTarget,
        action: PartyAction,
        call: F,
    ) -> Option<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        if !self.begin(&target, action) {
            return None;
        }
        let result = call.await;
        self.clear_marker(&target);
        match result {
            Ok(value) => {
                debug!("Party action {:?} succeeded", action);
                self.fetch_party().await;
                Some(value)
            }
            Err(e) => {
                warn!("Party action {:?} failed: {}", action, e);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn kick(&self, puuid: &str) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_kick(&party_id, puuid);
        self.mutate(ActionTarget::Member(puuid.to_owned()), PartyAction::Kick, call)
            .await;
    }

    pub async fn promote(&self, puuid: &str) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_promote(&party_id, puuid);
        self.mutate(ActionTarget::Member(puuid.to_owned()), PartyAction::Promote, call)
            .await;
    }

    /// Join the party that sent `invite`.
    pub async fn accept_invite(&self, invite: &PartyInvite) {
        let call = self.inner.client.party_accept_invite(&invite.party_id);
        self.mutate(
            ActionTarget::Invite(invite.request_id.clone()),
            PartyAction::AcceptInvite,
            call,
        )
        .await;
    }

    pub async fn decline_invite(&self, invite: &PartyInvite) {
        let call = self
            .inner
            .client
            .party_decline_invite(&invite.party_id, &invite.request_id);
        self.mutate(
            ActionTarget::Invite(invite.request_id.clone()),
            PartyAction::DeclineInvite,
            call,
        )
        .await;
    }

    pub async fn set_accessibility(&self, open: bool) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_set_accessibility(&party_id, open);
        self.mutate(ActionTarget::Accessibility, PartyAction::SetAccessibility, call)
            .await;
    }

    pub async fn set_ready(&self, ready: bool) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_set_ready(&party_id, ready);
        self.mutate(ActionTarget::Ready, PartyAction::SetReady, call)
            .await;
    }

    pub async fn set_queue(&self, queue_id: &str) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_set_queue(&party_id, queue_id);
        self.mutate(ActionTarget::Queue, PartyAction::SetQueue, call)
            .await;
    }

    pub async fn start_queue(&self) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_start_queue(&party_id);
        self.mutate(ActionTarget::Queue, PartyAction::StartQueue, call)
            .await;
    }

    pub async fn leave_queue(&self) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_leave_queue(&party_id);
        self.mutate(ActionTarget::Queue, PartyAction::LeaveQueue, call)
            .await;
    }

    /// Generate a party invite code. Returns the new code on success.
    pub async fn generate_code(&self) -> Option<String> {
        let party_id = self.party_id()?;
        let call = self.inner.client.party_generate_code(&party_id);
        let code = self
            .mutate(ActionTarget::InviteCode, PartyAction::GenerateCode, call)
            .await?;
        info!("Generated party code {}", code);
        Some(code)
    }

    pub async fn disable_code(&self) {
        let Some(party_id) = self.party_id() else { return };
        let call = self.inner.client.party_disable_code(&party_id);
        self.mutate(ActionTarget::InviteCode, PartyAction::DisableCode, call)
            .await;
    }

    /// Invite `friend` into the current party. The outcome stays visible on
    /// the friend's marker for `INVITE_STATUS_TTL`, during which further
    /// invites to the same friend are ignored.
    pub async fn invite_friend(&self, friend: &Friend) {
        let Some(party_id) = self.party_id() else { return };
        let target = ActionTarget::Friend(friend.puuid.clone());
        if !self.begin(&target, PartyAction::InviteFriend) {
            return;
        }
        let result = self
            .inner
            .client
            .party_invite(&party_id, &friend.game_name, &friend.tag_line)
            .await;
        match result {
            Ok(()) => {
                info!("Invited {}#{}", friend.game_name, friend.tag_line);
                self.settle(target, ActionState::Succeeded);
                self.fetch_party().await;
            }
            Err(e) => {
                warn!("Invite to {}#{} failed: {}", friend.game_name, friend.tag_line, e);
                self.settle(target, ActionState::Failed);
            }
        }
    }
}

#[async_trait]
impl<C: GameClient> Poller for PartySync<C> {
    const NAME: &'static str = "party";

    async fn poll(&mut self) {
        self.fetch_party().await;
    }

    /// Refetch the party and the friends list together.
    async fn refresh(&mut self) {
        tokio::join!(self.fetch_party(), self.fetch_friends());
    }

    fn reset(&mut self) {
        self.inner.view.send_if_modified(|v| {
            if *v == PartyView::default() {
                return false;
            }
            *v = PartyView::default();
            true
        });
    }
}
