// Abstract command surface of the native game-state service.
//
// The service that reads client state and performs lock/dodge/party
// mutations lives outside this workspace. Engines only ever talk to it
// through `GameClient`, which keeps them testable with scripted fakes.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::protocol::{
    AgentInfo, ConnectionState, Friend, LiveMatch, PartyState, PlayerProfile, PregameState,
};

pub type ClientResult<T> = Result<T, ClientError>;

/// Request/response commands exposed by the game-state service. Every call
/// is fallible; "no data" results (not in pregame, not in a match, not in a
/// party) are `Ok(None)` rather than errors.
#[async_trait]
pub trait GameClient: Send + Sync + 'static {
    async fn connection_state(&self) -> ClientResult<ConnectionState>;

    async fn player_profile(&self) -> ClientResult<PlayerProfile>;

    async fn agents(&self) -> ClientResult<Vec<AgentInfo>>;

    async fn pregame_state(&self) -> ClientResult<Option<PregameState>>;

    /// Select and lock `agent_id` for the pregame identified by `match_id`.
    async fn instalock_agent(&self, match_id: &str, agent_id: &str) -> ClientResult<()>;

    /// Leave the pregame identified by `match_id`.
    async fn dodge_match(&self, match_id: &str) -> ClientResult<()>;

    async fn live_match(&self) -> ClientResult<Option<LiveMatch>>;

    async fn party(&self) -> ClientResult<Option<PartyState>>;

    async fn friends(&self) -> ClientResult<Vec<Friend>>;

    async fn party_invite(&self, party_id: &str, name: &str, tag: &str) -> ClientResult<()>;

    async fn party_kick(&self, party_id: &str, puuid: &str) -> ClientResult<()>;

    async fn party_promote(&self, party_id: &str, puuid: &str) -> ClientResult<()>;

    async fn party_accept_invite(&self, party_id: &str) -> ClientResult<()>;

    async fn party_decline_invite(&self, party_id: &str, request_id: &str) -> ClientResult<()>;

    async fn party_set_accessibility(&self, party_id: &str, open: bool) -> ClientResult<()>;

    async fn party_set_ready(&self, party_id: &str, ready: bool) -> ClientResult<()>;

    async fn party_start_queue(&self, party_id: &str) -> ClientResult<()>;

    async fn party_leave_queue(&self, party_id: &str) -> ClientResult<()>;

    async fn party_set_queue(&self, party_id: &str, queue_id: &str) -> ClientResult<()>;

    /// Returns the newly generated invite code.
    async fn party_generate_code(&self, party_id: &str) -> ClientResult<String>;

    async fn party_disable_code(&self, party_id: &str) -> ClientResult<()>;
}
