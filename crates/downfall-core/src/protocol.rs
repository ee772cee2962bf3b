// Data types exchanged with the game-state service.
//
// Field names serialize as camelCase to match the payloads produced by the
// native backend. Every entity here is recreated per poll; only the live match
// snapshot is merged incrementally (see downfall-app's live_match module).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Connection status of the local game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Identity of the signed-in player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    #[serde(default)]
    pub player_card_id: Option<String>,
}

/// Snapshot of the connection to the game client. Replaced wholesale on
/// every poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub player_info: Option<PlayerInfo>,
    pub region: Option<String>,
    pub shard: Option<String>,
}

impl ConnectionState {
    /// The fail-safe state published whenever the status query fails.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

// ---------------------------------------------------------------------------
// Session catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountXp {
    pub level: u32,
    pub xp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMmr {
    pub rank: u32,
    pub rr: u32,
    pub leaderboard_rank: u32,
    pub peak_rank: u32,
    pub peak_rank_act: String,
    pub wins: u32,
    pub games: u32,
}

/// Result of one competitive match, as reported in the player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompUpdate {
    pub match_id: String,
    pub map_id: String,
    pub rank_before: u32,
    pub rank_after: u32,
    pub rr_before: u32,
    pub rr_after: u32,
    pub rr_change: i32,
    pub timestamp: u64,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub info: PlayerInfo,
    pub account_xp: Option<AccountXp>,
    pub mmr: Option<PlayerMmr>,
    #[serde(default)]
    pub comp_updates: Vec<CompUpdate>,
}

/// A selectable character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub uuid: String,
    pub name: String,
    pub icon: String,
    pub role: String,
    pub role_icon: String,
    pub unlocked: bool,
}

// ---------------------------------------------------------------------------
// Pre-match
// ---------------------------------------------------------------------------

/// State of the character-selection phase. Absent outside of pregame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PregameState {
    /// Stable session key for one selection phase.
    pub match_id: String,
    pub map_id: String,
    pub map_name: String,
    pub locked: bool,
    pub locked_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Live match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPhase {
    Pregame,
    Ingame,
}

/// One player on a live match roster. Unique by `puuid` within a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMatchPlayer {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub team_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub agent_icon: String,
    pub rank: u32,
    pub rr: u32,
    pub peak_rank: u32,
    pub account_level: u32,
    #[serde(default)]
    pub incognito: bool,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMatch {
    pub match_id: String,
    pub map_id: String,
    pub map_name: String,
    pub queue_id: String,
    pub phase: MatchPhase,
    pub is_team_mode: bool,
    pub ally_team: Vec<LiveMatchPlayer>,
    pub enemy_team: Vec<LiveMatchPlayer>,
}

// ---------------------------------------------------------------------------
// Party and friends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Accessibility {
    Open,
    Closed,
}

impl Accessibility {
    pub fn is_open(self) -> bool {
        self == Accessibility::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMember {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub rank: u32,
    pub account_level: u32,
    #[serde(default)]
    pub player_card_id: String,
    pub is_owner: bool,
    pub is_ready: bool,
    pub is_moderator: bool,
    pub ping: u32,
}

/// A pending invitation to join someone else's party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyInvite {
    pub request_id: String,
    pub party_id: String,
    pub from_puuid: String,
    pub from_name: String,
    pub from_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyState {
    pub party_id: String,
    pub members: Vec<PartyMember>,
    /// Matchmaking state reported by the service (e.g. `MATCHMAKING`).
    #[serde(default)]
    pub state: String,
    pub accessibility: Accessibility,
    pub queue_id: String,
    /// Empty when no invite code is active.
    #[serde(default)]
    pub invite_code: String,
    /// Whether the signed-in player owns the party.
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub eligible_queues: Vec<String>,
    #[serde(default)]
    pub invites: Vec<PartyInvite>,
}

impl PartyState {
    pub fn has_member(&self, puuid: &str) -> bool {
        self.members.iter().any(|m| m.puuid == puuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub is_online: bool,
    pub status: String,
    #[serde(default)]
    pub player_card_id: String,
}
