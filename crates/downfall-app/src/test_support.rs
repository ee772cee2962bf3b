// Scripted fakes shared by the unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use downfall_core::config::{AppConfig, SettingsStore};
use downfall_core::protocol::{
    Accessibility, AgentInfo, ConnectionState, ConnectionStatus, Friend, LiveMatch,
    LiveMatchPlayer, MatchPhase, PartyMember, PartyState, PlayerInfo, PlayerProfile,
    PregameState,
};
use downfall_core::{ClientError, ClientResult, ConfigError, GameClient};

/// A `GameClient` whose fetch results are set by the test and whose
/// mutation calls are recorded. Commands listed in `failing` are rejected;
/// commands listed in `stalled` are recorded and then never answer.
#[derive(Default)]
pub struct FakeClient {
    pub connection: Mutex<Option<ConnectionState>>,
    pub profile: Mutex<Option<PlayerProfile>>,
    pub agents: Mutex<Option<Vec<AgentInfo>>>,
    pub pregame: Mutex<Option<PregameState>>,
    pub live_match: Mutex<Option<LiveMatch>>,
    pub party: Mutex<Option<PartyState>>,
    pub friends: Mutex<Vec<Friend>>,
    pub invite_code: Mutex<String>,
    failing: Mutex<HashSet<&'static str>>,
    stalled: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_pregame(&self, pregame: Option<PregameState>) {
        *self.pregame.lock().unwrap() = pregame;
    }

    pub fn set_live_match(&self, live: Option<LiveMatch>) {
        *self.live_match.lock().unwrap() = live;
    }

    pub fn set_party(&self, party: Option<PartyState>) {
        *self.party.lock().unwrap() = party;
    }

    pub fn set_connection(&self, state: Option<ConnectionState>) {
        *self.connection.lock().unwrap() = state;
    }

    pub fn fail(&self, command: &'static str) {
        self.failing.lock().unwrap().insert(command);
    }

    pub fn recover(&self, command: &'static str) {
        self.failing.lock().unwrap().remove(command);
    }

    pub fn stall(&self, command: &'static str) {
        self.stalled.lock().unwrap().insert(command);
    }

    pub fn unstall(&self, command: &'static str) {
        self.stalled.lock().unwrap().remove(command);
    }

    /// Recorded calls, formatted as `command(arg,arg)`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, command: &str) -> Vec<String> {
        let prefix = format!("{command}(");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    fn record(&self, command: &'static str, args: &[&str]) -> ClientResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{command}({})", args.join(",")));
        self.check(command)
    }

    async fn hang_if_stalled(&self, command: &'static str) -> ClientResult<()> {
        let stalled = self.stalled.lock().unwrap().contains(command);
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn check(&self, command: &'static str) -> ClientResult<()> {
        if self.failing.lock().unwrap().contains(command) {
            Err(ClientError::rejected(command, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GameClient for FakeClient {
    async fn connection_state(&self) -> ClientResult<ConnectionState> {
        self.check("get_connection_state")?;
        self.connection
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    async fn player_profile(&self) -> ClientResult<PlayerProfile> {
        self.check("get_player_profile")?;
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    async fn agents(&self) -> ClientResult<Vec<AgentInfo>> {
        self.check("get_agents")?;
        Ok(self.agents.lock().unwrap().clone().unwrap_or_default())
    }

    async fn pregame_state(&self) -> ClientResult<Option<PregameState>> {
        self.check("get_pregame_state")?;
        Ok(self.pregame.lock().unwrap().clone())
    }

    async fn instalock_agent(&self, match_id: &str, agent_id: &str) -> ClientResult<()> {
        self.record("instalock_agent", &[match_id, agent_id])?;
        self.hang_if_stalled("instalock_agent").await
    }

    async fn dodge_match(&self, match_id: &str) -> ClientResult<()> {
        self.record("dodge_match", &[match_id])?;
        self.hang_if_stalled("dodge_match").await
    }

    async fn live_match(&self) -> ClientResult<Option<LiveMatch>> {
        self.check("get_live_match")?;
        Ok(self.live_match.lock().unwrap().clone())
    }

    async fn party(&self) -> ClientResult<Option<PartyState>> {
        self.check("get_party")?;
        Ok(self.party.lock().unwrap().clone())
    }

    async fn friends(&self) -> ClientResult<Vec<Friend>> {
        self.check("get_friends")?;
        Ok(self.friends.lock().unwrap().clone())
    }

    async fn party_invite(&self, party_id: &str, name: &str, tag: &str) -> ClientResult<()> {
        self.record("party_invite", &[party_id, name, tag])
    }

    async fn party_kick(&self, party_id: &str, puuid: &str) -> ClientResult<()> {
        self.record("party_kick", &[party_id, puuid])
    }

    async fn party_promote(&self, party_id: &str, puuid: &str) -> ClientResult<()> {
        self.record("party_promote", &[party_id, puuid])
    }

    async fn party_accept_invite(&self, party_id: &str) -> ClientResult<()> {
        self.record("party_accept_invite", &[party_id])
    }

    async fn party_decline_invite(&self, party_id: &str, request_id: &str) -> ClientResult<()> {
        self.record("party_decline_invite", &[party_id, request_id])
    }

    async fn party_set_accessibility(&self, party_id: &str, open: bool) -> ClientResult<()> {
        let open = open.to_string();
        self.record("party_set_accessibility", &[party_id, open.as_str()])
    }

    async fn party_set_ready(&self, party_id: &str, ready: bool) -> ClientResult<()> {
        let ready = ready.to_string();
        self.record("party_set_ready", &[party_id, ready.as_str()])
    }

    async fn party_start_queue(&self, party_id: &str) -> ClientResult<()> {
        self.record("party_start_queue", &[party_id])
    }

    async fn party_leave_queue(&self, party_id: &str) -> ClientResult<()> {
        self.record("party_leave_queue", &[party_id])
    }

    async fn party_set_queue(&self, party_id: &str, queue_id: &str) -> ClientResult<()> {
        self.record("party_set_queue", &[party_id, queue_id])
    }

    async fn party_generate_code(&self, party_id: &str) -> ClientResult<String> {
        self.record("party_generate_code", &[party_id])?;
        Ok(self.invite_code.lock().unwrap().clone())
    }

    async fn party_disable_code(&self, party_id: &str) -> ClientResult<()> {
        self.record("party_disable_code", &[party_id])
    }
}

/// In-memory `SettingsStore` that records every save.
#[derive(Default)]
pub struct MemoryStore {
    pub initial: Mutex<Option<AppConfig>>,
    saves: Mutex<Vec<AppConfig>>,
    fail_load: bool,
    fail_save: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_initial(config: AppConfig) -> Self {
        Self {
            initial: Mutex::new(Some(config)),
            ..Self::default()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn set_fail_save(&self, fail: bool) {
        *self.fail_save.lock().unwrap() = fail;
    }

    pub fn saves(&self) -> Vec<AppConfig> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if self.fail_load {
            return Err(ConfigError::NoConfigDir);
        }
        Ok(self.initial.lock().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if *self.fail_save.lock().unwrap() {
            return Err(ConfigError::NoConfigDir);
        }
        self.saves.lock().unwrap().push(config.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn connected_state() -> ConnectionState {
    ConnectionState {
        status: ConnectionStatus::Connected,
        player_info: Some(PlayerInfo {
            puuid: "self".into(),
            game_name: "Ash".into(),
            tag_line: "EUW".into(),
            player_card_id: None,
        }),
        region: Some("eu".into()),
        shard: Some("eu".into()),
    }
}

pub fn pregame(match_id: &str, map_name: &str, locked: bool) -> PregameState {
    PregameState {
        match_id: match_id.into(),
        map_id: format!("/Game/Maps/{map_name}"),
        map_name: map_name.into(),
        locked,
        locked_agent: None,
    }
}

pub fn player(puuid: &str, agent: &str) -> LiveMatchPlayer {
    LiveMatchPlayer {
        puuid: puuid.into(),
        game_name: format!("name-{puuid}"),
        tag_line: "TAG".into(),
        team_id: "Blue".into(),
        agent_id: format!("id-{agent}"),
        agent_name: agent.into(),
        agent_icon: format!("icon-{agent}"),
        rank: 12,
        rr: 40,
        peak_rank: 15,
        account_level: 120,
        incognito: false,
        is_self: false,
    }
}

pub fn live_match(
    match_id: &str,
    phase: MatchPhase,
    ally: Vec<LiveMatchPlayer>,
    enemy: Vec<LiveMatchPlayer>,
) -> LiveMatch {
    LiveMatch {
        match_id: match_id.into(),
        map_id: "/Game/Maps/Ascent".into(),
        map_name: "Ascent".into(),
        queue_id: "competitive".into(),
        phase,
        is_team_mode: true,
        ally_team: ally,
        enemy_team: enemy,
    }
}

pub fn member(puuid: &str, is_owner: bool) -> PartyMember {
    PartyMember {
        puuid: puuid.into(),
        game_name: format!("name-{puuid}"),
        tag_line: "TAG".into(),
        rank: 10,
        account_level: 50,
        player_card_id: String::new(),
        is_owner,
        is_ready: true,
        is_moderator: false,
        ping: 30,
    }
}

pub fn party(party_id: &str, members: Vec<PartyMember>) -> PartyState {
    PartyState {
        party_id: party_id.into(),
        members,
        state: "DEFAULT".into(),
        accessibility: Accessibility::Closed,
        queue_id: "unrated".into(),
        invite_code: String::new(),
        is_owner: true,
        eligible_queues: vec!["unrated".into(), "competitive".into()],
        invites: Vec::new(),
    }
}

pub fn friend(puuid: &str, name: &str, tag: &str, online: bool) -> Friend {
    Friend {
        puuid: puuid.into(),
        game_name: name.into(),
        tag_line: tag.into(),
        is_online: online,
        status: (if online { "chat" } else { "offline" }).into(),
        player_card_id: String::new(),
    }
}

pub fn agent(uuid: &str, name: &str, unlocked: bool) -> AgentInfo {
    AgentInfo {
        uuid: uuid.into(),
        name: name.into(),
        icon: format!("icon-{name}"),
        role: "Duelist".into(),
        role_icon: String::new(),
        unlocked,
    }
}
