use std::sync::OnceLock;

use log::{debug, error, warn};
use regex::Regex;

use crate::{
    client::RconClient,
    config::{ClientOptions, ServerEndpoint},
    error::{Error, Result},
    game_type::{Engine, GameType},
    models::{RconMapEntry, RconPlayer},
    source::session::RconSession,
};

const UNKNOWN_MAP: &str = "Unknown";

/// Columns: # userid name uniqueid connected ping loss state rate adr.
fn player_regex() -> &'static Regex {
    static PLAYER: OnceLock<Regex> = OnceLock::new();
    PLAYER.get_or_init(|| {
        Regex::new(
            r#"^#\s([0-9]+)\s([0-9]+)\s"(.+)"\s([STEAM0-9:_]+)\s+([0-9:]+)\s([0-9]+)\s([0-9]+)\s([a-z]+)\s([0-9]+)\s((?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])):?(-?[0-9]{1,5})"#,
        )
        .expect("player pattern is valid")
    })
}

fn map_regex() -> &'static Regex {
    static MAP: OnceLock<Regex> = OnceLock::new();
    MAP.get_or_init(|| Regex::new(r"(?m)^\s*map\s*:\s*(\S+)").expect("map pattern is valid"))
}

#[derive(Debug, Clone)]
struct Settings {
    server_id: String,
    endpoint: ServerEndpoint,
    rcon_password: String,
}

/// Rcon client for Source engine servers.
///
/// The authenticated TCP session is opened on the first command and kept
/// for the following ones. A session the server has hung up on is replaced
/// before the next command; one that breaks mid-command fails that command.
#[derive(Debug, Default)]
pub struct SourceRconClient {
    settings: Option<Settings>,
    session: Option<RconSession>,
    options: ClientOptions,
}

impl SourceRconClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        SourceRconClient {
            settings: None,
            session: None,
            options,
        }
    }

    /// True while an authenticated session is held open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Closes the session, if any. The next command reconnects.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("[{}] closing rcon session", self.server_id());
            session.close().await;
        }
    }

    fn server_id(&self) -> &str {
        self.settings
            .as_ref()
            .map(|settings| settings.server_id.as_str())
            .unwrap_or_default()
    }

    async fn create_connection(&self) -> Result<RconSession> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| Error::Configuration(String::from("rcon client is not configured")))?;

        debug!(
            "[{}] creating a new tcp connection and attempting to authenticate",
            settings.server_id
        );

        RconSession::connect(&settings.endpoint, &settings.rcon_password, &self.options)
            .await
            .map_err(|e| {
                error!(
                    "[{}] could not establish authenticated session with server: {}",
                    settings.server_id, e
                );
                e
            })
    }

    async fn command(&mut self, command: &str) -> Result<String> {
        let mut session = match self.session.take() {
            Some(mut session) => {
                if session.is_open() {
                    session
                } else {
                    debug!("[{}] server closed the rcon session, reconnecting", self.server_id());
                    self.create_connection().await?
                }
            }
            None => self.create_connection().await?,
        };

        let result = session.execute(command).await;
        match result {
            Err(ref e) if e.is_disconnect() => {
                warn!("[{}] rcon session lost: {}", self.server_id(), e);
            }
            _ => self.session = Some(session),
        }
        result
    }

    fn unsupported<T>(&self, what: &str) -> Result<T> {
        Err(Error::unsupported(format!(
            "{what} is not implemented for Source engine games"
        )))
    }
}

impl RconClient for SourceRconClient {
    fn configure(
        &mut self,
        game_type: GameType,
        server_id: &str,
        hostname: &str,
        port: u16,
        rcon_password: &str,
    ) -> Result<()> {
        debug!(
            "[{}] configuring Source rcon client for {} with endpoint {}:{}",
            server_id, game_type, hostname, port
        );

        if game_type.engine() != Some(Engine::Source) {
            return Err(Error::UnsupportedGameType(game_type, "Source rcon"));
        }
        let endpoint = ServerEndpoint::new(hostname, port)?;
        if rcon_password.is_empty() {
            return Err(Error::Configuration(String::from("rcon password is required")));
        }

        // a session authenticated against old settings is useless now
        self.session = None;
        self.settings = Some(Settings {
            server_id: server_id.to_string(),
            endpoint,
            rcon_password: rcon_password.to_string(),
        });
        Ok(())
    }

    async fn get_players(&mut self) -> Result<Vec<RconPlayer>> {
        debug!("[{}] attempting to get a list of players from the server", self.server_id());

        let status = self.command("status").await?;
        let players = parse_status(&status);

        for player in &players {
            debug!(
                "[{}] player {:?} with {:?} and {:?} parsed from result",
                self.server_id(),
                player.name,
                player.guid,
                player.ip_address
            );
        }
        Ok(players)
    }

    async fn get_current_map(&mut self) -> String {
        debug!("[{}] attempting to get current map from the server", self.server_id());

        let status = match self.command("status").await {
            Ok(status) => status,
            Err(e) => {
                warn!("[{}] failed to get current map from server: {}", self.server_id(), e);
                return UNKNOWN_MAP.to_string();
            }
        };

        match parse_map_name(&status) {
            Some(map_name) => {
                debug!("[{}] current map is {}", self.server_id(), map_name);
                map_name
            }
            None => {
                warn!("[{}] map name not found in status output", self.server_id());
                UNKNOWN_MAP.to_string()
            }
        }
    }

    async fn say(&mut self, _message: &str) -> Result<()> {
        self.unsupported("Sending messages to all players")
    }

    async fn get_maps(&mut self) -> Result<Vec<RconMapEntry>> {
        self.unsupported("Listing the map rotation")
    }

    async fn restart(&mut self) -> Result<String> {
        self.unsupported("Restarting the server")
    }

    async fn restart_map(&mut self) -> Result<String> {
        self.unsupported("Restarting the map")
    }

    async fn fast_restart_map(&mut self) -> Result<String> {
        self.unsupported("Fast restarting the map")
    }

    async fn next_map(&mut self) -> Result<String> {
        self.unsupported("Rotating to the next map")
    }

    async fn kick_player(&mut self, _client_id: u32) -> Result<String> {
        self.unsupported("Kicking players")
    }

    async fn kick_player_by_name(&mut self, _name: &str) -> Result<String> {
        self.unsupported("Kicking players by name")
    }

    async fn kick_all_players(&mut self) -> Result<String> {
        self.unsupported("Kicking all players")
    }

    async fn ban_player(&mut self, _client_id: u32) -> Result<String> {
        self.unsupported("Banning players")
    }

    async fn ban_player_by_name(&mut self, _name: &str) -> Result<String> {
        self.unsupported("Banning players by name")
    }

    async fn temp_ban_player(&mut self, _client_id: u32) -> Result<String> {
        self.unsupported("Temporarily banning players")
    }

    async fn temp_ban_player_by_name(&mut self, _name: &str) -> Result<String> {
        self.unsupported("Temporarily banning players by name")
    }

    async fn unban_player(&mut self, _name: &str) -> Result<String> {
        self.unsupported("Unbanning players")
    }

    async fn tell_player(&mut self, _client_id: u32, _message: &str) -> Result<String> {
        self.unsupported("Sending messages to specific players")
    }

    async fn change_map(&mut self, _map_name: &str) -> Result<String> {
        self.unsupported("Changing maps")
    }

    async fn get_server_info(&mut self) -> Result<String> {
        self.unsupported("Getting server info")
    }

    async fn get_system_info(&mut self) -> Result<String> {
        self.unsupported("Getting system info")
    }

    async fn get_command_list(&mut self) -> Result<String> {
        self.unsupported("Getting command list")
    }
}

/// Parses the player rows of a `status` reply; everything else is skipped.
pub fn parse_status(status: &str) -> Vec<RconPlayer> {
    status
        .lines()
        .map(str::trim)
        .filter_map(|line| player_regex().captures(line))
        .map(|captures| RconPlayer {
            num: captures[1].parse().unwrap_or(0),
            name: Some(captures[3].to_string()),
            guid: Some(captures[4].to_string()),
            ping: captures[6].parse().unwrap_or(0),
            rate: captures[9].parse().unwrap_or(0),
            ip_address: Some(captures[10].to_string()),
            score: None,
            qport: None,
        })
        .collect()
}

/// `map     : de_dust2 at: 0 x, 0 y, 0 z`
pub fn parse_map_name(status: &str) -> Option<String> {
    map_regex()
        .captures(status)
        .map(|captures| captures[1].to_string())
}
