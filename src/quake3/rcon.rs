use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use tokio::time::sleep;

use crate::{
    client::RconClient,
    config::{ClientOptions, RetryPolicy, ServerEndpoint},
    error::{Error, Result},
    game_type::{Engine, GameType},
    models::{RconMapEntry, RconPlayer},
    quake3::packet,
    transport,
};

const UNKNOWN_MAP: &str = "Unknown";

const IP_ADDRESS: &str = r"(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])";

/// Columns: num score ping guid name lastmsg address:port qport rate.
fn status_line_pattern(guid: &str) -> String {
    format!(
        r"^\s*([0-9]+)\s+([0-9-]+)\s+([0-9]+)\s+({guid})\s+(.*?)\s+([0-9]+?)\s*({IP_ADDRESS}):?(-?[0-9]{{1,5}})\s*(-?[0-9]{{1,5}})\s+([0-9]+)$"
    )
}

/// CoD2 and CoD5 report a numeric guid, CoD4 a 32 digit hex one.
fn status_regex(game_type: GameType) -> Option<&'static Regex> {
    static NUMERIC_GUID: OnceLock<Regex> = OnceLock::new();
    static HEX_GUID: OnceLock<Regex> = OnceLock::new();

    match game_type {
        GameType::CallOfDuty2 | GameType::CallOfDuty5 => Some(NUMERIC_GUID.get_or_init(|| {
            Regex::new(&status_line_pattern("[0-9]+")).expect("status pattern is valid")
        })),
        GameType::CallOfDuty4 => Some(HEX_GUID.get_or_init(|| {
            Regex::new(&status_line_pattern("[0-9a-f]{32}")).expect("status pattern is valid")
        })),
        _ => None,
    }
}

fn map_rotation_regex() -> &'static Regex {
    static MAP_ROTATION: OnceLock<Regex> = OnceLock::new();
    MAP_ROTATION.get_or_init(|| {
        Regex::new(r"(?:gametype\s+([a-zA-Z0-9]+)\s+)?map\s+([a-zA-Z0-9_]+)")
            .expect("map rotation pattern is valid")
    })
}

#[derive(Debug, Clone)]
struct Session {
    game_type: GameType,
    server_id: String,
    endpoint: ServerEndpoint,
    rcon_password: String,
}

/// Rcon client for id Tech 3 servers.
///
/// There is no connection to keep: every command is a single datagram
/// exchange on a fresh socket. Since UDP is lossy, failed exchanges are
/// retried according to the client's [RetryPolicy].
#[derive(Debug, Default)]
pub struct Quake3RconClient {
    session: Option<Session>,
    options: ClientOptions,
    retry: RetryPolicy,
}

impl Quake3RconClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions, retry: RetryPolicy) -> Self {
        Quake3RconClient {
            session: None,
            options,
            retry,
        }
    }

    fn server_id(&self) -> &str {
        self.session
            .as_ref()
            .map(|session| session.server_id.as_str())
            .unwrap_or_default()
    }

    /// Sends `command` and returns the text of the reply, retrying failed
    /// exchanges. With `receive` unset nothing is read back.
    async fn command(&mut self, command: &str, receive: bool) -> Result<String> {
        let Quake3RconClient {
            session,
            options,
            retry,
        } = self;
        let session = session
            .as_ref()
            .ok_or_else(|| Error::Configuration(String::from("rcon client is not configured")))?;

        let packet = packet::rcon(&session.rcon_password, command);
        let verb = command.split_whitespace().next().unwrap_or_default();

        let mut retry_count = 0;
        loop {
            match transport::exchange(&session.endpoint, options, &packet, receive).await {
                Ok(datagrams) => {
                    debug!(
                        "[{}] {} returned {} packet(s)",
                        session.server_id,
                        verb,
                        datagrams.len()
                    );
                    return Ok(packet::response_text(&datagrams));
                }
                Err(e) => {
                    retry_count += 1;
                    match retry.next_delay(retry_count) {
                        Some(delay) => {
                            warn!(
                                "[{}] failed to execute {} command - retry count: {}",
                                session.server_id, verb, retry_count
                            );
                            sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    fn game_type(&self) -> GameType {
        self.session
            .as_ref()
            .map(|session| session.game_type)
            .unwrap_or(GameType::Unknown)
    }
}

impl RconClient for Quake3RconClient {
    fn configure(
        &mut self,
        game_type: GameType,
        server_id: &str,
        hostname: &str,
        port: u16,
        rcon_password: &str,
    ) -> Result<()> {
        debug!(
            "[{}] configuring Quake3 rcon client for {} with endpoint {}:{}",
            server_id, game_type, hostname, port
        );

        if game_type.engine() != Some(Engine::Quake3) {
            return Err(Error::UnsupportedGameType(game_type, "Quake3 rcon"));
        }
        let endpoint = ServerEndpoint::new(hostname, port)?;
        if rcon_password.is_empty() {
            return Err(Error::Configuration(String::from("rcon password is required")));
        }

        self.session = Some(Session {
            game_type,
            server_id: server_id.to_string(),
            endpoint,
            rcon_password: rcon_password.to_string(),
        });
        Ok(())
    }

    async fn get_players(&mut self) -> Result<Vec<RconPlayer>> {
        debug!("[{}] attempting to get a list of players from the server", self.server_id());

        let status = self.command("status", true).await?;
        let players = parse_status(self.game_type(), &status);

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

        let server_info = match self.get_server_info().await {
            Ok(server_info) => server_info,
            Err(e) => {
                warn!("[{}] failed to get current map from server: {}", self.server_id(), e);
                return UNKNOWN_MAP.to_string();
            }
        };

        match parse_map_name(&server_info) {
            Some(map_name) => {
                debug!("[{}] current map is {}", self.server_id(), map_name);
                map_name
            }
            None => {
                warn!("[{}] map name not found in server info", self.server_id());
                UNKNOWN_MAP.to_string()
            }
        }
    }

    async fn say(&mut self, message: &str) -> Result<()> {
        debug!("[{}] attempting to send '{}' to the server", self.server_id(), message);
        self.command(&format!("say \"{message}\""), true).await?;
        Ok(())
    }

    async fn get_maps(&mut self) -> Result<Vec<RconMapEntry>> {
        debug!("[{}] attempting to get the map rotation", self.server_id());
        let rotation = self.command("sv_mapRotation", true).await?;
        Ok(parse_map_rotation(&rotation))
    }

    async fn restart(&mut self) -> Result<String> {
        debug!("[{}] attempting to restart the server", self.server_id());
        // the server goes down before it could answer
        self.command("quit", false).await?;
        Ok(String::from("Restart command sent to the server"))
    }

    async fn restart_map(&mut self) -> Result<String> {
        debug!("[{}] attempting to restart the current map", self.server_id());
        self.command("map_restart", true).await
    }

    async fn fast_restart_map(&mut self) -> Result<String> {
        debug!("[{}] attempting to fast restart the current map", self.server_id());
        self.command("fast_restart", true).await
    }

    async fn next_map(&mut self) -> Result<String> {
        debug!("[{}] attempting to rotate to the next map", self.server_id());
        self.command("map_rotate", true).await
    }

    async fn kick_player(&mut self, client_id: u32) -> Result<String> {
        debug!("[{}] attempting to kick client {}", self.server_id(), client_id);
        self.command(&format!("clientkick {client_id}"), true).await
    }

    async fn kick_player_by_name(&mut self, name: &str) -> Result<String> {
        debug!("[{}] attempting to kick player {}", self.server_id(), name);
        self.command(&format!("kick \"{name}\""), true).await
    }

    async fn kick_all_players(&mut self) -> Result<String> {
        debug!("[{}] attempting to kick all players", self.server_id());
        self.command("kickall", true).await
    }

    async fn ban_player(&mut self, client_id: u32) -> Result<String> {
        debug!("[{}] attempting to ban client {}", self.server_id(), client_id);
        self.command(&format!("banClient {client_id}"), true).await
    }

    async fn ban_player_by_name(&mut self, name: &str) -> Result<String> {
        debug!("[{}] attempting to ban player {}", self.server_id(), name);
        self.command(&format!("banUser \"{name}\""), true).await
    }

    async fn temp_ban_player(&mut self, client_id: u32) -> Result<String> {
        debug!("[{}] attempting to temporarily ban client {}", self.server_id(), client_id);
        self.command(&format!("tempBanClient {client_id}"), true).await
    }

    async fn temp_ban_player_by_name(&mut self, name: &str) -> Result<String> {
        debug!("[{}] attempting to temporarily ban player {}", self.server_id(), name);
        self.command(&format!("tempBanUser \"{name}\""), true).await
    }

    async fn unban_player(&mut self, name: &str) -> Result<String> {
        debug!("[{}] attempting to unban player {}", self.server_id(), name);
        self.command(&format!("unbanuser \"{name}\""), true).await
    }

    async fn tell_player(&mut self, client_id: u32, message: &str) -> Result<String> {
        debug!("[{}] attempting to send message to client {}", self.server_id(), client_id);
        self.command(&format!("tell {client_id} \"{message}\""), true).await
    }

    async fn change_map(&mut self, map_name: &str) -> Result<String> {
        debug!("[{}] attempting to change map to {}", self.server_id(), map_name);
        self.command(&format!("map {map_name}"), true).await
    }

    async fn get_server_info(&mut self) -> Result<String> {
        debug!("[{}] attempting to get server info", self.server_id());
        self.command("serverinfo", true).await
    }

    async fn get_system_info(&mut self) -> Result<String> {
        debug!("[{}] attempting to get system info", self.server_id());
        self.command("systeminfo", true).await
    }

    async fn get_command_list(&mut self) -> Result<String> {
        debug!("[{}] attempting to get command list", self.server_id());
        self.command("cmdlist", true).await
    }
}

/// Parses the player table of a `status` reply. Header lines, blank lines
/// and players still connecting don't match and are skipped.
pub fn parse_status(game_type: GameType, status: &str) -> Vec<RconPlayer> {
    let Some(regex) = status_regex(game_type) else {
        return Vec::new();
    };

    status
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .filter_map(|line| regex.captures(line))
        .map(|captures| RconPlayer {
            num: captures[1].parse().unwrap_or(0),
            score: Some(captures[2].parse().unwrap_or(0)),
            ping: captures[3].parse().unwrap_or(0),
            guid: Some(captures[4].to_string()),
            name: Some(captures[5].trim().to_string()),
            ip_address: Some(captures[7].to_string()),
            qport: Some(captures[9].to_string()),
            rate: captures[10].parse().unwrap_or(0),
        })
        .collect()
}

/// Entries look like `gametype war map mp_crash` or just `map mp_crash`.
pub fn parse_map_rotation(rotation: &str) -> Vec<RconMapEntry> {
    map_rotation_regex()
        .captures_iter(rotation)
        .map(|captures| {
            let game_type = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            RconMapEntry::new(game_type, &captures[2])
        })
        .collect()
}

/// Picks `mapname` out of a `serverinfo` reply, which lists one
/// `key   value` pair per line.
pub fn parse_map_name(server_info: &str) -> Option<String> {
    server_info.lines().find_map(|line| {
        let value = line.trim().strip_prefix("mapname")?;
        if !value.starts_with(char::is_whitespace) {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
