use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::{
    client::QueryClient,
    config::{ClientOptions, ServerEndpoint},
    error::{Error, Result},
    models::{ParamKeys, QueryPlayer, QueryResponse},
    quake3::packet,
    transport,
};

const STATUS_KEYS: ParamKeys = ParamKeys {
    server_name: "sv_hostname",
    map: "mapname",
    mod_name: "fs_game",
    max_players: "sv_maxclients",
};

fn player_regex() -> &'static Regex {
    static PLAYER: OnceLock<Regex> = OnceLock::new();
    PLAYER.get_or_init(|| {
        Regex::new(r#"^\s*(-?[0-9]+)\s+(-?[0-9]+)\s+"(.*)"\s*$"#).expect("player pattern is valid")
    })
}

/// `getstatus` client for id Tech 3 servers. Queries are cheap, so failures
/// are returned to the caller instead of being retried.
#[derive(Debug, Default)]
pub struct Quake3QueryClient {
    endpoint: Option<ServerEndpoint>,
    options: ClientOptions,
}

impl Quake3QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Quake3QueryClient {
            endpoint: None,
            options,
        }
    }
}

impl QueryClient for Quake3QueryClient {
    fn configure(&mut self, hostname: &str, port: u16) -> Result<()> {
        self.endpoint = Some(ServerEndpoint::new(hostname, port)?);
        Ok(())
    }

    async fn get_server_status(&self) -> Result<QueryResponse> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Configuration(String::from("query client is not configured")))?;

        info!("executing getstatus command against {}", endpoint.address());

        let datagrams =
            transport::exchange(endpoint, &self.options, &packet::get_status(), true).await?;
        let response = parse_status_response(&packet::response_text(&datagrams));

        debug!(
            "{} reports map {} with {} player(s)",
            endpoint.address(),
            response.map,
            response.player_count()
        );
        Ok(response)
    }
}

/// Parses a `statusResponse`: a header line, a line of `\key\value` pairs and
/// then one `score ping "name"` line per player.
pub fn parse_status_response(text: &str) -> QueryResponse {
    let mut lines = text.split('\n').skip(1);

    let server_params = lines.next().map(parse_params).unwrap_or_default();
    let players = lines.filter_map(parse_player).collect();

    QueryResponse::from_params(server_params, players, &STATUS_KEYS)
}

fn parse_params(line: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut parts = line.trim_end_matches('\r').split('\\');

    while let Some(key) = parts.next() {
        if key.is_empty() {
            continue;
        }
        let value = parts.next().unwrap_or_default();

        if key == "final" {
            break;
        }
        if key == "querid" {
            continue;
        }

        params.insert(key.to_string(), value.to_string());
    }

    params
}

fn parse_player(line: &str) -> Option<QueryPlayer> {
    let captures = player_regex().captures(line.trim_end())?;

    Some(QueryPlayer {
        score: captures[1].parse().unwrap_or(0),
        ping: captures[2].parse().unwrap_or(0),
        name: captures[3].to_string(),
        connected: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "statusResponse\n\
        \\sv_hostname\\^1XI ^7CoD4 Server\\mapname\\mp_crash\\fs_game\\mods/pam\\sv_maxclients\\24\\g_gametype\\war\n\
        12 48 \"Sniper^7\"\n\
        \n\
        -3 999 \"Connecting Player\"\n";

    #[test]
    fn parses_params_and_players() {
        let response = parse_status_response(STATUS);

        assert_eq!(response.server_name, "^1XI ^7CoD4 Server");
        assert_eq!(response.map, "mp_crash");
        assert_eq!(response.mod_name, "mods/pam");
        assert_eq!(response.max_players, 24);
        assert_eq!(response.server_params["g_gametype"], "war");
        assert_eq!(response.player_count(), 2);
        assert_eq!(
            response.players[0],
            QueryPlayer {
                name: "Sniper^7".into(),
                score: 12,
                ping: 48,
                connected: None,
            }
        );
        assert_eq!(response.players[1].score, -3);
    }

    #[test]
    fn empty_server_has_no_players() {
        let response = parse_status_response("statusResponse\n\\mapname\\mp_backlot\n");
        assert_eq!(response.map, "mp_backlot");
        assert!(response.players.is_empty());
    }

    #[test]
    fn truncated_response_defaults_everything() {
        let response = parse_status_response("statusResponse");
        assert_eq!(response, QueryResponse::default());
    }

    #[test]
    fn stops_at_final_and_skips_querid() {
        let params = parse_params("\\querid\\77\\mapname\\mp_pipeline\\final\\\\ignored\\1");
        assert_eq!(params.len(), 1);
        assert_eq!(params["mapname"], "mp_pipeline");
    }

    #[test]
    fn skips_lines_that_are_not_players() {
        assert_eq!(parse_player("garbage"), None);
        assert_eq!(parse_player(""), None);
        assert!(parse_player("0 50 \"Bot\"\r").is_some());
    }

    #[tokio::test]
    async fn refuses_to_query_before_configure() {
        let client = Quake3QueryClient::new();
        assert!(matches!(
            client.get_server_status().await,
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn configure_validates_endpoint() {
        let mut client = Quake3QueryClient::new();
        assert!(client.configure("", 28960).is_err());
        assert!(client.configure("127.0.0.1", 0).is_err());
        assert!(client.configure("127.0.0.1", 28960).is_ok());
    }
}
