use std::collections::HashMap;
use std::time::Duration;

/// Normalized result of a server status query, whatever the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub server_name: String,
    pub map: String,
    pub mod_name: String,
    pub max_players: u32,
    pub server_params: HashMap<String, String>,
    pub players: Vec<QueryPlayer>,
}

impl QueryResponse {
    /// Builds a response from a raw parameter block, reading the normalized
    /// fields from the engine specific keys. Missing keys default to empty or
    /// zero.
    pub(crate) fn from_params(
        server_params: HashMap<String, String>,
        players: Vec<QueryPlayer>,
        keys: &ParamKeys,
    ) -> Self {
        let lookup = |key: &str| server_params.get(key).cloned().unwrap_or_default();

        QueryResponse {
            server_name: lookup(keys.server_name),
            map: lookup(keys.map),
            mod_name: lookup(keys.mod_name),
            max_players: lookup(keys.max_players).trim().parse().unwrap_or(0),
            players,
            server_params,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Names of the parameters each engine reports the normalized fields under.
pub(crate) struct ParamKeys {
    pub server_name: &'static str,
    pub map: &'static str,
    pub mod_name: &'static str,
    pub max_players: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlayer {
    pub name: String,
    pub score: i32,
    pub ping: u32,
    /// Only reported by Source servers.
    pub connected: Option<Duration>,
}

/// A player row parsed from an rcon `status` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RconPlayer {
    pub num: u32,
    pub guid: Option<String>,
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub rate: u32,
    pub ping: u32,
    /// Quake3 only.
    pub score: Option<i32>,
    /// Quake3 only.
    pub qport: Option<String>,
}

/// An entry of a Quake3 `sv_mapRotation`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RconMapEntry {
    /// Empty when the rotation entry doesn't switch game type.
    pub game_type: String,
    pub map_name: String,
}

impl RconMapEntry {
    pub fn new(game_type: &str, map_name: &str) -> Self {
        RconMapEntry {
            game_type: game_type.to_string(),
            map_name: map_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: ParamKeys = ParamKeys {
        server_name: "sv_hostname",
        map: "mapname",
        mod_name: "fs_game",
        max_players: "sv_maxclients",
    };

    #[test]
    fn missing_params_default_to_empty() {
        let response = QueryResponse::from_params(HashMap::new(), vec![], &KEYS);
        assert_eq!(response.server_name, "");
        assert_eq!(response.map, "");
        assert_eq!(response.max_players, 0);
        assert_eq!(response.player_count(), 0);
    }

    #[test]
    fn non_numeric_max_players_is_zero() {
        let params = HashMap::from([
            ("sv_maxclients".to_string(), "lots".to_string()),
            ("mapname".to_string(), "mp_crash".to_string()),
        ]);
        let response = QueryResponse::from_params(params, vec![], &KEYS);
        assert_eq!(response.max_players, 0);
        assert_eq!(response.map, "mp_crash");
    }
}
