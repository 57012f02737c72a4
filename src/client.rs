//! Capabilities shared by every engine family.
//!
//! Each trait has a Quake3 and a Source implementation. The factories in
//! [crate::factory] return them wrapped in [AnyQueryClient] and
//! [AnyRconClient], which forward to whichever engine they hold.
#![allow(async_fn_in_trait)]

use crate::{
    error::Result,
    game_type::GameType,
    models::{QueryResponse, RconMapEntry, RconPlayer},
    quake3::{Quake3QueryClient, Quake3RconClient},
    source::{SourceQueryClient, SourceRconClient},
};

/// Read-only status queries, as used by server browsers.
pub trait QueryClient {
    fn configure(&mut self, hostname: &str, port: u16) -> Result<()>;

    async fn get_server_status(&self) -> Result<QueryResponse>;
}

/// Remote administration of a game server.
///
/// Operations the engine family has no equivalent for fail with
/// [crate::Error::UnsupportedOperation] without touching the network.
pub trait RconClient {
    fn configure(
        &mut self,
        game_type: GameType,
        server_id: &str,
        hostname: &str,
        port: u16,
        rcon_password: &str,
    ) -> Result<()>;

    async fn get_players(&mut self) -> Result<Vec<RconPlayer>>;

    /// Name of the map currently being played, or `"Unknown"` if the server
    /// could not be asked or its answer could not be parsed.
    async fn get_current_map(&mut self) -> String;

    async fn say(&mut self, message: &str) -> Result<()>;

    async fn get_maps(&mut self) -> Result<Vec<RconMapEntry>>;

    async fn restart(&mut self) -> Result<String>;

    async fn restart_map(&mut self) -> Result<String>;

    async fn fast_restart_map(&mut self) -> Result<String>;

    async fn next_map(&mut self) -> Result<String>;

    async fn kick_player(&mut self, client_id: u32) -> Result<String>;

    async fn kick_player_by_name(&mut self, name: &str) -> Result<String>;

    async fn kick_all_players(&mut self) -> Result<String>;

    async fn ban_player(&mut self, client_id: u32) -> Result<String>;

    async fn ban_player_by_name(&mut self, name: &str) -> Result<String>;

    async fn temp_ban_player(&mut self, client_id: u32) -> Result<String>;

    async fn temp_ban_player_by_name(&mut self, name: &str) -> Result<String>;

    async fn unban_player(&mut self, name: &str) -> Result<String>;

    async fn tell_player(&mut self, client_id: u32, message: &str) -> Result<String>;

    async fn change_map(&mut self, map_name: &str) -> Result<String>;

    async fn get_server_info(&mut self) -> Result<String>;

    async fn get_system_info(&mut self) -> Result<String>;

    async fn get_command_list(&mut self) -> Result<String>;
}

#[derive(Debug)]
pub enum AnyQueryClient {
    Quake3(Quake3QueryClient),
    Source(SourceQueryClient),
}

impl QueryClient for AnyQueryClient {
    fn configure(&mut self, hostname: &str, port: u16) -> Result<()> {
        match self {
            AnyQueryClient::Quake3(client) => client.configure(hostname, port),
            AnyQueryClient::Source(client) => client.configure(hostname, port),
        }
    }

    async fn get_server_status(&self) -> Result<QueryResponse> {
        match self {
            AnyQueryClient::Quake3(client) => client.get_server_status().await,
            AnyQueryClient::Source(client) => client.get_server_status().await,
        }
    }
}

#[derive(Debug)]
pub enum AnyRconClient {
    Quake3(Quake3RconClient),
    Source(SourceRconClient),
}

macro_rules! forward {
    ($self:ident.$method:ident($($arg:expr),*)) => {
        match $self {
            AnyRconClient::Quake3(client) => client.$method($($arg),*).await,
            AnyRconClient::Source(client) => client.$method($($arg),*).await,
        }
    };
}

impl RconClient for AnyRconClient {
    fn configure(
        &mut self,
        game_type: GameType,
        server_id: &str,
        hostname: &str,
        port: u16,
        rcon_password: &str,
    ) -> Result<()> {
        match self {
            AnyRconClient::Quake3(client) => {
                client.configure(game_type, server_id, hostname, port, rcon_password)
            }
            AnyRconClient::Source(client) => {
                client.configure(game_type, server_id, hostname, port, rcon_password)
            }
        }
    }

    async fn get_players(&mut self) -> Result<Vec<RconPlayer>> {
        forward!(self.get_players())
    }

    async fn get_current_map(&mut self) -> String {
        forward!(self.get_current_map())
    }

    async fn say(&mut self, message: &str) -> Result<()> {
        forward!(self.say(message))
    }

    async fn get_maps(&mut self) -> Result<Vec<RconMapEntry>> {
        forward!(self.get_maps())
    }

    async fn restart(&mut self) -> Result<String> {
        forward!(self.restart())
    }

    async fn restart_map(&mut self) -> Result<String> {
        forward!(self.restart_map())
    }

    async fn fast_restart_map(&mut self) -> Result<String> {
        forward!(self.fast_restart_map())
    }

    async fn next_map(&mut self) -> Result<String> {
        forward!(self.next_map())
    }

    async fn kick_player(&mut self, client_id: u32) -> Result<String> {
        forward!(self.kick_player(client_id))
    }

    async fn kick_player_by_name(&mut self, name: &str) -> Result<String> {
        forward!(self.kick_player_by_name(name))
    }

    async fn kick_all_players(&mut self) -> Result<String> {
        forward!(self.kick_all_players())
    }

    async fn ban_player(&mut self, client_id: u32) -> Result<String> {
        forward!(self.ban_player(client_id))
    }

    async fn ban_player_by_name(&mut self, name: &str) -> Result<String> {
        forward!(self.ban_player_by_name(name))
    }

    async fn temp_ban_player(&mut self, client_id: u32) -> Result<String> {
        forward!(self.temp_ban_player(client_id))
    }

    async fn temp_ban_player_by_name(&mut self, name: &str) -> Result<String> {
        forward!(self.temp_ban_player_by_name(name))
    }

    async fn unban_player(&mut self, name: &str) -> Result<String> {
        forward!(self.unban_player(name))
    }

    async fn tell_player(&mut self, client_id: u32, message: &str) -> Result<String> {
        forward!(self.tell_player(client_id, message))
    }

    async fn change_map(&mut self, map_name: &str) -> Result<String> {
        forward!(self.change_map(map_name))
    }

    async fn get_server_info(&mut self) -> Result<String> {
        forward!(self.get_server_info())
    }

    async fn get_system_info(&mut self) -> Result<String> {
        forward!(self.get_system_info())
    }

    async fn get_command_list(&mut self) -> Result<String> {
        forward!(self.get_command_list())
    }
}
