//! Source engine (Insurgency, Rust, Left 4 Dead 2) query and rcon clients.
pub mod packet;
mod query;
mod rcon;
pub mod session;

pub use query::{parse_info, parse_players, SourceQueryClient};
pub use rcon::{parse_map_name, parse_status, SourceRconClient};
pub use session::RconSession;
