//! id Tech 3 (Call of Duty 2, 4 and 5) query and rcon clients.
pub mod packet;
mod query;
mod rcon;

pub use query::{parse_status_response, Quake3QueryClient};
pub use rcon::{parse_map_name, parse_map_rotation, parse_status, Quake3RconClient};
