//! Query and administer game servers over their native protocols: the
//! id Tech 3 out-of-band protocol spoken by Call of Duty 2/4/5, and the
//! [Source RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol)
//! plus A2S queries spoken by Source engine games.
//!
//! ## Example
//! ```no_run
//! use serverlink::{GameType, RconClient, RconClientFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), serverlink::Error> {
//!     let factory = RconClientFactory::new();
//!     let mut client = factory.create_instance(
//!         GameType::CallOfDuty4,
//!         "my-server",
//!         "cod4.example.org",
//!         28960,
//!         "<put rcon password here>",
//!     )?;
//!
//!     for player in client.get_players().await? {
//!         println!("{:?}", player.name);
//!     }
//!     Ok(())
//! }
//! ```
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod game_type;
pub mod models;
pub mod quake3;
pub mod source;
mod transport;

pub use client::{AnyQueryClient, AnyRconClient, QueryClient, RconClient};
pub use config::{ClientOptions, RetryPolicy, ServerEndpoint};
pub use error::{Error, Result};
pub use factory::{QueryClientFactory, RconClientFactory};
pub use game_type::{Engine, GameType};
pub use models::{QueryPlayer, QueryResponse, RconMapEntry, RconPlayer};
