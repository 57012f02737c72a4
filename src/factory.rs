use log::debug;

use crate::{
    client::{AnyQueryClient, AnyRconClient, QueryClient, RconClient},
    config::{ClientOptions, RetryPolicy},
    error::{Error, Result},
    game_type::{Engine, GameType},
    quake3::{Quake3QueryClient, Quake3RconClient},
    source::{SourceQueryClient, SourceRconClient},
};

/// Creates configured query clients. Holds nothing but socket tunables, so
/// one factory can be copied to any number of callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClientFactory {
    options: ClientOptions,
}

impl QueryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        QueryClientFactory { options }
    }

    pub fn create_instance(
        &self,
        game_type: GameType,
        hostname: &str,
        port: u16,
    ) -> Result<AnyQueryClient> {
        let mut client = match game_type.engine() {
            Some(Engine::Quake3) => {
                AnyQueryClient::Quake3(Quake3QueryClient::with_options(self.options))
            }
            Some(Engine::Source) => {
                AnyQueryClient::Source(SourceQueryClient::with_options(self.options))
            }
            None => return Err(Error::UnsupportedGameType(game_type, "query")),
        };

        debug!("creating {} query client for {}:{}", game_type, hostname, port);
        client.configure(hostname, port)?;
        Ok(client)
    }
}

/// Creates configured rcon clients, one per logical session.
///
/// Quake3 clients get a copy of the factory's retry policy, so a seeded
/// policy makes every client back off the same way.
#[derive(Debug, Clone, Default)]
pub struct RconClientFactory {
    options: ClientOptions,
    retry: RetryPolicy,
}

impl RconClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        RconClientFactory {
            options,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn create_instance(
        &self,
        game_type: GameType,
        server_id: &str,
        hostname: &str,
        port: u16,
        rcon_password: &str,
    ) -> Result<AnyRconClient> {
        let mut client = match game_type.engine() {
            Some(Engine::Quake3) => AnyRconClient::Quake3(Quake3RconClient::with_options(
                self.options,
                self.retry.clone(),
            )),
            Some(Engine::Source) => {
                AnyRconClient::Source(SourceRconClient::with_options(self.options))
            }
            None => return Err(Error::UnsupportedGameType(game_type, "rcon")),
        };

        client.configure(game_type, server_id, hostname, port, rcon_password)?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_game_types_to_engines() {
        let factory = QueryClientFactory::new();
        assert!(matches!(
            factory.create_instance(GameType::CallOfDuty4, "127.0.0.1", 28960),
            Ok(AnyQueryClient::Quake3(_))
        ));
        assert!(matches!(
            factory.create_instance(GameType::Left4Dead2, "127.0.0.1", 27015),
            Ok(AnyQueryClient::Source(_))
        ));

        let factory = RconClientFactory::new();
        assert!(matches!(
            factory.create_instance(GameType::CallOfDuty2, "srv", "127.0.0.1", 28960, "pw"),
            Ok(AnyRconClient::Quake3(_))
        ));
        assert!(matches!(
            factory.create_instance(GameType::Rust, "srv", "127.0.0.1", 28016, "pw"),
            Ok(AnyRconClient::Source(_))
        ));
    }

    #[test]
    fn rejects_unsupported_game_types() {
        for game_type in [GameType::Unknown, GameType::Minecraft, GameType::Battlefield1] {
            assert!(matches!(
                QueryClientFactory::new().create_instance(game_type, "127.0.0.1", 1),
                Err(Error::UnsupportedGameType(_, "query"))
            ));
            assert!(matches!(
                RconClientFactory::new().create_instance(game_type, "srv", "127.0.0.1", 1, "pw"),
                Err(Error::UnsupportedGameType(_, "rcon"))
            ));
        }
    }

    #[test]
    fn returns_configuration_errors() {
        assert!(matches!(
            QueryClientFactory::new().create_instance(GameType::CallOfDuty5, "", 28960),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            RconClientFactory::new().create_instance(GameType::Insurgency, "srv", "host", 0, "pw"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn factories_can_be_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryClientFactory>();
        assert_send_sync::<RconClientFactory>();
    }
}
