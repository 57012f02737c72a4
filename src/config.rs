//! Session coordinates and tunables shared by every client.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{Error, Result};

/// Where a game server listens. Validated once when a client is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    hostname: String,
    port: u16,
}

impl ServerEndpoint {
    pub fn new(hostname: &str, port: u16) -> Result<Self> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(Error::Configuration(String::from("hostname is required")));
        }
        if port == 0 {
            return Err(Error::Configuration(String::from("port is required")));
        }

        Ok(ServerEndpoint {
            hostname: hostname.to_string(),
            port,
        })
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_ref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by tokio's socket constructors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Socket tunables. The defaults are what the game servers are tuned for,
/// tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Applied to every connect, send and receive.
    pub socket_timeout: Duration,
    /// How long to keep listening for trailing datagrams once the socket
    /// has gone quiet.
    pub drain_grace: Duration,
    /// Size of a single socket read.
    pub read_buffer_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            socket_timeout: Duration::from_secs(5),
            drain_grace: Duration::from_millis(500),
            read_buffer_size: 8192,
        }
    }
}

/// Retry schedule for Quake3 rcon commands: an initial attempt, then one
/// retry per ceiling, waiting a random duration in `[0, ceiling)` first.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    ceilings: Vec<Duration>,
    rng: StdRng,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::with_rng(StdRng::from_entropy())
    }
}

impl RetryPolicy {
    pub fn with_rng(rng: StdRng) -> Self {
        RetryPolicy {
            ceilings: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            rng,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn ceilings(mut self, ceilings: Vec<Duration>) -> Self {
        self.ceilings = ceilings;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.ceilings.len()
    }

    /// Wait before retry number `retry` (1-based), or `None` once the
    /// schedule is exhausted.
    pub fn next_delay(&mut self, retry: usize) -> Option<Duration> {
        let ceiling = *self.ceilings.get(retry.checked_sub(1)?)?;
        let millis = ceiling.as_millis() as u64;
        if millis == 0 {
            return Some(Duration::ZERO);
        }
        Some(Duration::from_millis(self.rng.gen_range(0..millis)))
    }
}
