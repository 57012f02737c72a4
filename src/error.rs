use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::game_type::GameType;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned before any I/O if the hostname, port or credentials are
    /// missing.
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    /// Returned if the host is down, behind a firewall, or refused to
    /// authenticate the session.
    #[error("cannot establish session with {host}: {reason}")]
    Connection { host: String, reason: String },
    /// Returned if the host name does not resolve or the socket can't be
    /// opened.
    #[error("host cannot be reached")]
    UnreachableHost(#[source] std::io::Error),
    /// The socket was established, but there was a problem writing to it.
    #[error("cannot send message to host")]
    SendError(#[source] std::io::Error),
    /// The socket was established, but there was a problem reading from it.
    #[error("cannot receive response from host")]
    ReceiveError(#[source] std::io::Error),
    /// The remote end closed the stream while we were waiting for a response.
    #[error("connection closed by host")]
    ConnectionClosed,
    /// Returned if the server did not respond in time.
    #[error("timeout")]
    TimeoutError(#[from] Elapsed),
    /// Returned if we received a packet that does not have a type known to us.
    #[error("unknown rcon packet type: {0}")]
    UnknownPacketType(i32),
    /// Returned if the header is mangled in some way (bad size, incomplete
    /// terminator).
    #[error("packet malformed: {0}")]
    MalformedPacket(String),
    /// The operation has no meaning for the engine family of this client.
    #[error("{0}")]
    UnsupportedOperation(String),
    /// Factories only know how to talk to a closed set of game types.
    #[error("game type {0} is not supported for {1} operations")]
    UnsupportedGameType(GameType, &'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedOperation(message.into())
    }

    /// True for errors a caller should surface as "not implemented" rather
    /// than as a failed operation.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::UnsupportedOperation(_))
    }

    /// True for errors caused by the caller's input rather than the server.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::UnsupportedGameType(_, _)
        )
    }

    /// Transport level failures after which a Source session can't be trusted
    /// any more.
    pub(crate) fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::SendError(_)
                | Error::ReceiveError(_)
                | Error::ConnectionClosed
                | Error::TimeoutError(_)
                | Error::MalformedPacket(_)
                | Error::UnknownPacketType(_)
        )
    }
}
