use log::trace;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    config::{ClientOptions, ServerEndpoint},
    error::{Error, Result},
    source::packet::{Packet, PacketReader, PacketType},
};

/// An authenticated rcon connection. Every command needs `&mut self`, so a
/// session can only ever have one command in flight; its packet IDs and
/// leftover bytes are never shared.
///
/// Sessions are created with [RconSession::connect] and end with
/// [RconSession::close] or when dropped.
#[derive(Debug)]
pub struct RconSession {
    next_packet_id: i32,
    stream: TcpStream,
    reader: PacketReader,
    options: ClientOptions,
}

impl RconSession {
    pub async fn connect(
        endpoint: &ServerEndpoint,
        password: &str,
        options: &ClientOptions,
    ) -> Result<Self> {
        let host = endpoint.address();
        let stream = timeout(options.socket_timeout, TcpStream::connect(&host))
            .await?
            .map_err(Error::UnreachableHost)?;

        trace!("opened tcp stream to {}, attempting auth", host);

        let mut session = RconSession {
            next_packet_id: 1,
            stream,
            reader: PacketReader::new(),
            options: *options,
        };
        session.auth(&host, password).await?;

        trace!("auth complete");

        Ok(session)
    }

    /// Run a rcon command. In case of a response being split between
    /// multiple packets, they will be joined together afterwards.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        let command_packet = self.create_packet(PacketType::Exec, command);
        // srcds can split up the response but won't tell us how many packets
        // to expect, so we send an empty packet right after the command. The
        // server answers packets in order, so once the empty packet is echoed
        // the command's response is complete.
        let tracking_packet = self.create_packet(PacketType::Response, "");

        trace!("sending command packet {} to server", command_packet.id());
        self.write_to_stream(&command_packet).await?;
        trace!("sending tracking (blank) packet {} to server", tracking_packet.id());
        self.write_to_stream(&tracking_packet).await?;

        let mut responses = Vec::<Packet>::new();
        'read: loop {
            for response in self.read_from_stream().await? {
                trace!("receive response for packet id {}", response.id());
                if response.id() == tracking_packet.id() {
                    trace!("that was the tracking packet, completing response");
                    break 'read;
                }
                if response.id() == command_packet.id() {
                    responses.push(response);
                }
            }
        }

        let body: Vec<u8> = responses
            .iter()
            .flat_map(|packet| packet.raw_body())
            .copied()
            .collect();
        Ok(String::from_utf8_lossy(&body).trim().to_string())
    }

    /// Checks, without blocking, whether the server has hung up since the
    /// last command. Stray packets that arrived in the meantime (the second
    /// echo of a tracking packet) are discarded.
    pub fn is_open(&mut self) -> bool {
        let mut buf = [0u8; 512];
        loop {
            match self.stream.try_read(&mut buf) {
                Ok(0) => return false,
                Ok(read) => match self.reader.push(&buf[..read]) {
                    Ok(stale) => trace!("discarding {} stale packet(s)", stale.len()),
                    Err(_) => return false,
                },
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return true,
                Err(_) => return false,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }

    fn create_packet(&mut self, packet_type: PacketType, body: &str) -> Packet {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);

        Packet::new(id, packet_type, body)
    }

    /// The server answers an auth packet with an empty response value
    /// followed by the auth response, whose ID is -1 if the password was
    /// wrong.
    async fn auth(&mut self, host: &str, password: &str) -> Result<()> {
        let auth_packet = self.create_packet(PacketType::Auth, password);

        trace!("sending auth packet to server");
        self.write_to_stream(&auth_packet).await?;

        let mut responses = Vec::<Packet>::new();
        while responses.len() < 2
            && !responses
                .iter()
                .any(|packet| packet.packet_type() == PacketType::AuthResponse)
        {
            responses.extend(self.read_from_stream().await?);
        }

        trace!("received {} auth packet(s)", responses.len());

        let authenticated = responses
            .iter()
            .any(|packet| packet.packet_type() == PacketType::AuthResponse && packet.id() >= 0);
        if !authenticated {
            return Err(Error::Connection {
                host: host.to_string(),
                reason: String::from("could not establish authenticated session with server"),
            });
        }

        Ok(())
    }

    async fn write_to_stream(&mut self, packet: &Packet) -> Result<()> {
        timeout(
            self.options.socket_timeout,
            self.stream.write_all(&packet.pack()),
        )
        .await?
        .map_err(Error::SendError)
    }

    async fn read_from_stream(&mut self) -> Result<Vec<Packet>> {
        let mut buf = vec![0u8; self.options.read_buffer_size];

        let read = timeout(self.options.socket_timeout, self.stream.read(&mut buf))
            .await?
            .map_err(Error::ReceiveError)?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }

        self.reader.push(&buf[..read])
    }
}
