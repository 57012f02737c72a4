//! In-process game servers the clients are tested against.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serverlink::{
    source::packet::{Packet, PacketReader, PacketType},
    ClientOptions, RetryPolicy,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
    task::JoinHandle,
};

pub const PASSWORD: &str = "testpass";

/// Short timeouts and no backoff, so failure paths finish quickly.
pub fn test_options() -> ClientOptions {
    ClientOptions {
        socket_timeout: Duration::from_millis(300),
        drain_grace: Duration::from_millis(50),
        read_buffer_size: 8192,
    }
}

pub fn no_backoff() -> RetryPolicy {
    RetryPolicy::seeded(1).ceilings(vec![Duration::ZERO; 3])
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap().port()
}

/// Answers a Quake3 `print` response.
pub fn quake3_print(content: &str) -> Vec<u8> {
    let mut datagram = vec![0xFF, 0xFF, 0xFF, 0xFF];
    datagram.extend_from_slice(b"print\n");
    datagram.extend_from_slice(content.as_bytes());
    datagram
}

#[derive(Default)]
struct UdpState {
    handlers: Vec<(String, Vec<Vec<u8>>)>,
    received: Vec<Vec<u8>>,
    ignore_first: usize,
}

/// Mock id Tech 3 server. Rcon handlers are keyed on the command prefix
/// following `rcon <password> `, anything else on the whole text after the
/// out-of-band marker.
#[derive(Clone)]
pub struct MockUdpServer {
    pub port: u16,
    state: Arc<Mutex<UdpState>>,
    handle: Arc<JoinHandle<()>>,
}

impl MockUdpServer {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(UdpState::default()));

        let handle = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    let Ok((read, from)) = socket.recv_from(&mut buf).await else {
                        return;
                    };
                    let responses = Self::respond(&state, &buf[..read]);
                    for response in responses {
                        let _ = socket.send_to(&response, from).await;
                    }
                }
            })
        };

        MockUdpServer {
            port,
            state,
            handle: Arc::new(handle),
        }
    }

    fn respond(state: &Mutex<UdpState>, datagram: &[u8]) -> Vec<Vec<u8>> {
        let mut state = state.lock().unwrap();
        state.received.push(datagram.to_vec());
        if state.ignore_first > 0 {
            state.ignore_first -= 1;
            return Vec::new();
        }

        let Some(text) = datagram.strip_prefix(&[0xFF, 0xFF, 0xFF, 0xFF][..]) else {
            return Vec::new();
        };
        let text = String::from_utf8_lossy(text).into_owned();
        let command = match text.splitn(3, ' ').collect::<Vec<_>>()[..] {
            ["rcon", _, command] => command.to_string(),
            _ => text.clone(),
        };

        state
            .handlers
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, responses)| responses.clone())
            .unwrap_or_default()
    }

    pub fn on(&self, command: &str, responses: Vec<Vec<u8>>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .handlers
            .push((command.to_string(), responses));
        self
    }

    /// Drops the first `count` requests without answering.
    pub fn ignore_first(&self, count: usize) -> &Self {
        self.state.lock().unwrap().ignore_first = count;
        self
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().received.clone()
    }

    /// Commands of the rcon packets received so far, password stripped.
    pub fn commands(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|datagram| {
                let text = String::from_utf8_lossy(&datagram[4..]).into_owned();
                text.splitn(3, ' ').nth(2).unwrap_or_default().to_string()
            })
            .collect()
    }
}

impl Drop for MockUdpServer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.handle) == 1 {
            self.handle.abort();
        }
    }
}

#[derive(Default)]
struct TcpState {
    handlers: HashMap<String, String>,
    received: Vec<Packet>,
    /// Largest body sent in one response packet.
    max_body: Option<usize>,
    /// Bytes per write, to make the client reassemble packets.
    write_chunk: Option<usize>,
    /// Hang up after this many commands on a connection.
    close_after: Option<usize>,
}

/// Mock Source rcon server.
#[derive(Clone)]
pub struct MockSourceServer {
    pub port: u16,
    pub connections: Arc<AtomicUsize>,
    state: Arc<Mutex<TcpState>>,
    handle: Arc<JoinHandle<()>>,
}

impl MockSourceServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(TcpState::default()));
        let connections = Arc::new(AtomicUsize::new(0));

        let handle = {
            let state = Arc::clone(&state);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, addr)) = listener.accept().await else {
                        return;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let _ = Self::process(stream, addr, state).await;
                    });
                }
            })
        };

        MockSourceServer {
            port,
            connections,
            state,
            handle: Arc::new(handle),
        }
    }

    async fn process(
        mut stream: TcpStream,
        _addr: SocketAddr,
        state: Arc<Mutex<TcpState>>,
    ) -> std::io::Result<()> {
        let mut reader = PacketReader::new();
        let mut buf = [0u8; 4096];
        let mut commands = 0;

        loop {
            let read = stream.read(&mut buf).await?;
            if read == 0 {
                return Ok(());
            }
            let packets = reader
                .push(&buf[..read])
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

            for packet in packets {
                let (replies, write_chunk, hang_up) = {
                    let mut state = state.lock().unwrap();
                    state.received.push(packet.clone());

                    let mut hang_up = false;
                    let replies = match packet.packet_type() {
                        PacketType::Auth => {
                            let id = if packet.body() == PASSWORD { packet.id() } else { -1 };
                            vec![
                                Packet::new(packet.id(), PacketType::Response, ""),
                                Packet::new(id, PacketType::AuthResponse, ""),
                            ]
                        }
                        // the client's exec type decodes as auth response
                        PacketType::AuthResponse | PacketType::Exec => {
                            commands += 1;
                            let body = state
                                .handlers
                                .get(&*packet.body())
                                .cloned()
                                .unwrap_or_default();
                            split_body(&body, state.max_body)
                                .into_iter()
                                .map(|chunk| Packet::new(packet.id(), PacketType::Response, chunk))
                                .collect()
                        }
                        PacketType::Response => {
                            hang_up = state.close_after.is_some_and(|limit| commands >= limit);
                            vec![
                                Packet::new(packet.id(), PacketType::Response, ""),
                                Packet::new(packet.id(), PacketType::Response, "\u{1}"),
                            ]
                        }
                    };
                    (replies, state.write_chunk, hang_up)
                };

                let bytes: Vec<u8> = replies.iter().flat_map(|reply| reply.pack()).collect();
                match write_chunk {
                    Some(size) => {
                        for chunk in bytes.chunks(size) {
                            stream.write_all(chunk).await?;
                            stream.flush().await?;
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                    None => stream.write_all(&bytes).await?,
                }

                if hang_up {
                    return stream.shutdown().await;
                }
            }
        }
    }

    pub fn on(&self, command: &str, response: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .handlers
            .insert(command.to_string(), response.to_string());
        self
    }

    pub fn max_body(&self, size: usize) -> &Self {
        self.state.lock().unwrap().max_body = Some(size);
        self
    }

    pub fn write_chunk(&self, size: usize) -> &Self {
        self.state.lock().unwrap().write_chunk = Some(size);
        self
    }

    pub fn close_after(&self, commands: usize) -> &Self {
        self.state.lock().unwrap().close_after = Some(commands);
        self
    }

    pub fn received(&self) -> Vec<Packet> {
        self.state.lock().unwrap().received.clone()
    }
}

impl Drop for MockSourceServer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.handle) == 1 {
            self.handle.abort();
        }
    }
}

/// Splits on byte boundaries, like srcds, even inside a character.
fn split_body(body: &str, max_body: Option<usize>) -> Vec<Vec<u8>> {
    let Some(max_body) = max_body else {
        return vec![body.as_bytes().to_vec()];
    };
    body.as_bytes().chunks(max_body).map(<[u8]>::to_vec).collect()
}
