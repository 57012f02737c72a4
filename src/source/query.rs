//! Valve A2S server queries.
//!
//! See <https://developer.valvesoftware.com/wiki/Server_queries>.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::{debug, info, trace};
use tokio::net::UdpSocket;

use crate::{
    client::QueryClient,
    config::{ClientOptions, ServerEndpoint},
    error::{Error, Result},
    models::{ParamKeys, QueryPlayer, QueryResponse},
    transport,
};

const SINGLE_PACKET: i32 = -1;
const SPLIT_PACKET: i32 = -2;

const A2S_INFO: u8 = 0x54;
const A2S_PLAYER: u8 = 0x55;
const S2C_CHALLENGE: u8 = 0x41;
const S2A_INFO: u8 = 0x49;
const S2A_PLAYER: u8 = 0x44;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const NO_CHALLENGE: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

const INFO_KEYS: ParamKeys = ParamKeys {
    server_name: "hostname",
    map: "mapname",
    mod_name: "modname",
    max_players: "maxplayers",
};

/// A2S client for Source engine servers.
#[derive(Debug, Default)]
pub struct SourceQueryClient {
    endpoint: Option<ServerEndpoint>,
    options: ClientOptions,
}

impl SourceQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClientOptions) -> Self {
        SourceQueryClient {
            endpoint: None,
            options,
        }
    }

    /// Sends a request and follows a challenge if the server insists on one.
    /// Returns the reply without its `FF FF FF FF` header.
    async fn request(
        &self,
        socket: &UdpSocket,
        header: u8,
        body: &[u8],
        mut challenge: [u8; 4],
    ) -> Result<Bytes> {
        // servers only ever challenge once
        for _ in 0..2 {
            let mut packet = BytesMut::with_capacity(9 + body.len());
            packet.put_i32_le(SINGLE_PACKET);
            packet.put_u8(header);
            packet.put_slice(body);
            if header != A2S_INFO || challenge != NO_CHALLENGE {
                packet.put_slice(&challenge);
            }

            transport::send(socket, &self.options, &packet).await?;
            let response = self.receive(socket).await?;

            if response.first() == Some(&S2C_CHALLENGE) && response.len() >= 5 {
                trace!("server challenged request 0x{:02x}", header);
                challenge.copy_from_slice(&response[1..5]);
                continue;
            }
            return Ok(response);
        }

        Err(Error::MalformedPacket(String::from(
            "server kept answering with challenges",
        )))
    }

    /// Reads one response, reassembling it if the server split it over
    /// several datagrams.
    async fn receive(&self, socket: &UdpSocket) -> Result<Bytes> {
        let mut fragments: Vec<Option<Bytes>> = Vec::new();
        let mut response_id = None;

        loop {
            let mut datagram = transport::recv(socket, &self.options).await?;
            ensure_remaining(&datagram, 4)?;

            match datagram.get_i32_le() {
                SINGLE_PACKET => return Ok(datagram),
                SPLIT_PACKET => {
                    ensure_remaining(&datagram, 8)?;
                    let id = datagram.get_i32_le();
                    let total = datagram.get_u8() as usize;
                    let number = datagram.get_u8() as usize;
                    let _max_size = datagram.get_u16_le();

                    if id as u32 & 0x8000_0000 != 0 {
                        return Err(Error::MalformedPacket(String::from(
                            "compressed split responses are not supported",
                        )));
                    }
                    if total == 0 || number >= total {
                        return Err(Error::MalformedPacket(format!(
                            "split packet {} of {}",
                            number, total
                        )));
                    }
                    if response_id.is_some_and(|current| current != id) {
                        trace!("dropping fragment of stale response {}", id);
                        continue;
                    }
                    response_id = Some(id);
                    fragments.resize(total, None);
                    fragments[number] = Some(datagram);

                    if fragments.iter().all(Option::is_some) {
                        let mut whole = BytesMut::new();
                        for fragment in fragments.into_iter().flatten() {
                            whole.extend_from_slice(&fragment);
                        }
                        let mut whole = whole.freeze();
                        ensure_remaining(&whole, 4)?;
                        whole.advance(4);
                        return Ok(whole);
                    }
                }
                other => {
                    return Err(Error::MalformedPacket(format!(
                        "unexpected packet header {}",
                        other
                    )))
                }
            }
        }
    }
}

impl QueryClient for SourceQueryClient {
    fn configure(&mut self, hostname: &str, port: u16) -> Result<()> {
        self.endpoint = Some(ServerEndpoint::new(hostname, port)?);
        Ok(())
    }

    async fn get_server_status(&self) -> Result<QueryResponse> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Configuration(String::from("query client is not configured")))?;

        info!("executing A2S queries against {}", endpoint.address());

        let socket = transport::connect_udp(endpoint).await?;
        let info = self.request(&socket, A2S_INFO, INFO_PAYLOAD, NO_CHALLENGE).await?;
        let server_params = parse_info(info)?;

        let players = self.request(&socket, A2S_PLAYER, &[], NO_CHALLENGE).await?;
        let players = parse_players(players)?;

        let response = QueryResponse::from_params(server_params, players, &INFO_KEYS);
        debug!(
            "{} reports map {} with {} player(s)",
            endpoint.address(),
            response.map,
            response.player_count()
        );
        Ok(response)
    }
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::MalformedPacket(format!(
            "needed {} more bytes, only {} left",
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn read_string(buf: &mut Bytes) -> Result<String> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::MalformedPacket(String::from("unterminated string")))?;
    let value = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.advance(end + 1);
    Ok(value)
}

/// Flattens an `S2A_INFO` reply into the same kind of parameter map a
/// Quake3 server reports.
pub fn parse_info(mut buf: Bytes) -> Result<HashMap<String, String>> {
    ensure_remaining(&buf, 2)?;
    let header = buf.get_u8();
    if header != S2A_INFO {
        return Err(Error::MalformedPacket(format!(
            "expected info reply, got 0x{:02x}",
            header
        )));
    }

    let mut params = HashMap::new();
    params.insert("protocol".to_string(), buf.get_u8().to_string());
    params.insert("hostname".to_string(), read_string(&mut buf)?);
    params.insert("mapname".to_string(), read_string(&mut buf)?);
    params.insert("modname".to_string(), read_string(&mut buf)?);
    params.insert("gamename".to_string(), read_string(&mut buf)?);

    ensure_remaining(&buf, 9)?;
    params.insert("appid".to_string(), buf.get_u16_le().to_string());
    params.insert("players".to_string(), buf.get_u8().to_string());
    params.insert("maxplayers".to_string(), buf.get_u8().to_string());
    params.insert("bots".to_string(), buf.get_u8().to_string());
    params.insert("servertype".to_string(), char::from(buf.get_u8()).to_string());
    params.insert("environment".to_string(), char::from(buf.get_u8()).to_string());
    params.insert("visibility".to_string(), buf.get_u8().to_string());
    params.insert("vac".to_string(), buf.get_u8().to_string());
    params.insert("version".to_string(), read_string(&mut buf)?);

    if !buf.has_remaining() {
        return Ok(params);
    }

    let edf = buf.get_u8();
    if edf & 0x80 != 0 {
        ensure_remaining(&buf, 2)?;
        params.insert("port".to_string(), buf.get_u16_le().to_string());
    }
    if edf & 0x10 != 0 {
        ensure_remaining(&buf, 8)?;
        params.insert("steamid".to_string(), buf.get_u64_le().to_string());
    }
    if edf & 0x40 != 0 {
        ensure_remaining(&buf, 2)?;
        params.insert("tvport".to_string(), buf.get_u16_le().to_string());
        params.insert("tvname".to_string(), read_string(&mut buf)?);
    }
    if edf & 0x20 != 0 {
        params.insert("keywords".to_string(), read_string(&mut buf)?);
    }
    if edf & 0x01 != 0 {
        ensure_remaining(&buf, 8)?;
        params.insert("gameid".to_string(), buf.get_u64_le().to_string());
    }

    Ok(params)
}

pub fn parse_players(mut buf: Bytes) -> Result<Vec<QueryPlayer>> {
    ensure_remaining(&buf, 2)?;
    let header = buf.get_u8();
    if header != S2A_PLAYER {
        return Err(Error::MalformedPacket(format!(
            "expected player reply, got 0x{:02x}",
            header
        )));
    }

    let count = buf.get_u8();
    let mut players = Vec::with_capacity(count as usize);
    for _ in 0..count {
        ensure_remaining(&buf, 1)?;
        let _index = buf.get_u8();
        let name = read_string(&mut buf)?;
        ensure_remaining(&buf, 8)?;
        let score = buf.get_i32_le();
        let duration = buf.get_f32_le();

        players.push(QueryPlayer {
            name,
            score,
            ping: 0,
            connected: Duration::try_from_secs_f32(duration).ok(),
        });
    }

    Ok(players)
}
