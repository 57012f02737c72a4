//! Short lived UDP sockets used by the query clients and Quake3 rcon.

use bytes::Bytes;
use log::{error, trace};
use tokio::{
    net::{lookup_host, UdpSocket},
    time::timeout,
};

use crate::{
    config::{ClientOptions, ServerEndpoint},
    error::{Error, Result},
};

/// Resolves the endpoint and returns a socket connected to it, so that only
/// datagrams from the server are delivered to us.
pub(crate) async fn connect_udp(endpoint: &ServerEndpoint) -> Result<UdpSocket> {
    let remote = lookup_host(endpoint.address())
        .await
        .map_err(Error::UnreachableHost)?
        .next()
        .ok_or_else(|| Error::Connection {
            host: endpoint.address(),
            reason: String::from("hostname did not resolve to any address"),
        })?;

    let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).await.map_err(Error::UnreachableHost)?;
    socket.connect(remote).await.map_err(Error::UnreachableHost)?;

    trace!("opened udp socket {:?} to {}", socket.local_addr().ok(), remote);
    Ok(socket)
}

pub(crate) async fn send(socket: &UdpSocket, options: &ClientOptions, payload: &[u8]) -> Result<()> {
    timeout(options.socket_timeout, socket.send(payload))
        .await?
        .map_err(Error::SendError)?;
    Ok(())
}

pub(crate) async fn recv(socket: &UdpSocket, options: &ClientOptions) -> Result<Bytes> {
    let mut buf = vec![0u8; options.read_buffer_size];
    let read = timeout(options.socket_timeout, socket.recv(&mut buf))
        .await?
        .map_err(Error::ReceiveError)?;
    buf.truncate(read);
    Ok(Bytes::from(buf))
}

/// Sends one datagram from a fresh socket and collects the reply.
///
/// The first datagram has the full socket timeout to arrive. After that we
/// keep reading for as long as more datagrams show up within the drain grace
/// period, since long responses are split over several datagrams with no
/// marker for the last one.
pub(crate) async fn exchange(
    endpoint: &ServerEndpoint,
    options: &ClientOptions,
    payload: &[u8],
    receive: bool,
) -> Result<Vec<Bytes>> {
    let result = exchange_inner(endpoint, options, payload, receive).await;
    if let Err(ref e) = result {
        error!("udp exchange with {} failed: {}", endpoint.address(), e);
    }
    result
}

async fn exchange_inner(
    endpoint: &ServerEndpoint,
    options: &ClientOptions,
    payload: &[u8],
    receive: bool,
) -> Result<Vec<Bytes>> {
    let socket = connect_udp(endpoint).await?;

    trace!("sending {} byte datagram to {}", payload.len(), endpoint.address());
    send(&socket, options, payload).await?;

    let mut datagrams = Vec::new();
    if !receive {
        return Ok(datagrams);
    }

    datagrams.push(recv(&socket, options).await?);

    let mut buf = vec![0u8; options.read_buffer_size];
    loop {
        match timeout(options.drain_grace, socket.recv(&mut buf)).await {
            Ok(Ok(read)) => datagrams.push(Bytes::copy_from_slice(&buf[..read])),
            Ok(Err(e)) => return Err(Error::ReceiveError(e)),
            // socket went quiet
            Err(_) => break,
        }
    }

    trace!(
        "received {} datagram(s) from {}",
        datagrams.len(),
        endpoint.address()
    );
    Ok(datagrams)
}
