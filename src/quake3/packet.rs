//! Out-of-band packets of the id Tech 3 network protocol.
//!
//! Control messages share the game port with in-game traffic and are told
//! apart by a sequence number of `-1`, i.e. four `0xFF` bytes, in front of
//! plain ASCII text.

use bytes::{BufMut, Bytes, BytesMut};

pub const OUT_OF_BAND_PREFIX: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

const PRINT_HEADER: &[u8] = b"print\n";

/// Frames `text` as an out-of-band packet.
pub fn out_of_band(text: &str) -> Bytes {
    let mut packet = BytesMut::with_capacity(OUT_OF_BAND_PREFIX.len() + text.len());
    packet.put_slice(&OUT_OF_BAND_PREFIX);
    packet.put_slice(text.as_bytes());
    packet.freeze()
}

/// `ÿÿÿÿgetstatus`
pub fn get_status() -> Bytes {
    out_of_band("getstatus")
}

/// `ÿÿÿÿrcon {password} {command}`
pub fn rcon(password: &str, command: &str) -> Bytes {
    out_of_band(&format!("rcon {password} {command}"))
}

/// Text carried by a single datagram, without the out-of-band marker and the
/// `print` echo servers put in front of console output.
pub fn datagram_text(datagram: &[u8]) -> String {
    let mut payload = datagram.strip_prefix(&OUT_OF_BAND_PREFIX[..]).unwrap_or(datagram);
    if let Some(printed) = payload.strip_prefix(PRINT_HEADER) {
        payload = printed;
    }
    String::from_utf8_lossy(payload).into_owned()
}

/// Joins the text of every datagram of a response, in arrival order.
pub fn response_text<T: AsRef<[u8]>>(datagrams: &[T]) -> String {
    datagrams
        .iter()
        .map(|datagram| datagram_text(datagram.as_ref()))
        .collect()
}
