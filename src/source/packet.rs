use std::borrow::Cow;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    // SERVERDATA_AUTH
    Auth,
    // SERVERDATA_EXECCOMMAND
    Exec,
    // SERVERDATA_AUTH_RESPONSE
    AuthResponse,
    // SERVERDATA_RESPONSE_VALUE
    Response,
}

impl PacketType {
    pub fn value(&self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::Exec => 2,
            PacketType::AuthResponse => 2,
            PacketType::Response => 0,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.value().to_le_bytes()
    }
}

/// Decodes a type as seen by a client. `2` is shared between exec and auth
/// response, and only the server ever receives the former.
impl TryFrom<i32> for PacketType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            3 => Ok(PacketType::Auth),
            2 => Ok(PacketType::AuthResponse),
            0 => Ok(PacketType::Response),
            other => Err(Error::UnknownPacketType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: PacketType,
    body: Vec<u8>,
}

impl Packet {
    /// ID, type and the two null terminators.
    pub const BASE_PACKET_SIZE: i32 = 10;

    /// Largest size field accepted from the wire: a 4096 byte body plus the
    /// fixed fields.
    pub const MAX_PACKET_SIZE: i32 = 4096 + Self::BASE_PACKET_SIZE;

    pub fn new(id: i32, packet_type: PacketType, body: impl AsRef<[u8]>) -> Self {
        Packet {
            id,
            packet_type,
            body: body.as_ref().to_vec(),
        }
    }

    /// Decodes one complete packet, size field included.
    pub fn unpack(mut frame: &[u8]) -> Result<Self> {
        if frame.len() < 4 + Self::BASE_PACKET_SIZE as usize {
            return Err(Error::MalformedPacket(format!(
                "{} bytes is too short for a packet",
                frame.len()
            )));
        }

        let size = frame.get_i32_le();
        if size < Self::BASE_PACKET_SIZE || size as usize != frame.len() {
            return Err(Error::MalformedPacket(format!(
                "declared size {} does not match {} byte payload",
                size,
                frame.len()
            )));
        }

        let id = frame.get_i32_le();
        let packet_type = PacketType::try_from(frame.get_i32_le())?;

        // body is null terminated, and so is the packet. Bodies stay raw:
        // srcds splits long responses without regard for UTF-8 boundaries.
        let mut body = frame[..frame.len() - 2].to_vec();
        while body.last() == Some(&0) {
            body.pop();
        }

        Ok(Packet {
            id,
            packet_type,
            body,
        })
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.len() as i32 + Self::BASE_PACKET_SIZE
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The body as text. Only decode a whole response, never a fragment of
    /// one; join fragments with [Packet::raw_body] first.
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    pub fn pack(&self) -> Vec<u8> {
        // Size, ID, Type, Body, Terminator
        let mut payload = Vec::<u8>::with_capacity(4 + self.size() as usize);
        payload.put_i32_le(self.size());
        payload.put_i32_le(self.id());
        payload.put_slice(&self.packet_type().to_le_bytes());
        payload.put_slice(&self.body);
        // null terminate the body, then null terminate the entire package
        payload.put_slice(&[0u8, 0u8]);
        payload
    }
}

/// Slices a TCP byte stream into packets.
///
/// A single read can end in the middle of a packet or even of its size
/// field. Whatever is left over after the last complete packet is kept and
/// prepended to the next read.
#[derive(Debug, Default)]
pub struct PacketReader {
    leftover: BytesMut,
}

impl PacketReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds freshly read bytes and returns every packet they complete.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Packet>> {
        self.leftover.extend_from_slice(data);

        let mut packets = Vec::new();
        while self.leftover.len() >= 4 {
            let size = (&self.leftover[..4]).get_i32_le();
            if !(Packet::BASE_PACKET_SIZE..=Packet::MAX_PACKET_SIZE).contains(&size) {
                let err = Error::MalformedPacket(format!("invalid packet size {}", size));
                self.leftover.clear();
                return Err(err);
            }

            let frame_len = 4 + size as usize;
            if self.leftover.len() < frame_len {
                break;
            }

            let frame = self.leftover.split_to(frame_len);
            packets.push(Packet::unpack(&frame)?);
        }

        Ok(packets)
    }

    /// Bytes of a packet that has not been completely received yet.
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    pub fn clear(&mut self) {
        self.leftover.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(id: i32, body: &str) -> Packet {
        Packet::new(id, PacketType::Response, body)
    }

    #[test]
    fn packs_auth_packet() {
        let packet = Packet::new(1, PacketType::Auth, "hunter2");
        let bytes = packet.pack();

        assert_eq!(&bytes[..4], &17i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_le_bytes());
        assert_eq!(&bytes[12..19], b"hunter2");
        assert_eq!(&bytes[19..], &[0, 0]);
        assert_eq!(bytes.len() as i32, 4 + packet.size());
    }

    #[test]
    fn empty_packet_is_ten_bytes() {
        let packet = Packet::new(7, PacketType::Response, "");
        assert_eq!(packet.size(), 10);
        assert_eq!(packet.pack().len(), 14);
    }

    #[test]
    fn unpacks_what_it_packs() {
        let packet = Packet::new(42, PacketType::AuthResponse, "");
        assert_eq!(Packet::unpack(&packet.pack()).unwrap(), packet);

        let packet = response(43, "hostname: test");
        assert_eq!(Packet::unpack(&packet.pack()).unwrap(), packet);
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut bytes = response(1, "abc").pack();
        bytes.push(0);
        assert!(matches!(
            Packet::unpack(&bytes),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn rejects_unknown_types() {
        let mut bytes = response(1, "abc").pack();
        bytes[8..12].copy_from_slice(&9i32.to_le_bytes());
        assert!(matches!(
            Packet::unpack(&bytes),
            Err(Error::UnknownPacketType(9))
        ));
    }

    #[test]
    fn reader_keeps_partial_packets() {
        let first = response(5, "first").pack();
        let second = response(6, "second").pack();
        let mut stream = first.clone();
        stream.extend_from_slice(&second[..3]);

        let mut reader = PacketReader::new();
        let packets = reader.push(&stream).unwrap();
        assert_eq!(packets, vec![response(5, "first")]);
        assert_eq!(reader.leftover(), &second[..3]);

        let packets = reader.push(&second[3..]).unwrap();
        assert_eq!(packets, vec![response(6, "second")]);
        assert!(reader.leftover().is_empty());
    }

    #[test]
    fn reassembly_does_not_depend_on_read_boundaries() {
        let expected = vec![
            response(10, "# userid name uniqueid"),
            response(10, "# 2 \"Player\" STEAM_1:0:1"),
            response(11, ""),
            Packet::new(11, PacketType::Response, "\u{1}"),
        ];
        let stream: Vec<u8> = expected.iter().flat_map(|p| p.pack()).collect();

        let whole = PacketReader::new().push(&stream).unwrap();
        assert_eq!(whole, expected);

        for chunk_size in [1, 2, 3, 5, 7, 13, 64] {
            let mut reader = PacketReader::new();
            let mut packets = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                packets.extend(reader.push(chunk).unwrap());
            }
            assert_eq!(packets, whole, "chunk size {}", chunk_size);
            assert!(reader.leftover().is_empty());
        }
    }

    #[test]
    fn reader_rejects_undersized_packets() {
        let mut reader = PacketReader::new();
        assert!(reader.push(&[4, 0, 0, 0, 1, 0, 0, 0]).is_err());
        assert!(reader.leftover().is_empty());
    }

    #[test]
    fn reader_rejects_oversized_packets_without_waiting_for_them() {
        let mut reader = PacketReader::new();
        let err = reader.push(&[0xFF, 0xFF, 0xFF, 0x7F, 1, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
        assert!(reader.leftover().is_empty());

        let largest = response(1, &"x".repeat(4096)).pack();
        assert_eq!(reader.push(&largest).unwrap().len(), 1);
    }

    #[test]
    fn bodies_split_inside_a_character_join_intact() {
        let name = "Zoë Łukasz".as_bytes();
        // 'ë' is two bytes, cut between them
        let (head, tail) = name.split_at(3);
        let first = Packet::unpack(&Packet::new(4, PacketType::Response, head).pack()).unwrap();
        let second = Packet::unpack(&Packet::new(4, PacketType::Response, tail).pack()).unwrap();

        assert_eq!(first.raw_body(), head);
        let joined: Vec<u8> = [first.raw_body(), second.raw_body()].concat();
        assert_eq!(String::from_utf8_lossy(&joined), "Zoë Łukasz");
    }
}
