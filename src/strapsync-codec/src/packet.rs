use std::fmt;

use crate::{
    constants::{CodeTable, PacketType},
    error::StrapError,
    helpers::BufferReader,
};

/// Start of frame marker.
pub const SOF: u8 = 0xAA;

/// SOF, two length bytes and the header CRC8.
const HEADER_LEN: usize = 4;
const CRC32_LEN: usize = 4;
/// Kind, sequence and code.
const BODY_PREFIX_LEN: usize = 3;
const MIN_LENGTH_FIELD: usize = HEADER_LEN + BODY_PREFIX_LEN;
/// Smallest buffer `Packet::decode` will look at.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CRC32_LEN;
/// Largest payload whose frame length still fits the u16 length field.
pub const MAX_DATA_LEN: usize = u16::MAX as usize - CRC32_LEN - BODY_PREFIX_LEN;

#[rustfmt::skip]
const CRC8_TABLE: [u8; 256] = [
    0x00, 0x07, 0x0E, 0x09, 0x1C, 0x1B, 0x12, 0x15, 0x38, 0x3F, 0x36, 0x31, 0x24, 0x23, 0x2A, 0x2D,
    0x70, 0x77, 0x7E, 0x79, 0x6C, 0x6B, 0x62, 0x65, 0x48, 0x4F, 0x46, 0x41, 0x54, 0x53, 0x5A, 0x5D,
    0xE0, 0xE7, 0xEE, 0xE9, 0xFC, 0xFB, 0xF2, 0xF5, 0xD8, 0xDF, 0xD6, 0xD1, 0xC4, 0xC3, 0xCA, 0xCD,
    0x90, 0x97, 0x9E, 0x99, 0x8C, 0x8B, 0x82, 0x85, 0xA8, 0xAF, 0xA6, 0xA1, 0xB4, 0xB3, 0xBA, 0xBD,
    0xC7, 0xC0, 0xC9, 0xCE, 0xDB, 0xDC, 0xD5, 0xD2, 0xFF, 0xF8, 0xF1, 0xF6, 0xE3, 0xE4, 0xED, 0xEA,
    0xB7, 0xB0, 0xB9, 0xBE, 0xAB, 0xAC, 0xA5, 0xA2, 0x8F, 0x88, 0x81, 0x86, 0x93, 0x94, 0x9D, 0x9A,
    0x27, 0x20, 0x29, 0x2E, 0x3B, 0x3C, 0x35, 0x32, 0x1F, 0x18, 0x11, 0x16, 0x03, 0x04, 0x0D, 0x0A,
    0x57, 0x50, 0x59, 0x5E, 0x4B, 0x4C, 0x45, 0x42, 0x6F, 0x68, 0x61, 0x66, 0x73, 0x74, 0x7D, 0x7A,
    0x89, 0x8E, 0x87, 0x80, 0x95, 0x92, 0x9B, 0x9C, 0xB1, 0xB6, 0xBF, 0xB8, 0xAD, 0xAA, 0xA3, 0xA4,
    0xF9, 0xFE, 0xF7, 0xF0, 0xE5, 0xE2, 0xEB, 0xEC, 0xC1, 0xC6, 0xCF, 0xC8, 0xDD, 0xDA, 0xD3, 0xD4,
    0x69, 0x6E, 0x67, 0x60, 0x75, 0x72, 0x7B, 0x7C, 0x51, 0x56, 0x5F, 0x58, 0x4D, 0x4A, 0x43, 0x44,
    0x19, 0x1E, 0x17, 0x10, 0x05, 0x02, 0x0B, 0x0C, 0x21, 0x26, 0x2F, 0x28, 0x3D, 0x3A, 0x33, 0x34,
    0x4E, 0x49, 0x40, 0x47, 0x52, 0x55, 0x5C, 0x5B, 0x76, 0x71, 0x78, 0x7F, 0x6A, 0x6D, 0x64, 0x63,
    0x3E, 0x39, 0x30, 0x37, 0x22, 0x25, 0x2C, 0x2B, 0x06, 0x01, 0x08, 0x0F, 0x1A, 0x1D, 0x14, 0x13,
    0xAE, 0xA9, 0xA0, 0xA7, 0xB2, 0xB5, 0xBC, 0xBB, 0x96, 0x91, 0x98, 0x9F, 0x8A, 0x8D, 0x84, 0x83,
    0xDE, 0xD9, 0xD0, 0xD7, 0xC2, 0xC5, 0xCC, 0xCB, 0xE6, 0xE1, 0xE8, 0xEF, 0xFA, 0xFD, 0xF4, 0xF3,
];

pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0, |crc, &byte| CRC8_TABLE[usize::from(crc ^ byte)])
}

pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub seq: u8,
    pub code: u8,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketType, seq: u8, code: u8, data: Vec<u8>) -> Self {
        Self {
            kind,
            seq,
            code,
            data,
        }
    }

    pub fn with_seq(self, seq: u8) -> Packet {
        Packet { seq, ..self }
    }

    /// Decodes the frame at the start of `bytes`. Anything after the frame is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, StrapError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(StrapError::PacketTooShort);
        }

        let mut header = bytes;
        if header.pop_front()? != SOF {
            return Err(StrapError::InvalidSof);
        }

        let length_buffer: [u8; 2] = header.read()?;
        if crc8(&length_buffer) != header.pop_front()? {
            return Err(StrapError::InvalidHeaderCrc8);
        }

        let length = usize::from(u16::from_le_bytes(length_buffer));
        if length < MIN_LENGTH_FIELD {
            return Err(StrapError::InvalidPacketLength);
        }

        let needed = length + CRC32_LEN;
        if bytes.len() < needed {
            return Err(StrapError::Truncated {
                needed,
                available: bytes.len(),
            });
        }

        let body = &bytes[HEADER_LEN..length];
        let mut trailer = &bytes[length..needed];
        if crc32(body) != trailer.read_u32_le()? {
            return Err(StrapError::InvalidDataCrc32);
        }

        let mut body = body;
        let kind = body.pop_front()?;
        Ok(Self {
            kind: PacketType::from_u8(kind).ok_or(StrapError::InvalidPacketType(kind))?,
            seq: body.pop_front()?,
            code: body.pop_front()?,
            data: body.to_vec(),
        })
    }

    fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(BODY_PREFIX_LEN + self.data.len());
        body.push(self.kind.as_u8());
        body.push(self.seq);
        body.push(self.code);
        body.extend_from_slice(&self.data);
        body
    }

    /// Frames the packet as `SOF | length | crc8 | body | crc32`.
    pub fn encode(&self) -> Result<Vec<u8>, StrapError> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(StrapError::PayloadTooLarge {
                len: self.data.len(),
            });
        }
        let body = self.body();
        let length_buffer = ((body.len() + CRC32_LEN) as u16).to_le_bytes();

        let mut frame = Vec::with_capacity(HEADER_LEN + body.len() + CRC32_LEN);
        frame.push(SOF);
        frame.extend_from_slice(&length_buffer);
        frame.push(crc8(&length_buffer));
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&crc32(&body).to_le_bytes());
        Ok(frame)
    }
}

pub fn encode(
    kind: PacketType,
    seq: u8,
    code: u8,
    data: &[u8],
) -> Result<Vec<u8>, StrapError> {
    Packet::new(kind, seq, code, data.to_vec()).encode()
}

pub fn decode(bytes: &[u8]) -> Result<Packet, StrapError> {
    Packet::decode(bytes)
}

/// Total size of the frame starting at `bytes`, read from its length field.
/// Checksums are not verified.
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    let length = u16::from_le_bytes(bytes.get(1..3)?.try_into().ok()?);
    Some(usize::from(length) + CRC32_LEN)
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet {{\n\tKind: {},\n\tSeq: {},\n\tCode: {},\n\tPayload: {}\n}}",
            self.kind,
            self.seq,
            self.code,
            hex::encode(&self.data)
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn crc8_table_spot_checks() {
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x07);
        assert_eq!(crc8(&[0xFF]), 0xF3);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn crc8_matches_bitwise_definition() {
        fn bitwise(data: &[u8]) -> u8 {
            let mut crc: u8 = 0;
            for &byte in data {
                crc ^= byte;
                for _ in 0..8 {
                    crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
                }
            }
            crc
        }

        for a in 0..=u8::MAX {
            assert_eq!(crc8(&[a, 0x5A]), bitwise(&[a, 0x5A]));
        }
    }

    #[test]
    fn crc32_is_zlib_compatible() {
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn toggle_realtime_frame_matches_device_bytes() {
        let packet = Packet::new(PacketType::Command, 0x28, 3, vec![0x01]);
        let framed = packet.encode().unwrap();
        assert_eq!(&framed[..4], &[0xAA, 0x08, 0x00, crc8(&[0x08, 0x00])]);
        assert_eq!(&framed[4..8], &[0x23, 0x28, 0x03, 0x01]);
        assert_eq!(framed.len(), 12);
    }

    #[test]
    fn rejects_payload_longer_than_length_field() {
        let largest = Packet::new(PacketType::Command, 1, 2, vec![0x5A; MAX_DATA_LEN]);
        let framed = largest.encode().unwrap();
        assert_eq!(&framed[1..3], &[0xFF, 0xFF]);
        assert_eq!(Packet::decode(&framed).unwrap(), largest);

        let oversized = Packet::new(PacketType::Command, 1, 2, vec![0x5A; MAX_DATA_LEN + 1]);
        assert_eq!(
            oversized.encode(),
            Err(StrapError::PayloadTooLarge {
                len: MAX_DATA_LEN + 1
            })
        );
    }

    #[test]
    fn decodes_captured_metadata_frame() {
        let bytes = hex::decode("aa1c00ab31370268ae7667702d32000000c7b6000010000000000000e01eba47")
            .expect("invalid hex");
        let packet = Packet::decode(&bytes).expect("invalid packet");
        assert_eq!(packet.kind, PacketType::Metadata);
        assert_eq!(packet.seq, 0x37);
        assert_eq!(packet.code, 2);
        assert_eq!(packet.data.len(), 21);
    }

    #[test]
    fn roundtrip_every_packet_kind() {
        for kind in PacketType::iter() {
            let original = Packet::new(kind, 7, 3, vec![0x01, 0x02]);
            let parsed = Packet::decode(&original.encode().unwrap()).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn empty_payload_creates_valid_frame() {
        let packet = Packet::new(PacketType::Command, 0, 0, vec![]);
        let framed = packet.encode().unwrap();
        // SOF + 2 length + 1 CRC8 + 3 (kind/seq/code) + 4 CRC32 = 11 bytes
        assert_eq!(framed.len(), 11);
        assert_eq!(Packet::decode(&framed).unwrap(), packet);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let packet = Packet::new(PacketType::Event, 1, 9, vec![0x00, 0x01]);
        let mut framed = packet.encode().unwrap();
        let frame_size = framed.len();
        framed.extend_from_slice(&[0xAA, 0x00]);
        assert_eq!(frame_len(&framed), Some(frame_size));
        assert_eq!(Packet::decode(&framed).unwrap(), packet);
    }

    #[test]
    fn packet_too_short() {
        assert_eq!(
            Packet::decode(&[0xAA, 0x01]),
            Err(StrapError::PacketTooShort)
        );
    }

    #[test]
    fn invalid_sof() {
        assert_eq!(Packet::decode(&[0x00; 8]), Err(StrapError::InvalidSof));
    }

    #[test]
    fn invalid_header_crc8() {
        let mut data = vec![0xAA, 0x0B, 0x00, 0xFF];
        data.extend_from_slice(&[0; 20]);
        assert_eq!(Packet::decode(&data), Err(StrapError::InvalidHeaderCrc8));
    }

    #[test]
    fn length_too_small_for_body() {
        let length = 6u16.to_le_bytes();
        let mut data = vec![0xAA, length[0], length[1], crc8(&length)];
        data.extend_from_slice(&[0; 8]);
        assert_eq!(Packet::decode(&data), Err(StrapError::InvalidPacketLength));
    }

    #[test]
    fn truncated_frame() {
        let framed = Packet::new(PacketType::Command, 0, 1, vec![0; 10]).encode().unwrap();
        let cut = &framed[..framed.len() - 1];
        assert_eq!(
            Packet::decode(cut),
            Err(StrapError::Truncated {
                needed: framed.len(),
                available: framed.len() - 1
            })
        );
    }

    #[test]
    fn unknown_packet_kind_is_fatal() {
        let body = [0x29, 0x00, 0x00];
        let length = ((body.len() + 4) as u16).to_le_bytes();
        let mut frame = vec![0xAA, length[0], length[1], crc8(&length)];
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&crc32(&body).to_le_bytes());
        assert_eq!(
            Packet::decode(&frame),
            Err(StrapError::InvalidPacketType(0x29))
        );
    }

    #[test]
    fn any_payload_bit_flip_fails_crc32() {
        let framed = Packet::new(PacketType::HistoricalData, 4, 2, vec![0x10, 0x20, 0x30]).encode().unwrap();
        let crc_start = framed.len() - 4;
        for index in HEADER_LEN..crc_start {
            for bit in 0..8 {
                let mut corrupt = framed.clone();
                corrupt[index] ^= 1 << bit;
                assert_eq!(
                    Packet::decode(&corrupt),
                    Err(StrapError::InvalidDataCrc32),
                    "byte {index} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn any_length_bit_flip_fails_header_crc8() {
        let framed = Packet::new(PacketType::Command, 0, 11, vec![0x00]).encode().unwrap();
        for index in 1..3 {
            for bit in 0..8 {
                let mut corrupt = framed.clone();
                corrupt[index] ^= 1 << bit;
                assert_eq!(
                    Packet::decode(&corrupt),
                    Err(StrapError::InvalidHeaderCrc8),
                    "byte {index} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn with_seq_changes_seq() {
        let packet = Packet::new(PacketType::Command, 0, 1, vec![]).with_seq(42);
        assert_eq!(packet.seq, 42);
    }

    #[test]
    fn display_format() {
        let packet = Packet::new(PacketType::Command, 1, 5, vec![0xAB, 0xCD]);
        let display = format!("{}", packet);
        assert!(display.contains("COMMAND"));
        assert!(display.contains("abcd"));
    }
}
