use crate::{
    Packet, StrapError,
    constants::{Code, CommandNumber, EventNumber, MetadataType, PacketType},
    helpers::{BufferReader, byte_at, u16_le_at, u32_le_at},
};

/// Byte sequence the firmware embeds in console log text.
const CONSOLE_MARKER: [u8; 3] = [0x34, 0x00, 0x01];
const CONSOLE_TEXT_OFFSET: usize = 7;
const REALTIME_MAX_RR: usize = 3;

/// Segment checkpoint carried by HISTORY_START and HISTORY_END metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferSegment {
    pub unix: u32,
    pub subseconds: u16,
    pub unknown: u32,
    pub trim_pointer: u32,
}

impl TransferSegment {
    pub fn decode(mut data: &[u8]) -> Result<Self, StrapError> {
        Ok(Self {
            unix: data.read_u32_le()?,
            subseconds: data.read_u16_le()?,
            unknown: data.read_u32_le()?,
            trim_pointer: data.read_u32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSample {
    pub unix: u32,
    pub subseconds: u16,
    pub heart_rate: u8,
    pub rr: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketData {
    Clock {
        unix: u32,
    },
    BatteryLevel {
        percent: f32,
    },
    VersionInfo {
        harvard: String,
        boylston: String,
    },
    HelloHarvard {
        charging: bool,
        is_worn: bool,
    },
    Command {
        kind: PacketType,
        command: Code<CommandNumber>,
        data: Vec<u8>,
    },
    Realtime(RealtimeSample),
    WristOn {
        unix: u32,
    },
    WristOff {
        unix: u32,
    },
    Event {
        event: Code<EventNumber>,
        data: Vec<u8>,
    },
    HistoricalData {
        unix: u32,
        subseconds: u16,
        data: Vec<u8>,
    },
    HistoryStart(TransferSegment),
    HistoryEnd(TransferSegment),
    HistoryComplete,
    Metadata {
        code: u8,
        data: Vec<u8>,
    },
    ConsoleLog {
        unix: u32,
        log: String,
    },
    Opaque {
        kind: PacketType,
        code: u8,
        data: Vec<u8>,
    },
}

impl PacketData {
    pub fn from_packet(packet: &Packet) -> Result<Self, StrapError> {
        match packet.kind {
            PacketType::Command | PacketType::CommandResponse => Self::parse_command(packet),
            PacketType::RealtimeData => Self::parse_realtime(packet.code, &packet.data),
            PacketType::Event => Self::parse_event(packet.code, &packet.data),
            PacketType::HistoricalData => Self::parse_historical(&packet.data),
            PacketType::Metadata => Self::parse_metadata(packet.code, &packet.data),
            PacketType::ConsoleLogs => Self::parse_console_log(&packet.data),
            PacketType::RealtimeRawData
            | PacketType::RealtimeImuDataStream
            | PacketType::HistoricalImuDataStream => Ok(Self::Opaque {
                kind: packet.kind,
                code: packet.code,
                data: packet.data.clone(),
            }),
        }
    }

    fn parse_command(packet: &Packet) -> Result<Self, StrapError> {
        let command = Code::<CommandNumber>::from(packet.code);
        let data = &packet.data;
        let parsed = match command {
            Code::Known(CommandNumber::GetClock) => Self::parse_clock(data),
            Code::Known(CommandNumber::GetBatteryLevel) => Self::parse_battery_level(data),
            Code::Known(CommandNumber::ReportVersionInfo) => Self::parse_version_info(data),
            Code::Known(CommandNumber::GetHelloHarvard) => Self::parse_hello_harvard(data),
            _ => return Ok(Self::opaque_command(packet, command)),
        };

        match parsed {
            // Outbound requests carry a one byte placeholder, not the response layout.
            Err(StrapError::UnexpectedEnd) if packet.kind == PacketType::Command => {
                Ok(Self::opaque_command(packet, command))
            }
            other => other,
        }
    }

    fn opaque_command(packet: &Packet, command: Code<CommandNumber>) -> Self {
        Self::Command {
            kind: packet.kind,
            command,
            data: packet.data.clone(),
        }
    }

    fn parse_clock(data: &[u8]) -> Result<Self, StrapError> {
        Ok(Self::Clock {
            unix: u32_le_at(data, 2)?,
        })
    }

    fn parse_battery_level(data: &[u8]) -> Result<Self, StrapError> {
        let raw = u16_le_at(data, 2)?;
        Ok(Self::BatteryLevel {
            percent: f32::from(raw) / 10.0,
        })
    }

    fn parse_version_info(mut data: &[u8]) -> Result<Self, StrapError> {
        data.skip(3)?;
        let mut fields = [0u32; 8];
        for field in fields.iter_mut() {
            *field = data.read_u32_le()?;
        }
        let [h_major, h_minor, h_patch, h_build, b_major, b_minor, b_patch, b_build] = fields;
        Ok(Self::VersionInfo {
            harvard: format!("{}.{}.{}.{}", h_major, h_minor, h_patch, h_build),
            boylston: format!("{}.{}.{}.{}", b_major, b_minor, b_patch, b_build),
        })
    }

    fn parse_hello_harvard(data: &[u8]) -> Result<Self, StrapError> {
        Ok(Self::HelloHarvard {
            charging: byte_at(data, 7)? != 0,
            is_worn: byte_at(data, 116)? != 0,
        })
    }

    /// The realtime header is rebuilt from the code byte followed by the
    /// first seven payload bytes: `unix | subseconds | heart_rate | rr_count`.
    fn parse_realtime(code: u8, data: &[u8]) -> Result<Self, StrapError> {
        let mut header = [0u8; 8];
        header[0] = code;
        header[1..].copy_from_slice(data.get(..7).ok_or(StrapError::UnexpectedEnd)?);

        let mut header = &header[..];
        let unix = header.read_u32_le()?;
        let subseconds = header.read_u16_le()?;
        let heart_rate = header.pop_front()?;
        let rr_count = usize::from(header.pop_front()?);

        let mut rr_values = &data[7..];
        let mut rr = Vec::new();
        for _ in 0..rr_count.min(REALTIME_MAX_RR) {
            rr.push(rr_values.read_u16_le()?);
        }

        Ok(Self::Realtime(RealtimeSample {
            unix,
            subseconds,
            heart_rate,
            rr,
        }))
    }

    fn parse_event(code: u8, data: &[u8]) -> Result<Self, StrapError> {
        let event = Code::<EventNumber>::from(code);
        match event {
            Code::Known(EventNumber::WristOn) => Ok(Self::WristOn {
                unix: u32_le_at(data, 1)?,
            }),
            Code::Known(EventNumber::WristOff) => Ok(Self::WristOff {
                unix: u32_le_at(data, 1)?,
            }),
            _ => Ok(Self::Event {
                event,
                data: data.to_vec(),
            }),
        }
    }

    fn parse_historical(data: &[u8]) -> Result<Self, StrapError> {
        Ok(Self::HistoricalData {
            unix: u32_le_at(data, 4)?,
            subseconds: u16_le_at(data, 8)?,
            data: data.to_vec(),
        })
    }

    fn parse_metadata(code: u8, data: &[u8]) -> Result<Self, StrapError> {
        match Code::<MetadataType>::from(code) {
            Code::Known(MetadataType::HistoryStart) => {
                Ok(Self::HistoryStart(TransferSegment::decode(data)?))
            }
            Code::Known(MetadataType::HistoryEnd) => {
                Ok(Self::HistoryEnd(TransferSegment::decode(data)?))
            }
            Code::Known(MetadataType::HistoryComplete) => Ok(Self::HistoryComplete),
            Code::Unknown(code) => Ok(Self::Metadata {
                code,
                data: data.to_vec(),
            }),
        }
    }

    fn parse_console_log(data: &[u8]) -> Result<Self, StrapError> {
        let unix = u32_le_at(data, 1)?;
        let text = data
            .get(CONSOLE_TEXT_OFFSET..data.len().saturating_sub(1))
            .ok_or(StrapError::UnexpectedEnd)?;

        let mut cleaned = Vec::with_capacity(text.len());
        let mut rest = text;
        while let Some((&byte, tail)) = rest.split_first() {
            match rest.strip_prefix(&CONSOLE_MARKER[..]) {
                Some(after_marker) => rest = after_marker,
                None => {
                    cleaned.push(byte);
                    rest = tail;
                }
            }
        }

        // some logs arrive partially corrupted, the readable part is still useful
        let log = String::from_utf8_lossy(&cleaned).into_owned();
        Ok(Self::ConsoleLog { unix, log })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(kind: PacketType, code: u8, data: &str) -> Packet {
        Packet::new(kind, 0, code, hex::decode(data).expect("Invalid hex data"))
    }

    #[test]
    fn parse_metadata() {
        let bytes = hex::decode("aa1c00ab311002a9fc8367205337000000257e00000a0000000000007ac020f8")
            .expect("invalid bytes");
        let packet = Packet::decode(&bytes).expect("Invalid packet");
        let data = PacketData::from_packet(&packet).expect("invalid packet");
        assert_eq!(
            data,
            PacketData::HistoryEnd(TransferSegment {
                unix: 1736703145,
                subseconds: 0x5320,
                unknown: 55,
                trim_pointer: 32293,
            })
        );

        let bytes = hex::decode("aa2c005231010146fb8367404c0600000010000000020000002900000010000000030000000000000008020055fd251d").expect("invalid bytes");
        let packet = Packet::decode(&bytes).expect("Invalid packet");
        let data = PacketData::from_packet(&packet).expect("invalid packet");
        assert_eq!(
            data,
            PacketData::HistoryStart(TransferSegment {
                unix: 1736702790,
                subseconds: 0x4c40,
                unknown: 6,
                trim_pointer: 16,
            })
        );
    }

    #[test]
    fn history_complete_and_unknown_metadata() {
        let complete = packet(PacketType::Metadata, 3, "b2c57a677033000000");
        assert_eq!(
            PacketData::from_packet(&complete).unwrap(),
            PacketData::HistoryComplete
        );

        let unknown = packet(PacketType::Metadata, 9, "0102");
        assert_eq!(
            PacketData::from_packet(&unknown).unwrap(),
            PacketData::Metadata {
                code: 9,
                data: vec![1, 2]
            }
        );
    }

    #[test]
    fn short_history_end_is_an_error() {
        let short = packet(PacketType::Metadata, 2, "b2c57a677033");
        assert_eq!(
            PacketData::from_packet(&short),
            Err(StrapError::UnexpectedEnd)
        );
    }

    #[test]
    fn parse_version_response() {
        let response = hex::decode("aa50000c2477070a01012900000011000000020000000000000011000000020000000200000000000000030000000400000000000000000000000300000006000000000000000000000008050100000074b95569").expect("invalid data");
        let packet = Packet::decode(&response).expect("invalid packet");
        let data = PacketData::from_packet(&packet).expect("invalid packet");
        assert_eq!(
            data,
            PacketData::VersionInfo {
                harvard: String::from("41.17.2.0"),
                boylston: String::from("17.2.2.0")
            }
        )
    }

    #[test]
    fn parse_battery_level() {
        let response = packet(PacketType::CommandResponse, 26, "0000c800");
        assert_eq!(
            PacketData::from_packet(&response).unwrap(),
            PacketData::BatteryLevel { percent: 20.0 }
        );
    }

    #[test]
    fn parse_clock() {
        let response = packet(PacketType::CommandResponse, 11, "0a01c2e96e67");
        assert_eq!(
            PacketData::from_packet(&response).unwrap(),
            PacketData::Clock { unix: 0x676ee9c2 }
        );
    }

    #[test]
    fn parse_hello_harvard() {
        let mut data = vec![0u8; 120];
        data[116] = 1;
        let response = Packet::new(PacketType::CommandResponse, 0, 35, data);
        assert_eq!(
            PacketData::from_packet(&response).unwrap(),
            PacketData::HelloHarvard {
                charging: false,
                is_worn: true
            }
        );

        let response = Packet::new(PacketType::CommandResponse, 0, 35, vec![0u8; 100]);
        assert_eq!(
            PacketData::from_packet(&response),
            Err(StrapError::UnexpectedEnd)
        );
    }

    #[test]
    fn outbound_request_stays_opaque() {
        let request = Packet::get_clock();
        assert_eq!(
            PacketData::from_packet(&request).unwrap(),
            PacketData::Command {
                kind: PacketType::Command,
                command: Code::Known(CommandNumber::GetClock),
                data: vec![0x00]
            }
        );
    }

    #[test]
    fn short_response_is_an_error() {
        let response = packet(PacketType::CommandResponse, 26, "00");
        assert_eq!(
            PacketData::from_packet(&response),
            Err(StrapError::UnexpectedEnd)
        );
    }

    #[test]
    fn unknown_command_is_opaque() {
        let response = packet(PacketType::CommandResponse, 250, "beef");
        assert_eq!(
            PacketData::from_packet(&response).unwrap(),
            PacketData::Command {
                kind: PacketType::CommandResponse,
                command: Code::Unknown(250),
                data: vec![0xbe, 0xef]
            }
        );
    }

    #[test]
    fn parse_realtime_reuses_code_byte() {
        // code 0x78 is the low byte of the timestamp
        let realtime = packet(PacketType::RealtimeData, 0x78, "56341210274802200321031003");
        assert_eq!(
            PacketData::from_packet(&realtime).unwrap(),
            PacketData::Realtime(RealtimeSample {
                unix: 0x12345678,
                subseconds: 0x2710,
                heart_rate: 0x48,
                rr: vec![0x0320, 0x0321],
            })
        );
    }

    #[test]
    fn parse_realtime_caps_rr_at_three() {
        let realtime = packet(PacketType::RealtimeData, 0x00, "00000000003c04e803e903ea03");
        let Ok(PacketData::Realtime(sample)) = PacketData::from_packet(&realtime) else {
            panic!("expected realtime sample");
        };
        assert_eq!(sample.rr, vec![1000, 1001, 1002]);
    }

    #[test]
    fn parse_realtime_without_rr() {
        let realtime = packet(PacketType::RealtimeData, 0x00, "00000000003c00");
        let Ok(PacketData::Realtime(sample)) = PacketData::from_packet(&realtime) else {
            panic!("expected realtime sample");
        };
        assert_eq!(sample.heart_rate, 60);
        assert!(sample.rr.is_empty());
    }

    #[test]
    fn parse_wrist_events() {
        let on = packet(PacketType::Event, 9, "00c2e96e67685d0000");
        assert_eq!(
            PacketData::from_packet(&on).unwrap(),
            PacketData::WristOn { unix: 0x676ee9c2 }
        );

        let off = packet(PacketType::Event, 10, "003bea6e6758690000");
        assert_eq!(
            PacketData::from_packet(&off).unwrap(),
            PacketData::WristOff { unix: 0x676eea3b }
        );
    }

    #[test]
    fn other_events_keep_payload() {
        let alarm = packet(PacketType::Event, 57, "00b70c5467");
        assert_eq!(
            PacketData::from_packet(&alarm).unwrap(),
            PacketData::Event {
                event: Code::Known(EventNumber::StrapDrivenAlarmExecuted),
                data: hex::decode("00b70c5467").unwrap()
            }
        );

        let unknown = packet(PacketType::Event, 77, "");
        assert_eq!(
            PacketData::from_packet(&unknown).unwrap(),
            PacketData::Event {
                event: Code::Unknown(77),
                data: vec![]
            }
        );
    }

    #[test]
    fn parse_console_logs() {
        let logs = packet(
            PacketType::ConsoleLogs,
            2,
            "007e0b6d67907b340001205472696d3a20307830303030303030303a30303031623665662028303a313132333637290a3231312c203131323633313400",
        );
        assert_eq!(
            PacketData::from_packet(&logs).unwrap(),
            PacketData::ConsoleLog {
                unix: 1735199614,
                log: " Trim: 0x00000000:0001b6ef (0:112367)\n211, 1126314".to_owned()
            }
        );
    }

    #[test]
    fn console_marker_removed_mid_text() {
        let logs = packet(PacketType::ConsoleLogs, 2, "0001000000000061340001620000");
        let Ok(PacketData::ConsoleLog { log, .. }) = PacketData::from_packet(&logs) else {
            panic!("expected console log");
        };
        assert_eq!(log, "ab\0");
    }

    #[test]
    fn historical_data_summary() {
        let historical = packet(
            PacketType::HistoricalData,
            0,
            "0100000068ae7667702d",
        );
        assert_eq!(
            PacketData::from_packet(&historical).unwrap(),
            PacketData::HistoricalData {
                unix: 1735831144,
                subseconds: 0x2d70,
                data: hex::decode("0100000068ae7667702d").unwrap()
            }
        );
    }

    #[test]
    fn imu_streams_are_opaque() {
        let imu = packet(PacketType::RealtimeImuDataStream, 4, "0102");
        assert!(matches!(
            PacketData::from_packet(&imu).unwrap(),
            PacketData::Opaque {
                kind: PacketType::RealtimeImuDataStream,
                code: 4,
                ..
            }
        ));
    }
}
