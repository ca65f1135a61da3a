use bytes::{Buf, BytesMut};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    Packet, StrapError,
    constants::PacketType,
    helpers::{BufferReader, byte_at, u32_le_at},
    packet::{MIN_FRAME_LEN, frame_len},
};

const UNIX_OFFSET: usize = 4;
const HEART_RATE_OFFSET: usize = 14;
const RR_COUNT_OFFSET: usize = 15;
const RR_OFFSET: usize = 16;
const MAX_RR: u8 = 4;
/// Payload must reach the end of the four rr slots, used or not.
const MIN_PAYLOAD_LEN: usize = RR_OFFSET + 2 * MAX_RR as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoricalRecord {
    pub unix: u32,
    pub heart_rate: u8,
    pub rr: Vec<u16>,
}

impl HistoricalRecord {
    pub fn from_packet(packet: &Packet) -> Result<Self, StrapError> {
        if packet.kind != PacketType::HistoricalData {
            return Err(StrapError::NotHistoricalData(packet.kind));
        }

        let data = &packet.data;
        let unix = u32_le_at(data, UNIX_OFFSET)?;
        let heart_rate = byte_at(data, HEART_RATE_OFFSET)?;
        let rr_count = byte_at(data, RR_COUNT_OFFSET)?;
        if rr_count > MAX_RR {
            return Err(StrapError::InvalidRrCount(rr_count));
        }
        if data.len() < MIN_PAYLOAD_LEN {
            return Err(StrapError::UnexpectedEnd);
        }

        let mut rr_values = &data[RR_OFFSET..];
        let rr = (0..rr_count)
            .map(|_| rr_values.read_u16_le())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            unix,
            heart_rate,
            rr,
        })
    }

    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.unix), 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// A batch that stopped at a bad frame. `records` holds everything decoded
/// before `offset`.
#[derive(Debug, Error, PartialEq)]
#[error("history stream failed at byte {offset}: {source}")]
pub struct PartialHistory {
    pub records: Vec<HistoricalRecord>,
    pub offset: usize,
    #[source]
    pub source: StrapError,
}

fn truncated(rest: &[u8]) -> StrapError {
    StrapError::Truncated {
        needed: frame_len(rest).map_or(MIN_FRAME_LEN, |len| len.max(MIN_FRAME_LEN)),
        available: rest.len(),
    }
}

/// Decodes the frame at the start of `rest`, returning it with its size on the wire.
fn next_frame(rest: &[u8]) -> Result<(Packet, usize), StrapError> {
    let packet = Packet::decode(rest).map_err(|err| match err {
        StrapError::PacketTooShort => truncated(rest),
        other => other,
    })?;
    let len = frame_len(rest).ok_or(StrapError::UnexpectedEnd)?;
    Ok((packet, len))
}

/// Parses a buffer of back to back HISTORICAL_DATA frames. Any bad frame
/// ends the batch.
pub fn parse_history(bytes: &[u8]) -> Result<Vec<HistoricalRecord>, PartialHistory> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let record = next_frame(rest)
            .and_then(|(packet, len)| Ok((HistoricalRecord::from_packet(&packet)?, len)));

        match record {
            Ok((record, len)) => {
                records.push(record);
                offset += len;
            }
            Err(source) => {
                return Err(PartialHistory {
                    records,
                    offset,
                    source,
                });
            }
        }
    }

    Ok(records)
}

/// Incremental [`parse_history`] for frames that arrive in arbitrary chunks.
#[derive(Debug, Default)]
pub struct HistoryStreamParser {
    buffer: BytesMut,
    consumed: usize,
}

impl HistoryStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes consumed by complete frames so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Buffers `chunk` and returns every record it completed. A fatal frame
    /// discards whatever is still buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<HistoricalRecord>, PartialHistory> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while !self.buffer.is_empty() {
            let frame = match next_frame(&self.buffer) {
                Ok(frame) => frame,
                Err(StrapError::Truncated { .. }) => break,
                Err(source) => return Err(self.fail(records, source)),
            };

            let (packet, len) = frame;
            match HistoricalRecord::from_packet(&packet) {
                Ok(record) => records.push(record),
                Err(source) => return Err(self.fail(records, source)),
            }
            self.buffer.advance(len);
            self.consumed += len;
        }

        Ok(records)
    }

    fn fail(&mut self, records: Vec<HistoricalRecord>, source: StrapError) -> PartialHistory {
        let offset = self.consumed;
        self.consumed += self.buffer.len();
        self.buffer.clear();
        PartialHistory {
            records,
            offset,
            source,
        }
    }

    /// Ends the stream. Leftover bytes are a truncated trailing frame.
    pub fn finish(self) -> Result<(), StrapError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(truncated(&self.buffer))
        }
    }
}
