use thiserror::Error;

use crate::constants::PacketType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrapError {
    #[error("PacketTooShort")]
    PacketTooShort,
    #[error("InvalidSof")]
    InvalidSof,
    #[error("InvalidHeaderCrc8")]
    InvalidHeaderCrc8,
    #[error("InvalidPacketLength")]
    InvalidPacketLength,
    #[error("frame needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("InvalidDataCrc32")]
    InvalidDataCrc32,
    #[error("InvalidPacketType({0})")]
    InvalidPacketType(u8),
    #[error("payload of {len} bytes does not fit in a frame")]
    PayloadTooLarge { len: usize },
    #[error("UnexpectedEnd")]
    UnexpectedEnd,
    #[error("rr interval count {0} outside 0..=4")]
    InvalidRrCount(u8),
    #[error("expected historical data frame, got {0}")]
    NotHistoricalData(PacketType),
}
