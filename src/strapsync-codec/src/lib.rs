#[macro_use]
extern crate serde;

mod packet;
pub use packet::{MAX_DATA_LEN, MIN_FRAME_LEN, Packet, SOF, crc8, crc32, decode, encode, frame_len};

mod error;
pub use error::StrapError;

pub mod constants;

mod helpers;

mod data;
pub use data::{PacketData, RealtimeSample, TransferSegment};

pub mod history;

mod commands;
