#[macro_use]
extern crate log;

mod config;
pub use config::SessionConfig;

mod session;
pub use session::{
    Channels, DeviceSession, FirmwareVersion, Router, SessionError, StrapStatus, Transport,
};

pub mod transfer;
pub use transfer::{HistoryTransfer, TransferError, TransferReport, TransferState};
