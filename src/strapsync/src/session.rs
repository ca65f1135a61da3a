use std::{
    future::Future,
    sync::atomic::{AtomicU8, Ordering},
};

use strapsync_codec::{
    Packet, PacketData, StrapError,
    constants::{Code, CommandNumber, PacketType},
};
use thiserror::Error;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
    },
    time::timeout,
};

use crate::SessionConfig;

/// Outbound half of a connection to the strap. Implementations write one
/// complete frame per call.
pub trait Transport: Send + Sync {
    fn write(&self, frame: Vec<u8>) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Hands frames to whatever task owns the physical link.
impl Transport for mpsc::Sender<Vec<u8>> {
    async fn write(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        self.send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("transport closed"))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no response to {0} before timeout")]
    Timeout(Code<CommandNumber>),
    #[error("response channel closed")]
    Closed,
    #[error("unexpected response to {command}: {data:?}")]
    UnexpectedResponse {
        command: CommandNumber,
        data: PacketData,
    },
    #[error(transparent)]
    Codec(#[from] StrapError),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Receiving ends of the per-kind channels fed by a [`Router`].
pub struct Channels {
    pub responses: mpsc::Receiver<Packet>,
    pub metadata: mpsc::Receiver<Packet>,
    /// Raw HISTORICAL_DATA frames, exactly as received.
    pub bulk: mpsc::Receiver<Vec<u8>>,
    pub events: mpsc::Receiver<Packet>,
}

/// Decodes inbound notifications and fans them out by packet kind.
#[derive(Clone)]
pub struct Router {
    responses: mpsc::Sender<Packet>,
    metadata: mpsc::Sender<Packet>,
    bulk: mpsc::Sender<Vec<u8>>,
    events: mpsc::Sender<Packet>,
}

impl Router {
    pub fn new(capacity: usize) -> (Self, Channels) {
        let capacity = capacity.max(1);
        let (responses_tx, responses) = mpsc::channel(capacity);
        let (metadata_tx, metadata) = mpsc::channel(capacity);
        let (bulk_tx, bulk) = mpsc::channel(capacity);
        let (events_tx, events) = mpsc::channel(capacity);

        let router = Self {
            responses: responses_tx,
            metadata: metadata_tx,
            bulk: bulk_tx,
            events: events_tx,
        };
        let channels = Channels {
            responses,
            metadata,
            bulk,
            events,
        };
        (router, channels)
    }

    /// Routes one notification. Undecodable frames are dropped, and so are
    /// events that arrive while the events channel is full.
    pub async fn route(&self, frame: Vec<u8>) {
        let packet = match Packet::decode(&frame) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("dropping frame ({} bytes): {}", frame.len(), error);
                return;
            }
        };

        trace!("routing {} seq={} code={}", packet.kind, packet.seq, packet.code);
        let kind = packet.kind;
        let delivered = match kind {
            PacketType::CommandResponse => self.responses.send(packet).await.is_ok(),
            PacketType::Metadata => self.metadata.send(packet).await.is_ok(),
            PacketType::HistoricalData => self.bulk.send(frame).await.is_ok(),
            PacketType::ConsoleLogs => {
                match PacketData::from_packet(&packet) {
                    Ok(PacketData::ConsoleLog { log, .. }) => trace!(target: "ConsoleLog", "{}", log),
                    Ok(_) => {}
                    Err(error) => debug!("unreadable console log: {}", error),
                }
                true
            }
            PacketType::Command
            | PacketType::Event
            | PacketType::RealtimeData
            | PacketType::RealtimeRawData
            | PacketType::RealtimeImuDataStream
            | PacketType::HistoricalImuDataStream => match self.events.try_send(packet) {
                Ok(()) => true,
                Err(TrySendError::Full(packet)) => {
                    warn!("events channel full, dropping {} code={}", packet.kind, packet.code);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        };

        if !delivered {
            debug!("no consumer for {} packets", kind);
        }
    }

    /// Routes notifications until the sender side closes.
    pub async fn run(self, mut notifications: mpsc::Receiver<Vec<u8>>) {
        while let Some(frame) = notifications.recv().await {
            self.route(frame).await;
        }
        debug!("notification stream closed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub harvard: String,
    pub boylston: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrapStatus {
    pub charging: bool,
    pub is_worn: bool,
}

/// Command side of a connection. One command is in flight at a time.
pub struct DeviceSession<T> {
    transport: T,
    responses: Mutex<mpsc::Receiver<Packet>>,
    seq: AtomicU8,
    config: SessionConfig,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, responses: mpsc::Receiver<Packet>, config: SessionConfig) -> Self {
        Self {
            transport,
            responses: Mutex::new(responses),
            seq: AtomicU8::new(0),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn write(&self, packet: Packet) -> Result<(), SessionError> {
        // fetch_add wraps on overflow
        let packet = packet.with_seq(self.seq.fetch_add(1, Ordering::Relaxed));
        debug!(
            "sending {} seq={}",
            Code::<CommandNumber>::from(packet.code),
            packet.seq
        );
        self.transport.write(packet.encode()?).await?;
        Ok(())
    }

    /// Writes a command that has no response.
    pub async fn send(&self, packet: Packet) -> Result<(), SessionError> {
        let _guard = self.responses.lock().await;
        self.write(packet).await
    }

    /// Writes a command and waits for the response carrying the same code.
    pub async fn request(&self, packet: Packet) -> Result<Packet, SessionError> {
        let mut responses = self.responses.lock().await;
        let code = packet.code;
        self.write(packet).await?;

        let wait_for_response = async {
            loop {
                let Some(response) = responses.recv().await else {
                    return Err(SessionError::Closed);
                };
                if response.code == code {
                    return Ok(response);
                }
                warn!(
                    "skipping response to {} while waiting for {}",
                    Code::<CommandNumber>::from(response.code),
                    Code::<CommandNumber>::from(code)
                );
            }
        };

        timeout(self.config.response_timeout(), wait_for_response)
            .await
            .map_err(|_| SessionError::Timeout(Code::from(code)))?
    }

    async fn request_data(&self, packet: Packet) -> Result<PacketData, SessionError> {
        let response = self.request(packet).await?;
        Ok(PacketData::from_packet(&response)?)
    }

    pub async fn get_clock(&self) -> Result<u32, SessionError> {
        match self.request_data(Packet::get_clock()).await? {
            PacketData::Clock { unix } => Ok(unix),
            data => Err(SessionError::UnexpectedResponse {
                command: CommandNumber::GetClock,
                data,
            }),
        }
    }

    pub async fn get_battery_level(&self) -> Result<f32, SessionError> {
        match self.request_data(Packet::get_battery_level()).await? {
            PacketData::BatteryLevel { percent } => Ok(percent),
            data => Err(SessionError::UnexpectedResponse {
                command: CommandNumber::GetBatteryLevel,
                data,
            }),
        }
    }

    pub async fn report_version_info(&self) -> Result<FirmwareVersion, SessionError> {
        match self.request_data(Packet::report_version_info()).await? {
            PacketData::VersionInfo { harvard, boylston } => {
                Ok(FirmwareVersion { harvard, boylston })
            }
            data => Err(SessionError::UnexpectedResponse {
                command: CommandNumber::ReportVersionInfo,
                data,
            }),
        }
    }

    pub async fn get_hello_harvard(&self) -> Result<StrapStatus, SessionError> {
        match self.request_data(Packet::get_hello_harvard()).await? {
            PacketData::HelloHarvard { charging, is_worn } => Ok(StrapStatus { charging, is_worn }),
            data => Err(SessionError::UnexpectedResponse {
                command: CommandNumber::GetHelloHarvard,
                data,
            }),
        }
    }

    pub async fn set_clock(&self, unix: u32) -> Result<(), SessionError> {
        self.send(Packet::set_clock(unix)).await
    }

    pub async fn toggle_realtime_hr(&self, enable: bool) -> Result<(), SessionError> {
        self.send(Packet::toggle_realtime_hr(enable)).await
    }

    pub async fn abort_historical_transmits(&self) -> Result<(), SessionError> {
        self.send(Packet::abort_historical_transmits()).await
    }
}
