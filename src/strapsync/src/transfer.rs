use std::future::Future;

use serde::Serialize;
use strapsync_codec::{
    Packet, PacketData, StrapError, TransferSegment,
    constants::{CodeTable, CommandNumber, PacketType},
    history::{HistoricalRecord, HistoryStreamParser, PartialHistory},
};
use thiserror::Error;
use tokio::{sync::mpsc, time::timeout};

use crate::{DeviceSession, SessionError, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    AwaitAck,
    AwaitMetadata,
    Complete,
    Error,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{event} is not valid while {state:?}")]
    InvalidEvent {
        state: TransferState,
        event: &'static str,
    },
    #[error("unexpected metadata code {0}")]
    UnexpectedMetadata(u8),
    #[error("timed out while {0:?}")]
    Timeout(TransferState),
    #[error("metadata channel closed")]
    ChannelClosed,
    #[error("transfer cancelled")]
    Cancelled,
    #[error(transparent)]
    Decode(#[from] StrapError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One HISTORY_START..HISTORY_END bracket. `start` is missing when the
/// device closes a segment it never opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start: Option<TransferSegment>,
    pub end: TransferSegment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub segments: Vec<Segment>,
    /// Trim pointers acknowledged, in order.
    pub acknowledged: Vec<u32>,
}

/// History download state machine. It performs no IO: callers write the
/// packets it returns and feed it what the device sends back.
#[derive(Debug)]
pub struct HistoryTransfer {
    state: TransferState,
    open_segment: Option<TransferSegment>,
    report: TransferReport,
}

impl Default for HistoryTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryTransfer {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            open_segment: None,
            report: TransferReport::default(),
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    pub fn into_report(self) -> TransferReport {
        self.report
    }

    fn fail(&mut self, error: TransferError) -> TransferError {
        self.state = TransferState::Error;
        error
    }

    /// Rejects an event the current state does not accept. `Complete` stays
    /// final; every other state moves to `Error`.
    fn invalid(&mut self, event: &'static str) -> TransferError {
        let state = self.state;
        let error = TransferError::InvalidEvent { state, event };
        if state == TransferState::Complete {
            return error;
        }
        self.fail(error)
    }

    /// Returns the SEND_HISTORICAL_DATA command to write.
    pub fn start(&mut self) -> Result<Packet, TransferError> {
        if self.state != TransferState::Idle {
            return Err(self.invalid("start"));
        }
        self.state = TransferState::AwaitAck;
        Ok(Packet::send_historical_data())
    }

    pub fn on_command_response(&mut self, packet: &Packet) -> Result<(), TransferError> {
        if self.state != TransferState::AwaitAck
            || packet.kind != PacketType::CommandResponse
            || packet.code != CommandNumber::SendHistoricalData.as_u8()
        {
            return Err(self.invalid("command response"));
        }
        self.state = TransferState::AwaitMetadata;
        Ok(())
    }

    /// Handles a METADATA packet. Returns the acknowledgement to write when
    /// a segment ends.
    pub fn on_metadata(&mut self, packet: &Packet) -> Result<Option<Packet>, TransferError> {
        if self.state != TransferState::AwaitMetadata || packet.kind != PacketType::Metadata {
            return Err(self.invalid("metadata"));
        }

        let data = match PacketData::from_packet(packet) {
            Ok(data) => data,
            Err(error) => return Err(self.fail(error.into())),
        };

        match data {
            PacketData::HistoryStart(segment) => {
                debug!(
                    "history segment started at {} (trim {})",
                    segment.unix, segment.trim_pointer
                );
                if let Some(previous) = self.open_segment.replace(segment) {
                    warn!("segment starting at {} was never closed", previous.unix);
                }
                Ok(None)
            }
            PacketData::HistoryEnd(segment) => {
                self.report.segments.push(Segment {
                    start: self.open_segment.take(),
                    end: segment,
                });
                self.report.acknowledged.push(segment.trim_pointer);
                info!("acknowledging history up to trim {}", segment.trim_pointer);
                Ok(Some(Packet::historical_data_result(segment.trim_pointer)))
            }
            PacketData::HistoryComplete => {
                self.state = TransferState::Complete;
                Ok(None)
            }
            PacketData::Metadata { code, .. } => {
                Err(self.fail(TransferError::UnexpectedMetadata(code)))
            }
            _ => Err(self.invalid("metadata")),
        }
    }

    /// Called when the device stops answering. Always ends in `Error`.
    pub fn on_timeout(&mut self) -> TransferError {
        let state = self.state;
        self.fail(TransferError::Timeout(state))
    }

    /// Returns to `Idle` and hands back the ABORT_HISTORICAL_TRANSMITS command
    /// that tells the device to stop streaming.
    pub fn abort(&mut self) -> Packet {
        self.state = TransferState::Idle;
        self.open_segment = None;
        Packet::abort_historical_transmits()
    }
}

async fn drive<T: Transport>(
    transfer: &mut HistoryTransfer,
    session: &DeviceSession<T>,
    metadata: &mut mpsc::Receiver<Packet>,
) -> Result<(), TransferError> {
    let start = transfer.start()?;
    let response = match session.request(start).await {
        Ok(response) => response,
        Err(SessionError::Timeout(_)) => return Err(transfer.on_timeout()),
        Err(error) => return Err(error.into()),
    };
    transfer.on_command_response(&response)?;
    info!("history transfer started");

    let metadata_timeout = session.config().metadata_timeout();
    while transfer.state() != TransferState::Complete {
        let packet = match timeout(metadata_timeout, metadata.recv()).await {
            Ok(Some(packet)) => packet,
            Ok(None) => return Err(TransferError::ChannelClosed),
            Err(_) => return Err(transfer.on_timeout()),
        };

        if let Some(ack) = transfer.on_metadata(&packet)? {
            session.send(ack).await?;
        }
    }

    Ok(())
}

/// Runs a full history download. Historical data frames are not touched
/// here; they arrive on the bulk channel for [`collect_history`].
///
/// If `shutdown` resolves first, or the transfer fails, the device is told to
/// abort before this returns.
pub async fn download_history<T: Transport>(
    session: &DeviceSession<T>,
    metadata: &mut mpsc::Receiver<Packet>,
    shutdown: impl Future<Output = ()>,
) -> Result<TransferReport, TransferError> {
    let mut transfer = HistoryTransfer::new();

    let result = tokio::select! {
        result = drive(&mut transfer, session, metadata) => result,
        _ = shutdown => Err(TransferError::Cancelled),
    };

    match result {
        Ok(()) => {
            let report = transfer.into_report();
            info!(
                "history transfer complete: {} segments",
                report.segments.len()
            );
            Ok(report)
        }
        Err(error) => {
            error!("history transfer failed: {}", error);
            if let Err(abort_error) = session.send(transfer.abort()).await {
                error!("failed to abort history transfer: {}", abort_error);
            }
            Err(error)
        }
    }
}

/// Parses forwarded HISTORICAL_DATA frames until the channel closes.
pub async fn collect_history(
    mut bulk: mpsc::Receiver<Vec<u8>>,
) -> Result<Vec<HistoricalRecord>, PartialHistory> {
    let mut parser = HistoryStreamParser::new();
    let mut records = Vec::new();

    while let Some(frame) = bulk.recv().await {
        match parser.push(&frame) {
            Ok(new_records) => records.extend(new_records),
            Err(mut partial) => {
                records.append(&mut partial.records);
                partial.records = records;
                return Err(partial);
            }
        }
    }

    let offset = parser.consumed();
    parser.finish().map_err(|source| PartialHistory {
        records: std::mem::take(&mut records),
        offset,
        source,
    })?;

    debug!("collected {} historical records", records.len());
    Ok(records)
}
