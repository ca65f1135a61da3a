use crate::{
    Packet,
    constants::{CodeTable, CommandNumber, PacketType},
};

impl Packet {
    /// A command request with sequence 0; sessions restamp the sequence on send.
    pub fn command(command: CommandNumber, data: Vec<u8>) -> Packet {
        Packet::new(PacketType::Command, 0, command.as_u8(), data)
    }

    pub fn send_historical_data() -> Packet {
        Packet::command(CommandNumber::SendHistoricalData, vec![0x00])
    }

    /// Acknowledges a history segment, echoing the device's trim pointer verbatim.
    pub fn historical_data_result(trim: u32) -> Packet {
        let mut data = vec![0x01];
        data.extend_from_slice(&trim.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]); // padding
        Packet::command(CommandNumber::HistoricalDataResult, data)
    }

    pub fn abort_historical_transmits() -> Packet {
        Packet::command(CommandNumber::AbortHistoricalTransmits, vec![0x00])
    }

    pub fn get_clock() -> Packet {
        Packet::command(CommandNumber::GetClock, vec![0x00])
    }

    pub fn set_clock(unix: u32) -> Packet {
        let mut data = unix.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 0]); // padding
        Packet::command(CommandNumber::SetClock, data)
    }

    pub fn get_battery_level() -> Packet {
        Packet::command(CommandNumber::GetBatteryLevel, vec![0x00])
    }

    pub fn report_version_info() -> Packet {
        Packet::command(CommandNumber::ReportVersionInfo, vec![0x00])
    }

    pub fn get_hello_harvard() -> Packet {
        Packet::command(CommandNumber::GetHelloHarvard, vec![0x00])
    }

    pub fn toggle_realtime_hr(enable: bool) -> Packet {
        Packet::command(CommandNumber::ToggleRealtimeHr, vec![u8::from(enable)])
    }

    pub fn reboot_strap() -> Packet {
        Packet::command(CommandNumber::RebootStrap, vec![0x00])
    }

    pub fn enter_high_freq_sync() -> Packet {
        Packet::command(CommandNumber::EnterHighFreqSync, vec![])
    }

    pub fn exit_high_freq_sync() -> Packet {
        Packet::command(CommandNumber::ExitHighFreqSync, vec![])
    }
}
