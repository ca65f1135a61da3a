use std::fmt;

use strum::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};
use uuid::{Uuid, uuid};

pub const STRAP_SERVICE: Uuid = uuid!("61080001-8d6d-82b8-614a-1c8cb0f8dcc6");
pub const CMD_TO_STRAP: Uuid = uuid!("61080002-8d6d-82b8-614a-1c8cb0f8dcc6");
pub const CMD_FROM_STRAP: Uuid = uuid!("61080003-8d6d-82b8-614a-1c8cb0f8dcc6");
pub const EVENTS_FROM_STRAP: Uuid = uuid!("61080004-8d6d-82b8-614a-1c8cb0f8dcc6");
pub const DATA_FROM_STRAP: Uuid = uuid!("61080005-8d6d-82b8-614a-1c8cb0f8dcc6");
pub const MEMFAULT: Uuid = uuid!("61080007-8d6d-82b8-614a-1c8cb0f8dcc6");

/// Numeric code table whose every code maps to exactly one variant.
pub trait CodeTable: Copy + Into<&'static str> {
    fn from_u8(value: u8) -> Option<Self>;
    fn as_u8(self) -> u8;
}

macro_rules! code_table {
    ($($table:ty),* $(,)?) => {
        $(
            impl CodeTable for $table {
                fn from_u8(value: u8) -> Option<Self> {
                    Self::from_repr(value)
                }

                fn as_u8(self) -> u8 {
                    self as u8
                }
            }
        )*
    };
}

code_table!(PacketType, MetadataType, EventNumber, CommandNumber);

/// A code from an open-ended table. Unrecognised values are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code<T> {
    Known(T),
    Unknown(u8),
}

impl<T: CodeTable> Code<T> {
    pub fn as_u8(self) -> u8 {
        match self {
            Code::Known(value) => value.as_u8(),
            Code::Unknown(value) => value,
        }
    }

    pub fn known(self) -> Option<T> {
        match self {
            Code::Known(value) => Some(value),
            Code::Unknown(_) => None,
        }
    }
}

impl<T: CodeTable> From<u8> for Code<T> {
    fn from(value: u8) -> Self {
        T::from_u8(value).map_or(Code::Unknown(value), Code::Known)
    }
}

impl<T: CodeTable> fmt::Display for Code<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Code::Known(value) => {
                let name: &'static str = value.into();
                f.write_str(name)
            }
            Code::Unknown(value) => write!(f, "UNKNOWN({value})"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromRepr,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum PacketType {
    Command = 35,
    CommandResponse = 36,
    RealtimeData = 40,
    RealtimeRawData = 43,
    HistoricalData = 47,
    Event = 48,
    Metadata = 49,
    ConsoleLogs = 50,
    RealtimeImuDataStream = 51,
    HistoricalImuDataStream = 52,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, IntoStaticStr, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MetadataType {
    HistoryStart = 1,
    HistoryEnd = 2,
    HistoryComplete = 3,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, IntoStaticStr, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EventNumber {
    Undefined = 0,
    Error = 1,
    ConsoleOutput = 2,
    BatteryLevel = 3,
    SystemControl = 4,
    #[strum(to_string = "EXTERNAL_5V_ON")]
    External5vOn = 5,
    #[strum(to_string = "EXTERNAL_5V_OFF")]
    External5vOff = 6,
    ChargingOn = 7,
    ChargingOff = 8,
    WristOn = 9,
    WristOff = 10,
    BleConnectionUp = 11,
    BleConnectionDown = 12,
    RtcLost = 13,
    DoubleTap = 14,
    Boot = 15,
    SetRtc = 16,
    TemperatureLevel = 17,
    PairingMode = 18,
    SerialHeadConnected = 19,
    SerialHeadRemoved = 20,
    BatteryPackConnected = 21,
    BatteryPackRemoved = 22,
    BleBonded = 23,
    BleHrProfileEnabled = 24,
    BleHrProfileDisabled = 25,
    TrimAllData = 26,
    TrimAllDataEnded = 27,
    FlashInitComplete = 28,
    StrapConditionReport = 29,
    BootReport = 30,
    ExitVirginMode = 31,
    CaptouchAutothresholdAction = 32,
    BleRealtimeHrOn = 33,
    BleRealtimeHrOff = 34,
    AccelerometerReset = 35,
    AfeReset = 36,
    ShipModeEnabled = 37,
    ShipModeDisabled = 38,
    ShipModeBoot = 39,
    Ch1SaturationDetected = 40,
    Ch2SaturationDetected = 41,
    AccelerometerSaturationDetected = 42,
    BleSystemReset = 43,
    BleSystemOn = 44,
    BleSystemInitialized = 45,
    RawDataCollectionOn = 46,
    RawDataCollectionOff = 47,
    StrapDrivenAlarmSet = 56,
    StrapDrivenAlarmExecuted = 57,
    AppDrivenAlarmExecuted = 58,
    StrapDrivenAlarmDisabled = 59,
    HapticsFired = 60,
    ExtendedBatteryInformation = 63,
    HighFreqSyncPrompt = 96,
    HighFreqSyncEnabled = 97,
    HighFreqSyncDisabled = 98,
    HapticsTerminated = 100,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, IntoStaticStr, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CommandNumber {
    LinkValid = 1,
    GetMaxProtocolVersion = 2,
    ToggleRealtimeHr = 3,
    ReportVersionInfo = 7,
    SetClock = 10,
    GetClock = 11,
    ToggleGenericHrProfile = 14,
    #[strum(to_string = "TOGGLE_R7_DATA_COLLECTION")]
    ToggleR7DataCollection = 16,
    RunHapticPatternMaverick = 19,
    AbortHistoricalTransmits = 20,
    SendHistoricalData = 22,
    HistoricalDataResult = 23,
    ForceTrim = 25,
    GetBatteryLevel = 26,
    RebootStrap = 29,
    PowerCycleStrap = 32,
    SetReadPointer = 33,
    GetDataRange = 34,
    GetHelloHarvard = 35,
    StartFirmwareLoad = 36,
    LoadFirmwareData = 37,
    ProcessFirmwareImage = 38,
    SetLedDrive = 39,
    GetLedDrive = 40,
    SetTiaGain = 41,
    GetTiaGain = 42,
    SetBiasOffset = 43,
    GetBiasOffset = 44,
    EnterBleDfu = 45,
    SetDpType = 52,
    ForceDpType = 53,
    #[strum(to_string = "SEND_R10_R11_REALTIME")]
    SendR10R11Realtime = 63,
    SetAlarmTime = 66,
    GetAlarmTime = 67,
    RunAlarm = 68,
    DisableAlarm = 69,
    GetAdvertisingNameHarvard = 76,
    SetAdvertisingNameHarvard = 77,
    RunHapticsPattern = 79,
    GetAllHapticsPattern = 80,
    StartRawData = 81,
    StopRawData = 82,
    VerifyFirmwareImage = 83,
    GetBodyLocationAndStatus = 84,
    EnterHighFreqSync = 96,
    ExitHighFreqSync = 97,
    GetExtendedBatteryInfo = 98,
    ResetFuelGauge = 99,
    CalibrateCapsense = 100,
    ToggleImuModeHistorical = 105,
    ToggleImuMode = 106,
    EnableOpticalData = 107,
    ToggleOpticalMode = 108,
    StartDeviceConfigKeyExchange = 115,
    SendNextDeviceConfig = 116,
    StartFfKeyExchange = 117,
    SendNextFf = 118,
    SetDeviceConfigValue = 119,
    SetFfValue = 120,
    GetDeviceConfigValue = 121,
    StopHaptics = 122,
    SelectWrist = 123,
    ToggleLabradorDataGeneration = 124,
    ToggleLabradorRawSave = 125,
    GetFfValue = 128,
    SetResearchPacket = 131,
    GetResearchPacket = 132,
    ToggleLabradorFiltered = 139,
    SetAdvertisingName = 140,
    GetAdvertisingName = 141,
    StartFirmwareLoadNew = 142,
    LoadFirmwareDataNew = 143,
    ProcessFirmwareImageNew = 144,
    GetHello = 145,
}
