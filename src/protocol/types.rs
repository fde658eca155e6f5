//! XBee API modes, frame types and status codes

use std::fmt;

/// Operating mode of the module link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ApiMode {
    /// Not yet detected
    #[default]
    Unknown = 0xFF,
    /// API disabled, text AT commands (transparent mode)
    TransparentAt = 0,
    /// Binary API frames
    ApiEnabled = 1,
    /// Binary API frames with escaped reserved bytes
    ApiEnabledEscaped = 2,
}

impl ApiMode {
    /// Convert from the value of the `AP` register
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::TransparentAt,
            1 => Self::ApiEnabled,
            2 => Self::ApiEnabledEscaped,
            _ => Self::Unknown,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if binary frames are exchanged in this mode
    #[must_use]
    pub const fn is_api(self) -> bool {
        matches!(self, Self::ApiEnabled | Self::ApiEnabledEscaped)
    }

    /// Check if reserved bytes are escaped in this mode
    #[must_use]
    pub const fn is_escaped(self) -> bool {
        matches!(self, Self::ApiEnabledEscaped)
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::TransparentAt => "TransparentAt",
            Self::ApiEnabled => "ApiEnabled",
            Self::ApiEnabledEscaped => "ApiEnabledEscaped",
        };
        write!(f, "{name}")
    }
}

/// API frame type identifiers (first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiId {
    /// Local AT command
    AtCommand = 0x08,
    /// Local AT command, parameter queued until `AC`
    AtCommandQueue = 0x09,
    /// ZigBee transmit request
    TransmitRequest = 0x10,
    /// Remote AT command request
    RemoteAtCommand = 0x17,

    /// Local AT command response
    AtCommandResponse = 0x88,
    /// Modem status
    ModemStatus = 0x8A,
    /// ZigBee transmit status
    TransmitStatus = 0x8B,
    /// ZigBee receive packet
    ReceivePacket = 0x90,
    /// ZigBee IO data sample indicator
    IoDataSample = 0x92,
    /// XBee sensor read indicator
    SensorRead = 0x94,
    /// Node identification indicator
    NodeIdentification = 0x95,
    /// Remote AT command response
    RemoteCommandResponse = 0x97,
}

impl ApiId {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x08 => Some(Self::AtCommand),
            0x09 => Some(Self::AtCommandQueue),
            0x10 => Some(Self::TransmitRequest),
            0x17 => Some(Self::RemoteAtCommand),
            0x88 => Some(Self::AtCommandResponse),
            0x8A => Some(Self::ModemStatus),
            0x8B => Some(Self::TransmitStatus),
            0x90 => Some(Self::ReceivePacket),
            0x92 => Some(Self::IoDataSample),
            0x94 => Some(Self::SensorRead),
            0x95 => Some(Self::NodeIdentification),
            0x97 => Some(Self::RemoteCommandResponse),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if frames of this type travel from the module to the host
    #[must_use]
    pub const fn is_response(self) -> bool {
        (self as u8) & 0x80 != 0
    }
}

/// Status byte of an AT command response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommandStatus {
    /// Command accepted
    Ok,
    /// Command failed
    Error,
    /// Unknown command mnemonic
    InvalidCommand,
    /// Parameter rejected
    InvalidParameter,
    /// Remote command could not be delivered
    TransmissionFailed,
    /// Value outside the documented range
    Unknown(u8),
}

impl From<u8> for AtCommandStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::InvalidCommand,
            3 => Self::InvalidParameter,
            4 => Self::TransmissionFailed,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for AtCommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::TransmissionFailed => write!(f, "transmission failed"),
            Self::Unknown(code) => write!(f, "unknown status (0x{code:02X})"),
        }
    }
}

/// Unsolicited module state reported in a modem status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemStatus {
    /// Hardware reset
    HardwareReset,
    /// Watchdog timer reset
    WatchdogReset,
    /// Joined a network
    JoinedNetwork,
    /// Left the network
    Disassociated,
    /// Coordinator formed a network
    CoordinatorStarted,
    /// Network security key was updated
    SecurityKeyUpdated,
    /// Supply voltage limit exceeded
    VoltageLimitExceeded,
    /// Configuration changed while a join was in progress
    ConfigChangedDuringJoin,
    /// Stack error (0x80 and above)
    StackError(u8),
    /// Value outside the documented range
    Unknown(u8),
}

impl From<u8> for ModemStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::HardwareReset,
            0x01 => Self::WatchdogReset,
            0x02 => Self::JoinedNetwork,
            0x03 => Self::Disassociated,
            0x06 => Self::CoordinatorStarted,
            0x07 => Self::SecurityKeyUpdated,
            0x0D => Self::VoltageLimitExceeded,
            0x11 => Self::ConfigChangedDuringJoin,
            code if code >= 0x80 => Self::StackError(code),
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ModemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareReset => write!(f, "hardware reset"),
            Self::WatchdogReset => write!(f, "watchdog timer reset"),
            Self::JoinedNetwork => write!(f, "joined network"),
            Self::Disassociated => write!(f, "disassociated"),
            Self::CoordinatorStarted => write!(f, "coordinator started"),
            Self::SecurityKeyUpdated => write!(f, "network security key updated"),
            Self::VoltageLimitExceeded => write!(f, "voltage supply limit exceeded"),
            Self::ConfigChangedDuringJoin => write!(f, "configuration changed while join in progress"),
            Self::StackError(code) => write!(f, "stack error (0x{code:02X})"),
            Self::Unknown(code) => write!(f, "unknown status (0x{code:02X})"),
        }
    }
}

/// Delivery outcome reported in a transmit status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Delivered
    Success,
    /// MAC acknowledgement failure
    MacAckFailure,
    /// Clear channel assessment failure
    CcaFailure,
    /// Invalid destination endpoint
    InvalidEndpoint,
    /// Network acknowledgement failure
    NetworkAckFailure,
    /// Not joined to a network
    NotJoined,
    /// Self-addressed
    SelfAddressed,
    /// Address not found
    AddressNotFound,
    /// Route not found
    RouteNotFound,
    /// Other failure code
    Other(u8),
}

impl From<u8> for DeliveryStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::MacAckFailure,
            0x02 => Self::CcaFailure,
            0x15 => Self::InvalidEndpoint,
            0x21 => Self::NetworkAckFailure,
            0x22 => Self::NotJoined,
            0x23 => Self::SelfAddressed,
            0x24 => Self::AddressNotFound,
            0x25 => Self::RouteNotFound,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::MacAckFailure => write!(f, "MAC ACK failure"),
            Self::CcaFailure => write!(f, "CCA failure"),
            Self::InvalidEndpoint => write!(f, "invalid destination endpoint"),
            Self::NetworkAckFailure => write!(f, "network ACK failure"),
            Self::NotJoined => write!(f, "not joined to network"),
            Self::SelfAddressed => write!(f, "self-addressed"),
            Self::AddressNotFound => write!(f, "address not found"),
            Self::RouteNotFound => write!(f, "route not found"),
            Self::Other(code) => write!(f, "delivery failure (0x{code:02X})"),
        }
    }
}

/// Role of a node in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Network coordinator
    Coordinator,
    /// Router
    Router,
    /// Sleepy end device
    EndDevice,
    /// Value outside the documented range
    Unknown(u8),
}

impl From<u8> for DeviceType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Coordinator,
            1 => Self::Router,
            2 => Self::EndDevice,
            other => Self::Unknown(other),
        }
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => write!(f, "coordinator"),
            Self::Router => write!(f, "router"),
            Self::EndDevice => write!(f, "end device"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Options byte of received packets and samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOptions(u8);

impl ReceiveOptions {
    /// Packet was acknowledged
    pub const ACKNOWLEDGED: u8 = 0x01;
    /// Packet was a broadcast
    pub const BROADCAST: u8 = 0x02;
    /// Packet was encrypted with APS encryption
    pub const ENCRYPTED: u8 = 0x20;
    /// Packet was sent from an end device
    pub const FROM_END_DEVICE: u8 = 0x40;

    /// Create from byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Check if flag is set
    #[must_use]
    pub const fn has(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Check if acknowledged
    #[must_use]
    pub const fn is_acknowledged(self) -> bool {
        self.has(Self::ACKNOWLEDGED)
    }

    /// Check if broadcast
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.has(Self::BROADCAST)
    }
}

impl fmt::Display for ReceiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.is_acknowledged() {
            parts.push("ACKNOWLEDGED");
        }
        if self.is_broadcast() {
            parts.push("BROADCAST");
        }
        if self.has(Self::ENCRYPTED) {
            parts.push("ENCRYPTED");
        }
        if self.has(Self::FROM_END_DEVICE) {
            parts.push("FROM_END_DEVICE");
        }
        if parts.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_id_roundtrip() {
        let ids = [
            ApiId::AtCommand,
            ApiId::AtCommandResponse,
            ApiId::ModemStatus,
            ApiId::RemoteCommandResponse,
        ];

        for id in ids {
            assert_eq!(ApiId::from_u8(id.as_u8()), Some(id));
        }
        assert_eq!(ApiId::from_u8(0x42), None);
    }

    #[test]
    fn test_request_and_response_ids() {
        assert!(!ApiId::AtCommand.is_response());
        assert!(!ApiId::TransmitRequest.is_response());
        assert!(ApiId::ModemStatus.is_response());
        assert!(ApiId::NodeIdentification.is_response());
    }

    #[test]
    fn test_api_mode_from_register() {
        assert_eq!(ApiMode::from_u8(0), ApiMode::TransparentAt);
        assert_eq!(ApiMode::from_u8(1), ApiMode::ApiEnabled);
        assert_eq!(ApiMode::from_u8(2), ApiMode::ApiEnabledEscaped);
        assert_eq!(ApiMode::from_u8(7), ApiMode::Unknown);
        assert!(ApiMode::ApiEnabledEscaped.is_escaped());
        assert!(!ApiMode::TransparentAt.is_api());
    }

    #[test]
    fn test_modem_status_codes() {
        assert_eq!(ModemStatus::from(0x02), ModemStatus::JoinedNetwork);
        assert_eq!(ModemStatus::from(0x03), ModemStatus::Disassociated);
        assert_eq!(ModemStatus::from(0x82), ModemStatus::StackError(0x82));
        assert_eq!(ModemStatus::from(0x05), ModemStatus::Unknown(0x05));
    }

    #[test]
    fn test_receive_options() {
        let options = ReceiveOptions::from_u8(ReceiveOptions::ACKNOWLEDGED | ReceiveOptions::BROADCAST);
        assert!(options.is_acknowledged());
        assert!(options.is_broadcast());
        assert_eq!(options.to_string(), "ACKNOWLEDGED | BROADCAST");
        assert_eq!(ReceiveOptions::default().to_string(), "NONE");
    }
}
