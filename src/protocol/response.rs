//! Inbound response frames
//!
//! [`Response::decode`] turns a checksum-verified frame payload into a typed
//! value. Payloads whose API identifier has no decoder yield `Ok(None)`.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use super::reader::PayloadReader;
use super::{ApiId, AtCommandStatus, AtData, DeliveryStatus, IoSample, ModemStatus, NodeInfo, ReceiveOptions, Result};

fn mnemonic_str(command: &[u8; 2]) -> &str {
    std::str::from_utf8(command).unwrap_or("??")
}

fn resolve_at_data(command: [u8; 2], value: &Bytes) -> Option<AtData> {
    if value.is_empty() {
        return None;
    }
    match AtData::decode(command, value) {
        Ok(data) => data,
        Err(err) => {
            debug!(
                command = mnemonic_str(&command),
                error = %err,
                "AT data left undecoded"
            );
            None
        }
    }
}

/// Response to a local AT command (`0x88`)
#[derive(Debug, Clone, PartialEq)]
pub struct AtCommandResponse {
    frame_id: u8,
    command: [u8; 2],
    status: AtCommandStatus,
    value: Bytes,
    data: Option<AtData>,
}

impl AtCommandResponse {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        let frame_id = reader.read_u8()?;
        let command = reader.read_array::<2>()?;
        let status = AtCommandStatus::from(reader.read_u8()?);
        let value = reader.read_rest();
        let data = resolve_at_data(command, &value);
        Ok(Self {
            frame_id,
            command,
            status,
            value,
            data,
        })
    }

    /// Correlation id echoed from the request
    #[must_use]
    pub const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Command mnemonic
    #[must_use]
    pub fn command(&self) -> &str {
        mnemonic_str(&self.command)
    }

    /// Command status
    #[must_use]
    pub const fn status(&self) -> AtCommandStatus {
        self.status
    }

    /// Raw value bytes
    #[must_use]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Decoded value, for commands with a known data format
    #[must_use]
    pub const fn data(&self) -> Option<&AtData> {
        self.data.as_ref()
    }
}

/// Response to a remote AT command (`0x97`)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommandResponse {
    frame_id: u8,
    source64: u64,
    source16: u16,
    command: [u8; 2],
    status: AtCommandStatus,
    value: Bytes,
    data: Option<AtData>,
}

impl RemoteCommandResponse {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        let frame_id = reader.read_u8()?;
        let source64 = reader.read_u64()?;
        let source16 = reader.read_u16()?;
        let command = reader.read_array::<2>()?;
        let status = AtCommandStatus::from(reader.read_u8()?);
        let value = reader.read_rest();
        let data = resolve_at_data(command, &value);
        Ok(Self {
            frame_id,
            source64,
            source16,
            command,
            status,
            value,
            data,
        })
    }

    /// Correlation id echoed from the request
    #[must_use]
    pub const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// 64-bit address of the responding node
    #[must_use]
    pub const fn source64(&self) -> u64 {
        self.source64
    }

    /// 16-bit address of the responding node
    #[must_use]
    pub const fn source16(&self) -> u16 {
        self.source16
    }

    /// Command mnemonic
    #[must_use]
    pub fn command(&self) -> &str {
        mnemonic_str(&self.command)
    }

    /// Command status
    #[must_use]
    pub const fn status(&self) -> AtCommandStatus {
        self.status
    }

    /// Raw value bytes
    #[must_use]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Decoded value, for commands with a known data format
    #[must_use]
    pub const fn data(&self) -> Option<&AtData> {
        self.data.as_ref()
    }
}

/// RF data received from another node (`0x90`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePacket {
    source64: u64,
    source16: u16,
    options: ReceiveOptions,
    data: Bytes,
}

impl ReceivePacket {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            source64: reader.read_u64()?,
            source16: reader.read_u16()?,
            options: ReceiveOptions::from_u8(reader.read_u8()?),
            data: reader.read_rest(),
        })
    }

    /// 64-bit sender address
    #[must_use]
    pub const fn source64(&self) -> u64 {
        self.source64
    }

    /// 16-bit sender address
    #[must_use]
    pub const fn source16(&self) -> u16 {
        self.source16
    }

    /// Receive options
    #[must_use]
    pub const fn options(&self) -> ReceiveOptions {
        self.options
    }

    /// RF data
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// IO sample sent by a remote node (`0x92`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoDataSample {
    source64: u64,
    source16: u16,
    options: ReceiveOptions,
    sample: IoSample,
}

impl IoDataSample {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            source64: reader.read_u64()?,
            source16: reader.read_u16()?,
            options: ReceiveOptions::from_u8(reader.read_u8()?),
            sample: IoSample::decode(reader)?,
        })
    }

    /// 64-bit sender address
    #[must_use]
    pub const fn source64(&self) -> u64 {
        self.source64
    }

    /// 16-bit sender address
    #[must_use]
    pub const fn source16(&self) -> u16 {
        self.source16
    }

    /// Receive options
    #[must_use]
    pub const fn options(&self) -> ReceiveOptions {
        self.options
    }

    /// Sampled pin values
    #[must_use]
    pub const fn sample(&self) -> &IoSample {
        &self.sample
    }
}

/// Delivery report for a transmit request (`0x8B`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitStatus {
    frame_id: u8,
    destination16: u16,
    retry_count: u8,
    delivery: DeliveryStatus,
    discovery: u8,
}

impl TransmitStatus {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            frame_id: reader.read_u8()?,
            destination16: reader.read_u16()?,
            retry_count: reader.read_u8()?,
            delivery: DeliveryStatus::from(reader.read_u8()?),
            discovery: reader.read_u8()?,
        })
    }

    /// Correlation id echoed from the request
    #[must_use]
    pub const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// 16-bit address the packet was delivered to
    #[must_use]
    pub const fn destination16(&self) -> u16 {
        self.destination16
    }

    /// Number of application retries
    #[must_use]
    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// Delivery outcome
    #[must_use]
    pub const fn delivery(&self) -> DeliveryStatus {
        self.delivery
    }

    /// Raw discovery status byte
    #[must_use]
    pub const fn discovery(&self) -> u8 {
        self.discovery
    }
}

/// Node joined or pressed its commissioning button (`0x95`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentification {
    source64: u64,
    source16: u16,
    options: ReceiveOptions,
    node: NodeInfo,
}

impl NodeIdentification {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            source64: reader.read_u64()?,
            source16: reader.read_u16()?,
            options: ReceiveOptions::from_u8(reader.read_u8()?),
            node: NodeInfo::decode(reader)?,
        })
    }

    /// 64-bit sender address
    #[must_use]
    pub const fn source64(&self) -> u64 {
        self.source64
    }

    /// 16-bit sender address
    #[must_use]
    pub const fn source16(&self) -> u16 {
        self.source16
    }

    /// Receive options
    #[must_use]
    pub const fn options(&self) -> ReceiveOptions {
        self.options
    }

    /// Identified node
    #[must_use]
    pub const fn node(&self) -> &NodeInfo {
        &self.node
    }
}

/// 1-Wire sensor reading (`0x94`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRead {
    source64: u64,
    source16: u16,
    options: ReceiveOptions,
    sensors: u8,
    analog: [u16; 4],
    temperature: u16,
}

impl SensorRead {
    fn decode(reader: &mut PayloadReader) -> Result<Self> {
        let source64 = reader.read_u64()?;
        let source16 = reader.read_u16()?;
        let options = ReceiveOptions::from_u8(reader.read_u8()?);
        let sensors = reader.read_u8()?;
        let mut analog = [0u16; 4];
        for value in &mut analog {
            *value = reader.read_u16()?;
        }
        let temperature = reader.read_u16()?;
        Ok(Self {
            source64,
            source16,
            options,
            sensors,
            analog,
            temperature,
        })
    }

    /// 64-bit sender address
    #[must_use]
    pub const fn source64(&self) -> u64 {
        self.source64
    }

    /// 16-bit sender address
    #[must_use]
    pub const fn source16(&self) -> u16 {
        self.source16
    }

    /// Receive options
    #[must_use]
    pub const fn options(&self) -> ReceiveOptions {
        self.options
    }

    /// Bitmask of attached sensors
    #[must_use]
    pub const fn sensors(&self) -> u8 {
        self.sensors
    }

    /// Raw A/D readings (AD0..AD3)
    #[must_use]
    pub const fn analog(&self) -> [u16; 4] {
        self.analog
    }

    /// Raw temperature reading
    #[must_use]
    pub const fn temperature(&self) -> u16 {
        self.temperature
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Local AT command response
    AtCommand(AtCommandResponse),
    /// Remote AT command response
    RemoteCommand(RemoteCommandResponse),
    /// RF data from another node
    ReceivePacket(ReceivePacket),
    /// IO sample from another node
    IoDataSample(IoDataSample),
    /// Transmit delivery report
    TransmitStatus(TransmitStatus),
    /// Modem status change
    ModemStatus(ModemStatus),
    /// Node identification
    NodeIdentification(NodeIdentification),
    /// Sensor reading
    SensorRead(SensorRead),
}

impl Response {
    /// Decode a frame payload (API identifier first).
    ///
    /// Returns `Ok(None)` for an empty payload or an API identifier with no
    /// response decoder. Truncated bodies fail with
    /// [`Error::BufferTooSmall`](super::Error::BufferTooSmall).
    pub fn decode(payload: Bytes) -> Result<Option<Self>> {
        let mut reader = PayloadReader::new(payload);
        let Some(id) = reader.peek_u8().and_then(ApiId::from_u8) else {
            return Ok(None);
        };
        reader.read_u8()?;

        let response = match id {
            ApiId::AtCommandResponse => Self::AtCommand(AtCommandResponse::decode(&mut reader)?),
            ApiId::RemoteCommandResponse => {
                Self::RemoteCommand(RemoteCommandResponse::decode(&mut reader)?)
            }
            ApiId::ReceivePacket => Self::ReceivePacket(ReceivePacket::decode(&mut reader)?),
            ApiId::IoDataSample => Self::IoDataSample(IoDataSample::decode(&mut reader)?),
            ApiId::TransmitStatus => Self::TransmitStatus(TransmitStatus::decode(&mut reader)?),
            ApiId::ModemStatus => Self::ModemStatus(ModemStatus::from(reader.read_u8()?)),
            ApiId::NodeIdentification => {
                Self::NodeIdentification(NodeIdentification::decode(&mut reader)?)
            }
            ApiId::SensorRead => Self::SensorRead(SensorRead::decode(&mut reader)?),
            ApiId::AtCommand
            | ApiId::AtCommandQueue
            | ApiId::TransmitRequest
            | ApiId::RemoteAtCommand => return Ok(None),
        };
        Ok(Some(response))
    }

    /// API identifier of this frame
    #[must_use]
    pub const fn api_id(&self) -> ApiId {
        match self {
            Self::AtCommand(_) => ApiId::AtCommandResponse,
            Self::RemoteCommand(_) => ApiId::RemoteCommandResponse,
            Self::ReceivePacket(_) => ApiId::ReceivePacket,
            Self::IoDataSample(_) => ApiId::IoDataSample,
            Self::TransmitStatus(_) => ApiId::TransmitStatus,
            Self::ModemStatus(_) => ApiId::ModemStatus,
            Self::NodeIdentification(_) => ApiId::NodeIdentification,
            Self::SensorRead(_) => ApiId::SensorRead,
        }
    }

    /// Frame id, for the variants that echo one
    #[must_use]
    pub const fn frame_id(&self) -> Option<u8> {
        match self {
            Self::AtCommand(r) => Some(r.frame_id),
            Self::RemoteCommand(r) => Some(r.frame_id),
            Self::TransmitStatus(r) => Some(r.frame_id),
            _ => None,
        }
    }

    /// Frame id that can complete a pending `execute`.
    ///
    /// Only local AT command responses are correlated.
    #[must_use]
    pub const fn correlation_id(&self) -> Option<u8> {
        match self {
            Self::AtCommand(r) => Some(r.frame_id),
            _ => None,
        }
    }

    /// The AT command response, if this is one
    #[must_use]
    pub const fn as_at_command(&self) -> Option<&AtCommandResponse> {
        match self {
            Self::AtCommand(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtCommand(r) => {
                write!(f, "AT {} #{} {}", r.command(), r.frame_id, r.status)?;
                if let Some(data) = &r.data {
                    write!(f, ": {data}")?;
                }
                Ok(())
            }
            Self::RemoteCommand(r) => write!(
                f,
                "remote AT {} #{} from {:#018x} {}",
                r.command(),
                r.frame_id,
                r.source64,
                r.status
            ),
            Self::ReceivePacket(r) => write!(
                f,
                "receive {} bytes from {:#018x} ({})",
                r.data.len(),
                r.source64,
                r.options
            ),
            Self::IoDataSample(r) => write!(f, "io sample from {:#018x}: {}", r.source64, r.sample),
            Self::TransmitStatus(r) => write!(
                f,
                "transmit status #{} to {:#06x}: {} after {} retries",
                r.frame_id, r.destination16, r.delivery, r.retry_count
            ),
            Self::ModemStatus(status) => write!(f, "modem status: {status}"),
            Self::NodeIdentification(r) => {
                write!(f, "node identification from {:#018x} ({})", r.source64, r.node.identifier)
            }
            Self::SensorRead(r) => write!(f, "sensor read from {:#018x}", r.source64),
        }
    }
}
