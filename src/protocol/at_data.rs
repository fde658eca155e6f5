//! Typed values of AT command responses
//!
//! The value bytes of an AT command response are interpreted according to
//! the two-character command mnemonic. Mnemonics without a decoder keep only
//! the raw value on the response.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use super::reader::{PayloadReader, be_value};
use super::{ApiMode, DeviceType, Error, Result};

/// Decoded value of an AT command response, selected by mnemonic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtData {
    /// `DB`: received signal strength of the last packet, in dBm
    SignalStrength(i16),
    /// `IS`: forced IO sample
    ForceSample(IoSample),
    /// `ND`: one discovered node
    NodeDiscover(NodeInfo),
    /// `NI`: node identifier string
    NodeIdentifier(String),
    /// `SM`: sleep mode
    SleepMode(SleepMode),
    /// `SP`: cyclic sleep period
    CyclicSleepPeriod(Duration),
    /// `ST`: time before sleep
    TimeBeforeSleep(Duration),
    /// `%V`: supply voltage in millivolts
    SupplyVoltage(u16),
    /// `AP`: API enable setting
    ApiEnable(ApiMode),
}

impl AtData {
    /// Decode the value bytes of a response to `command`.
    ///
    /// Returns `Ok(None)` for mnemonics without a decoder.
    pub fn decode(command: [u8; 2], value: &[u8]) -> Result<Option<Self>> {
        let data = match &command {
            b"DB" => match value {
                [dbm] => Self::SignalStrength(-i16::from(*dbm)),
                _ => {
                    return Err(Error::PayloadTooLarge {
                        size: value.len(),
                        max: 1,
                    });
                }
            },
            b"IS" => Self::ForceSample(IoSample::decode(&mut reader(value))?),
            b"ND" => Self::NodeDiscover(NodeInfo::decode(&mut reader(value))?),
            b"NI" => Self::NodeIdentifier(reader(value).read_cstring()?),
            b"SM" => Self::SleepMode(SleepMode::from(narrow::<u8>(value)?)),
            // SP is counted in units of 10 ms
            b"SP" => Self::CyclicSleepPeriod(Duration::from_millis(u64::from(be_value(value)?) * 10)),
            b"ST" => Self::TimeBeforeSleep(Duration::from_millis(u64::from(be_value(value)?))),
            b"%V" => Self::SupplyVoltage(narrow(value)?),
            b"AP" => Self::ApiEnable(ApiMode::from_u8(narrow(value)?)),
            _ => return Ok(None),
        };
        Ok(Some(data))
    }

    /// Mnemonic this value belongs to
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::SignalStrength(_) => "DB",
            Self::ForceSample(_) => "IS",
            Self::NodeDiscover(_) => "ND",
            Self::NodeIdentifier(_) => "NI",
            Self::SleepMode(_) => "SM",
            Self::CyclicSleepPeriod(_) => "SP",
            Self::TimeBeforeSleep(_) => "ST",
            Self::SupplyVoltage(_) => "%V",
            Self::ApiEnable(_) => "AP",
        }
    }
}

/// Big-endian value that must fit in `T`
fn narrow<T: TryFrom<u32>>(value: &[u8]) -> Result<T> {
    T::try_from(be_value(value)?).map_err(|_| Error::PayloadTooLarge {
        size: value.len(),
        max: std::mem::size_of::<T>(),
    })
}

fn reader(value: &[u8]) -> PayloadReader {
    PayloadReader::new(Bytes::copy_from_slice(value))
}

impl fmt::Display for AtData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalStrength(dbm) => write!(f, "signal strength = {dbm} dBm"),
            Self::ForceSample(sample) => write!(f, "{sample}"),
            Self::NodeDiscover(node) => write!(f, "{node}"),
            Self::NodeIdentifier(name) => write!(f, "node identifier = {name}"),
            Self::SleepMode(mode) => write!(f, "sleep mode = {mode}"),
            Self::CyclicSleepPeriod(period) => write!(f, "cyclic sleep period = {period:?}"),
            Self::TimeBeforeSleep(time) => write!(f, "time before sleep = {time:?}"),
            Self::SupplyVoltage(mv) => write!(f, "supply voltage = {mv} mV"),
            Self::ApiEnable(mode) => write!(f, "API mode = {mode}"),
        }
    }
}

/// Sleep mode setting (`SM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Sleep disabled
    NoSleep,
    /// Pin-controlled hibernate
    PinHibernate,
    /// Cyclic sleep
    CyclicSleep,
    /// Cyclic sleep with pin wake-up
    CyclicSleepPinWake,
    /// Value outside the documented range
    Unknown(u8),
}

impl From<u8> for SleepMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoSleep,
            1 => Self::PinHibernate,
            4 => Self::CyclicSleep,
            5 => Self::CyclicSleepPinWake,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSleep => write!(f, "no sleep"),
            Self::PinHibernate => write!(f, "pin hibernate"),
            Self::CyclicSleep => write!(f, "cyclic sleep"),
            Self::CyclicSleepPinWake => write!(f, "cyclic sleep with pin wake"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// One IO sample: the `IS` response value and the body of IO sample frames.
///
/// Digital and analog readings are only present when the corresponding
/// channel mask bits are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoSample {
    /// Number of sample sets (always 1 on current firmware)
    pub num_samples: u8,
    /// Enabled digital channels, bit n = DIOn
    pub digital_mask: u16,
    /// Enabled analog channels, bits 0-3 = AD0-AD3, bit 7 = supply voltage
    pub analog_mask: u8,
    /// Digital pin states, present when any digital channel is enabled
    pub digital: Option<u16>,
    /// AD0-AD3 readings
    pub analog: [Option<u16>; 4],
    /// Supply voltage reading
    pub supply_voltage: Option<u16>,
}

impl IoSample {
    const SUPPLY_VOLTAGE_BIT: u8 = 0x80;

    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        let num_samples = reader.read_u8()?;
        let digital_mask = reader.read_u16()?;
        let analog_mask = reader.read_u8()?;

        let digital = if digital_mask != 0 {
            Some(reader.read_u16()?)
        } else {
            None
        };

        let mut analog = [None; 4];
        for (channel, slot) in analog.iter_mut().enumerate() {
            if analog_mask & (1 << channel) != 0 {
                *slot = Some(reader.read_u16()?);
            }
        }

        let supply_voltage = if analog_mask & Self::SUPPLY_VOLTAGE_BIT != 0 {
            Some(reader.read_u16()?)
        } else {
            None
        };

        Ok(Self {
            num_samples,
            digital_mask,
            analog_mask,
            digital,
            analog,
            supply_voltage,
        })
    }

    /// State of digital pin `pin`, if it is enabled
    #[must_use]
    pub fn digital_pin(&self, pin: u8) -> Option<bool> {
        let bit = 1u16.checked_shl(u32::from(pin))?;
        if self.digital_mask & bit == 0 {
            return None;
        }
        self.digital.map(|states| states & bit != 0)
    }
}

impl fmt::Display for IoSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        if let Some(digital) = self.digital {
            lines.push(format!("DIO = {digital:#06x} (mask {:#06x})", self.digital_mask));
        }
        for (channel, value) in self.analog.iter().enumerate() {
            if let Some(value) = value {
                lines.push(format!("AD{channel} = {value}"));
            }
        }
        if let Some(voltage) = self.supply_voltage {
            lines.push(format!("supplyVoltage = {voltage}"));
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Node description shared by `ND` responses and node identification frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    /// 16-bit network address
    pub address16: u16,
    /// 64-bit serial number
    pub address64: u64,
    /// Node identifier string (`NI`)
    pub identifier: String,
    /// 16-bit address of the parent, `0xFFFE` if none
    pub parent_address16: u16,
    /// Network role
    pub device_type: DeviceType,
    /// Status byte (`ND`) or source event (node identification)
    pub status: u8,
    /// Profile id
    pub profile_id: u16,
    /// Manufacturer id
    pub manufacturer_id: u16,
}

impl NodeInfo {
    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            address16: reader.read_u16()?,
            address64: reader.read_u64()?,
            identifier: reader.read_cstring()?,
            parent_address16: reader.read_u16()?,
            device_type: DeviceType::from(reader.read_u8()?),
            status: reader.read_u8()?,
            profile_id: reader.read_u16()?,
            manufacturer_id: reader.read_u16()?,
        })
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "address16 = {:#06x}", self.address16)?;
        writeln!(f, "address64 = {:#018x}", self.address64)?;
        writeln!(f, "identifier = {}", self.identifier)?;
        writeln!(f, "parent = {:#06x}", self.parent_address16)?;
        write!(f, "device type = {}", self.device_type)
    }
}
