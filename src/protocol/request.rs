//! Outbound requests
//!
//! A request is rendered differently depending on the API mode: a text line
//! in transparent mode, an API frame otherwise (escaped in
//! [`ApiMode::ApiEnabledEscaped`]).

use bytes::{BufMut, Bytes};

use super::{ApiId, ApiMode, Error, NO_RESPONSE_FRAME_ID, Result, codec};

/// 64-bit broadcast address
pub const BROADCAST_ADDRESS64: u64 = 0x0000_0000_0000_FFFF;
/// 16-bit address meaning "unknown, resolve from the 64-bit address"
pub const UNKNOWN_ADDRESS16: u16 = 0xFFFE;

fn mnemonic(command: &str) -> Result<[u8; 2]> {
    match command.as_bytes() {
        &[a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => Ok([a, b]),
        _ => Err(Error::InvalidCommand(command.to_owned())),
    }
}

/// Local AT command (query when the parameter is empty, set otherwise)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    command: [u8; 2],
    parameter: Bytes,
    expects_response: bool,
}

impl AtCommand {
    /// Create a query for the given two-character mnemonic
    pub fn new(command: &str) -> Result<Self> {
        Ok(Self {
            command: mnemonic(command)?,
            parameter: Bytes::new(),
            expects_response: true,
        })
    }

    /// `AP` query, used to detect the API mode
    #[must_use]
    pub fn api_enable() -> Self {
        Self {
            command: *b"AP",
            parameter: Bytes::new(),
            expects_response: true,
        }
    }

    /// Set the parameter value
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<Bytes>) -> Self {
        self.parameter = parameter.into();
        self
    }

    /// Send with frame id 0 so the module does not answer
    #[must_use]
    pub fn without_response(mut self) -> Self {
        self.expects_response = false;
        self
    }

    /// Command mnemonic
    #[must_use]
    pub fn command(&self) -> &str {
        std::str::from_utf8(&self.command).unwrap_or("??")
    }

    /// Parameter value
    #[must_use]
    pub fn parameter(&self) -> &Bytes {
        &self.parameter
    }

    fn at_text(&self) -> Vec<u8> {
        let mut line = String::with_capacity(5 + self.parameter.len() * 2);
        line.push_str("AT");
        line.push_str(self.command());
        for byte in &self.parameter {
            line.push_str(&format!("{byte:02X}"));
        }
        line.push('\r');
        line.into_bytes()
    }
}

/// AT command executed on a remote node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtCommand {
    destination64: u64,
    destination16: u16,
    command: [u8; 2],
    parameter: Bytes,
    apply_changes: bool,
    expects_response: bool,
}

impl RemoteAtCommand {
    /// Option bit: apply changes immediately on the remote node
    pub const APPLY_CHANGES: u8 = 0x02;

    /// Create a remote query addressed by 64-bit serial number
    pub fn new(destination64: u64, command: &str) -> Result<Self> {
        Ok(Self {
            destination64,
            destination16: UNKNOWN_ADDRESS16,
            command: mnemonic(command)?,
            parameter: Bytes::new(),
            apply_changes: true,
            expects_response: true,
        })
    }

    /// Use a known 16-bit network address
    #[must_use]
    pub fn with_address16(mut self, destination16: u16) -> Self {
        self.destination16 = destination16;
        self
    }

    /// Set the parameter value
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<Bytes>) -> Self {
        self.parameter = parameter.into();
        self
    }

    /// Queue the change on the remote node until `AC`
    #[must_use]
    pub fn queued(mut self) -> Self {
        self.apply_changes = false;
        self
    }

    /// Send with frame id 0 so the module does not answer
    #[must_use]
    pub fn without_response(mut self) -> Self {
        self.expects_response = false;
        self
    }

    /// Destination 64-bit address
    #[must_use]
    pub const fn destination64(&self) -> u64 {
        self.destination64
    }
}

/// RF data addressed to another node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    destination64: u64,
    destination16: u16,
    broadcast_radius: u8,
    options: u8,
    data: Bytes,
    expects_response: bool,
}

impl TransmitRequest {
    /// Create a unicast transmission to a 64-bit address
    pub fn new(destination64: u64, data: impl Into<Bytes>) -> Self {
        Self {
            destination64,
            destination16: UNKNOWN_ADDRESS16,
            broadcast_radius: 0,
            options: 0,
            data: data.into(),
            expects_response: true,
        }
    }

    /// Create a broadcast transmission
    pub fn broadcast(data: impl Into<Bytes>) -> Self {
        Self::new(BROADCAST_ADDRESS64, data)
    }

    /// Use a known 16-bit network address
    #[must_use]
    pub fn with_address16(mut self, destination16: u16) -> Self {
        self.destination16 = destination16;
        self
    }

    /// Limit the number of broadcast hops (0 = network maximum)
    #[must_use]
    pub fn with_broadcast_radius(mut self, radius: u8) -> Self {
        self.broadcast_radius = radius;
        self
    }

    /// Set the transmit options byte
    #[must_use]
    pub fn with_options(mut self, options: u8) -> Self {
        self.options = options;
        self
    }

    /// Send with frame id 0 so no transmit status is generated
    #[must_use]
    pub fn without_response(mut self) -> Self {
        self.expects_response = false;
        self
    }

    /// RF data
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Outbound request to the local module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Local AT command, applied immediately
    AtCommand(AtCommand),
    /// Local AT command, parameter queued until `AC`
    AtCommandQueue(AtCommand),
    /// AT command on a remote node
    RemoteAtCommand(RemoteAtCommand),
    /// RF transmission
    Transmit(TransmitRequest),
}

impl Request {
    /// API identifier of the frame this request renders to
    #[must_use]
    pub const fn api_id(&self) -> ApiId {
        match self {
            Self::AtCommand(_) => ApiId::AtCommand,
            Self::AtCommandQueue(_) => ApiId::AtCommandQueue,
            Self::RemoteAtCommand(_) => ApiId::RemoteAtCommand,
            Self::Transmit(_) => ApiId::TransmitRequest,
        }
    }

    /// Check if the request carries a correlation id
    #[must_use]
    pub const fn is_correlated(&self) -> bool {
        match self {
            Self::AtCommand(cmd) | Self::AtCommandQueue(cmd) => cmd.expects_response,
            Self::RemoteAtCommand(cmd) => cmd.expects_response,
            Self::Transmit(tx) => tx.expects_response,
        }
    }

    /// Frame payload (API id onwards).
    ///
    /// `frame_id` is replaced by [`NO_RESPONSE_FRAME_ID`] for uncorrelated
    /// requests.
    #[must_use]
    pub fn payload(&self, frame_id: u8) -> Vec<u8> {
        let frame_id = if self.is_correlated() {
            frame_id
        } else {
            NO_RESPONSE_FRAME_ID
        };

        let mut out = Vec::with_capacity(16);
        out.put_u8(self.api_id().as_u8());
        out.put_u8(frame_id);

        match self {
            Self::AtCommand(cmd) | Self::AtCommandQueue(cmd) => {
                out.put_slice(&cmd.command);
                out.put_slice(&cmd.parameter);
            }
            Self::RemoteAtCommand(cmd) => {
                out.put_u64(cmd.destination64);
                out.put_u16(cmd.destination16);
                out.put_u8(if cmd.apply_changes {
                    RemoteAtCommand::APPLY_CHANGES
                } else {
                    0
                });
                out.put_slice(&cmd.command);
                out.put_slice(&cmd.parameter);
            }
            Self::Transmit(tx) => {
                out.put_u64(tx.destination64);
                out.put_u16(tx.destination16);
                out.put_u8(tx.broadcast_radius);
                out.put_u8(tx.options);
                out.put_slice(&tx.data);
            }
        }
        out
    }

    /// Unescaped API frame
    pub fn api_packet(&self, frame_id: u8) -> Result<Vec<u8>> {
        codec::encode(&self.payload(frame_id))
    }

    /// API frame with reserved bytes escaped
    pub fn escaped_api_packet(&self, frame_id: u8) -> Result<Vec<u8>> {
        codec::encode_escaped(&self.payload(frame_id))
    }

    /// Transparent-mode text line (`AT<cmd><hex parameter>\r`)
    pub fn at_packet(&self) -> Result<Vec<u8>> {
        match self {
            Self::AtCommand(cmd) | Self::AtCommandQueue(cmd) => Ok(cmd.at_text()),
            Self::RemoteAtCommand(_) | Self::Transmit(_) => Err(Error::UnsupportedMode {
                mode: ApiMode::TransparentAt,
                operation: "remote commands and transmit requests",
            }),
        }
    }

    /// Bytes to write for the given mode
    pub fn render(&self, mode: ApiMode, frame_id: u8) -> Result<Vec<u8>> {
        match mode {
            ApiMode::ApiEnabledEscaped => self.escaped_api_packet(frame_id),
            ApiMode::ApiEnabled => self.api_packet(frame_id),
            ApiMode::TransparentAt => self.at_packet(),
            ApiMode::Unknown => Err(Error::UnsupportedMode {
                mode,
                operation: "rendering a request",
            }),
        }
    }
}

impl From<AtCommand> for Request {
    fn from(cmd: AtCommand) -> Self {
        Self::AtCommand(cmd)
    }
}

impl From<RemoteAtCommand> for Request {
    fn from(cmd: RemoteAtCommand) -> Self {
        Self::RemoteAtCommand(cmd)
    }
}

impl From<TransmitRequest> for Request {
    fn from(tx: TransmitRequest) -> Self {
        Self::Transmit(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_command_api_packet() {
        let request = Request::from(AtCommand::new("ND").unwrap());
        let packet = request.api_packet(1).unwrap();
        assert_eq!(packet, [0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x44, 0x64]);
    }

    #[test]
    fn test_invalid_mnemonic() {
        assert!(matches!(AtCommand::new("D"), Err(Error::InvalidCommand(_))));
        assert!(matches!(AtCommand::new("DBX"), Err(Error::InvalidCommand(_))));
        assert!(matches!(AtCommand::new("D "), Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_at_text_with_parameter() {
        let request = Request::from(AtCommand::new("DL").unwrap().with_parameter(vec![0x12, 0x0A]));
        assert_eq!(request.at_packet().unwrap(), b"ATDL120A\r");
        assert_eq!(request.render(ApiMode::TransparentAt, 7).unwrap(), b"ATDL120A\r");
    }

    #[test]
    fn test_uncorrelated_uses_frame_id_zero() {
        let request = Request::from(AtCommand::new("WR").unwrap().without_response());
        assert!(!request.is_correlated());
        assert_eq!(request.payload(9)[1], NO_RESPONSE_FRAME_ID);
    }

    #[test]
    fn test_escaped_render() {
        // frame id 0x7D must be escaped
        let request = Request::from(AtCommand::api_enable());
        let plain = request.render(ApiMode::ApiEnabled, 0x7D).unwrap();
        let escaped = request.render(ApiMode::ApiEnabledEscaped, 0x7D).unwrap();
        assert_eq!(escaped.len(), plain.len() + 1);
        assert_eq!(&escaped[4..6], [0x7D, 0x5D]);
    }

    #[test]
    fn test_remote_at_layout() {
        let request = Request::from(
            RemoteAtCommand::new(0x0013_A200_4052_2BAA, "D1")
                .unwrap()
                .with_parameter(vec![0x04]),
        );
        let payload = request.payload(3);
        assert_eq!(payload[0], 0x17);
        assert_eq!(payload[1], 3);
        assert_eq!(&payload[2..10], 0x0013_A200_4052_2BAA_u64.to_be_bytes());
        assert_eq!(&payload[10..12], [0xFF, 0xFE]);
        assert_eq!(payload[12], RemoteAtCommand::APPLY_CHANGES);
        assert_eq!(&payload[13..], b"D1\x04");
    }

    #[test]
    fn test_transmit_layout() {
        let request = Request::from(TransmitRequest::broadcast(&b"hi"[..]).with_broadcast_radius(2));
        let payload = request.payload(1);
        assert_eq!(payload[0], 0x10);
        assert_eq!(&payload[2..10], BROADCAST_ADDRESS64.to_be_bytes());
        assert_eq!(payload[12], 2);
        assert_eq!(&payload[14..], b"hi");
    }

    #[test]
    fn test_transmit_not_renderable_as_text() {
        let request = Request::from(TransmitRequest::broadcast(&b"hi"[..]));
        assert!(matches!(
            request.render(ApiMode::TransparentAt, 1),
            Err(Error::UnsupportedMode { .. })
        ));
        assert!(matches!(
            request.render(ApiMode::Unknown, 1),
            Err(Error::UnsupportedMode { .. })
        ));
    }
}
