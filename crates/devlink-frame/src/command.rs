//! Command ids.
//!
//! Requests from the host sit in `0x01..=0x3F`; responses set the high bit of
//! the request they answer. Unsolicited device frames live in `0x40..=0x4F`
//! and `0xE0`.

/// Every command id defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    Ping = 0x01,
    Pong = 0x81,
    GetStatus = 0x02,
    StatusResponse = 0x82,
    GetDeviceInfo = 0x03,
    DeviceInfoResponse = 0x83,
    SetModeContinuous = 0x10,
    SetModeTrigger = 0x11,
    StartStream = 0x12,
    StopStream = 0x13,
    ConfigureStream = 0x14,
    Ack = 0x90,
    Nack = 0x91,
    DataPacket = 0x40,
    EventTriggered = 0x41,
    RequestBufferedData = 0x42,
    BufferTransferComplete = 0x4F,
    LogMessage = 0xE0,
}

impl CommandId {
    pub const ALL: [CommandId; 18] = [
        CommandId::Ping,
        CommandId::Pong,
        CommandId::GetStatus,
        CommandId::StatusResponse,
        CommandId::GetDeviceInfo,
        CommandId::DeviceInfoResponse,
        CommandId::SetModeContinuous,
        CommandId::SetModeTrigger,
        CommandId::StartStream,
        CommandId::StopStream,
        CommandId::ConfigureStream,
        CommandId::Ack,
        CommandId::Nack,
        CommandId::DataPacket,
        CommandId::EventTriggered,
        CommandId::RequestBufferedData,
        CommandId::BufferTransferComplete,
        CommandId::LogMessage,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Diagnostic name, as printed in logs.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::Ping => "PING",
            CommandId::Pong => "PONG",
            CommandId::GetStatus => "GET_STATUS",
            CommandId::StatusResponse => "STATUS_RESPONSE",
            CommandId::GetDeviceInfo => "GET_DEVICE_INFO",
            CommandId::DeviceInfoResponse => "DEVICE_INFO_RESPONSE",
            CommandId::SetModeContinuous => "SET_MODE_CONTINUOUS",
            CommandId::SetModeTrigger => "SET_MODE_TRIGGER",
            CommandId::StartStream => "START_STREAM",
            CommandId::StopStream => "STOP_STREAM",
            CommandId::ConfigureStream => "CONFIGURE_STREAM",
            CommandId::Ack => "ACK",
            CommandId::Nack => "NACK",
            CommandId::DataPacket => "DATA_PACKET",
            CommandId::EventTriggered => "EVENT_TRIGGERED",
            CommandId::RequestBufferedData => "REQUEST_BUFFERED_DATA",
            CommandId::BufferTransferComplete => "BUFFER_TRANSFER_COMPLETE",
            CommandId::LogMessage => "LOG_MESSAGE",
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        CommandId::ALL
            .iter()
            .copied()
            .find(|id| id.code() == code)
            .ok_or(code)
    }
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> Self {
        id.code()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns a human-readable name for a raw command id.
pub fn command_name(code: u8) -> &'static str {
    CommandId::try_from(code).map_or("UNKNOWN", CommandId::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for id in CommandId::ALL {
            assert_eq!(CommandId::try_from(id.code()), Ok(id));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(CommandId::try_from(0x99), Err(0x99));
        assert_eq!(command_name(0x99), "UNKNOWN");
    }

    #[test]
    fn names() {
        assert_eq!(command_name(0x01), "PING");
        assert_eq!(command_name(0x4F), "BUFFER_TRANSFER_COMPLETE");
        assert_eq!(CommandId::LogMessage.to_string(), "LOG_MESSAGE");
    }

    #[test]
    fn wire_values() {
        assert_eq!(u8::from(CommandId::ConfigureStream), 0x14);
        assert_eq!(CommandId::Nack.code(), 0x91);
        assert_eq!(CommandId::RequestBufferedData.code(), 0x42);
    }
}
