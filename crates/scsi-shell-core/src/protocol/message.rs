//! SMDI message and reject-reason codes.
//!
//! The transport reports every SMDI exchange as a 32-bit message id
//! (`message << 16 | sub-message`). When the device answers with a
//! Message Reject, the reason is fetched separately as an error code.

use std::fmt;

use super::constants::*;

/// Decoded SMDI message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmdiMessage {
    Error,
    MasterIdentify,
    SlaveIdentify,
    MessageReject,
    Ack,
    Nak,
    Wait,
    SendNextPacket,
    EndOfProcedure,
    AbortProcedure,
    DataPacket,
    SampleHeaderRequest,
    SampleHeader,
    BeginSampleTransfer,
    SampleName,
    DeleteSample,
    TransmitMidiMessage,
    /// Anything the table above does not know.
    Unknown(u32),
}

impl SmdiMessage {
    pub fn from_code(code: u32) -> Self {
        match code {
            SMDIM_ERROR => Self::Error,
            SMDIM_MASTER_IDENTIFY => Self::MasterIdentify,
            SMDIM_SLAVE_IDENTIFY => Self::SlaveIdentify,
            SMDIM_MESSAGE_REJECT => Self::MessageReject,
            SMDIM_ACK => Self::Ack,
            SMDIM_NAK => Self::Nak,
            SMDIM_WAIT => Self::Wait,
            SMDIM_SEND_NEXT_PACKET => Self::SendNextPacket,
            SMDIM_END_OF_PROCEDURE => Self::EndOfProcedure,
            SMDIM_ABORT_PROCEDURE => Self::AbortProcedure,
            SMDIM_DATA_PACKET => Self::DataPacket,
            SMDIM_SAMPLE_HEADER_REQUEST => Self::SampleHeaderRequest,
            SMDIM_SAMPLE_HEADER => Self::SampleHeader,
            SMDIM_BEGIN_SAMPLE_TRANSFER => Self::BeginSampleTransfer,
            SMDIM_SAMPLE_NAME => Self::SampleName,
            SMDIM_DELETE_SAMPLE => Self::DeleteSample,
            SMDIM_TRANSMIT_MIDI_MESSAGE => Self::TransmitMidiMessage,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Error => SMDIM_ERROR,
            Self::MasterIdentify => SMDIM_MASTER_IDENTIFY,
            Self::SlaveIdentify => SMDIM_SLAVE_IDENTIFY,
            Self::MessageReject => SMDIM_MESSAGE_REJECT,
            Self::Ack => SMDIM_ACK,
            Self::Nak => SMDIM_NAK,
            Self::Wait => SMDIM_WAIT,
            Self::SendNextPacket => SMDIM_SEND_NEXT_PACKET,
            Self::EndOfProcedure => SMDIM_END_OF_PROCEDURE,
            Self::AbortProcedure => SMDIM_ABORT_PROCEDURE,
            Self::DataPacket => SMDIM_DATA_PACKET,
            Self::SampleHeaderRequest => SMDIM_SAMPLE_HEADER_REQUEST,
            Self::SampleHeader => SMDIM_SAMPLE_HEADER,
            Self::BeginSampleTransfer => SMDIM_BEGIN_SAMPLE_TRANSFER,
            Self::SampleName => SMDIM_SAMPLE_NAME,
            Self::DeleteSample => SMDIM_DELETE_SAMPLE,
            Self::TransmitMidiMessage => SMDIM_TRANSMIT_MIDI_MESSAGE,
            Self::Unknown(code) => *code,
        }
    }

    /// Terminal codes that mean a procedure finished successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ack | Self::EndOfProcedure)
    }
}

impl fmt::Display for SmdiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.code())
    }
}

/// Reason attached to a Message Reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmdiError {
    /// Sample number out of range.
    OutOfRange,
    /// No sample at the given number.
    NoSample,
    /// Device ran out of sample memory.
    NoMemory,
    /// Bits-per-word not supported by the device.
    UnsupportedSampleBits,
    Other(u32),
}

impl SmdiError {
    pub fn from_code(code: u32) -> Self {
        match code {
            SMDIE_OUT_OF_RANGE => Self::OutOfRange,
            SMDIE_NO_SAMPLE => Self::NoSample,
            SMDIE_NO_MEMORY => Self::NoMemory,
            SMDIE_UNSUPPORTED_SAMPLE_BITS => Self::UnsupportedSampleBits,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::OutOfRange => SMDIE_OUT_OF_RANGE,
            Self::NoSample => SMDIE_NO_SAMPLE,
            Self::NoMemory => SMDIE_NO_MEMORY,
            Self::UnsupportedSampleBits => SMDIE_UNSUPPORTED_SAMPLE_BITS,
            Self::Other(code) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_codes() {
        for code in [
            SMDIM_ACK,
            SMDIM_END_OF_PROCEDURE,
            SMDIM_MESSAGE_REJECT,
            SMDIM_SAMPLE_HEADER,
        ] {
            assert_eq!(SmdiMessage::from_code(code).code(), code);
        }
        assert_eq!(
            SmdiMessage::from_code(0xDEAD_0000),
            SmdiMessage::Unknown(0xDEAD_0000)
        );
    }

    #[test]
    fn test_success_codes() {
        assert!(SmdiMessage::Ack.is_success());
        assert!(SmdiMessage::EndOfProcedure.is_success());
        assert!(!SmdiMessage::MessageReject.is_success());
        assert!(!SmdiMessage::Nak.is_success());
    }

    #[test]
    fn test_message_display() {
        assert_eq!(SmdiMessage::EndOfProcedure.to_string(), "0x01040000");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SmdiError::from_code(SMDIE_NO_SAMPLE), SmdiError::NoSample);
        assert_eq!(SmdiError::from_code(0x1234), SmdiError::Other(0x1234));
        assert_eq!(SmdiError::NoMemory.code(), SMDIE_NO_MEMORY);
    }
}
