//! Transport layer abstraction.
//!
//! Defines the collaborator interfaces the shell drives:
//! - `ScsiTransport`: raw ASPI-style passthrough
//! - `SmdiTransport`: SMDI sample dump protocol over SCSI
//!
//! Every call is synchronous and blocking. Implementations own retries and
//! timeouts; the shell never retries.

use std::path::Path;

use thiserror::Error;

use crate::address::{DeviceAddress, SampleHandle};
use crate::protocol::SmdiMessage;
use crate::sample::SampleHeader;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No device at {0}")]
    NoDevice(DeviceAddress),

    #[error("Device {0} not ready")]
    NotReady(DeviceAddress),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identification returned by an SMDI device-info query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: u8,
    pub vendor: String,
    pub product: String,
    /// Whether the device speaks SMDI.
    pub smdi: bool,
}

/// Parameters of one file-oriented sample transfer.
#[derive(Debug, Clone, Copy)]
pub struct FileTransfer<'a> {
    pub handle: SampleHandle,
    /// Native-form file to read (send) or write (receive).
    pub path: &'a Path,
    /// Name to store the sample under (send only).
    pub sample_name: Option<&'a str>,
    /// Background transfer. The shell always transfers synchronously.
    pub asynchronous: bool,
}

/// Packet accounting reported while a file transfer is running.
#[derive(Debug, Clone)]
pub struct TransmissionInfo {
    /// Header of the sample being moved.
    pub header: SampleHeader,
    pub packet_size: u32,
    /// Cumulative packets transmitted so far.
    pub transmitted_packets: u32,
}

/// Receives packet updates during a blocking file transfer.
pub trait TransferMonitor {
    fn packets(&mut self, info: &TransmissionInfo);
}

/// Raw SCSI passthrough.
pub trait ScsiTransport {
    /// Whether the passthrough layer is usable at all.
    fn is_available(&self) -> bool;

    /// Peripheral device type at `addr`, or [`NO_DEVICE`](crate::protocol::NO_DEVICE).
    fn device_type(&self, addr: DeviceAddress) -> u8;

    /// TEST UNIT READY.
    fn test_unit_ready(&self, addr: DeviceAddress) -> bool;

    /// Standard INQUIRY data.
    fn inquire(&self, addr: DeviceAddress) -> Result<Vec<u8>, TransportError>;

    /// Write `data` to the device; returns bytes accepted.
    fn send(&self, addr: DeviceAddress, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` bytes; returns bytes received.
    fn receive(&self, addr: DeviceAddress, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// SMDI sample transport.
pub trait SmdiTransport {
    /// Initialize the SMDI layer; false if it is unusable.
    fn init(&self) -> bool;

    /// SMDI-level unit ready check.
    fn unit_ready(&self, addr: DeviceAddress) -> bool;

    fn device_info(&self, addr: DeviceAddress) -> Result<DeviceInfo, TransportError>;

    /// Sample Header Request. A reply other than
    /// [`SmdiMessage::SampleHeader`] means no header was delivered.
    fn sample_header_request(
        &self,
        handle: SampleHandle,
    ) -> Result<(SmdiMessage, SampleHeader), TransportError>;

    /// Upload a native-form file. Returns the terminal message.
    fn send_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError>;

    /// Download a sample into a native-form file. Returns the terminal message.
    fn receive_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError>;

    fn delete_sample(&self, handle: SampleHandle) -> Result<SmdiMessage, TransportError>;

    /// Error code attached to the most recent Message Reject.
    fn last_error(&self) -> u32;

    /// Toggle transport-level debug tracing.
    fn set_debug(&self, _enabled: bool) {}
}

/// A transport usable by both shell variants.
pub trait Backend: ScsiTransport + SmdiTransport {}

impl<T: ScsiTransport + SmdiTransport> Backend for T {}
