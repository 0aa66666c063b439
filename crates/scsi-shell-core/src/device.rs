//! Device sessions.
//!
//! Thin, blocking wrappers over the transports. Each operation is a single
//! transport call (or a fixed sequence of them for scans and listings) keyed
//! by [`DeviceAddress`]. Sentinel values coming back from the transport are
//! turned into `Option`/`Result` here so the shell never sees them.

use tracing::{debug, instrument, warn};

use crate::address::{DeviceAddress, SampleHandle};
use crate::protocol::constants::*;
use crate::protocol::{InquiryData, SmdiError, SmdiMessage};
use crate::sample::SampleHeader;
use crate::transport::{
    DeviceInfo, FileTransfer, ScsiTransport, SmdiTransport, TransferMonitor, TransportError,
};

/// Slots probed by a scan: 0..16 without the adapter's own id.
pub fn scan_slots() -> impl Iterator<Item = u8> {
    (0..SCAN_SLOTS).filter(|&id| id != ADAPTER_SLOT)
}

/// One device found by a raw scan.
#[derive(Debug, Clone)]
pub struct ScanRow {
    pub scsi_id: u8,
    pub device_type: u8,
    pub inquiry: InquiryData,
}

/// Raw SCSI session.
pub struct ScsiSession<'a, T: ScsiTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: ScsiTransport + ?Sized> ScsiSession<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    pub fn check(&self) -> bool {
        let available = self.transport.is_available();
        debug!(available, "Transport check");
        available
    }

    /// Probe every slot on `host_adapter` in ascending order.
    #[instrument(level = "debug", skip(self))]
    pub fn scan(&self, host_adapter: u8) -> Vec<ScanRow> {
        scan_slots()
            .filter_map(|scsi_id| {
                let addr = DeviceAddress::new(host_adapter, scsi_id);
                let device_type = self.transport.device_type(addr);
                if device_type == NO_DEVICE {
                    return None;
                }
                let inquiry = match self.transport.inquire(addr) {
                    Ok(raw) => InquiryData::from_bytes(&raw),
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "Inquiry failed during scan");
                        InquiryData::from_bytes(&[])
                    }
                };
                Some(ScanRow {
                    scsi_id,
                    device_type,
                    inquiry,
                })
            })
            .collect()
    }

    pub fn ready(&self, addr: DeviceAddress) -> bool {
        self.transport.test_unit_ready(addr)
    }

    #[instrument(level = "debug", skip(self), fields(addr = %addr))]
    pub fn inquire(&self, addr: DeviceAddress) -> Result<InquiryData, TransportError> {
        let raw = self.transport.inquire(addr)?;
        Ok(InquiryData::from_bytes(&raw))
    }

    /// Send `data`. Zero bytes accepted counts as a failure.
    #[instrument(level = "debug", skip(self, data), fields(addr = %addr, len = data.len()))]
    pub fn send(&self, addr: DeviceAddress, data: &[u8]) -> Result<usize, TransportError> {
        match self.transport.send(addr, data)? {
            0 => Err(TransportError::SendFailed(format!(
                "device {} accepted no data",
                addr
            ))),
            n => Ok(n),
        }
    }

    /// Receive into `buf`. Zero bytes received counts as a failure.
    #[instrument(level = "debug", skip(self, buf), fields(addr = %addr, len = buf.len()))]
    pub fn receive(&self, addr: DeviceAddress, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.transport.receive(addr, buf)? {
            0 => Err(TransportError::ReceiveFailed(format!(
                "device {} returned no data",
                addr
            ))),
            n => Ok(n),
        }
    }
}

/// One device found by an SMDI scan.
#[derive(Debug, Clone)]
pub struct SmdiScanRow {
    pub scsi_id: u8,
    pub info: DeviceInfo,
}

/// A filled sample slot found by [`SmdiSession::list`].
#[derive(Debug, Clone)]
pub struct ListedSample {
    pub sample_id: u32,
    pub header: SampleHeader,
}

/// Protocol-level answer to a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Acknowledged,
    EndOfProcedure,
    /// Message Reject with the reason reported by the device.
    Rejected(SmdiError),
    /// Any other reply.
    Unexpected(SmdiMessage),
}

/// SMDI sample session.
pub struct SmdiSession<'a, T: SmdiTransport + ?Sized> {
    transport: &'a T,
    max_samples: u32,
}

impl<'a, T: SmdiTransport + ?Sized> SmdiSession<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            max_samples: MAX_SAMPLES,
        }
    }

    /// Limit listings to the first `max_samples` slots.
    pub fn with_max_samples(mut self, max_samples: u32) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn init(&self) -> bool {
        let available = self.transport.init();
        debug!(available, "SMDI init");
        available
    }

    /// Probe every slot on `host_adapter`; a slot is present when it
    /// reports ready.
    #[instrument(level = "debug", skip(self))]
    pub fn scan(&self, host_adapter: u8) -> Vec<SmdiScanRow> {
        scan_slots()
            .filter_map(|scsi_id| {
                let addr = DeviceAddress::new(host_adapter, scsi_id);
                if !self.transport.unit_ready(addr) {
                    return None;
                }
                let info = self.transport.device_info(addr).unwrap_or_else(|e| {
                    warn!(addr = %addr, error = %e, "Device info failed during scan");
                    DeviceInfo::default()
                });
                Some(SmdiScanRow { scsi_id, info })
            })
            .collect()
    }

    /// Header of `handle`, or `None` if the slot is empty or the device did
    /// not answer with a header.
    #[instrument(level = "debug", skip(self), fields(handle = %handle))]
    pub fn sample_header(
        &self,
        handle: SampleHandle,
    ) -> Result<Option<SampleHeader>, TransportError> {
        let (reply, header) = self.transport.sample_header_request(handle)?;
        if reply != SmdiMessage::SampleHeader {
            debug!(reply = %reply, "No header delivered");
            return Ok(None);
        }
        Ok(header.exists.then_some(header))
    }

    /// Every filled slot on `addr`, in ascending slot order.
    #[instrument(level = "debug", skip(self), fields(addr = %addr))]
    pub fn list(&self, addr: DeviceAddress) -> Result<Vec<ListedSample>, TransportError> {
        let mut found = Vec::new();
        for sample_id in 0..self.max_samples {
            if let Some(header) = self.sample_header(addr.sample(sample_id))? {
                found.push(ListedSample { sample_id, header });
            }
        }
        Ok(found)
    }

    #[instrument(level = "debug", skip(self), fields(handle = %handle))]
    pub fn delete(&self, handle: SampleHandle) -> Result<DeleteOutcome, TransportError> {
        let reply = self.transport.delete_sample(handle)?;
        let outcome = match reply {
            SmdiMessage::Ack => DeleteOutcome::Acknowledged,
            SmdiMessage::EndOfProcedure => DeleteOutcome::EndOfProcedure,
            SmdiMessage::MessageReject => {
                let code = self.transport.last_error();
                warn!(code = %format!("0x{:08X}", code), "Delete rejected");
                DeleteOutcome::Rejected(SmdiError::from_code(code))
            }
            other => DeleteOutcome::Unexpected(other),
        };
        Ok(outcome)
    }

    pub fn send_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        debug!(handle = %transfer.handle, path = %transfer.path.display(), "Send file");
        self.transport.send_file(transfer, monitor)
    }

    pub fn receive_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        debug!(handle = %transfer.handle, path = %transfer.path.display(), "Receive file");
        self.transport.receive_file(transfer, monitor)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.transport.set_debug(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_scan_order_and_count() {
        let mock = MockTransport::new();
        let inquiry = InquiryData::build(0x05, "TOSHIBA", "CD-ROM XM-3401", "3593");
        for id in [12, 3, 7, 0] {
            mock.add_device(DeviceAddress::new(1, id), 0x05, inquiry.raw());
        }

        let rows = ScsiSession::new(&mock).scan(1);
        let ids: Vec<u8> = rows.iter().map(|r| r.scsi_id).collect();
        assert_eq!(ids, vec![0, 3, 12]);
        assert_eq!(rows[0].inquiry.vendor(), "TOSHIBA ");

        let probes = mock
            .calls()
            .iter()
            .filter(|c| c.starts_with("device_type"))
            .count();
        assert_eq!(probes, 15);
        assert!(!mock.calls().contains(&"device_type 1:7".to_string()));
    }

    #[test]
    fn test_zero_byte_transfers_fail() {
        let mock = MockTransport::new();
        let addr = DeviceAddress::new(0, 1);
        mock.add_device(addr, 0x03, &[]);
        let session = ScsiSession::new(&mock);

        mock.set_send_accepts(false);
        assert!(matches!(
            session.send(addr, &[1, 2, 3]),
            Err(TransportError::SendFailed(_))
        ));

        mock.set_receive_data(&[]);
        let mut buf = [0u8; 8];
        assert!(matches!(
            session.receive(addr, &mut buf),
            Err(TransportError::ReceiveFailed(_))
        ));

        mock.set_receive_data(&[9, 8, 7]);
        assert_eq!(session.receive(addr, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[9, 8, 7]);
    }

    #[test]
    fn test_smdi_scan_uses_ready() {
        let mock = MockTransport::new();
        let addr = DeviceAddress::new(0, 4);
        mock.add_smdi_device(
            addr,
            DeviceInfo {
                device_type: 0x03,
                vendor: "AKAI".into(),
                product: "S3000".into(),
                smdi: true,
            },
        );
        let rows = SmdiSession::new(&mock).scan(0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scsi_id, 4);
        assert!(rows[0].info.smdi);
    }

    #[test]
    fn test_list_skips_empty_slots() {
        let mock = MockTransport::new();
        let addr = DeviceAddress::new(0, 2);
        let header = |name: &str| SampleHeader {
            exists: true,
            name: name.into(),
            period_ns: 22675,
            length: 10,
            channels: 1,
            bits_per_word: 16,
            ..Default::default()
        };
        mock.set_header(addr.sample(1), header("One"));
        mock.set_header(addr.sample(6), header("Six"));
        mock.set_header(addr.sample(7), SampleHeader::default());

        let listed = SmdiSession::new(&mock)
            .with_max_samples(16)
            .list(addr)
            .unwrap();
        let ids: Vec<u32> = listed.iter().map(|s| s.sample_id).collect();
        assert_eq!(ids, vec![1, 6]);
        assert_eq!(listed[1].header.name, "Six");
    }

    #[test]
    fn test_delete_outcomes() {
        let mock = MockTransport::new();
        let handle = DeviceAddress::new(0, 2).sample(3);
        let session = SmdiSession::new(&mock);

        mock.set_delete_reply(SmdiMessage::Ack, 0);
        assert_eq!(session.delete(handle).unwrap(), DeleteOutcome::Acknowledged);

        mock.set_delete_reply(SmdiMessage::MessageReject, SMDIE_NO_MEMORY);
        assert_eq!(
            session.delete(handle).unwrap(),
            DeleteOutcome::Rejected(SmdiError::NoMemory)
        );

        mock.set_delete_reply(SmdiMessage::Nak, 0);
        assert_eq!(
            session.delete(handle).unwrap(),
            DeleteOutcome::Unexpected(SmdiMessage::Nak)
        );
    }
}
