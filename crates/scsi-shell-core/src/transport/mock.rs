//! Mock transport for testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::traits::{
    DeviceInfo, FileTransfer, ScsiTransport, SmdiTransport, TransferMonitor, TransmissionInfo,
    TransportError,
};
use crate::address::{DeviceAddress, SampleHandle};
use crate::protocol::constants::{NO_DEVICE, SMDIE_NO_SAMPLE};
use crate::protocol::SmdiMessage;
use crate::sample::{Sample, SampleHeader, native};

/// A scripted sample download.
#[derive(Debug, Clone)]
pub struct ScriptedDownload {
    pub sample: Sample,
    /// Terminal message to return.
    pub reply: SmdiMessage,
    /// Number of packet updates to report.
    pub packets: u32,
    pub packet_size: u32,
    /// Whether the native file gets written before the reply.
    pub write_file: bool,
}

/// A file the mock received through `send_file`.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub handle: SampleHandle,
    pub sample_name: Option<String>,
    pub data: Vec<u8>,
}

/// Mock transport for unit testing shell and session logic.
///
/// Responses are scripted per address or sample slot, and every call is
/// appended to a log so tests can assert that nothing reached the device.
pub struct MockTransport {
    available: Mutex<bool>,
    device_types: Mutex<HashMap<DeviceAddress, u8>>,
    ready: Mutex<HashSet<DeviceAddress>>,
    inquiry: Mutex<HashMap<DeviceAddress, Vec<u8>>>,
    device_info: Mutex<HashMap<DeviceAddress, DeviceInfo>>,
    send_accepts: Mutex<bool>,
    receive_data: Mutex<Vec<u8>>,
    /// Header replies per slot; the last one repeats.
    headers: Mutex<HashMap<SampleHandle, VecDeque<SampleHeader>>>,
    delete_reply: Mutex<SmdiMessage>,
    last_error: Mutex<u32>,
    download: Mutex<Option<ScriptedDownload>>,
    upload_reply: Mutex<SmdiMessage>,
    uploads: Mutex<Vec<UploadRecord>>,
    sent: Mutex<Vec<Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            device_types: Mutex::new(HashMap::new()),
            ready: Mutex::new(HashSet::new()),
            inquiry: Mutex::new(HashMap::new()),
            device_info: Mutex::new(HashMap::new()),
            send_accepts: Mutex::new(true),
            receive_data: Mutex::new(Vec::new()),
            headers: Mutex::new(HashMap::new()),
            delete_reply: Mutex::new(SmdiMessage::Ack),
            last_error: Mutex::new(0),
            download: Mutex::new(None),
            upload_reply: Mutex::new(SmdiMessage::EndOfProcedure),
            uploads: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }

    /// Place a ready device at `addr` with the given type and INQUIRY data.
    pub fn add_device(&self, addr: DeviceAddress, device_type: u8, inquiry: &[u8]) {
        self.device_types.lock().unwrap().insert(addr, device_type);
        self.inquiry.lock().unwrap().insert(addr, inquiry.to_vec());
        self.ready.lock().unwrap().insert(addr);
    }

    /// Place a ready SMDI-level device at `addr`.
    pub fn add_smdi_device(&self, addr: DeviceAddress, info: DeviceInfo) {
        self.ready.lock().unwrap().insert(addr);
        self.device_info.lock().unwrap().insert(addr, info);
    }

    pub fn set_ready(&self, addr: DeviceAddress, ready: bool) {
        let mut set = self.ready.lock().unwrap();
        if ready {
            set.insert(addr);
        } else {
            set.remove(&addr);
        }
    }

    pub fn set_send_accepts(&self, accepts: bool) {
        *self.send_accepts.lock().unwrap() = accepts;
    }

    /// Bytes handed out by `receive`.
    pub fn set_receive_data(&self, data: &[u8]) {
        *self.receive_data.lock().unwrap() = data.to_vec();
    }

    /// Reply to every header request for `handle` with `header`.
    pub fn set_header(&self, handle: SampleHandle, header: SampleHeader) {
        self.queue_headers(handle, vec![header]);
    }

    /// Reply to successive header requests with `headers`; the last repeats.
    pub fn queue_headers(&self, handle: SampleHandle, headers: Vec<SampleHeader>) {
        self.headers
            .lock()
            .unwrap()
            .insert(handle, headers.into_iter().collect());
    }

    pub fn set_delete_reply(&self, reply: SmdiMessage, last_error: u32) {
        *self.delete_reply.lock().unwrap() = reply;
        *self.last_error.lock().unwrap() = last_error;
    }

    pub fn script_download(&self, download: ScriptedDownload) {
        *self.download.lock().unwrap() = Some(download);
    }

    pub fn set_upload_reply(&self, reply: SmdiMessage) {
        *self.upload_reply.lock().unwrap() = reply;
    }

    /// Files received through `send_file`.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().unwrap().clone()
    }

    /// Payloads received through raw `send`.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Every transport call made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn is_ready(&self, addr: DeviceAddress) -> bool {
        self.ready.lock().unwrap().contains(&addr)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiTransport for MockTransport {
    fn is_available(&self) -> bool {
        self.record("check".into());
        *self.available.lock().unwrap()
    }

    fn device_type(&self, addr: DeviceAddress) -> u8 {
        self.record(format!("device_type {}", addr));
        self.device_types
            .lock()
            .unwrap()
            .get(&addr)
            .copied()
            .unwrap_or(NO_DEVICE)
    }

    fn test_unit_ready(&self, addr: DeviceAddress) -> bool {
        self.record(format!("ready {}", addr));
        self.is_ready(addr)
    }

    fn inquire(&self, addr: DeviceAddress) -> Result<Vec<u8>, TransportError> {
        self.record(format!("inquire {}", addr));
        self.inquiry
            .lock()
            .unwrap()
            .get(&addr)
            .cloned()
            .ok_or(TransportError::NoDevice(addr))
    }

    fn send(&self, addr: DeviceAddress, data: &[u8]) -> Result<usize, TransportError> {
        self.record(format!("send {} {}", addr, data.len()));
        self.sent.lock().unwrap().push(data.to_vec());
        if *self.send_accepts.lock().unwrap() {
            Ok(data.len())
        } else {
            Ok(0)
        }
    }

    fn receive(&self, addr: DeviceAddress, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.record(format!("receive {} {}", addr, buf.len()));
        let data = self.receive_data.lock().unwrap();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

impl SmdiTransport for MockTransport {
    fn init(&self) -> bool {
        self.record("init".into());
        *self.available.lock().unwrap()
    }

    fn unit_ready(&self, addr: DeviceAddress) -> bool {
        self.record(format!("smdi_ready {}", addr));
        self.is_ready(addr)
    }

    fn device_info(&self, addr: DeviceAddress) -> Result<DeviceInfo, TransportError> {
        self.record(format!("device_info {}", addr));
        self.device_info
            .lock()
            .unwrap()
            .get(&addr)
            .cloned()
            .ok_or(TransportError::NoDevice(addr))
    }

    fn sample_header_request(
        &self,
        handle: SampleHandle,
    ) -> Result<(SmdiMessage, SampleHeader), TransportError> {
        self.record(format!("header {}", handle));
        let mut headers = self.headers.lock().unwrap();
        let Some(queue) = headers.get_mut(&handle) else {
            *self.last_error.lock().unwrap() = SMDIE_NO_SAMPLE;
            return Ok((SmdiMessage::MessageReject, SampleHeader::default()));
        };
        let header = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok((SmdiMessage::SampleHeader, header.unwrap_or_default()))
    }

    fn send_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        self.record(format!("send_file {}", transfer.handle));
        let data = std::fs::read(transfer.path)?;

        let header = native::from_bytes(&data)
            .map(|s| s.header())
            .unwrap_or_default();
        let packet_size = 1024u32;
        let packets = (data.len() as u32).div_ceil(packet_size);
        for p in 1..=packets {
            monitor.packets(&TransmissionInfo {
                header: header.clone(),
                packet_size,
                transmitted_packets: p,
            });
        }

        self.uploads.lock().unwrap().push(UploadRecord {
            handle: transfer.handle,
            sample_name: transfer.sample_name.map(str::to_string),
            data,
        });
        Ok(*self.upload_reply.lock().unwrap())
    }

    fn receive_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        self.record(format!("receive_file {}", transfer.handle));
        let Some(script) = self.download.lock().unwrap().clone() else {
            *self.last_error.lock().unwrap() = SMDIE_NO_SAMPLE;
            return Ok(SmdiMessage::MessageReject);
        };

        let header = script.sample.header();
        for p in 1..=script.packets {
            monitor.packets(&TransmissionInfo {
                header: header.clone(),
                packet_size: script.packet_size,
                transmitted_packets: p,
            });
        }
        if script.write_file {
            native::save(&script.sample, transfer.path)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        }
        Ok(script.reply)
    }

    fn delete_sample(&self, handle: SampleHandle) -> Result<SmdiMessage, TransportError> {
        self.record(format!("delete {}", handle));
        Ok(*self.delete_reply.lock().unwrap())
    }

    fn last_error(&self) -> u32 {
        *self.last_error.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_header_queue() {
        let mock = MockTransport::new();
        let handle = DeviceAddress::new(0, 2).sample(5);
        let present = SampleHeader {
            exists: true,
            ..Default::default()
        };
        mock.queue_headers(handle, vec![present.clone(), SampleHeader::default()]);

        let (msg, first) = mock.sample_header_request(handle).unwrap();
        assert_eq!(msg, SmdiMessage::SampleHeader);
        assert!(first.exists);

        // The last queued reply repeats
        assert!(!mock.sample_header_request(handle).unwrap().1.exists);
        assert!(!mock.sample_header_request(handle).unwrap().1.exists);
    }

    #[test]
    fn test_mock_unknown_slot_rejects() {
        let mock = MockTransport::new();
        let (msg, _) = mock
            .sample_header_request(DeviceAddress::new(0, 2).sample(1))
            .unwrap();
        assert_eq!(msg, SmdiMessage::MessageReject);
        assert_eq!(mock.last_error(), SMDIE_NO_SAMPLE);
    }

    #[test]
    fn test_mock_call_log() {
        let mock = MockTransport::new();
        let addr = DeviceAddress::new(1, 3);
        assert_eq!(mock.device_type(addr), NO_DEVICE);
        mock.send(addr, b"abc").unwrap();

        let calls = mock.calls();
        assert_eq!(calls, vec!["device_type 1:3", "send 1:3 3"]);
        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }
}
