//! Simulated SCSI bus.
//!
//! Stands in for the host adapter when no passthrough driver is present.
//! Devices and their sample memory are described in a TOML bus file:
//!
//! ```toml
//! [[device]]
//! host_adapter = 0
//! scsi_id = 2
//! device_type = 3
//! vendor = "E-MU"
//! product = "E4XT Ultra"
//! smdi = true
//!
//! [[device.sample]]
//! id = 0
//! name = "Piano C3"
//! length = 44100
//! ```
//!
//! Raw `receive` echoes the last payload sent to the same device, or an
//! incrementing byte pattern before anything was sent.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::traits::{
    DeviceInfo, FileTransfer, ScsiTransport, SmdiTransport, TransferMonitor, TransmissionInfo,
    TransportError,
};
use crate::address::{DeviceAddress, SampleHandle};
use crate::protocol::constants::*;
use crate::protocol::{InquiryData, SmdiMessage};
use crate::sample::{LoopControl, Sample, SampleHeader, native};

const PACKET_SIZE: u32 = 4096;

fn default_true() -> bool {
    true
}

fn default_device_type() -> u8 {
    0x03 // processor, as samplers report themselves
}

fn default_slots() -> u32 {
    MAX_SAMPLES
}

fn default_bits() -> Vec<u16> {
    vec![8, 16]
}

fn default_rate() -> u32 {
    44100
}

fn default_sample_bits() -> u16 {
    16
}

fn default_channels() -> u16 {
    1
}

fn default_pitch() -> u16 {
    60
}

/// Whole-bus description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Whether the passthrough layer reports itself available.
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            available: true,
            devices: Vec::new(),
        }
    }
}

/// One target on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub host_adapter: u8,
    pub scsi_id: u8,
    #[serde(default = "default_device_type")]
    pub device_type: u8,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default = "default_true")]
    pub ready: bool,
    #[serde(default)]
    pub smdi: bool,
    /// Number of addressable sample slots.
    #[serde(default = "default_slots")]
    pub sample_slots: u32,
    /// Sample memory in bytes; unlimited when absent.
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    #[serde(default = "default_bits")]
    pub supported_bits: Vec<u16>,
    /// Reject deletes with "no sample" even though the sample was removed.
    #[serde(default)]
    pub ambiguous_delete: bool,
    #[serde(default, rename = "sample")]
    pub samples: Vec<SampleConfig>,
}

/// A sample preloaded into a simulated device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_sample_bits")]
    pub bits: u16,
    #[serde(default = "default_channels")]
    pub channels: u16,
    pub length: u32,
    #[serde(default = "default_pitch")]
    pub pitch: u16,
    #[serde(default)]
    pub pitch_fraction: i16,
    #[serde(default)]
    pub loop_control: LoopControl,
    #[serde(default)]
    pub loop_start: u32,
    #[serde(default)]
    pub loop_end: u32,
}

impl SampleConfig {
    /// Reject formats [`Sample`] cannot hold.
    fn check(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=32).contains(&self.bits),
            "sample {} ({}): {} bits per sample, expected 1-32",
            self.id,
            self.name,
            self.bits
        );
        anyhow::ensure!(
            self.channels > 0,
            "sample {} ({}): zero channels",
            self.id,
            self.name
        );
        Ok(())
    }

    /// Materialize the sample with a triangle waveform.
    fn to_sample(&self) -> Sample {
        let bytes_per_word = (self.bits as usize).div_ceil(8);
        let words = self.length as usize * self.channels as usize;
        let mut data = Vec::with_capacity(words * bytes_per_word);
        for i in 0..words {
            let phase = (i % 256) as i64;
            let tri = if phase < 128 { phase } else { 255 - phase } - 64;
            let word = (tri << (self.bits.saturating_sub(8) as i64)).to_be_bytes();
            data.extend_from_slice(&word[8 - bytes_per_word..]);
        }
        Sample {
            name: self.name.clone(),
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits,
            channels: self.channels,
            sample_count: self.length,
            pitch: self.pitch,
            pitch_fraction: self.pitch_fraction,
            loop_control: self.loop_control,
            loop_start: self.loop_start,
            loop_end: self.loop_end,
            data,
        }
    }
}

impl BusConfig {
    /// Load a bus description from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BusConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every preloaded sample's format.
    pub fn validate(&self) -> Result<()> {
        for dev in &self.devices {
            for sample in &dev.samples {
                sample.check().map_err(|e| {
                    e.context(format!(
                        "device {}:{}",
                        dev.host_adapter, dev.scsi_id
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Save the bus description as TOML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// A small bus: a disk at 0:0 and an SMDI sampler at 0:2.
    pub fn demo() -> Self {
        let sample = |id: u32, name: &str, length: u32, loop_control: LoopControl| SampleConfig {
            id,
            name: name.to_string(),
            sample_rate: 44100,
            bits: 16,
            channels: 1,
            length,
            pitch: 60,
            pitch_fraction: 0,
            loop_control,
            loop_start: if loop_control.is_looped() { length / 4 } else { 0 },
            loop_end: if loop_control.is_looped() { length - 1 } else { 0 },
        };
        Self {
            available: true,
            devices: vec![
                DeviceConfig {
                    host_adapter: 0,
                    scsi_id: 0,
                    device_type: 0x00,
                    vendor: "SGI".into(),
                    product: "IBM DDRS-34560".into(),
                    revision: "S97B".into(),
                    ready: true,
                    smdi: false,
                    sample_slots: 0,
                    memory_bytes: None,
                    supported_bits: Vec::new(),
                    ambiguous_delete: false,
                    samples: Vec::new(),
                },
                DeviceConfig {
                    host_adapter: 0,
                    scsi_id: 2,
                    device_type: 0x03,
                    vendor: "E-MU".into(),
                    product: "E4XT Ultra".into(),
                    revision: "4.70".into(),
                    ready: true,
                    smdi: true,
                    sample_slots: MAX_SAMPLES,
                    memory_bytes: Some(16 * 1024 * 1024),
                    supported_bits: default_bits(),
                    ambiguous_delete: false,
                    samples: vec![
                        sample(0, "Piano C3", 44100, LoopControl::None),
                        sample(1, "Strings Pad", 88200, LoopControl::Forward),
                        sample(5, "Kick 909", 11025, LoopControl::None),
                    ],
                },
            ],
        }
    }
}

#[derive(Debug)]
struct SimDevice {
    config: DeviceConfig,
    samples: BTreeMap<u32, Sample>,
    /// Last raw payload, echoed by `receive`.
    loopback: Vec<u8>,
}

impl SimDevice {
    fn memory_used(&self) -> u64 {
        self.samples.values().map(|s| s.data.len() as u64).sum()
    }
}

#[derive(Debug, Default)]
struct BusState {
    devices: BTreeMap<(u8, u8), SimDevice>,
    last_error: u32,
    debug: bool,
}

/// In-memory SCSI bus implementing both transports.
#[derive(Debug)]
pub struct SimulatedBus {
    available: bool,
    state: Mutex<BusState>,
}

impl SimulatedBus {
    pub fn new(config: BusConfig) -> Self {
        let devices = config
            .devices
            .into_iter()
            .map(|dev| {
                let samples = dev
                    .samples
                    .iter()
                    .filter(|s| match s.check() {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(error = %e, "Skipping sample");
                            false
                        }
                    })
                    .map(|s| (s.id, s.to_sample()))
                    .collect();
                (
                    (dev.host_adapter, dev.scsi_id),
                    SimDevice {
                        config: dev,
                        samples,
                        loopback: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            available: config.available,
            state: Mutex::new(BusState {
                devices,
                ..Default::default()
            }),
        }
    }

    fn with_device<R>(
        &self,
        addr: DeviceAddress,
        f: impl FnOnce(&mut SimDevice, &mut u32) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock().ok()?;
        let BusState {
            devices,
            last_error,
            ..
        } = &mut *state;
        devices
            .get_mut(&(addr.host_adapter, addr.scsi_id))
            .map(|dev| f(dev, last_error))
    }

    fn debug_enabled(&self) -> bool {
        self.state.lock().map(|s| s.debug).unwrap_or(false)
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new(BusConfig::demo())
    }
}

impl ScsiTransport for SimulatedBus {
    fn is_available(&self) -> bool {
        self.available
    }

    #[instrument(level = "debug", skip(self), fields(addr = %addr))]
    fn device_type(&self, addr: DeviceAddress) -> u8 {
        self.with_device(addr, |dev, _| dev.config.device_type)
            .unwrap_or(NO_DEVICE)
    }

    #[instrument(level = "debug", skip(self), fields(addr = %addr))]
    fn test_unit_ready(&self, addr: DeviceAddress) -> bool {
        self.with_device(addr, |dev, _| dev.config.ready)
            .unwrap_or(false)
    }

    #[instrument(level = "debug", skip(self), fields(addr = %addr))]
    fn inquire(&self, addr: DeviceAddress) -> Result<Vec<u8>, TransportError> {
        self.with_device(addr, |dev, _| {
            let c = &dev.config;
            let mut raw = InquiryData::build(c.device_type, &c.vendor, &c.product, &c.revision)
                .raw()
                .to_vec();
            raw.resize(INQUIRY_BUFFER_LEN, 0);
            raw
        })
        .ok_or(TransportError::NoDevice(addr))
    }

    #[instrument(level = "debug", skip(self, data), fields(addr = %addr, len = data.len()))]
    fn send(&self, addr: DeviceAddress, data: &[u8]) -> Result<usize, TransportError> {
        self.with_device(addr, |dev, _| {
            if !dev.config.ready {
                return Err(TransportError::NotReady(addr));
            }
            dev.loopback = data.to_vec();
            Ok(data.len())
        })
        .ok_or(TransportError::NoDevice(addr))?
    }

    #[instrument(level = "debug", skip(self, buf), fields(addr = %addr, max_len = buf.len()))]
    fn receive(&self, addr: DeviceAddress, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.with_device(addr, |dev, _| {
            if !dev.config.ready {
                return Err(TransportError::NotReady(addr));
            }
            if dev.loopback.is_empty() {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = i as u8;
                }
                return Ok(buf.len());
            }
            let n = dev.loopback.len().min(buf.len());
            buf[..n].copy_from_slice(&dev.loopback[..n]);
            Ok(n)
        })
        .ok_or(TransportError::NoDevice(addr))?
    }
}

impl SmdiTransport for SimulatedBus {
    fn init(&self) -> bool {
        self.available
    }

    fn unit_ready(&self, addr: DeviceAddress) -> bool {
        ScsiTransport::test_unit_ready(self, addr)
    }

    fn device_info(&self, addr: DeviceAddress) -> Result<DeviceInfo, TransportError> {
        self.with_device(addr, |dev, _| DeviceInfo {
            device_type: dev.config.device_type,
            vendor: dev.config.vendor.clone(),
            product: dev.config.product.clone(),
            smdi: dev.config.smdi,
        })
        .ok_or(TransportError::NoDevice(addr))
    }

    #[instrument(level = "debug", skip(self), fields(handle = %handle))]
    fn sample_header_request(
        &self,
        handle: SampleHandle,
    ) -> Result<(SmdiMessage, SampleHeader), TransportError> {
        self.with_device(handle.address, |dev, last_error| {
            if !dev.config.smdi {
                return (SmdiMessage::Error, SampleHeader::default());
            }
            if handle.sample_id >= dev.config.sample_slots {
                *last_error = SMDIE_OUT_OF_RANGE;
                return (SmdiMessage::MessageReject, SampleHeader::default());
            }
            let header = dev
                .samples
                .get(&handle.sample_id)
                .map(Sample::header)
                .unwrap_or_default();
            (SmdiMessage::SampleHeader, header)
        })
        .ok_or(TransportError::NoDevice(handle.address))
    }

    #[instrument(level = "debug", skip(self, transfer, monitor), fields(handle = %transfer.handle))]
    fn send_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        let mut sample = native::load(transfer.path)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        if let Some(name) = transfer.sample_name {
            sample.name = name.to_string();
        }
        let header = sample.header();
        let packets = (sample.data.len() as u32).div_ceil(PACKET_SIZE);

        let reply = self
            .with_device(transfer.handle.address, |dev, last_error| {
                let reject = |code: u32, last_error: &mut u32| {
                    *last_error = code;
                    SmdiMessage::MessageReject
                };
                if !dev.config.smdi {
                    return SmdiMessage::Error;
                }
                if transfer.handle.sample_id >= dev.config.sample_slots {
                    return reject(SMDIE_OUT_OF_RANGE, last_error);
                }
                if !dev.config.supported_bits.contains(&sample.bits_per_sample) {
                    return reject(SMDIE_UNSUPPORTED_SAMPLE_BITS, last_error);
                }
                if let Some(limit) = dev.config.memory_bytes {
                    let replaced = dev
                        .samples
                        .get(&transfer.handle.sample_id)
                        .map(|s| s.data.len() as u64)
                        .unwrap_or(0);
                    if dev.memory_used() - replaced + sample.data.len() as u64 > limit {
                        return reject(SMDIE_NO_MEMORY, last_error);
                    }
                }
                dev.samples
                    .insert(transfer.handle.sample_id, sample.clone());
                SmdiMessage::EndOfProcedure
            })
            .ok_or(TransportError::NoDevice(transfer.handle.address))?;

        if reply == SmdiMessage::EndOfProcedure {
            for p in 1..=packets {
                monitor.packets(&TransmissionInfo {
                    header: header.clone(),
                    packet_size: PACKET_SIZE,
                    transmitted_packets: p,
                });
            }
            if self.debug_enabled() {
                debug!(packets, bytes = sample.data.len(), "Sample stored");
            }
        } else {
            warn!(reply = %reply, "Sample upload rejected");
        }
        Ok(reply)
    }

    #[instrument(level = "debug", skip(self, transfer, monitor), fields(handle = %transfer.handle))]
    fn receive_file(
        &self,
        transfer: &FileTransfer<'_>,
        monitor: &mut dyn TransferMonitor,
    ) -> Result<SmdiMessage, TransportError> {
        let stored = self
            .with_device(transfer.handle.address, |dev, last_error| {
                if !dev.config.smdi {
                    return Err(SmdiMessage::Error);
                }
                if transfer.handle.sample_id >= dev.config.sample_slots {
                    *last_error = SMDIE_OUT_OF_RANGE;
                    return Err(SmdiMessage::MessageReject);
                }
                match dev.samples.get(&transfer.handle.sample_id) {
                    Some(sample) => Ok(sample.clone()),
                    None => {
                        *last_error = SMDIE_NO_SAMPLE;
                        Err(SmdiMessage::MessageReject)
                    }
                }
            })
            .ok_or(TransportError::NoDevice(transfer.handle.address))?;

        let sample = match stored {
            Ok(sample) => sample,
            Err(reply) => return Ok(reply),
        };

        let header = sample.header();
        let packets = (sample.data.len() as u32).div_ceil(PACKET_SIZE);
        for p in 1..=packets {
            monitor.packets(&TransmissionInfo {
                header: header.clone(),
                packet_size: PACKET_SIZE,
                transmitted_packets: p,
            });
        }

        native::save(&sample, transfer.path)
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        Ok(SmdiMessage::EndOfProcedure)
    }

    #[instrument(level = "debug", skip(self), fields(handle = %handle))]
    fn delete_sample(&self, handle: SampleHandle) -> Result<SmdiMessage, TransportError> {
        self.with_device(handle.address, |dev, last_error| {
            if !dev.config.smdi {
                return SmdiMessage::Error;
            }
            if handle.sample_id >= dev.config.sample_slots {
                *last_error = SMDIE_OUT_OF_RANGE;
                return SmdiMessage::MessageReject;
            }
            match dev.samples.remove(&handle.sample_id) {
                Some(_) if dev.config.ambiguous_delete => {
                    *last_error = SMDIE_NO_SAMPLE;
                    SmdiMessage::MessageReject
                }
                Some(_) => SmdiMessage::Ack,
                None => {
                    *last_error = SMDIE_NO_SAMPLE;
                    SmdiMessage::MessageReject
                }
            }
        })
        .ok_or(TransportError::NoDevice(handle.address))
    }

    fn last_error(&self) -> u32 {
        self.state.lock().map(|s| s.last_error).unwrap_or(0)
    }

    fn set_debug(&self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.debug = enabled;
        }
    }
}
