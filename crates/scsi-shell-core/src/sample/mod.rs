//! Sample metadata and sample file forms.
//!
//! - `SampleHeader`: what a device reports for a sample slot
//! - `Sample`: an in-memory waveform plus its descriptive fields
//! - `native`: the lossless staging form exchanged with the device
//! - `aif`: AIF / AIF-C interchange files (uncompressed PCM only)

pub mod aif;
pub mod native;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::constants::PERIOD_NS_PER_SECOND;

pub use aif::AifVariant;

#[derive(Error, Debug)]
pub enum SampleFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: String, actual: String },
    #[error("Unsupported version {0}")]
    UnsupportedVersion(u16),
    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),
    #[error("Unsupported compression type {0:?}")]
    UnsupportedCompression(String),
    #[error("Data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Invalid sample format: {0}")]
    InvalidFormat(String),
}

/// Loop mode of a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopControl {
    #[default]
    None,
    Forward,
    Bidirectional,
    /// Value outside the defined set, as reported by the device.
    Unknown(u8),
}

impl LoopControl {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Forward,
            2 => Self::Bidirectional,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Forward => 1,
            Self::Bidirectional => 2,
            Self::Unknown(b) => *b,
        }
    }

    pub fn is_looped(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for LoopControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Forward => write!(f, "Forward"),
            Self::Bidirectional => write!(f, "Bidirectional"),
            Self::Unknown(b) => write!(f, "Unknown ({})", b),
        }
    }
}

/// Sample header as returned by a header request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleHeader {
    /// Whether the slot holds a sample at all.
    pub exists: bool,
    pub name: String,
    /// Nanoseconds per sample tick.
    pub period_ns: u32,
    /// Length in sample frames.
    pub length: u32,
    pub channels: u16,
    pub bits_per_word: u16,
    /// Root note (MIDI note number).
    pub pitch: u16,
    /// Fine tune in cents.
    pub pitch_fraction: i16,
    pub loop_control: LoopControl,
    pub loop_start: u32,
    pub loop_end: u32,
}

impl SampleHeader {
    /// Sample rate derived from the period; 0 if the period is 0.
    pub fn sample_rate(&self) -> u32 {
        PERIOD_NS_PER_SECOND.checked_div(self.period_ns).unwrap_or(0)
    }

    /// Total PCM payload size in bytes.
    pub fn data_size(&self) -> u64 {
        self.length as u64 * self.channels as u64 * self.bits_per_word as u64 / 8
    }
}

/// An in-memory sample.
///
/// `data` holds interleaved, big-endian, signed PCM with
/// `bytes_per_word()` bytes per word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    /// Number of sample frames.
    pub sample_count: u32,
    pub pitch: u16,
    pub pitch_fraction: i16,
    pub loop_control: LoopControl,
    pub loop_start: u32,
    pub loop_end: u32,
    pub data: Vec<u8>,
}

impl Sample {
    /// Build a sample from a device header and its PCM payload.
    pub fn from_header(header: &SampleHeader, data: Vec<u8>) -> Self {
        Self {
            name: header.name.clone(),
            sample_rate: header.sample_rate(),
            bits_per_sample: header.bits_per_word,
            channels: header.channels,
            sample_count: header.length,
            pitch: header.pitch,
            pitch_fraction: header.pitch_fraction,
            loop_control: header.loop_control,
            loop_start: header.loop_start,
            loop_end: header.loop_end,
            data,
        }
    }

    /// Header describing this sample as stored on a device.
    pub fn header(&self) -> SampleHeader {
        SampleHeader {
            exists: true,
            name: self.name.clone(),
            period_ns: PERIOD_NS_PER_SECOND.checked_div(self.sample_rate).unwrap_or(0),
            length: self.sample_count,
            channels: self.channels,
            bits_per_word: self.bits_per_sample,
            pitch: self.pitch,
            pitch_fraction: self.pitch_fraction,
            loop_control: self.loop_control,
            loop_start: self.loop_start,
            loop_end: self.loop_end,
        }
    }

    pub fn bytes_per_word(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// PCM payload size implied by the format fields.
    pub fn expected_data_len(&self) -> usize {
        self.sample_count as usize * self.channels as usize * self.bytes_per_word()
    }

    /// Check that the payload matches the declared format.
    pub fn validate(&self) -> Result<(), SampleFileError> {
        if self.channels == 0 {
            return Err(SampleFileError::InvalidFormat("zero channels".into()));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample > 32 {
            return Err(SampleFileError::InvalidFormat(format!(
                "{} bits per sample",
                self.bits_per_sample
            )));
        }
        let expected = self.expected_data_len();
        if self.data.len() < expected {
            return Err(SampleFileError::Truncated {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A short 16-bit mono ramp.
    pub fn ramp(name: &str, frames: u32) -> Sample {
        let data = (0..frames)
            .flat_map(|i| ((i as i16).wrapping_mul(64)).to_be_bytes())
            .collect();
        Sample {
            name: name.to_string(),
            sample_rate: 44100,
            bits_per_sample: 16,
            channels: 1,
            sample_count: frames,
            pitch: 60,
            pitch_fraction: 0,
            loop_control: LoopControl::Forward,
            loop_start: 1,
            loop_end: frames.saturating_sub(1),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_derived_fields() {
        let header = SampleHeader {
            exists: true,
            period_ns: 22675,
            length: 1000,
            channels: 2,
            bits_per_word: 16,
            ..Default::default()
        };
        assert_eq!(header.sample_rate(), 44101);
        assert_eq!(header.data_size(), 4000);
    }

    #[test]
    fn test_zero_period_rate() {
        let header = SampleHeader::default();
        assert_eq!(header.sample_rate(), 0);
        assert_eq!(header.data_size(), 0);
    }

    #[test]
    fn test_loop_control_bytes() {
        assert_eq!(LoopControl::from_byte(2), LoopControl::Bidirectional);
        assert_eq!(LoopControl::from_byte(9), LoopControl::Unknown(9));
        assert_eq!(LoopControl::Forward.as_byte(), 1);
        assert!(!LoopControl::None.is_looped());
        assert_eq!(LoopControl::Unknown(9).to_string(), "Unknown (9)");
    }

    #[test]
    fn test_sample_header_conversion() {
        let sample = fixtures::ramp("Ramp", 100);
        let header = sample.header();
        assert!(header.exists);
        assert_eq!(header.period_ns, 22675);
        assert_eq!(header.length, 100);
        assert_eq!(header.data_size(), 200);
        sample.validate().unwrap();
    }

    #[test]
    fn test_validate_truncated() {
        let mut sample = fixtures::ramp("Short", 10);
        sample.data.truncate(5);
        assert!(matches!(
            sample.validate(),
            Err(SampleFileError::Truncated {
                expected: 20,
                actual: 5
            })
        ));
    }
}
