//! Native sample dump form (`.sdmp`).
//!
//! Lossless staging form between device transfers and AIF conversion.
//! Layout, all big-endian:
//!
//! ```text
//! "SDMP" u16 version
//! u16 name_len, name bytes
//! u32 sample_rate, u16 bits, u16 channels, u32 frames
//! u16 pitch, i16 pitch_fraction
//! u8 loop_control, u32 loop_start, u32 loop_end
//! u32 data_len, data
//! ```

use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{LoopControl, Sample, SampleFileError};
use crate::protocol::constants::SAMPLE_NAME_MAX;

pub const NATIVE_MAGIC: &[u8; 4] = b"SDMP";
pub const NATIVE_VERSION: u16 = 1;
pub const NATIVE_EXTENSION: &str = "sdmp";

/// Serialize a sample into native form.
pub fn to_bytes(sample: &Sample) -> Result<Vec<u8>, SampleFileError> {
    let name = truncated_name(&sample.name);
    let mut buf = Vec::with_capacity(40 + name.len() + sample.data.len());
    buf.write_all(NATIVE_MAGIC)?;
    buf.write_u16::<BigEndian>(NATIVE_VERSION)?;
    buf.write_u16::<BigEndian>(name.len() as u16)?;
    buf.write_all(name)?;
    buf.write_u32::<BigEndian>(sample.sample_rate)?;
    buf.write_u16::<BigEndian>(sample.bits_per_sample)?;
    buf.write_u16::<BigEndian>(sample.channels)?;
    buf.write_u32::<BigEndian>(sample.sample_count)?;
    buf.write_u16::<BigEndian>(sample.pitch)?;
    buf.write_i16::<BigEndian>(sample.pitch_fraction)?;
    buf.write_u8(sample.loop_control.as_byte())?;
    buf.write_u32::<BigEndian>(sample.loop_start)?;
    buf.write_u32::<BigEndian>(sample.loop_end)?;
    buf.write_u32::<BigEndian>(sample.data.len() as u32)?;
    buf.write_all(&sample.data)?;
    Ok(buf)
}

/// Parse a sample from native form.
pub fn from_bytes(data: &[u8]) -> Result<Sample, SampleFileError> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != NATIVE_MAGIC {
        return Err(SampleFileError::InvalidMagic {
            expected: String::from_utf8_lossy(NATIVE_MAGIC).into_owned(),
            actual: String::from_utf8_lossy(&magic).into_owned(),
        });
    }
    let version = cursor.read_u16::<BigEndian>()?;
    if version != NATIVE_VERSION {
        return Err(SampleFileError::UnsupportedVersion(version));
    }

    let name_len = cursor.read_u16::<BigEndian>()? as usize;
    let mut name = vec![0u8; name_len];
    cursor.read_exact(&mut name)?;

    let sample_rate = cursor.read_u32::<BigEndian>()?;
    let bits_per_sample = cursor.read_u16::<BigEndian>()?;
    let channels = cursor.read_u16::<BigEndian>()?;
    let sample_count = cursor.read_u32::<BigEndian>()?;
    let pitch = cursor.read_u16::<BigEndian>()?;
    let pitch_fraction = cursor.read_i16::<BigEndian>()?;
    let loop_control = LoopControl::from_byte(cursor.read_u8()?);
    let loop_start = cursor.read_u32::<BigEndian>()?;
    let loop_end = cursor.read_u32::<BigEndian>()?;

    let data_len = cursor.read_u32::<BigEndian>()? as usize;
    let offset = cursor.position() as usize;
    let available = data.len() - offset;
    if available < data_len {
        return Err(SampleFileError::Truncated {
            expected: data_len,
            actual: available,
        });
    }

    let sample = Sample {
        name: String::from_utf8_lossy(&name).into_owned(),
        sample_rate,
        bits_per_sample,
        channels,
        sample_count,
        pitch,
        pitch_fraction,
        loop_control,
        loop_start,
        loop_end,
        data: data[offset..offset + data_len].to_vec(),
    };
    sample.validate()?;
    Ok(sample)
}

/// Load a native sample file.
pub fn load(path: &Path) -> Result<Sample, SampleFileError> {
    let data = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = data.len(), "Loading native sample");
    from_bytes(&data)
}

/// Save a sample as a native file.
pub fn save(sample: &Sample, path: &Path) -> Result<(), SampleFileError> {
    let bytes = to_bytes(sample)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Saving native sample");
    std::fs::write(path, bytes)?;
    Ok(())
}

fn truncated_name(name: &str) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..bytes.len().min(SAMPLE_NAME_MAX)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::ramp;

    #[test]
    fn test_native_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.sdmp");
        let sample = ramp("Ramp C3", 64);

        save(&sample, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = to_bytes(&ramp("x", 4)).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            from_bytes(&bytes),
            Err(SampleFileError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = to_bytes(&ramp("x", 32)).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            from_bytes(&bytes),
            Err(SampleFileError::Truncated { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("absent.sdmp")),
            Err(SampleFileError::Io(_))
        ));
    }
}
