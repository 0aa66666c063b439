//! AIF / AIF-C interchange files.
//!
//! Only uncompressed big-endian PCM is handled: AIF-C files are written with
//! the `NONE` compression type and read back when they carry `NONE` or `twos`.
//! Loop points are not carried through this form.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{LoopControl, Sample, SampleFileError};

const AIFC_VERSION_1: u32 = 0xA280_5140;
const COMPRESSION_NONE: &[u8; 4] = b"NONE";
const COMPRESSION_TWOS: &[u8; 4] = b"twos";
const COMPRESSION_NAME: &str = "not compressed";
const DEFAULT_PITCH: u16 = 60;

/// Container variant, chosen from the destination file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AifVariant {
    Aiff,
    Aifc,
}

impl AifVariant {
    /// `.aifc` (any case) selects AIF-C; everything else is plain AIF.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("aifc") => Self::Aifc,
            _ => Self::Aiff,
        }
    }

    fn form_type(&self) -> &'static [u8; 4] {
        match self {
            Self::Aiff => b"AIFF",
            Self::Aifc => b"AIFC",
        }
    }
}

/// Encode a sample as an AIF / AIF-C byte stream.
pub fn to_bytes(sample: &Sample, variant: AifVariant) -> Result<Vec<u8>, SampleFileError> {
    sample.validate()?;
    let pcm = &sample.data[..sample.expected_data_len()];

    let mut chunks = Vec::new();

    if variant == AifVariant::Aifc {
        let mut fver = Vec::with_capacity(4);
        fver.write_u32::<BigEndian>(AIFC_VERSION_1)?;
        write_chunk(&mut chunks, b"FVER", &fver)?;
    }

    let mut comm = Vec::with_capacity(38);
    comm.write_i16::<BigEndian>(sample.channels as i16)?;
    comm.write_u32::<BigEndian>(sample.sample_count)?;
    comm.write_i16::<BigEndian>(sample.bits_per_sample as i16)?;
    comm.write_all(&encode_extended(sample.sample_rate))?;
    if variant == AifVariant::Aifc {
        comm.write_all(COMPRESSION_NONE)?;
        write_pstring(&mut comm, COMPRESSION_NAME)?;
    }
    write_chunk(&mut chunks, b"COMM", &comm)?;

    if !sample.name.is_empty() {
        write_chunk(&mut chunks, b"NAME", sample.name.as_bytes())?;
    }

    let mut ssnd = Vec::with_capacity(8 + pcm.len());
    ssnd.write_u32::<BigEndian>(0)?; // offset
    ssnd.write_u32::<BigEndian>(0)?; // block size
    ssnd.write_all(pcm)?;
    write_chunk(&mut chunks, b"SSND", &ssnd)?;

    let mut out = Vec::with_capacity(12 + chunks.len());
    out.write_all(b"FORM")?;
    out.write_u32::<BigEndian>(4 + chunks.len() as u32)?;
    out.write_all(variant.form_type())?;
    out.write_all(&chunks)?;
    Ok(out)
}

/// Decode an AIF / AIF-C byte stream. `fallback_name` is used when the file
/// has no `NAME` chunk.
pub fn from_bytes(data: &[u8], fallback_name: &str) -> Result<Sample, SampleFileError> {
    let mut cursor = Cursor::new(data);

    let mut id = [0u8; 4];
    cursor.read_exact(&mut id)?;
    if &id != b"FORM" {
        return Err(invalid_magic("FORM", &id));
    }
    let _form_size = cursor.read_u32::<BigEndian>()?;
    cursor.read_exact(&mut id)?;
    let is_aifc = match &id {
        b"AIFF" => false,
        b"AIFC" => true,
        other => return Err(invalid_magic("AIFF/AIFC", other)),
    };

    let mut comm: Option<(u16, u32, u16, u32)> = None;
    let mut name: Option<String> = None;
    let mut pcm: Option<Vec<u8>> = None;

    while (cursor.position() as usize) + 8 <= data.len() {
        cursor.read_exact(&mut id)?;
        let size = cursor.read_u32::<BigEndian>()? as usize;
        let start = cursor.position() as usize;
        let end = start.checked_add(size).filter(|&e| e <= data.len()).ok_or(
            SampleFileError::Truncated {
                expected: size,
                actual: data.len() - start,
            },
        )?;
        let body = &data[start..end];

        match &id {
            b"COMM" => comm = Some(parse_comm(body, is_aifc)?),
            b"NAME" => name = Some(String::from_utf8_lossy(body).into_owned()),
            b"SSND" => {
                let mut ssnd = Cursor::new(body);
                let offset = ssnd.read_u32::<BigEndian>()? as usize;
                let _block_size = ssnd.read_u32::<BigEndian>()?;
                let pcm_start = (8 + offset).min(body.len());
                pcm = Some(body[pcm_start..].to_vec());
            }
            _ => debug!(chunk = %String::from_utf8_lossy(&id), "Skipping AIF chunk"),
        }

        // chunks are padded to even length
        cursor.set_position((end + (size & 1)) as u64);
    }

    let (channels, sample_count, bits_per_sample, sample_rate) =
        comm.ok_or(SampleFileError::MissingChunk("COMM"))?;
    let mut data = pcm.ok_or(SampleFileError::MissingChunk("SSND"))?;

    let sample = Sample {
        name: name.unwrap_or_else(|| fallback_name.to_string()),
        sample_rate,
        bits_per_sample,
        channels,
        sample_count,
        pitch: DEFAULT_PITCH,
        pitch_fraction: 0,
        loop_control: LoopControl::None,
        loop_start: 0,
        loop_end: 0,
        data: Vec::new(),
    };
    let expected = sample.expected_data_len();
    if data.len() < expected {
        return Err(SampleFileError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    data.truncate(expected);

    let sample = Sample { data, ..sample };
    sample.validate()?;
    Ok(sample)
}

/// Load an AIF / AIF-C file. Without a `NAME` chunk, the file stem names the sample.
pub fn load(path: &Path) -> Result<Sample, SampleFileError> {
    let data = std::fs::read(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(path = %path.display(), bytes = data.len(), "Loading AIF");
    from_bytes(&data, &stem)
}

/// Save a sample as AIF / AIF-C.
pub fn save(sample: &Sample, path: &Path, variant: AifVariant) -> Result<(), SampleFileError> {
    let bytes = to_bytes(sample, variant)?;
    debug!(path = %path.display(), ?variant, bytes = bytes.len(), "Saving AIF");
    std::fs::write(path, bytes)?;
    Ok(())
}

fn parse_comm(body: &[u8], is_aifc: bool) -> Result<(u16, u32, u16, u32), SampleFileError> {
    let mut c = Cursor::new(body);
    let channels = c.read_i16::<BigEndian>()?;
    let frames = c.read_u32::<BigEndian>()?;
    let bits = c.read_i16::<BigEndian>()?;
    let mut ext = [0u8; 10];
    c.read_exact(&mut ext)?;

    if is_aifc {
        let mut compression = [0u8; 4];
        c.read_exact(&mut compression)?;
        if &compression != COMPRESSION_NONE && &compression != COMPRESSION_TWOS {
            return Err(SampleFileError::UnsupportedCompression(
                String::from_utf8_lossy(&compression).into_owned(),
            ));
        }
    }
    if channels <= 0 || bits <= 0 {
        return Err(SampleFileError::InvalidFormat(format!(
            "{} channels, {} bits",
            channels, bits
        )));
    }

    Ok((channels as u16, frames, bits as u16, decode_extended(&ext)))
}

fn write_chunk(out: &mut Vec<u8>, id: &[u8; 4], body: &[u8]) -> std::io::Result<()> {
    out.write_all(id)?;
    out.write_u32::<BigEndian>(body.len() as u32)?;
    out.write_all(body)?;
    if body.len() % 2 == 1 {
        out.write_u8(0)?;
    }
    Ok(())
}

/// Pascal string padded to an even total length.
fn write_pstring(out: &mut Vec<u8>, s: &str) -> std::io::Result<()> {
    let bytes = &s.as_bytes()[..s.len().min(255)];
    out.write_u8(bytes.len() as u8)?;
    out.write_all(bytes)?;
    if (bytes.len() + 1) % 2 == 1 {
        out.write_u8(0)?;
    }
    Ok(())
}

/// Integer rate to 80-bit IEEE 754 extended precision.
fn encode_extended(rate: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if rate == 0 {
        return out;
    }
    let msb = 31 - rate.leading_zeros();
    let exponent = 16383 + msb as u16;
    let mantissa = (rate as u64) << (63 - msb);
    out[..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

/// 80-bit extended value to the nearest integer rate.
fn decode_extended(bytes: &[u8; 10]) -> u32 {
    let exponent = u16::from_be_bytes([bytes[0], bytes[1]]) & 0x7FFF;
    let mut m = [0u8; 8];
    m.copy_from_slice(&bytes[2..]);
    let mantissa = u64::from_be_bytes(m);

    if exponent < 16383 || mantissa == 0 {
        return 0;
    }
    let shift = (exponent - 16383) as u32;
    if shift > 31 {
        return u32::MAX;
    }
    // keep one extra bit for rounding
    let with_half = mantissa >> (62 - shift);
    ((with_half + 1) >> 1).min(u32::MAX as u64) as u32
}

fn invalid_magic(expected: &str, actual: &[u8]) -> SampleFileError {
    SampleFileError::InvalidMagic {
        expected: expected.to_string(),
        actual: String::from_utf8_lossy(actual).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::ramp;

    #[test]
    fn test_variant_from_suffix() {
        assert_eq!(AifVariant::for_path(Path::new("a.aifc")), AifVariant::Aifc);
        assert_eq!(AifVariant::for_path(Path::new("A.AIFC")), AifVariant::Aifc);
        assert_eq!(AifVariant::for_path(Path::new("a.aif")), AifVariant::Aiff);
        assert_eq!(AifVariant::for_path(Path::new("a.aiff")), AifVariant::Aiff);
        assert_eq!(AifVariant::for_path(Path::new("noext")), AifVariant::Aiff);
    }

    #[test]
    fn test_extended_rate() {
        for rate in [8000, 22050, 32000, 44100, 48000, 96000] {
            assert_eq!(decode_extended(&encode_extended(rate)), rate);
        }
        // 44100 Hz as written by common tools
        let known = [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0];
        assert_eq!(encode_extended(44100), known);
        assert_eq!(decode_extended(&[0; 10]), 0);
    }

    #[test]
    fn test_aiff_layout() {
        let sample = ramp("Ramp", 3);
        let bytes = to_bytes(&sample, AifVariant::Aiff).unwrap();
        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(&bytes[8..12], b"AIFF");
        assert_eq!(&bytes[12..16], b"COMM");
        let form_size = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(form_size as usize, bytes.len() - 8);
    }

    #[test]
    fn test_aifc_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.aifc");
        let sample = ramp("Ramp", 101);

        save(&sample, &path, AifVariant::for_path(&path)).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[8..12], b"AIFC");

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.name, "Ramp");
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.sample_count, 101);
        assert_eq!(loaded.data, sample.data);
        assert_eq!(loaded.loop_control, LoopControl::None);
    }

    #[test]
    fn test_missing_name_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Strings.aif");
        let mut sample = ramp("", 8);
        sample.name.clear();
        save(&sample, &path, AifVariant::Aiff).unwrap();
        assert_eq!(load(&path).unwrap().name, "Strings");
    }

    #[test]
    fn test_missing_ssnd() {
        let sample = ramp("x", 4);
        let bytes = to_bytes(&sample, AifVariant::Aiff).unwrap();
        // cut the file right after COMM (12 header + 8 + 18)
        let cut = &bytes[..38];
        assert!(matches!(
            from_bytes(cut, "x"),
            Err(SampleFileError::MissingChunk("SSND"))
        ));
    }

    #[test]
    fn test_not_a_form() {
        assert!(matches!(
            from_bytes(b"RIFF\0\0\0\0WAVE", "x"),
            Err(SampleFileError::InvalidMagic { .. })
        ));
    }
}
