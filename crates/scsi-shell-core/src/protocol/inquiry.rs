//! Standard INQUIRY data and peripheral device types.

use std::fmt;

use super::constants::*;

/// Peripheral device type (INQUIRY byte 0, bits 4:0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralType {
    Disk,
    Tape,
    Printer,
    Processor,
    Worm,
    CdRom,
    Scanner,
    Optical,
    Changer,
    Communications,
    Unknown(u8),
}

impl PeripheralType {
    /// Decode from a raw device type byte; the qualifier bits are masked off.
    pub fn from_byte(byte: u8) -> Self {
        match byte & PERIPHERAL_TYPE_MASK {
            0x00 => Self::Disk,
            0x01 => Self::Tape,
            0x02 => Self::Printer,
            0x03 => Self::Processor,
            0x04 => Self::Worm,
            0x05 => Self::CdRom,
            0x06 => Self::Scanner,
            0x07 => Self::Optical,
            0x08 => Self::Changer,
            0x09 => Self::Communications,
            other => Self::Unknown(other),
        }
    }

    /// Name used in scan tables.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Disk => "Disk",
            Self::Tape => "Tape",
            Self::Printer => "Printer",
            Self::Processor => "Processor",
            Self::Worm => "WORM",
            Self::CdRom => "CD-ROM",
            Self::Scanner => "Scanner",
            Self::Optical => "Optical",
            Self::Changer => "Changer",
            Self::Communications => "Comm",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for PeripheralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Communications => write!(f, "Communications"),
            Self::Unknown(code) => write!(f, "Unknown (0x{:02X})", code),
            other => write!(f, "{}", other.short_name()),
        }
    }
}

/// Raw standard INQUIRY response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryData {
    raw: Vec<u8>,
}

impl InquiryData {
    /// Wrap a response, zero-padding it to the standard 36 bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut raw = data.to_vec();
        if raw.len() < INQUIRY_STANDARD_LEN {
            raw.resize(INQUIRY_STANDARD_LEN, 0);
        }
        Self { raw }
    }

    /// Build a response from identification strings (used by the simulator).
    pub fn build(device_type: u8, vendor: &str, product: &str, revision: &str) -> Self {
        let mut raw = vec![0u8; INQUIRY_STANDARD_LEN];
        raw[0] = device_type & PERIPHERAL_TYPE_MASK;
        raw[2] = 0x02; // SCSI-2
        raw[4] = (INQUIRY_STANDARD_LEN - 5) as u8;
        fill_padded(&mut raw[INQUIRY_VENDOR], vendor);
        fill_padded(&mut raw[INQUIRY_PRODUCT], product);
        fill_padded(&mut raw[INQUIRY_REVISION], revision);
        Self { raw }
    }

    pub fn peripheral_type(&self) -> PeripheralType {
        PeripheralType::from_byte(self.raw[0])
    }

    pub fn vendor(&self) -> String {
        field(&self.raw[INQUIRY_VENDOR])
    }

    pub fn product(&self) -> String {
        field(&self.raw[INQUIRY_PRODUCT])
    }

    pub fn revision(&self) -> String {
        field(&self.raw[INQUIRY_REVISION])
    }

    /// The standard 36-byte prefix.
    pub fn standard_bytes(&self) -> &[u8] {
        &self.raw[..INQUIRY_STANDARD_LEN]
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

fn fill_padded(dst: &mut [u8], value: &str) {
    dst.fill(b' ');
    for (d, s) in dst.iter_mut().zip(value.bytes()) {
        *d = s;
    }
}

/// Fixed-width ASCII field, cut at the first NUL.
fn field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peripheral_type_masks_qualifier() {
        assert_eq!(PeripheralType::from_byte(0x65), PeripheralType::CdRom);
        assert_eq!(PeripheralType::from_byte(0x1F), PeripheralType::Unknown(0x1F));
    }

    #[test]
    fn test_peripheral_type_names() {
        assert_eq!(PeripheralType::Communications.short_name(), "Comm");
        assert_eq!(PeripheralType::Communications.to_string(), "Communications");
        assert_eq!(PeripheralType::Unknown(0x0C).to_string(), "Unknown (0x0C)");
    }

    #[test]
    fn test_inquiry_fields() {
        let inq = InquiryData::build(0x03, "E-MU", "E4XT Ultra", "4.70");
        assert_eq!(inq.peripheral_type(), PeripheralType::Processor);
        assert_eq!(inq.vendor(), "E-MU    ");
        assert_eq!(inq.product(), "E4XT Ultra      ");
        assert_eq!(inq.revision(), "4.70");
        assert_eq!(inq.standard_bytes().len(), INQUIRY_STANDARD_LEN);
    }

    #[test]
    fn test_inquiry_short_response_padded() {
        let inq = InquiryData::from_bytes(&[0x00, 0x80]);
        assert_eq!(inq.raw().len(), INQUIRY_STANDARD_LEN);
        assert_eq!(inq.vendor(), "");
    }
}
