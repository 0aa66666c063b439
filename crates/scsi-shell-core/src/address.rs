//! Device addressing: host adapter x SCSI id, plus sample slots.

use std::fmt;
use std::str::FromStr;

/// A logical unit reachable through the transport.
///
/// Range checking (0-15, with 7 normally the adapter itself) is left to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub host_adapter: u8,
    pub scsi_id: u8,
}

impl DeviceAddress {
    pub const fn new(host_adapter: u8, scsi_id: u8) -> Self {
        Self {
            host_adapter,
            scsi_id,
        }
    }

    /// Parse a host adapter id and SCSI id typed by the user.
    pub fn parse(host_adapter: &str, scsi_id: &str) -> Option<Self> {
        Some(Self::new(parse_number(host_adapter)?, parse_number(scsi_id)?))
    }

    /// Address of sample slot `sample_id` on this device.
    pub const fn sample(self, sample_id: u32) -> SampleHandle {
        SampleHandle {
            address: self,
            sample_id,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_adapter, self.scsi_id)
    }
}

/// A sample slot on a device. Says nothing about whether the slot is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleHandle {
    pub address: DeviceAddress,
    pub sample_id: u32,
}

impl fmt::Display for SampleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.sample_id)
    }
}

/// Parse an unsigned decimal argument.
///
/// Returns `None` for anything that is not a complete number in range for
/// `T`, so "12abc", "-1" and "300" (for a `u8`) are all rejected.
pub fn parse_number<T: FromStr>(text: &str) -> Option<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_strict() {
        assert_eq!(parse_number::<u8>("7"), Some(7));
        assert_eq!(parse_number::<u32>("0127"), Some(127));
        assert_eq!(parse_number::<u8>("300"), None);
        assert_eq!(parse_number::<u8>("12abc"), None);
        assert_eq!(parse_number::<u8>("-1"), None);
        assert_eq!(parse_number::<u8>("+1"), None);
        assert_eq!(parse_number::<u32>(""), None);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(DeviceAddress::parse("1", "4"), Some(DeviceAddress::new(1, 4)));
        assert_eq!(DeviceAddress::parse("x", "4"), None);
    }

    #[test]
    fn test_address_display() {
        let addr = DeviceAddress::new(0, 5);
        assert_eq!(addr.to_string(), "0:5");
        assert_eq!(addr.sample(12).to_string(), "0:5#12");
    }
}
