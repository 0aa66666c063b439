//! Protocol module - SCSI and SMDI protocol definitions.

pub mod constants;
pub mod inquiry;
pub mod message;

pub use constants::*;
pub use inquiry::{InquiryData, PeripheralType};
pub use message::{SmdiError, SmdiMessage};
