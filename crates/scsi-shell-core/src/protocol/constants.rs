// Shell limits
pub const DATA_BUFFER_SIZE: usize = 8192;
pub const MAX_SAMPLES: u32 = 128;

// SCSI addressing
pub const SCAN_SLOTS: u8 = 16;
pub const ADAPTER_SLOT: u8 = 7; // conventionally the host adapter itself
pub const NO_DEVICE: u8 = 0xFF; // device type sentinel: nothing at this slot

// Standard INQUIRY layout
pub const INQUIRY_BUFFER_LEN: usize = 96;
pub const INQUIRY_STANDARD_LEN: usize = 36;
pub const INQUIRY_VENDOR: std::ops::Range<usize> = 8..16;
pub const INQUIRY_PRODUCT: std::ops::Range<usize> = 16..32;
pub const INQUIRY_REVISION: std::ops::Range<usize> = 32..36;
pub const PERIPHERAL_TYPE_MASK: u8 = 0x1F;

// SMDI message ids (message << 16 | sub-message)
pub const SMDIM_ERROR: u32 = 0x0000_0000;
pub const SMDIM_MASTER_IDENTIFY: u32 = 0x0001_0000;
pub const SMDIM_SLAVE_IDENTIFY: u32 = 0x0001_0001;
pub const SMDIM_MESSAGE_REJECT: u32 = 0x0002_0000;
pub const SMDIM_ACK: u32 = 0x0100_0000;
pub const SMDIM_NAK: u32 = 0x0101_0000;
pub const SMDIM_WAIT: u32 = 0x0102_0000;
pub const SMDIM_SEND_NEXT_PACKET: u32 = 0x0103_0000;
pub const SMDIM_END_OF_PROCEDURE: u32 = 0x0104_0000;
pub const SMDIM_ABORT_PROCEDURE: u32 = 0x0105_0000;
pub const SMDIM_DATA_PACKET: u32 = 0x0110_0000;
pub const SMDIM_SAMPLE_HEADER_REQUEST: u32 = 0x0120_0000;
pub const SMDIM_SAMPLE_HEADER: u32 = 0x0121_0000;
pub const SMDIM_BEGIN_SAMPLE_TRANSFER: u32 = 0x0122_0000;
pub const SMDIM_SAMPLE_NAME: u32 = 0x0123_0000;
pub const SMDIM_DELETE_SAMPLE: u32 = 0x0124_0000;
pub const SMDIM_TRANSMIT_MIDI_MESSAGE: u32 = 0x0200_0000;

// SMDI reject reasons (reported through get-last-error)
pub const SMDIE_OUT_OF_RANGE: u32 = 0x0020_0000;
pub const SMDIE_NO_SAMPLE: u32 = 0x0020_0002;
pub const SMDIE_NO_MEMORY: u32 = 0x0020_0004;
pub const SMDIE_UNSUPPORTED_SAMPLE_BITS: u32 = 0x0020_0006;

// Sample naming
pub const SAMPLE_NAME_MAX: usize = 255;
pub const PERIOD_NS_PER_SECOND: u32 = 1_000_000_000;
