//! Transport layer module.

pub mod mock;
pub mod sim;
pub mod traits;

pub use mock::MockTransport;
pub use sim::{BusConfig, DeviceConfig, SampleConfig, SimulatedBus};
pub use traits::{
    Backend, DeviceInfo, FileTransfer, ScsiTransport, SmdiTransport, TransferMonitor,
    TransmissionInfo, TransportError,
};
