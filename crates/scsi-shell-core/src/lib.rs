//! scsi-shell-core: interactive raw SCSI and SMDI sample transfer shell.
//!
//! The crate drives SCSI devices through an ASPI-style transport and talks
//! SMDI (SCSI Musical Data Interchange) to hardware samplers on the same bus.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, SMDI messages and reject codes, INQUIRY layout
//! - **Transport**: Raw SCSI and SMDI traits, a mock and a simulated bus
//! - **Device**: Sessions wrapping a transport with per-command semantics
//! - **Sample**: Native sample files and AIF / AIF-C conversion
//! - **Transfer**: Sample download/upload with progress and staging files
//! - **Delete**: The delete disambiguation state machine
//! - **Events**: Observer pattern for progress and log output
//! - **Shell**: Tokenizer, command tables and the read-eval-print loop
//!
//! # Example
//!
//! ```no_run
//! use scsi_shell_core::{Shell, ShellSettings, SimulatedBus, Variant};
//!
//! let bus = SimulatedBus::default();
//! let settings = ShellSettings {
//!     variant: Variant::Smdi,
//!     ..Default::default()
//! };
//!
//! let stdin = std::io::stdin();
//! let mut shell = Shell::new(&bus, settings);
//! shell.run(stdin.lock(), &mut std::io::stdout()).expect("shell failed");
//! ```

pub mod address;
pub mod delete;
pub mod device;
pub mod events;
pub mod hex;
pub mod protocol;
pub mod sample;
pub mod settings;
pub mod shell;
pub mod transfer;
pub mod transport;

// Re-exports for convenience
pub use address::{DeviceAddress, SampleHandle};
pub use delete::{DeleteMachine, DeleteState};
pub use device::{ScsiSession, SmdiSession};
pub use events::{LogLevel, NullObserver, ShellEvent, ShellObserver, TracingObserver};
pub use protocol::{InquiryData, PeripheralType, SmdiError, SmdiMessage};
pub use sample::{LoopControl, Sample, SampleHeader};
pub use settings::{LogControl, NullLogControl, ShellSettings, Variant};
pub use shell::Shell;
pub use transfer::{
    ProgressSnapshot, TransferDescriptor, TransferError, TransferOrchestrator, TransferReport,
};
pub use transport::{BusConfig, MockTransport, SimulatedBus, TransportError};
