//! Delete with rejection disambiguation.
//!
//! A Message Reject in answer to a delete does not prove the sample is still
//! there: some devices remove the sample and then reject. After a rejection
//! the slot is queried again and an empty slot is reported as a likely
//! successful delete. A rejection is never reported as a plain failure
//! without that check.

use std::fmt;

use tracing::{debug, warn};

use crate::address::SampleHandle;
use crate::device::{DeleteOutcome, SmdiSession};
use crate::protocol::{SmdiError, SmdiMessage};
use crate::transport::{SmdiTransport, TransportError};

/// Printed when a rejected delete left the slot empty anyway.
pub const DELETED_DESPITE_REJECT: &str =
    "Note: Sample appears to have been deleted despite the error message.";

/// Extra line for a "no sample" rejection when the slot is confirmed empty.
pub const CONFIRMED_ABSENT: &str =
    "Sample is confirmed to no longer exist (possibly deleted successfully).";

/// States of one delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    /// Existence pre-check pending.
    Checking,
    /// Delete issued, waiting for the device's answer.
    Requested,
    /// The slot was empty before the delete; nothing was sent.
    NotFound,
    /// Ack or End Of Procedure.
    Acknowledged(SmdiMessage),
    /// Message Reject. `sample_absent` is the result of the follow-up query.
    Rejected {
        error: SmdiError,
        sample_absent: bool,
    },
    /// Any other reply.
    Failed(SmdiMessage),
}

impl DeleteState {
    /// Whether the machine has stopped.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeleteState::Checking | DeleteState::Requested)
    }

    /// Whether the sample is believed gone.
    pub fn sample_gone(&self) -> bool {
        match self {
            DeleteState::Acknowledged(_) => true,
            DeleteState::Rejected { sample_absent, .. } => *sample_absent,
            _ => false,
        }
    }
}

impl fmt::Display for DeleteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteState::Checking => write!(f, "CHECKING"),
            DeleteState::Requested => write!(f, "REQUESTED"),
            DeleteState::NotFound => write!(f, "NOT_FOUND"),
            DeleteState::Acknowledged(_) => write!(f, "ACKNOWLEDGED"),
            DeleteState::Rejected { .. } => write!(f, "REJECTED"),
            DeleteState::Failed(_) => write!(f, "FAILED"),
        }
    }
}

/// Human-readable explanation of a delete rejection.
pub fn explain_rejection(error: SmdiError, sample_id: u32) -> String {
    match error {
        SmdiError::OutOfRange => "Delete failed: Sample ID out of range.".to_string(),
        SmdiError::NoSample => format!(
            "Delete failed: Sample {} does not exist on the device.",
            sample_id
        ),
        SmdiError::NoMemory => {
            "Delete failed: Device has insufficient memory for this operation.".to_string()
        }
        SmdiError::UnsupportedSampleBits => {
            "Delete failed: Unsupported sample bits format.".to_string()
        }
        SmdiError::Other(code) => format!("Delete failed with error code: 0x{:08X}", code),
    }
}

/// Runs one delete request to a terminal [`DeleteState`].
pub struct DeleteMachine<'a, T: SmdiTransport + ?Sized> {
    session: &'a SmdiSession<'a, T>,
    handle: SampleHandle,
    state: DeleteState,
}

impl<'a, T: SmdiTransport + ?Sized> DeleteMachine<'a, T> {
    pub fn new(session: &'a SmdiSession<'a, T>, handle: SampleHandle) -> Self {
        Self {
            session,
            handle,
            state: DeleteState::Checking,
        }
    }

    pub fn state(&self) -> DeleteState {
        self.state
    }

    /// Advance one transition. Transport errors leave the state unchanged.
    pub fn step(&mut self) -> Result<DeleteState, TransportError> {
        let next = match self.state {
            DeleteState::Checking => match self.session.sample_header(self.handle)? {
                Some(_) => DeleteState::Requested,
                None => DeleteState::NotFound,
            },
            DeleteState::Requested => match self.session.delete(self.handle)? {
                DeleteOutcome::Acknowledged => DeleteState::Acknowledged(SmdiMessage::Ack),
                DeleteOutcome::EndOfProcedure => {
                    DeleteState::Acknowledged(SmdiMessage::EndOfProcedure)
                }
                DeleteOutcome::Rejected(error) => DeleteState::Rejected {
                    error,
                    sample_absent: self.confirm_absent(),
                },
                DeleteOutcome::Unexpected(reply) => DeleteState::Failed(reply),
            },
            terminal => terminal,
        };
        if next != self.state {
            debug!(handle = %self.handle, from = %self.state, to = %next, "Delete state changed");
        }
        self.state = next;
        Ok(next)
    }

    /// Step until a terminal state is reached.
    pub fn run(mut self) -> Result<DeleteState, TransportError> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(self.state)
    }

    /// Follow-up existence query after a rejection. A failed query counts as
    /// "still present" so a rejection is never upgraded without evidence.
    fn confirm_absent(&self) -> bool {
        match self.session.sample_header(self.handle) {
            Ok(header) => header.is_none(),
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Existence re-check failed");
                false
            }
        }
    }
}

/// Lines reported to the user for a terminal state.
pub fn report_lines(state: &DeleteState, handle: SampleHandle) -> Vec<String> {
    match state {
        DeleteState::NotFound => vec![format!(
            "Sample {} not found on device {}",
            handle.sample_id, handle.address
        )],
        DeleteState::Acknowledged(_) => vec!["Sample deleted successfully.".to_string()],
        DeleteState::Rejected {
            error,
            sample_absent,
        } => {
            let mut lines = vec![explain_rejection(*error, handle.sample_id)];
            if *sample_absent {
                if *error == SmdiError::NoSample {
                    lines.push(CONFIRMED_ABSENT.to_string());
                }
                lines.push(DELETED_DESPITE_REJECT.to_string());
            }
            lines
        }
        DeleteState::Failed(reply) => vec![format!(
            "Failed to delete sample. Response: 0x{:08X}",
            reply.code()
        )],
        DeleteState::Checking | DeleteState::Requested => Vec::new(),
    }
}
