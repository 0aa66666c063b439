//! Event system for front-end decoupling.
//!
//! Transfers and the shell report what they are doing through
//! [`ShellObserver`], so the console renderer and the log stay out of the
//! core logic.

use std::fmt;

use crate::address::SampleHandle;
use crate::protocol::SmdiMessage;
use crate::transfer::{ProgressSnapshot, SampleSummary};

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Direction of a sample transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Device to host.
    Download,
    /// Host to device.
    Upload,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Download => write!(f, "download"),
            TransferDirection::Upload => write!(f, "upload"),
        }
    }
}

/// Events emitted while the shell works.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    /// A device transfer is about to start.
    TransferStarted {
        direction: TransferDirection,
        handle: SampleHandle,
        path: String,
    },
    /// Packet progress of the running transfer.
    Progress(ProgressSnapshot),
    /// The device answered the transfer.
    TransferFinished {
        direction: TransferDirection,
        handle: SampleHandle,
        reply: SmdiMessage,
    },
    /// An AIF file was read and is about to be staged.
    AifLoaded {
        path: String,
        summary: SampleSummary,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
}

/// Observer trait for receiving shell events.
///
/// Everything runs on one thread, so observers may use interior mutability
/// freely.
pub trait ShellObserver {
    fn on_event(&self, event: &ShellEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ShellObserver for NullObserver {
    fn on_event(&self, _event: &ShellEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ShellObserver for TracingObserver {
    fn on_event(&self, event: &ShellEvent) {
        match event {
            ShellEvent::TransferStarted {
                direction,
                handle,
                path,
            } => {
                tracing::info!(direction = %direction, handle = %handle, path = %path, "Transfer started");
            }
            ShellEvent::Progress(p) => {
                tracing::trace!(
                    sent = p.sent_bytes,
                    total = p.total_bytes,
                    progress = %format!("{}%", p.percent),
                    "Progress"
                );
            }
            ShellEvent::TransferFinished {
                direction,
                handle,
                reply,
            } => {
                if reply.is_success() {
                    tracing::info!(direction = %direction, handle = %handle, reply = %reply, "Transfer finished");
                } else {
                    tracing::warn!(direction = %direction, handle = %handle, reply = %reply, "Transfer refused");
                }
            }
            ShellEvent::AifLoaded { path, summary } => {
                tracing::info!(path = %path, name = %summary.name, frames = summary.sample_count, "AIF loaded");
            }
            ShellEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

/// Forwards every event to two observers.
pub struct Fanout<'a>(pub &'a dyn ShellObserver, pub &'a dyn ShellObserver);

impl ShellObserver for Fanout<'_> {
    fn on_event(&self, event: &ShellEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}
