//! Tracing setup with a runtime-adjustable level and log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use scsi_shell_core::LogControl;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Writer that appends to the current debug log file, or drops output when
/// none is set.
#[derive(Clone, Default)]
struct LogFileSink(Arc<Mutex<Option<File>>>);

impl Write for LogFileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(file) => file.write(buf),
                None => Ok(buf.len()),
            },
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock() {
            Ok(mut guard) => guard.as_mut().map_or(Ok(()), |file| file.flush()),
            Err(_) => Ok(()),
        }
    }
}

/// Handle the shell uses to toggle debug output and redirect the log.
pub struct Logging {
    filter: reload::Handle<EnvFilter, Registry>,
    base_level: Level,
    sink: LogFileSink,
}

impl Logging {
    /// Install the global subscriber: human-readable output on stderr plus
    /// an optional plain-text log file.
    pub fn init(verbose: bool) -> Result<Self> {
        let base_level = if verbose { Level::DEBUG } else { Level::WARN };
        let (filter, handle) = reload::Layer::new(filter_for(base_level));
        let sink = LogFileSink::default();

        let file_writer = sink.clone();
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || file_writer.clone()),
            )
            .try_init()?;

        Ok(Self {
            filter: handle,
            base_level,
            sink,
        })
    }
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

impl LogControl for Logging {
    fn set_debug(&self, enabled: bool) -> Result<()> {
        let level = if enabled { Level::DEBUG } else { self.base_level };
        self.filter
            .modify(|filter| *filter = filter_for(level))
            .map_err(|e| anyhow!("failed to update log filter: {}", e))
    }

    fn set_log_file(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut current = self
            .sink
            .0
            .lock()
            .map_err(|_| anyhow!("log file lock poisoned"))?;
        *current = Some(file);
        Ok(())
    }
}
