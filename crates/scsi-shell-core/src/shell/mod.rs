//! Interactive command shell.
//!
//! Reads one line at a time, resolves it against the variant's command
//! table and runs the handler before reading the next line. The loop ends on
//! `quit`/`exit` or end of input.

pub mod command;
pub mod handlers;

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::{debug, info};

use crate::device::SmdiSession;
use crate::events::{ShellObserver, TracingObserver};
use crate::settings::{LogControl, NullLogControl, ShellSettings, Variant};
use crate::transport::Backend;

use command::{Command, resolve, tokenize};
use handlers::{HandlerContext, handle};

/// The read-eval-print loop for one variant.
pub struct Shell<'a, T: Backend + ?Sized> {
    backend: &'a T,
    settings: ShellSettings,
    log_control: &'a dyn LogControl,
    observer: &'a dyn ShellObserver,
}

impl<'a, T: Backend + ?Sized> Shell<'a, T> {
    pub fn new(backend: &'a T, settings: ShellSettings) -> Self {
        Self {
            backend,
            settings,
            log_control: &NullLogControl,
            observer: &TracingObserver,
        }
    }

    pub fn with_log_control(mut self, log_control: &'a dyn LogControl) -> Self {
        self.log_control = log_control;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ShellObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    /// Run until `quit`, `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        let variant = self.settings.variant;
        info!(variant = variant.name(), "Shell started");

        writeln!(out, "IRIX {} Test Shell", variant.name())?;
        writeln!(out, "===================")?;
        writeln!(out, "Type 'help' for a list of commands")?;

        if variant == Variant::Smdi {
            let session = SmdiSession::new(self.backend);
            if session.init() {
                writeln!(out, "SMDI is available")?;
            } else {
                writeln!(out, "SMDI is not available")?;
            }
            if self.settings.debug {
                session.set_debug(true);
            }
        }

        let mut raw = Vec::new();
        loop {
            write!(out, "\n{}", variant.prompt())?;
            out.flush()?;

            raw.clear();
            if input.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            let tokens = tokenize(&line);
            if tokens.is_empty() {
                continue;
            }

            match resolve(variant, &tokens) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    debug!(command = ?command, "Executing");
                    self.execute(command, out)?;
                }
                Err(e) => writeln!(out, "{}", e)?,
            }
        }

        writeln!(out, "\nExiting {} Test Shell", variant.name())?;
        info!("Shell finished");
        Ok(())
    }

    /// Run a single resolved command.
    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<()> {
        let mut ctx = HandlerContext {
            backend: self.backend,
            settings: &mut self.settings,
            log_control: self.log_control,
            observer: self.observer,
            out,
        };
        handle(command, &mut ctx)
    }
}
