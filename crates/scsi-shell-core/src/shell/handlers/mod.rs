//! Command handlers - one function per shell command.
//!
//! Handlers render every device or file failure as text and return `Ok`;
//! only errors writing to the output stream propagate.

mod control;
mod raw;
mod sample;

use std::cell::RefCell;
use std::io::Write;

use anyhow::Result;

use crate::device::{ScsiSession, SmdiSession};
use crate::events::{ShellEvent, ShellObserver};
use crate::settings::{LogControl, ShellSettings};
use crate::transport::Backend;

use super::command::Command;

/// Everything a handler may touch.
pub struct HandlerContext<'a, T: Backend + ?Sized> {
    pub backend: &'a T,
    pub settings: &'a mut ShellSettings,
    pub log_control: &'a dyn LogControl,
    pub observer: &'a dyn ShellObserver,
    pub out: &'a mut dyn Write,
}

impl<'a, T: Backend + ?Sized> HandlerContext<'a, T> {
    fn scsi(&self) -> ScsiSession<'a, T> {
        ScsiSession::new(self.backend)
    }

    fn smdi(&self) -> SmdiSession<'a, T> {
        SmdiSession::new(self.backend).with_max_samples(self.settings.max_samples)
    }
}

/// Run one resolved command.
pub fn handle<T: Backend + ?Sized>(command: Command, ctx: &mut HandlerContext<'_, T>) -> Result<()> {
    match command {
        Command::Help => control::help(ctx),
        Command::Quit => Ok(()),
        Command::Debug(enabled) => control::debug(ctx, enabled),
        Command::LogFile(path) => control::log_file(ctx, &path),

        Command::Check => raw::check(ctx),
        Command::Scan { host_adapter } => raw::scan(ctx, host_adapter),
        Command::Ready(addr) => raw::ready(ctx, addr),
        Command::Inquire(addr) => raw::inquire(ctx, addr),
        Command::RawSend { addr, hex } => raw::send(ctx, addr, &hex),
        Command::RawReceive { addr, size } => raw::receive(ctx, addr, size),
        Command::DumpFile { path, addr, size } => raw::dump_file(ctx, &path, addr, size),
        Command::SendFile { path, addr } => raw::send_file(ctx, &path, addr),

        Command::SmdiScan { host_adapter } => sample::scan(ctx, host_adapter),
        Command::List(addr) => sample::list(ctx, addr),
        Command::Info(handle) => sample::info(ctx, handle),
        Command::ReceiveSample { handle, path } => sample::receive(ctx, handle, &path),
        Command::SendSample { handle, path } => sample::send(ctx, handle, &path),
        Command::Delete(handle) => sample::delete(ctx, handle),
        Command::LoadAif { path, handle } => sample::load_aif(ctx, &path, handle),
        Command::SaveAif { handle, path } => sample::save_aif(ctx, handle, &path),
    }
}

/// Prints transfer progress and AIF load summaries as they happen.
struct ConsoleObserver<'w> {
    out: RefCell<&'w mut dyn Write>,
}

impl<'w> ConsoleObserver<'w> {
    fn new(out: &'w mut dyn Write) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    fn render(&self, event: &ShellEvent) -> std::io::Result<()> {
        let mut out = self.out.borrow_mut();
        match event {
            ShellEvent::Progress(p) => {
                write!(
                    out,
                    "\rProgress: {}% ({} of {} bytes)    ",
                    p.percent, p.sent_bytes, p.total_bytes
                )?;
                out.flush()
            }
            ShellEvent::AifLoaded { summary, .. } => {
                writeln!(out, "AIF file loaded successfully:")?;
                sample::write_summary(&mut **out, summary)
            }
            _ => Ok(()),
        }
    }
}

impl ShellObserver for ConsoleObserver<'_> {
    fn on_event(&self, event: &ShellEvent) {
        if let Err(e) = self.render(event) {
            tracing::warn!(error = %e, "Failed to write progress");
        }
    }
}
