//! Help, debug and log file commands.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use super::HandlerContext;
use crate::events::{LogLevel, ShellEvent};
use crate::shell::command::commands;
use crate::transport::Backend;

pub(super) fn help<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>) -> Result<()> {
    let variant = ctx.settings.variant;
    let title = format!("IRIX {} Test Shell Commands:", variant.name());
    writeln!(ctx.out)?;
    writeln!(ctx.out, "{}", title)?;
    writeln!(ctx.out, "{}", "-".repeat(title.len()))?;
    for spec in commands(variant) {
        writeln!(ctx.out, "{}", spec.help)?;
    }
    writeln!(ctx.out)?;
    Ok(())
}

pub(super) fn debug<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, enabled: bool) -> Result<()> {
    ctx.settings.debug = enabled;
    if let Err(e) = ctx.log_control.set_debug(enabled) {
        warn!(error = %e, "Could not change log filter");
    }
    ctx.smdi().set_debug(enabled);
    ctx.observer.on_event(&ShellEvent::Log {
        level: LogLevel::Debug,
        message: format!("Debug output {}", if enabled { "on" } else { "off" }),
    });

    if enabled {
        writeln!(ctx.out, "Debug output enabled")?;
    } else {
        writeln!(ctx.out, "Debug output disabled")?;
    }
    Ok(())
}

pub(super) fn log_file<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, path: &Path) -> Result<()> {
    match ctx.log_control.set_log_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Debug log file set");
            ctx.settings.log_file = Some(path.to_path_buf());
            writeln!(ctx.out, "Debug log file set to '{}'", path.display())?;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not open log file");
            writeln!(ctx.out, "Failed to set debug log file to '{}'", path.display())?;
        }
    }
    Ok(())
}
