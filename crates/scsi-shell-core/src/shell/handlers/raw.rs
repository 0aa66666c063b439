//! Raw SCSI commands.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::HandlerContext;
use crate::address::DeviceAddress;
use crate::hex;
use crate::protocol::PeripheralType;
use crate::transport::Backend;

/// Zeroed buffer of exactly `size` bytes, or `None` if it cannot be allocated.
fn alloc_buffer(size: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).ok()?;
    buf.resize(size, 0);
    Some(buf)
}

pub(super) fn check<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>) -> Result<()> {
    if ctx.scsi().check() {
        writeln!(ctx.out, "ASPI is available")?;
    } else {
        writeln!(ctx.out, "ASPI is not available")?;
    }
    Ok(())
}

pub(super) fn scan<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, host_adapter: u8) -> Result<()> {
    writeln!(ctx.out, "Scanning host adapter {} for devices...", host_adapter)?;
    writeln!(ctx.out, "ID | Type       | Vendor   | Product        | Revision")?;
    writeln!(ctx.out, "---|------------|----------|----------------|----------")?;

    let rows = ctx.scsi().scan(host_adapter);
    for row in &rows {
        writeln!(
            ctx.out,
            "{:2} | {:<10}| {} | {} | {}",
            row.scsi_id,
            PeripheralType::from_byte(row.device_type).short_name(),
            row.inquiry.vendor(),
            row.inquiry.product(),
            row.inquiry.revision()
        )?;
    }

    if rows.is_empty() {
        writeln!(ctx.out, "No devices found on host adapter {}", host_adapter)?;
    } else {
        writeln!(
            ctx.out,
            "{} device(s) found on host adapter {}",
            rows.len(),
            host_adapter
        )?;
    }
    Ok(())
}

pub(super) fn ready<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, addr: DeviceAddress) -> Result<()> {
    if ctx.scsi().ready(addr) {
        writeln!(ctx.out, "Device {} is ready", addr)?;
    } else {
        writeln!(ctx.out, "Device {} is NOT ready", addr)?;
    }
    Ok(())
}

pub(super) fn inquire<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, addr: DeviceAddress) -> Result<()> {
    let inquiry = match ctx.scsi().inquire(addr) {
        Ok(inquiry) => inquiry,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Inquiry failed");
            writeln!(ctx.out, "Inquiry failed for device {}", addr)?;
            return Ok(());
        }
    };

    writeln!(ctx.out, "Inquiry data for device {}", addr)?;
    writeln!(ctx.out, "Device type: {}", inquiry.peripheral_type())?;
    writeln!(ctx.out, "Vendor: {}", inquiry.vendor())?;
    writeln!(ctx.out, "Product: {}", inquiry.product())?;
    writeln!(ctx.out, "Revision: {}", inquiry.revision())?;
    writeln!(ctx.out, "Raw data:")?;
    write!(ctx.out, "{}", hex::hex_dump(inquiry.standard_bytes()))?;
    Ok(())
}

pub(super) fn send<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    addr: DeviceAddress,
    hex_data: &str,
) -> Result<()> {
    let data = hex::decode(hex_data, ctx.settings.buffer_limit);
    if data.is_empty() {
        writeln!(ctx.out, "Error: Invalid hex data")?;
        return Ok(());
    }

    writeln!(ctx.out, "Sending {} bytes to device {}...", data.len(), addr)?;
    let sent = ctx.scsi().send(addr, &data).is_ok();
    report_send(ctx, sent)
}

pub(super) fn receive<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    addr: DeviceAddress,
    size: usize,
) -> Result<()> {
    if size > ctx.settings.buffer_limit {
        writeln!(
            ctx.out,
            "Error: Size exceeds buffer limit ({} bytes)",
            ctx.settings.buffer_limit
        )?;
        return Ok(());
    }

    writeln!(ctx.out, "Receiving {} bytes from device {}...", size, addr)?;
    let mut buf = vec![0u8; size];
    match ctx.scsi().receive(addr, &mut buf) {
        Ok(n) => {
            writeln!(ctx.out, "Received {} bytes:", n)?;
            write!(ctx.out, "{}", hex::hex_dump(&buf[..n]))?;
        }
        Err(e) => {
            debug!(error = %e, "Receive failed");
            writeln!(ctx.out, "Failed to receive data")?;
        }
    }
    Ok(())
}

pub(super) fn dump_file<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    path: &Path,
    addr: DeviceAddress,
    size: usize,
) -> Result<()> {
    let Some(mut buf) = alloc_buffer(size) else {
        writeln!(ctx.out, "Error: Failed to allocate memory for {} bytes", size)?;
        return Ok(());
    };

    writeln!(ctx.out, "Receiving {} bytes from device {}...", size, addr)?;
    let received = match ctx.scsi().receive(addr, &mut buf) {
        Ok(n) => n,
        Err(e) => {
            debug!(error = %e, "Receive failed");
            writeln!(ctx.out, "Failed to receive data")?;
            return Ok(());
        }
    };
    writeln!(ctx.out, "Received {} bytes", received)?;

    let mut file = match File::create(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Open for writing failed");
            writeln!(ctx.out, "Error opening file '{}' for writing", path.display())?;
            return Ok(());
        }
    };
    match file.write_all(&buf[..received]) {
        Ok(()) => writeln!(ctx.out, "Data written to file '{}'", path.display())?,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Write failed");
            writeln!(ctx.out, "Error writing to file '{}'", path.display())?;
        }
    }
    Ok(())
}

pub(super) fn send_file<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    path: &Path,
    addr: DeviceAddress,
) -> Result<()> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Open for reading failed");
            writeln!(ctx.out, "Error opening file '{}' for reading", path.display())?;
            return Ok(());
        }
    };

    let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut data = Vec::new();
    if data
        .try_reserve_exact(usize::try_from(file_size).unwrap_or(usize::MAX))
        .is_err()
    {
        writeln!(ctx.out, "Error: Failed to allocate memory for {} bytes", file_size)?;
        return Ok(());
    }

    let bytes_read = match file.read_to_end(&mut data) {
        Ok(n) => n as u64,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Read failed");
            data.len() as u64
        }
    };
    if bytes_read != file_size {
        writeln!(
            ctx.out,
            "Error: Read {} bytes, expected {} bytes",
            bytes_read, file_size
        )?;
        return Ok(());
    }

    writeln!(
        ctx.out,
        "Sending {} bytes from file '{}' to device {}...",
        file_size,
        path.display(),
        addr
    )?;
    let sent = ctx.scsi().send(addr, &data).is_ok();
    report_send(ctx, sent)
}

fn report_send<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, sent: bool) -> Result<()> {
    if sent {
        writeln!(ctx.out, "Data sent successfully")?;
    } else {
        writeln!(ctx.out, "Failed to send data")?;
    }
    Ok(())
}
