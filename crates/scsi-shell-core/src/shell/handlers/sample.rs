//! SMDI sample commands.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tracing::warn;

use super::{ConsoleObserver, HandlerContext};
use crate::address::{DeviceAddress, SampleHandle};
use crate::delete::{DeleteMachine, report_lines};
use crate::events::Fanout;
use crate::protocol::PeripheralType;
use crate::transfer::{
    SampleSummary, TransferDescriptor, TransferError, TransferOrchestrator, TransferReport,
};
use crate::transport::Backend;

pub(super) fn write_summary(out: &mut dyn Write, summary: &SampleSummary) -> std::io::Result<()> {
    writeln!(out, "  Name: {}", summary.name)?;
    writeln!(
        out,
        "  Rate: {} Hz, Bits: {}, Channels: {}",
        summary.sample_rate, summary.bits_per_sample, summary.channels
    )?;
    writeln!(out, "  Samples: {}", summary.sample_count)
}

/// Run `desc` with progress printed to the console.
fn run_transfer<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    desc: &TransferDescriptor,
) -> Result<TransferReport, TransferError> {
    let session = ctx.smdi();
    let orchestrator = TransferOrchestrator::new(&session, ctx.settings.staging_dir.clone());
    let base = ctx.observer;
    let console = ConsoleObserver::new(&mut *ctx.out);
    orchestrator.run(desc, &Fanout(&console, base))
}

pub(super) fn scan<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, host_adapter: u8) -> Result<()> {
    writeln!(ctx.out, "Scanning host adapter {} for SMDI devices...", host_adapter)?;
    writeln!(ctx.out, "ID | Type       | Vendor   | Product        | SMDI")?;
    writeln!(ctx.out, "---|------------|----------|----------------|------")?;

    let rows = ctx.smdi().scan(host_adapter);
    for row in &rows {
        writeln!(
            ctx.out,
            "{:2} | {:<10}| {:.8} | {:.16} | {}",
            row.scsi_id,
            PeripheralType::from_byte(row.info.device_type).short_name(),
            row.info.vendor,
            row.info.product,
            if row.info.smdi { "Yes" } else { "No" }
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

pub(super) fn list<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, addr: DeviceAddress) -> Result<()> {
    writeln!(ctx.out, "Listing samples on device {}...", addr)?;
    writeln!(
        ctx.out,
        "ID  | Name                           | Rate     | Length   | Bits | Ch"
    )?;
    writeln!(
        ctx.out,
        "----|--------------------------------|----------|----------|------|----"
    )?;

    let samples = match ctx.smdi().list(addr) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Listing failed");
            writeln!(ctx.out, "Failed to list samples on device {}", addr)?;
            return Ok(());
        }
    };
    for s in &samples {
        writeln!(
            ctx.out,
            "{:3} | {:<30} | {:8} | {:8} | {:4} | {:2}",
            s.sample_id,
            s.header.name,
            s.header.sample_rate(),
            s.header.length,
            s.header.bits_per_word,
            s.header.channels
        )?;
    }

    if samples.is_empty() {
        writeln!(ctx.out, "No samples found on device {}", addr)?;
    } else {
        writeln!(ctx.out, "{} sample(s) found on device {}", samples.len(), addr)?;
    }
    Ok(())
}

pub(super) fn info<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, handle: SampleHandle) -> Result<()> {
    let header = match ctx.smdi().sample_header(handle) {
        Ok(Some(header)) => header,
        Ok(None) => return not_found(ctx, handle),
        Err(e) => {
            warn!(handle = %handle, error = %e, "Header request failed");
            return not_found(ctx, handle);
        }
    };

    let out = &mut *ctx.out;
    writeln!(out, "Sample Information for ID {}:", handle.sample_id)?;
    writeln!(out, "Name:            {}", header.name)?;
    writeln!(out, "Sample Rate:     {} Hz", header.sample_rate())?;
    writeln!(out, "Sample Length:   {} samples", header.length)?;
    writeln!(out, "Channels:        {}", header.channels)?;
    writeln!(out, "Bits per Sample: {}", header.bits_per_word)?;
    writeln!(out, "Root Note:       {}", header.pitch)?;
    writeln!(out, "Fine Tune:       {} cents", header.pitch_fraction)?;
    writeln!(out, "Loop Type:       {}", header.loop_control)?;
    if header.loop_control.is_looped() {
        writeln!(out, "Loop Start:      {}", header.loop_start)?;
        writeln!(out, "Loop End:        {}", header.loop_end)?;
    }
    writeln!(out, "Data Size:       {} bytes", header.data_size())?;
    Ok(())
}

fn not_found<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, handle: SampleHandle) -> Result<()> {
    writeln!(
        ctx.out,
        "Sample {} not found on device {}",
        handle.sample_id, handle.address
    )?;
    Ok(())
}

pub(super) fn receive<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    handle: SampleHandle,
    path: &Path,
) -> Result<()> {
    writeln!(
        ctx.out,
        "Downloading sample {} from device {} to file '{}'...",
        handle.sample_id,
        handle.address,
        path.display()
    )?;
    let result = run_transfer(ctx, &TransferDescriptor::receive(handle, path));
    writeln!(ctx.out)?;

    match result {
        Ok(_) => writeln!(ctx.out, "Sample downloaded successfully.")?,
        Err(e) => report_device_failure(ctx, "download", &e)?,
    }
    Ok(())
}

pub(super) fn send<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    handle: SampleHandle,
    path: &Path,
) -> Result<()> {
    writeln!(
        ctx.out,
        "Uploading file '{}' to device {} as sample {}...",
        path.display(),
        handle.address,
        handle.sample_id
    )?;
    let result = run_transfer(ctx, &TransferDescriptor::send(handle, path));
    writeln!(ctx.out)?;

    match result {
        Ok(_) => writeln!(ctx.out, "Sample uploaded successfully.")?,
        Err(e) => report_device_failure(ctx, "upload", &e)?,
    }
    Ok(())
}

pub(super) fn delete<T: Backend + ?Sized>(ctx: &mut HandlerContext<'_, T>, handle: SampleHandle) -> Result<()> {
    writeln!(
        ctx.out,
        "Deleting sample {} from device {}...",
        handle.sample_id, handle.address
    )?;

    let session = ctx.smdi();
    match DeleteMachine::new(&session, handle).run() {
        Ok(state) => {
            for line in report_lines(&state, handle) {
                writeln!(ctx.out, "{}", line)?;
            }
        }
        Err(e) => {
            warn!(handle = %handle, error = %e, "Delete aborted");
            writeln!(ctx.out, "Failed to delete sample: {}", e)?;
        }
    }
    Ok(())
}

pub(super) fn load_aif<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    path: &Path,
    handle: SampleHandle,
) -> Result<()> {
    writeln!(
        ctx.out,
        "Loading AIF file '{}' and sending to device {} as sample {}...",
        path.display(),
        handle.address,
        handle.sample_id
    )?;

    match run_transfer(ctx, &TransferDescriptor::load_aif(handle, path)) {
        Err(TransferError::Load { source, .. }) => {
            warn!(error = %source, "AIF load failed");
            writeln!(ctx.out, "Failed to load AIF file '{}'.", path.display())?;
        }
        Err(TransferError::Stage { source, .. }) => {
            warn!(error = %source, "Staging failed");
            writeln!(ctx.out, "Failed to create temporary file.")?;
        }
        Ok(_) => {
            writeln!(ctx.out)?;
            writeln!(ctx.out, "Sample uploaded successfully.")?;
        }
        Err(e) => {
            writeln!(ctx.out)?;
            report_device_failure(ctx, "upload", &e)?;
        }
    }
    Ok(())
}

pub(super) fn save_aif<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    handle: SampleHandle,
    path: &Path,
) -> Result<()> {
    writeln!(
        ctx.out,
        "Downloading sample {} from device {} and saving as {}...",
        handle.sample_id,
        handle.address,
        path.display()
    )?;
    let result = run_transfer(ctx, &TransferDescriptor::save_aif(handle, path));
    writeln!(ctx.out)?;

    match result {
        Ok(report) => {
            writeln!(ctx.out, "Sample saved as {} successfully.", path.display())?;
            if let Some(summary) = &report.sample {
                write_summary(&mut *ctx.out, summary)?;
            }
        }
        Err(TransferError::Convert { source, .. }) => {
            warn!(error = %source, "Staged sample unreadable");
            writeln!(ctx.out, "Failed to load downloaded sample.")?;
        }
        Err(TransferError::Save { source, .. }) => {
            warn!(error = %source, "AIF save failed");
            writeln!(ctx.out, "Failed to save as AIF file.")?;
        }
        Err(e) => report_device_failure(ctx, "download", &e)?,
    }
    Ok(())
}

/// "Failed to <verb> sample" with the device's reply code when there is one.
fn report_device_failure<T: Backend + ?Sized>(
    ctx: &mut HandlerContext<'_, T>,
    verb: &str,
    error: &TransferError,
) -> Result<()> {
    match error {
        TransferError::Device { reply, .. } => writeln!(
            ctx.out,
            "Failed to {} sample. Error code: 0x{:08X}",
            verb,
            reply.code()
        )?,
        other => {
            warn!(error = %other, "Transfer failed");
            writeln!(ctx.out, "Failed to {} sample: {}", verb, other)?;
        }
    }
    Ok(())
}
