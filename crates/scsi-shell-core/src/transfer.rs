//! Sample transfer orchestration.
//!
//! Moves samples between a device and the host filesystem:
//! - direct transfers, where the local file already is in native form
//! - AIF transfers, staged through a temporary native file
//!
//! The staging file is owned by a [`StagingFile`] guard and removed on
//! every exit path.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::SampleHandle;
use crate::device::SmdiSession;
use crate::events::{ShellEvent, ShellObserver, TransferDirection};
use crate::protocol::SmdiMessage;
use crate::protocol::constants::SAMPLE_NAME_MAX;
use crate::sample::{AifVariant, Sample, SampleFileError, aif, native};
use crate::transport::{
    FileTransfer, SmdiTransport, TransferMonitor, TransmissionInfo, TransportError,
};

/// On-disk form of the local side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Native,
    Aif(AifVariant),
}

/// Everything needed to run one transfer. Built fresh per command.
#[derive(Debug, Clone)]
pub struct TransferDescriptor {
    pub handle: SampleHandle,
    pub direction: TransferDirection,
    pub path: PathBuf,
    pub format: FormatTag,
    /// Name to store an upload under.
    pub sample_name: Option<String>,
}

impl TransferDescriptor {
    /// Download into a native file.
    pub fn receive(handle: SampleHandle, path: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            direction: TransferDirection::Download,
            path: path.into(),
            format: FormatTag::Native,
            sample_name: None,
        }
    }

    /// Upload a native file, named after the file.
    pub fn send(handle: SampleHandle, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            handle,
            direction: TransferDirection::Upload,
            sample_name: Some(sample_name_for(&path)),
            path,
            format: FormatTag::Native,
        }
    }

    /// Download and save as AIF or AIF-C, chosen by the destination name.
    pub fn save_aif(handle: SampleHandle, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            handle,
            direction: TransferDirection::Download,
            format: FormatTag::Aif(AifVariant::for_path(&path)),
            path,
            sample_name: None,
        }
    }

    /// Load an AIF file and upload it under the name it carries.
    pub fn load_aif(handle: SampleHandle, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            handle,
            direction: TransferDirection::Upload,
            format: FormatTag::Aif(AifVariant::for_path(&path)),
            path,
            sample_name: None,
        }
    }
}

/// Sample name for an upload: the file's base name without its last
/// extension, cut to the protocol's name limit.
pub fn sample_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    truncate_name(stem)
}

fn truncate_name(mut name: String) -> String {
    if name.len() > SAMPLE_NAME_MAX {
        let mut end = SAMPLE_NAME_MAX;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

/// Progress of one transfer at one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total_bytes: u64,
    /// Never more than `total_bytes`.
    pub sent_bytes: u64,
    /// 0 when `total_bytes` is 0.
    pub percent: u32,
}

impl ProgressSnapshot {
    pub fn compute(total_bytes: u64, sent_bytes: u64) -> Self {
        let sent_bytes = sent_bytes.min(total_bytes);
        let percent = if total_bytes > 0 {
            (sent_bytes as u128 * 100 / total_bytes as u128) as u32
        } else {
            0
        };
        Self {
            total_bytes,
            sent_bytes,
            percent,
        }
    }
}

/// Turns packet counts into [`ProgressSnapshot`]s and forwards them to an
/// observer. [`last`](Self::last) holds the final value once the blocking
/// transfer call returns.
pub struct ProgressMeter<'a> {
    observer: &'a dyn ShellObserver,
    last: Option<ProgressSnapshot>,
}

impl<'a> ProgressMeter<'a> {
    pub fn new(observer: &'a dyn ShellObserver) -> Self {
        Self {
            observer,
            last: None,
        }
    }

    pub fn last(&self) -> Option<ProgressSnapshot> {
        self.last
    }
}

impl TransferMonitor for ProgressMeter<'_> {
    fn packets(&mut self, info: &TransmissionInfo) {
        let total = info.header.data_size();
        let mut sent = info.transmitted_packets as u64 * info.packet_size as u64;
        if let Some(prev) = self.last {
            sent = sent.max(prev.sent_bytes);
        }
        let snapshot = ProgressSnapshot::compute(total, sent);
        self.last = Some(snapshot);
        self.observer.on_event(&ShellEvent::Progress(snapshot));
    }
}

/// Descriptive fields of a sample, as printed after AIF conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSummary {
    pub name: String,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub sample_count: u32,
}

impl From<&Sample> for SampleSummary {
    fn from(sample: &Sample) -> Self {
        Self {
            name: sample.name.clone(),
            sample_rate: sample.sample_rate,
            bits_per_sample: sample.bits_per_sample,
            channels: sample.channels,
            sample_count: sample.sample_count,
        }
    }
}

/// Overall result class of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Every step succeeded.
    Complete,
    /// The device transfer succeeded but a later local step failed.
    Partial,
    /// Nothing useful happened.
    Failed,
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub reply: SmdiMessage,
    pub progress: Option<ProgressSnapshot>,
    /// Set for AIF conversions.
    pub sample: Option<SampleSummary>,
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        source: SampleFileError,
    },

    #[error("Failed to create staging file {}: {source}", .path.display())]
    Stage {
        path: PathBuf,
        source: SampleFileError,
    },

    #[error("Device replied {reply}")]
    Device {
        reply: SmdiMessage,
        progress: Option<ProgressSnapshot>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to load downloaded sample {}: {source}", .path.display())]
    Convert {
        path: PathBuf,
        source: SampleFileError,
    },

    #[error("Failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        source: SampleFileError,
    },
}

impl TransferError {
    pub fn status(&self) -> TransferStatus {
        match self {
            TransferError::Convert { .. } | TransferError::Save { .. } => TransferStatus::Partial,
            _ => TransferStatus::Failed,
        }
    }
}

/// Status of any transfer result.
pub fn status_of(result: &Result<TransferReport, TransferError>) -> TransferStatus {
    match result {
        Ok(_) => TransferStatus::Complete,
        Err(e) => e.status(),
    }
}

/// Temporary native file, removed when dropped.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// Staging path for `sample_id` inside `dir`.
    pub fn new(dir: &Path, sample_id: u32) -> Self {
        Self {
            path: dir.join(format!("smdi_temp_{}.{}", sample_id, native::NATIVE_EXTENSION)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Staging file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staging file"),
        }
    }
}

/// Drives transfers for one SMDI session.
pub struct TransferOrchestrator<'a, T: SmdiTransport + ?Sized> {
    session: &'a SmdiSession<'a, T>,
    staging_dir: PathBuf,
}

impl<'a, T: SmdiTransport + ?Sized> TransferOrchestrator<'a, T> {
    pub fn new(session: &'a SmdiSession<'a, T>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            staging_dir: staging_dir.into(),
        }
    }

    /// Run `desc` to completion.
    pub fn run(
        &self,
        desc: &TransferDescriptor,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        match (desc.direction, desc.format) {
            (TransferDirection::Download, FormatTag::Native) => {
                self.receive_native(desc.handle, &desc.path, observer)
            }
            (TransferDirection::Upload, FormatTag::Native) => self.send_native(
                desc.handle,
                &desc.path,
                desc.sample_name.as_deref(),
                observer,
            ),
            (TransferDirection::Download, FormatTag::Aif(variant)) => {
                self.download_to_aif(desc.handle, &desc.path, variant, observer)
            }
            (TransferDirection::Upload, FormatTag::Aif(_)) => {
                self.upload_from_aif(desc.handle, &desc.path, observer)
            }
        }
    }

    /// Download `handle` straight into a native file at `path`.
    pub fn receive_native(
        &self,
        handle: SampleHandle,
        path: &Path,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        let direction = TransferDirection::Download;
        observer.on_event(&ShellEvent::TransferStarted {
            direction,
            handle,
            path: path.display().to_string(),
        });

        let mut meter = ProgressMeter::new(observer);
        let transfer = FileTransfer {
            handle,
            path,
            sample_name: None,
            asynchronous: false,
        };
        let reply = self.session.receive_file(&transfer, &mut meter)?;
        self.finish(direction, handle, reply, meter.last(), observer)
    }

    /// Upload the native file at `path` to `handle`.
    pub fn send_native(
        &self,
        handle: SampleHandle,
        path: &Path,
        sample_name: Option<&str>,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        let direction = TransferDirection::Upload;
        observer.on_event(&ShellEvent::TransferStarted {
            direction,
            handle,
            path: path.display().to_string(),
        });

        let mut meter = ProgressMeter::new(observer);
        let transfer = FileTransfer {
            handle,
            path,
            sample_name,
            asynchronous: false,
        };
        let reply = self.session.send_file(&transfer, &mut meter)?;
        self.finish(direction, handle, reply, meter.last(), observer)
    }

    /// Download through a staging file and save as AIF/AIF-C at `dest`.
    pub fn download_to_aif(
        &self,
        handle: SampleHandle,
        dest: &Path,
        variant: AifVariant,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        let staging = StagingFile::new(&self.staging_dir, handle.sample_id);
        let mut report = self.receive_native(handle, staging.path(), observer)?;

        let sample = native::load(staging.path()).map_err(|source| TransferError::Convert {
            path: staging.path().to_path_buf(),
            source,
        })?;
        aif::save(&sample, dest, variant).map_err(|source| TransferError::Save {
            path: dest.to_path_buf(),
            source,
        })?;

        info!(path = %dest.display(), variant = ?variant, "Sample saved");
        report.sample = Some(SampleSummary::from(&sample));
        Ok(report)
    }

    /// Load the AIF file at `src`, stage it and upload it to `handle`.
    pub fn upload_from_aif(
        &self,
        handle: SampleHandle,
        src: &Path,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        let sample = aif::load(src).map_err(|source| TransferError::Load {
            path: src.to_path_buf(),
            source,
        })?;
        let summary = SampleSummary::from(&sample);
        observer.on_event(&ShellEvent::AifLoaded {
            path: src.display().to_string(),
            summary: summary.clone(),
        });

        let staging = StagingFile::new(&self.staging_dir, handle.sample_id);
        native::save(&sample, staging.path()).map_err(|source| TransferError::Stage {
            path: staging.path().to_path_buf(),
            source,
        })?;

        let mut report = self.send_native(handle, staging.path(), Some(sample.name.as_str()), observer)?;
        report.sample = Some(summary);
        Ok(report)
    }

    fn finish(
        &self,
        direction: TransferDirection,
        handle: SampleHandle,
        reply: SmdiMessage,
        progress: Option<ProgressSnapshot>,
        observer: &dyn ShellObserver,
    ) -> Result<TransferReport, TransferError> {
        observer.on_event(&ShellEvent::TransferFinished {
            direction,
            handle,
            reply,
        });
        if !reply.is_success() {
            return Err(TransferError::Device { reply, progress });
        }
        Ok(TransferReport {
            reply,
            progress,
            sample: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::address::DeviceAddress;
    use crate::events::NullObserver;
    use crate::sample::SampleHeader;
    use crate::sample::fixtures::ramp;
    use crate::transport::MockTransport;
    use crate::transport::mock::ScriptedDownload;

    struct Recorder(RefCell<Vec<ShellEvent>>);

    impl ShellObserver for Recorder {
        fn on_event(&self, event: &ShellEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn handle() -> SampleHandle {
        DeviceAddress::new(0, 2).sample(4)
    }

    fn script(mock: &MockTransport, reply: SmdiMessage, write_file: bool) {
        mock.script_download(ScriptedDownload {
            sample: ramp("Ramp", 600),
            reply,
            packets: 3,
            packet_size: 512,
            write_file,
        });
    }

    fn staging_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_progress_zero_total() {
        let p = ProgressSnapshot::compute(0, 4096);
        assert_eq!(p.percent, 0);
        assert_eq!(p.sent_bytes, 0);
    }

    #[test]
    fn test_progress_clamped() {
        let p = ProgressSnapshot::compute(1000, 1500);
        assert_eq!(p.sent_bytes, 1000);
        assert_eq!(p.percent, 100);
        assert_eq!(ProgressSnapshot::compute(1000, 333).percent, 33);
    }

    #[test]
    fn test_meter_never_decreases() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let mut meter = ProgressMeter::new(&recorder);
        let header = SampleHeader {
            length: 1000,
            channels: 1,
            bits_per_word: 16,
            ..Default::default()
        };
        for packets in [2, 1, 3] {
            meter.packets(&TransmissionInfo {
                header: header.clone(),
                packet_size: 512,
                transmitted_packets: packets,
            });
        }
        let sent: Vec<u64> = recorder
            .0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Progress(p) => Some(p.sent_bytes),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![1024, 1024, 1536]);
        assert_eq!(meter.last().unwrap().percent, 76);
    }

    #[test]
    fn test_sample_name_from_path() {
        assert_eq!(sample_name_for(Path::new("/tmp/piano.c3.sdmp")), "piano.c3");
        assert_eq!(sample_name_for(Path::new("kick")), "kick");
        let long = "x".repeat(300) + ".sdmp";
        assert_eq!(sample_name_for(Path::new(&long)).len(), SAMPLE_NAME_MAX);
    }

    #[test]
    fn test_descriptor_formats() {
        let d = TransferDescriptor::save_aif(handle(), "out.AIFC");
        assert_eq!(d.format, FormatTag::Aif(AifVariant::Aifc));
        let d = TransferDescriptor::save_aif(handle(), "out.aif");
        assert_eq!(d.format, FormatTag::Aif(AifVariant::Aiff));
        let d = TransferDescriptor::send(handle(), "dir/Strings.sdmp");
        assert_eq!(d.sample_name.as_deref(), Some("Strings"));
    }

    #[test]
    fn test_download_to_aif_success_cleans_staging() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("ramp.aif");
        let mock = MockTransport::new();
        script(&mock, SmdiMessage::EndOfProcedure, true);

        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result = orchestrator.run(&TransferDescriptor::save_aif(handle(), &dest), &NullObserver);

        assert_eq!(status_of(&result), TransferStatus::Complete);
        let report = result.unwrap();
        assert_eq!(report.sample.unwrap().sample_count, 600);
        assert_eq!(report.progress.unwrap().percent, 100);
        assert_eq!(aif::load(&dest).unwrap().data, ramp("Ramp", 600).data);
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_download_to_aif_partial_cleans_staging() {
        let staging = tempfile::tempdir().unwrap();
        let dest = staging.path().join("missing-dir").join("ramp.aif");
        let mock = MockTransport::new();
        script(&mock, SmdiMessage::EndOfProcedure, true);

        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result = orchestrator.download_to_aif(handle(), &dest, AifVariant::Aiff, &NullObserver);

        assert_eq!(status_of(&result), TransferStatus::Partial);
        assert!(matches!(result, Err(TransferError::Save { .. })));
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_download_to_aif_unreadable_staging_is_partial() {
        let staging = tempfile::tempdir().unwrap();
        let dest = staging.path().join("ramp.aif");
        let mock = MockTransport::new();
        script(&mock, SmdiMessage::EndOfProcedure, false);

        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result = orchestrator.download_to_aif(handle(), &dest, AifVariant::Aiff, &NullObserver);

        assert!(matches!(result, Err(TransferError::Convert { .. })));
        assert!(!dest.exists());
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_download_to_aif_failure_cleans_staging() {
        let staging = tempfile::tempdir().unwrap();
        let dest = staging.path().join("ramp.aif");
        let mock = MockTransport::new();
        // the device writes a file and then refuses
        script(&mock, SmdiMessage::MessageReject, true);

        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result = orchestrator.download_to_aif(handle(), &dest, AifVariant::Aiff, &NullObserver);

        assert_eq!(status_of(&result), TransferStatus::Failed);
        assert!(matches!(
            result,
            Err(TransferError::Device {
                reply: SmdiMessage::MessageReject,
                ..
            })
        ));
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_upload_from_aif() {
        let staging = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("ramp.aifc");
        aif::save(&ramp("Ramp Up", 64), &src, AifVariant::Aifc).unwrap();

        let mock = MockTransport::new();
        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let recorder = Recorder(RefCell::new(Vec::new()));
        let report = orchestrator
            .run(&TransferDescriptor::load_aif(handle(), &src), &recorder)
            .unwrap();

        assert_eq!(report.reply, SmdiMessage::EndOfProcedure);
        let uploads = mock.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].sample_name.as_deref(), Some("Ramp Up"));
        assert_eq!(native::from_bytes(&uploads[0].data).unwrap().sample_count, 64);
        assert!(matches!(
            recorder.0.borrow().first(),
            Some(ShellEvent::AifLoaded { .. })
        ));
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_upload_rejected_cleans_staging() {
        let staging = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let aif_path = src_dir.path().join("ramp.aif");
        aif::save(&ramp("Ramp", 16), &aif_path, AifVariant::Aiff).unwrap();

        let mock = MockTransport::new();
        mock.set_upload_reply(SmdiMessage::MessageReject);
        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result = orchestrator.upload_from_aif(handle(), &aif_path, &NullObserver);

        assert_eq!(status_of(&result), TransferStatus::Failed);
        assert_eq!(staging_entries(staging.path()), 0);
    }

    #[test]
    fn test_upload_missing_aif() {
        let staging = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, staging.path());
        let result =
            orchestrator.upload_from_aif(handle(), &staging.path().join("nope.aif"), &NullObserver);

        assert!(matches!(result, Err(TransferError::Load { .. })));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_send_native_accepts_ack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bass.sdmp");
        native::save(&ramp("ignored", 8), &path).unwrap();

        let mock = MockTransport::new();
        mock.set_upload_reply(SmdiMessage::Ack);
        let session = SmdiSession::new(&mock);
        let orchestrator = TransferOrchestrator::new(&session, dir.path());
        let report = orchestrator
            .run(&TransferDescriptor::send(handle(), &path), &NullObserver)
            .unwrap();

        assert_eq!(report.reply, SmdiMessage::Ack);
        assert_eq!(mock.uploads()[0].sample_name.as_deref(), Some("Bass"));
    }
}
