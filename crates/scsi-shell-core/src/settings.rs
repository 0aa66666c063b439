//! Shell settings and the logging seam.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::constants::{DATA_BUFFER_SIZE, MAX_SAMPLES};

/// Which test shell to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Raw SCSI passthrough shell.
    #[default]
    Aspi,
    /// SMDI sample transfer shell.
    Smdi,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Aspi => "ASPI",
            Variant::Smdi => "SMDI",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Variant::Aspi => "aspi> ",
            Variant::Smdi => "smdi> ",
        }
    }
}

/// Per-session configuration, handed to every command handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub variant: Variant,
    /// Ceiling for interactive raw send/receive buffers.
    pub buffer_limit: usize,
    /// Number of slots probed by `list`.
    pub max_samples: u32,
    /// Where AIF transfers stage their native files.
    pub staging_dir: PathBuf,
    /// Debug output toggled by the `debug` command.
    pub debug: bool,
    /// Debug log file set by the `logfile` command.
    pub log_file: Option<PathBuf>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            buffer_limit: DATA_BUFFER_SIZE,
            max_samples: MAX_SAMPLES,
            staging_dir: std::env::temp_dir(),
            debug: false,
            log_file: None,
        }
    }
}

impl ShellSettings {
    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: ShellSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Runtime control over the process's log output.
///
/// Implemented by the binary on top of its subscriber; the core only calls
/// through this trait.
pub trait LogControl {
    /// Raise or lower the log filter.
    fn set_debug(&self, enabled: bool) -> Result<()>;

    /// Also write logs to `path`, appending.
    fn set_log_file(&self, path: &Path) -> Result<()>;
}

/// Accepts every request and does nothing.
pub struct NullLogControl;

impl LogControl for NullLogControl {
    fn set_debug(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn set_log_file(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.toml");
        let settings = ShellSettings {
            variant: Variant::Smdi,
            max_samples: 64,
            log_file: Some(dir.path().join("debug.log")),
            ..Default::default()
        };
        settings.save_to_file(&path).unwrap();
        assert_eq!(ShellSettings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: ShellSettings = toml::from_str("variant = \"smdi\"\n").unwrap();
        assert_eq!(settings.variant, Variant::Smdi);
        assert_eq!(settings.buffer_limit, DATA_BUFFER_SIZE);
        assert_eq!(settings.max_samples, MAX_SAMPLES);
    }

    #[test]
    fn test_variant_prompts() {
        assert_eq!(Variant::Aspi.prompt(), "aspi> ");
        assert_eq!(Variant::Smdi.name(), "SMDI");
    }
}
