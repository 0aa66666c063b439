//! Command line tokenizing and resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::address::{DeviceAddress, SampleHandle, parse_number};
use crate::settings::Variant;

/// Command name plus at most four arguments; further tokens are ignored.
pub const MAX_TOKENS: usize = 5;

/// Split a line on whitespace, keeping at most [`MAX_TOKENS`] tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().take(MAX_TOKENS).collect()
}

/// One row of a variant's command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    /// Arguments required after the command name.
    pub min_args: usize,
    pub usage: &'static str,
    /// Line shown by `help`.
    pub help: &'static str,
}

impl CommandSpec {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.alias == Some(name)
    }
}

const fn spec(
    name: &'static str,
    alias: Option<&'static str>,
    min_args: usize,
    usage: &'static str,
    help: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        alias,
        min_args,
        usage,
        help,
    }
}

const ASPI_COMMANDS: &[CommandSpec] = &[
    spec("help", Some("?"), 0, "help", "help                  - Display this help message"),
    spec("check", None, 0, "check", "check                 - Check if ASPI is available"),
    spec("scan", None, 1, "scan <ha_id>", "scan <ha_id>          - Scan for devices on host adapter"),
    spec("ready", None, 2, "ready <ha_id> <id>", "ready <ha_id> <id>    - Test if unit is ready"),
    spec("inquire", None, 2, "inquire <ha_id> <id>", "inquire <ha_id> <id>  - Get device information"),
    spec("send", None, 3, "send <ha_id> <id> <hex_data>", "send <ha_id> <id> <hex_data> - Send data to device"),
    spec("receive", None, 3, "receive <ha_id> <id> <size>", "receive <ha_id> <id> <size>  - Receive data from device"),
    spec("debug", None, 0, "debug [on|off]", "debug [on|off]        - Enable/disable debug output"),
    spec("logfile", None, 1, "logfile <filename>", "logfile <filename>    - Set debug log file"),
    spec("dumpfile", None, 4, "dumpfile <filename> <ha_id> <id> <size>", "dumpfile <filename> <ha_id> <id> <size> - Dump data from device to file"),
    spec("sendfile", None, 3, "sendfile <filename> <ha_id> <id>", "sendfile <filename> <ha_id> <id> - Send file data to device"),
    spec("quit", Some("exit"), 0, "quit", "quit                  - Exit the program"),
];

const SMDI_COMMANDS: &[CommandSpec] = &[
    spec("help", Some("?"), 0, "help", "help                          - Display this help message"),
    spec("scan", None, 1, "scan <ha_id>", "scan <ha_id>                  - Scan for SMDI devices on host adapter"),
    spec("list", None, 2, "list <ha_id> <id>", "list <ha_id> <id>             - List samples on device"),
    spec("info", None, 3, "info <ha_id> <id> <sample_id>", "info <ha_id> <id> <sample_id> - Get sample info"),
    spec("receive", None, 4, "receive <ha_id> <id> <sample_id> <file>", "receive <ha_id> <id> <sample_id> <file> - Download sample to file"),
    spec("send", None, 4, "send <ha_id> <id> <file> <sample_id>", "send <ha_id> <id> <file> <sample_id>    - Upload file to device"),
    spec("delete", None, 3, "delete <ha_id> <id> <sample_id>", "delete <ha_id> <id> <sample_id>         - Delete sample from device"),
    spec("debug", None, 0, "debug [on|off]", "debug [on|off]                - Enable/disable debug output"),
    spec("logfile", None, 1, "logfile <filename>", "logfile <filename>            - Set debug log file"),
    spec("loadaif", None, 4, "loadaif <file.aif> <sample_id> <ha_id> <id>", "loadaif <file.aif> <sample_id> <ha_id> <id> - Load AIF and send to device"),
    spec("saveaif", None, 4, "saveaif <ha_id> <id> <sample_id> <file.aif>", "saveaif <ha_id> <id> <sample_id> <file.aif> - Receive sample and save as AIF"),
    spec("quit", Some("exit"), 0, "quit", "quit                          - Exit the program"),
];

/// Command table of `variant`, in help order.
pub fn commands(variant: Variant) -> &'static [CommandSpec] {
    match variant {
        Variant::Aspi => ASPI_COMMANDS,
        Variant::Smdi => SMDI_COMMANDS,
    }
}

/// Exact, case-sensitive lookup.
pub fn lookup(variant: Variant, name: &str) -> Option<&'static CommandSpec> {
    commands(variant).iter().find(|spec| spec.matches(name))
}

/// A fully validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    /// Enable or disable debug output.
    Debug(bool),
    LogFile(PathBuf),

    // raw SCSI
    Check,
    Scan { host_adapter: u8 },
    Ready(DeviceAddress),
    Inquire(DeviceAddress),
    RawSend { addr: DeviceAddress, hex: String },
    RawReceive { addr: DeviceAddress, size: usize },
    DumpFile { path: PathBuf, addr: DeviceAddress, size: usize },
    SendFile { path: PathBuf, addr: DeviceAddress },

    // SMDI
    SmdiScan { host_adapter: u8 },
    List(DeviceAddress),
    Info(SampleHandle),
    ReceiveSample { handle: SampleHandle, path: PathBuf },
    SendSample { handle: SampleHandle, path: PathBuf },
    Delete(SampleHandle),
    LoadAif { path: PathBuf, handle: SampleHandle },
    SaveAif { handle: SampleHandle, path: PathBuf },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Too few arguments, or an argument that does not parse.
    #[error("Usage: {usage}")]
    Usage { usage: &'static str },

    #[error("Unknown command: {0}\nType 'help' for a list of commands")]
    Unknown(String),
}

/// Resolve tokens from [`tokenize`] into a [`Command`].
///
/// Callers skip empty lines before calling this.
pub fn resolve(variant: Variant, tokens: &[&str]) -> Result<Command, CommandError> {
    let Some((&name, args)) = tokens.split_first() else {
        return Err(CommandError::Unknown(String::new()));
    };
    let spec = lookup(variant, name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
    if args.len() < spec.min_args {
        return Err(CommandError::Usage { usage: spec.usage });
    }

    let usage = || CommandError::Usage { usage: spec.usage };
    let num = |i: usize| -> Result<u32, CommandError> { parse_number(args[i]).ok_or_else(usage) };
    let byte = |i: usize| -> Result<u8, CommandError> { parse_number(args[i]).ok_or_else(usage) };
    let size = |i: usize| -> Result<usize, CommandError> { parse_number(args[i]).ok_or_else(usage) };
    let addr = |i: usize| -> Result<DeviceAddress, CommandError> {
        DeviceAddress::parse(args[i], args[i + 1]).ok_or_else(usage)
    };
    let path = |i: usize| PathBuf::from(args[i]);

    let command = match (variant, spec.name) {
        (_, "help") => Command::Help,
        (_, "quit") => Command::Quit,
        (_, "debug") => Command::Debug(args.first().is_none_or(|a| *a != "off")),
        (_, "logfile") => Command::LogFile(path(0)),

        (Variant::Aspi, "check") => Command::Check,
        (Variant::Aspi, "scan") => Command::Scan {
            host_adapter: byte(0)?,
        },
        (Variant::Aspi, "ready") => Command::Ready(addr(0)?),
        (Variant::Aspi, "inquire") => Command::Inquire(addr(0)?),
        (Variant::Aspi, "send") => Command::RawSend {
            addr: addr(0)?,
            hex: args[2].to_string(),
        },
        (Variant::Aspi, "receive") => Command::RawReceive {
            addr: addr(0)?,
            size: size(2)?,
        },
        (Variant::Aspi, "dumpfile") => Command::DumpFile {
            path: path(0),
            addr: addr(1)?,
            size: size(3)?,
        },
        (Variant::Aspi, "sendfile") => Command::SendFile {
            path: path(0),
            addr: addr(1)?,
        },

        (Variant::Smdi, "scan") => Command::SmdiScan {
            host_adapter: byte(0)?,
        },
        (Variant::Smdi, "list") => Command::List(addr(0)?),
        (Variant::Smdi, "info") => Command::Info(addr(0)?.sample(num(2)?)),
        (Variant::Smdi, "receive") => Command::ReceiveSample {
            handle: addr(0)?.sample(num(2)?),
            path: path(3),
        },
        (Variant::Smdi, "send") => Command::SendSample {
            handle: addr(0)?.sample(num(3)?),
            path: path(2),
        },
        (Variant::Smdi, "delete") => Command::Delete(addr(0)?.sample(num(2)?)),
        (Variant::Smdi, "loadaif") => Command::LoadAif {
            path: path(0),
            handle: addr(2)?.sample(num(1)?),
        },
        (Variant::Smdi, "saveaif") => Command::SaveAif {
            handle: addr(0)?.sample(num(2)?),
            path: path(3),
        },

        _ => return Err(CommandError::Unknown(name.to_string())),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspi(line: &str) -> Result<Command, CommandError> {
        resolve(Variant::Aspi, &tokenize(line))
    }

    fn smdi(line: &str) -> Result<Command, CommandError> {
        resolve(Variant::Smdi, &tokenize(line))
    }

    #[test]
    fn test_tokenize_caps_fields() {
        assert_eq!(tokenize("  a\tb  c d e f g\n"), vec!["a", "b", "c", "d", "e"]);
        assert!(tokenize(" \t \n").is_empty());
    }

    #[test]
    fn test_usage_on_missing_args() {
        assert_eq!(
            aspi("ready 0"),
            Err(CommandError::Usage {
                usage: "ready <ha_id> <id>"
            })
        );
        assert_eq!(
            aspi("dumpfile out.bin 0 1").unwrap_err().to_string(),
            "Usage: dumpfile <filename> <ha_id> <id> <size>"
        );
        assert_eq!(
            smdi("saveaif 0 2 1").unwrap_err().to_string(),
            "Usage: saveaif <ha_id> <id> <sample_id> <file.aif>"
        );
    }

    #[test]
    fn test_invalid_numbers_are_usage_errors() {
        assert_eq!(
            aspi("scan x"),
            Err(CommandError::Usage {
                usage: "scan <ha_id>"
            })
        );
        assert!(matches!(
            smdi("info 0 2 -5"),
            Err(CommandError::Usage { .. })
        ));
        assert!(matches!(aspi("ready 0 256"), Err(CommandError::Usage { .. })));
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        assert_eq!(
            aspi("HELP").unwrap_err().to_string(),
            "Unknown command: HELP\nType 'help' for a list of commands"
        );
        assert!(matches!(aspi("list 0 2"), Err(CommandError::Unknown(_))));
        assert!(matches!(smdi("check"), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(aspi("?"), Ok(Command::Help));
        assert_eq!(smdi("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_debug_argument() {
        assert_eq!(aspi("debug"), Ok(Command::Debug(true)));
        assert_eq!(aspi("debug on"), Ok(Command::Debug(true)));
        assert_eq!(aspi("debug off"), Ok(Command::Debug(false)));
        assert_eq!(smdi("debug maybe"), Ok(Command::Debug(true)));
    }

    #[test]
    fn test_argument_order() {
        let addr = DeviceAddress::new(1, 3);
        assert_eq!(
            smdi("send 1 3 kick.sdmp 12"),
            Ok(Command::SendSample {
                handle: addr.sample(12),
                path: "kick.sdmp".into()
            })
        );
        assert_eq!(
            smdi("loadaif kick.aif 12 1 3"),
            Ok(Command::LoadAif {
                path: "kick.aif".into(),
                handle: addr.sample(12)
            })
        );
        assert_eq!(
            aspi("dumpfile out.bin 1 3 512"),
            Ok(Command::DumpFile {
                path: "out.bin".into(),
                addr,
                size: 512
            })
        );
        assert_eq!(
            aspi("send 1 3 4142 ignored"),
            Ok(Command::RawSend {
                addr,
                hex: "4142".into()
            })
        );
    }

    #[test]
    fn test_tables_cover_variants() {
        let names: Vec<&str> = commands(Variant::Smdi).iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "help", "scan", "list", "info", "receive", "send", "delete", "debug", "logfile",
                "loadaif", "saveaif", "quit"
            ]
        );
        assert!(lookup(Variant::Aspi, "dumpfile").is_some());
    }
}
