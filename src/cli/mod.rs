use crate::constants::{APP_DESCRIPTION, APP_NAME, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Edit encrypted documents as if they were plain text
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// Log output format
    #[arg(long, value_name = "FORMAT", default_value = LOG_FORMAT_TEXT)]
    #[arg(value_parser = [LOG_FORMAT_TEXT, LOG_FORMAT_JSON])]
    pub log_format: String,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Edit an encrypted document (created on first save if missing)
    Open {
        /// Document path; must end with the managed suffix
        path: PathBuf,
    },
    /// Encrypt a plain text file into a new encrypted document
    Seal {
        /// Plain text file to encrypt
        input: PathBuf,
        /// Output path (defaults to INPUT plus the managed suffix)
        #[arg(short = 'o', long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
    /// Decrypt an encrypted document to standard output
    Unseal {
        /// Encrypted document to read
        input: PathBuf,
    },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        CliArgs::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_command() {
        let args = CliArgs::parse_from(["sealdoc", "open", "notes.enc"]);
        assert_eq!(
            args.command,
            Command::Open {
                path: PathBuf::from("notes.enc")
            }
        );
        assert_eq!(args.log_format, LOG_FORMAT_TEXT);
        assert!(args.log_level.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_seal_with_output() {
        let args = CliArgs::parse_from(["sealdoc", "seal", "plain.txt", "-o", "out.enc"]);
        assert_eq!(
            args.command,
            Command::Seal {
                input: PathBuf::from("plain.txt"),
                output: Some(PathBuf::from("out.enc")),
            }
        );
    }

    #[test]
    fn test_seal_default_output() {
        let args = CliArgs::parse_from(["sealdoc", "seal", "plain.txt"]);
        assert!(matches!(args.command, Command::Seal { output: None, .. }));
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from([
            "sealdoc",
            "--log-format",
            "json",
            "--log-level",
            "debug",
            "-v",
            "unseal",
            "x.enc",
        ]);
        assert_eq!(args.log_format, LOG_FORMAT_JSON);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let result = CliArgs::try_parse_from(["sealdoc", "--log-format", "xml", "open", "a.enc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliArgs::try_parse_from(["sealdoc"]).is_err());
    }
}
