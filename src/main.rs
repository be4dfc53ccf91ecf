/*!
# sealdoc

Edit encrypted documents as if they were plain text. A document whose name
ends with the managed suffix (`.enc` by default) is stored as armored
ciphertext; sealdoc decrypts it into memory, hands it to your editor through
a secure temporary file, and encrypts it again on every save. Left idle, an
unlocked document is sealed again and the password asked for anew.

## Usage

```text
sealdoc [OPTIONS] <COMMAND>

Commands:
  open    Edit an encrypted document (created on first save if missing)
  seal    Encrypt a plain text file into a new encrypted document
  unseal  Decrypt an encrypted document to standard output

Options:
      --log-format <FORMAT>  Log output format [default: text] [possible values: text, json]
      --log-level <LEVEL>    Log level when RUST_LOG is not set
  -v, --verbose              Print verbose output (debug logging)
```

## Configuration

- `SEALDOC_BACKEND`: `gpg` (default) or `age`
- `SEALDOC_GPG`: gpg program (defaults to "gpg")
- `SEALDOC_SUFFIX`: managed file suffix (defaults to ".enc")
- `SEALDOC_RELOCK_MINUTES`: idle minutes before re-locking (defaults to 10)
- `SEALDOC_EDITOR` or `EDITOR`: editor command (defaults to "vim")
*/

use clap::Parser;
use sealdoc::cli::{CliArgs, Command};
use sealdoc::config::Config;
use sealdoc::constants::{DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON};
use sealdoc::errors::AppResult;
use sealdoc::ops;
use std::io::Write;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

fn main() -> AppResult<()> {
    let args = CliArgs::parse();
    setup_tracing(&args);
    debug!("CLI arguments: {:?}", args);

    let result = run(args);
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn run(args: CliArgs) -> AppResult<()> {
    let config = Config::load()?;
    debug!("Configuration: {:?}", config);

    match args.command {
        Command::Open { path } => ops::open_document(&config, &path),
        Command::Seal { input, output } => {
            let written = ops::seal_file(&config, &input, output.as_deref())?;
            info!("Encrypted document written to {:?}", written);
            Ok(())
        }
        Command::Unseal { input } => {
            let text = ops::unseal_file(&config, &input)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Structured logging to stderr. `RUST_LOG` wins over the command-line level.
fn setup_tracing(args: &CliArgs) {
    let level = match (&args.log_level, args.verbose) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => DEFAULT_LOG_LEVEL.to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(false);

    if args.log_format == LOG_FORMAT_JSON {
        builder.json().init();
    } else {
        builder.init();
    }
}
