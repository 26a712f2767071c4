//! Logging init: file under the XDG state dir, or stderr when that is unusable.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,repoll_core=debug,repoll_cli=debug";

/// `RUST_LOG` if set, otherwise the crate default (`warn` when `quiet`).
fn env_filter(quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

/// Log file handle that degrades to stderr if it cannot be cloned per event.
struct LogFile(fs::File);

enum LogWriter {
    File(fs::File),
    Stderr(io::Stderr),
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr(e) => e.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or_else(|_| LogWriter::Stderr(io::stderr()))
    }
}

/// Directory holding `repoll.log` (`~/.local/state/repoll`).
pub fn log_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("repoll")?;
    Ok(xdg_dirs.get_state_home().join("repoll"))
}

/// Initialize structured logging to `~/.local/state/repoll/repoll.log`.
/// Returns the log file path. On failure (e.g. state dir unwritable) returns
/// Err so the caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("repoll.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(false))
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing subscriber: {}", e))?;

    tracing::info!("repoll logging initialized at {}", path.display());
    Ok(path)
}

/// Initialize logging to stderr only. `quiet` lowers the default level to `warn`
/// so log lines do not drown out command output.
pub fn init_logging_stderr(quiet: bool) {
    // A subscriber may already be installed (e.g. a second init in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(quiet))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
