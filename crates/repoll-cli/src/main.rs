use repoll_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // File logging when the state dir is usable, stderr otherwise.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr(true);
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("repoll error: {:#}", err);
        std::process::exit(1);
    }
}
