use std::path::Path;

use color_eyre::eyre::Context;
use color_eyre::Result;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

const LOG_FILE_BASENAME: &str = "cex_stock";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

/// Starts the logger. Level comes from `RUST_LOG`, defaulting to `info`.
///
/// The returned handle must be kept alive for the rest of the run.
pub fn init(log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str("info").wrap_err("invalid RUST_LOG")?;

    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .duplicate_to_stderr(Duplicate::All),
        None => logger,
    };

    logger.start().wrap_err("failed to start logger")
}
