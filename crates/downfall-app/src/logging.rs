// Tracing bootstrap.
//
// Log output goes to a file so it never interferes with whatever front end
// hosts the companion.

use std::path::Path;

use anyhow::Context;

/// Name of the log file created in the log directory.
pub const LOG_FILE_NAME: &str = "downfall.log";

const DEFAULT_FILTER: &str = "downfall_app=info,downfall_core=info,warn";

/// Install a global subscriber writing to `log_dir/downfall.log`.
///
/// The filter honours `RUST_LOG` and falls back to `DEFAULT_FILTER`. Fails if
/// the directory cannot be created or a global subscriber is already set.
pub fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
        .context("failed to create log file")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
