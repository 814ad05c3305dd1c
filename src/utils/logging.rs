use std::env;
use std::fs;
use std::io;
use std::path::Path;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize logging: console output plus an optional session log file.
///
/// `RUST_LOG` wins when set; otherwise `info` is used with this crate raised to `debug`.
/// The log file, if given, is truncated on startup.
pub fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let enable_backtrace = env::var("RUST_BACKTRACE").unwrap_or_else(|_| "0".to_string()) == "1";

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| -> anyhow::Result<EnvFilter> {
        Ok(EnvFilter::new(&log_level).add_directive("live2d_mascot=debug".parse()?))
    })?;

    let file_layer = match log_file {
        Some(path) => {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    eprintln!("Warning: Failed to remove existing {}: {}", path.display(), e);
                }
            }
            let file = fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(true),
        )
        .with(file_layer)
        .try_init()?;

    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("Panic occurred: {}", panic_info);

        if let Some(location) = panic_info.location() {
            tracing::error!(
                "Panic location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        if enable_backtrace {
            tracing::error!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
        }
    }));

    tracing::info!("Logging initialized with level: {}", log_level);
    if let Some(path) = log_file {
        tracing::info!("File logging enabled: {}", path.display());
    }
    Ok(())
}

/// Log basic host information for bug reports
pub fn log_system_info() {
    tracing::info!("=== System Information ===");
    tracing::info!("OS: {}", std::env::consts::OS);
    tracing::info!("Architecture: {}", std::env::consts::ARCH);
    tracing::info!("{} version: {}", crate::APP_NAME, crate::VERSION);
    tracing::info!("==========================");
}
