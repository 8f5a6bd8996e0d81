use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialise logging. Without `debug` the level is fixed at `info`; with it
/// the default is `debug` and `RUST_LOG` may override it.
///
/// When `log_file` is given, output goes to that file instead of stdout. The
/// file is written synchronously so nothing is lost on exit. Only the first
/// call in a process has any effect.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Opening the appender creates the file, so bail out before that.
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("logging already initialised");
        return;
    }

    // Ignore RUST_LOG unless debug logging was asked for in the settings.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match log_file.as_deref().and_then(split_path) {
        Some((dir, name)) => builder
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::never(dir, name))
            .try_init(),
        None => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}

fn split_path(path: &std::path::Path) -> Option<(PathBuf, std::ffi::OsString)> {
    let name = path.file_name()?.to_os_string();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}
