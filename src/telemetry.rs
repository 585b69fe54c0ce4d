use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Where the JSON trace log goes.
pub fn tracing_log_path() -> PathBuf {
    env::var("SENTINEL_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("sentinel_trace.jsonl"))
}

/// Logging switches taken from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub verbose: bool,
    pub json: bool,
    pub disabled: bool,
}

/// Install the global subscriber once. Later calls are no-ops.
///
/// Human-readable lines go to stderr unless `json` is set, in which case JSON
/// records are appended to [`tracing_log_path`].
pub fn init_tracing(options: LogOptions) {
    if options.disabled {
        return;
    }
    let level = if options.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let _ = TRACING_INIT.get_or_init(|| {
        if options.json {
            let path = tracing_log_path();
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("failed to open trace log {}: {err}", path.display());
                    return;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
