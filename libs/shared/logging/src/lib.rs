//! Tracing initialization shared by all three binaries: a dual-mode
//! formatter (JSON in release builds, compact text in debug builds) writing
//! to one of stdout, a rolling file, or syslog, plus a panic hook that logs
//! the panic instead of letting it vanish into stderr.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    FileOpen(#[source] std::io::Error),
    #[error("failed to connect to syslog: {0}")]
    Syslog(#[source] std::io::Error),
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Where log lines go. Mutually exclusive by construction: callers (the CLI
/// layer) are responsible for rejecting `--logfile` and `--syslog-facility`
/// together before building this.
pub enum LogSink {
    Stdout,
    File(std::path::PathBuf),
    Syslog(syslog::Facility),
}

/// Keeps the non-blocking file writer (if any) alive. Drop this only at
/// process exit, after the last log line has been emitted.
pub struct LogGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Initializes the global `tracing` subscriber. Call exactly once per process.
pub fn init(service_name: &str, sink: LogSink, level: &str) -> Result<LogGuard, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = !cfg!(debug_assertions);

    let guard = match sink {
        LogSink::Stdout => {
            install(env_filter, json, std::io::stdout)?;
            None
        }
        LogSink::File(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let filename = path.file_name().ok_or_else(|| LoggingError::FileOpen(std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing file name")))?;
            let appender = tracing_appender::rolling::never(dir, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            install(env_filter, json, move || non_blocking.clone())?;
            Some(guard)
        }
        LogSink::Syslog(facility) => {
            let formatter = syslog::Formatter3164 { facility, hostname: None, process: service_name.to_string(), pid: std::process::id() as i32 };
            let logger = syslog::unix(formatter).map_err(LoggingError::Syslog)?;
            let writer = SyslogWriter(Arc::new(Mutex::new(logger)));
            install(env_filter, json, move || writer.clone())?;
            None
        }
    };

    install_panic_hook();
    Ok(LogGuard(guard))
}

fn install<W>(env_filter: EnvFilter, json: bool, make_writer: W) -> Result<(), LoggingError>
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(make_writer);
    let result = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().with_target(false).try_init()
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info.location().map(|l| l.to_string()).unwrap_or_else(|| "unknown location".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(location = %location, panic = %payload, "panic");
    }));
}

type SyslogLogger = syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>;

#[derive(Clone)]
struct SyslogWriter(Arc<Mutex<SyslogLogger>>);

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let mut logger = self.0.lock().expect("syslog logger mutex poisoned");
        logger.info(line.trim_end()).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
