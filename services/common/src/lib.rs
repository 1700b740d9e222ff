//! Runtime plumbing shared by the Concept Visualizer services: tracing
//! bootstrap, typed environment lookup and graceful-shutdown signalling.

use std::{
    env,
    fs,
    panic,
    path::{Path, PathBuf},
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Keeps the non-blocking file writer alive for the process lifetime.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber: stdout always, plus a daily-rolling file
/// under `LOG_DIR/<service_name>` when that directory is writable. Old log
/// files are cleaned up in the background per `LOG_RETENTION_DAYS`.
pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let log_root = log_root(service_name);
    let file_guard = match file_writer(&log_root, service_name) {
        Some((writer, guard)) => {
            let subscriber = Registry::default()
                .with(filter)
                .with(stdout_layer)
                .with(fmt::layer().with_writer(writer));
            let _ = tracing::subscriber::set_global_default(subscriber);
            spawn_log_cleanup(log_root);
            Some(guard)
        }
        None => {
            let subscriber = Registry::default().with(filter).with(stdout_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
            None
        }
    };

    TracingGuards {
        _file_guard: file_guard,
    }
}

/// Parse typed environment values with a fallback.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

/// Resolves on ctrl-c or SIGTERM so services can drain and exit cleanly.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

fn log_root(service_name: &str) -> PathBuf {
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "/var/log/concept".to_string());
    PathBuf::from(log_dir).join(service_name)
}

// The rolling appender panics on unwritable paths, so probe inside
// catch_unwind and fall back to stdout-only logging.
fn file_writer(log_root: &Path, service_name: &str) -> Option<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(log_root).ok()?;
    let appender = panic::catch_unwind(|| {
        tracing_appender::rolling::daily(log_root, format!("{service_name}.log"))
    })
    .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

fn spawn_log_cleanup(log_root: PathBuf) {
    let retention_days = env_or("LOG_RETENTION_DAYS", 14u64);
    let interval_minutes = env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64);
    if retention_days == 0 || interval_minutes == 0 {
        return;
    }

    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let interval = Duration::from_secs(interval_minutes * 60);

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(retention) {
            remove_logs_older_than(&log_root, cutoff);
        }
        thread::sleep(interval);
    });
}

fn remove_logs_older_than(root: &Path, cutoff: SystemTime) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            remove_logs_older_than(&path, cutoff);
            continue;
        }
        let modified = fs::metadata(&path).and_then(|metadata| metadata.modified());
        if matches!(modified, Ok(modified) if modified < cutoff) {
            let _ = fs::remove_file(&path);
        }
    }
}
