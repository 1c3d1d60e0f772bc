use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use tokio::signal;
use tracing::{error, warn};

/// Resolves when the process is asked to stop (Ctrl+C, or SIGTERM on unix).
///
/// A signal whose handler cannot be installed is logged and ignored; the
/// server then only stops on the other one.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        () = ctrl_c => "Ctrl+C",
        () = terminate => "SIGTERM",
    };
    warn!("Received {received}, draining in-flight requests before shutdown");
}

/// Append-mode handles for the JSON log files under `LOG_DIR`.
#[derive(Debug)]
pub struct LogFiles {
    /// Every event that passes the log filter.
    pub all: File,
    /// `ERROR` events only.
    pub errors: File,
}

/// Create `dir` if needed and open `all.log` and `error.log` for appending.
pub fn open_log_files(dir: &Path) -> io::Result<LogFiles> {
    fs::create_dir_all(dir)?;
    let open = |name: &str| OpenOptions::new().create(true).append(true).open(dir.join(name));
    Ok(LogFiles {
        all: open("all.log")?,
        errors: open("error.log")?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_log_files_are_created_and_appended() {
        let dir = std::env::temp_dir().join(format!("nexthub-logs-{}", uuid::Uuid::new_v4()));

        let mut files = open_log_files(&dir).unwrap();
        writeln!(files.all, "first").unwrap();
        drop(files);

        let mut files = open_log_files(&dir).unwrap();
        writeln!(files.all, "second").unwrap();
        writeln!(files.errors, "boom").unwrap();

        assert_eq!(fs::read_to_string(dir.join("all.log")).unwrap(), "first\nsecond\n");
        assert_eq!(fs::read_to_string(dir.join("error.log")).unwrap(), "boom\n");
        fs::remove_dir_all(dir).unwrap();
    }
}
