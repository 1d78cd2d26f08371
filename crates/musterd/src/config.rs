use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
///
/// Confidence thresholds are deliberately absent: the routing boundaries
/// are fixed constants in the workflow core, not deployment knobs.
pub struct Config {
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Timeout in seconds for one recognizer call.
    pub recognizer_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `MUSTER_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("muster");

        let db_path = std::env::var("MUSTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        Self {
            db_path,
            recognizer_timeout_secs: env_u64("MUSTER_RECOGNIZER_TIMEOUT_SECS", 30),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
