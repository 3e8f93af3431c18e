//! Engine status written as a JSON file for an external dashboard.
//!
//! Each publish writes `<path>.tmp` and renames it over `path`, so readers
//! never observe a partial document.

use crate::domain::error::TraderError;
use crate::domain::status::EngineStatus;
use crate::ports::status_port::StatusPort;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonStatusAdapter {
    path: PathBuf,
}

impl JsonStatusAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusPort for JsonStatusAdapter {
    fn publish(&self, status: &EngineStatus) -> Result<(), TraderError> {
        let json = serde_json::to_string_pretty(status).map_err(|e| TraderError::Data {
            reason: format!("failed to serialize status: {}", e),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TraderError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn status(cycles: u64) -> EngineStatus {
        EngineStatus {
            account_id: "DU1".into(),
            strategy: "trend_pullback".into(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            cycles_completed: cycles,
            consecutive_failures: 0,
            last_error: None,
            portfolio: None,
            recent_signals: Vec::new(),
            recent_orders: Vec::new(),
            last_cycle: None,
        }
    }

    #[test]
    fn publish_writes_json() {
        let dir = TempDir::new().unwrap();
        let adapter = JsonStatusAdapter::new(dir.path().join("status.json"));
        adapter.publish(&status(1)).unwrap();
        adapter.publish(&status(2)).unwrap();

        let content = fs::read_to_string(adapter.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["cycles_completed"], 2);
        assert_eq!(value["account_id"], "DU1");
        assert!(!dir.path().join("status.json.tmp").exists());
    }

    #[test]
    fn publish_to_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let adapter = JsonStatusAdapter::new(dir.path().join("nope").join("status.json"));
        let err = adapter.publish(&status(1)).unwrap_err();
        assert!(matches!(err, TraderError::Io(_)));
    }
}
