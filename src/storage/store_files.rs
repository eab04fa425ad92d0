use std::fs;
use std::path::{Path, PathBuf};

use crate::common::Result;

/// On-disk layout of one database: the data file at the given path and the
/// write-ahead log beside it with a `.log` suffix.
pub struct StoreFiles {
    data_path: PathBuf,
    log_path: PathBuf,
}

impl StoreFiles {
    pub fn new(path: &Path) -> Self {
        let data_path = path.to_path_buf();
        let mut log_name = path.as_os_str().to_os_string();
        log_name.push(".log");
        Self {
            data_path,
            log_path: PathBuf::from(log_name),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Removes both files. Used by the demo driver and tests.
    pub fn cleanup(&self) -> Result<()> {
        for path in [&self.data_path, &self.log_path] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
