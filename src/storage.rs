use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_SOURCE_FILE;

#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub data_dir: PathBuf,
    pub source_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir: PathBuf = data_dir.into();
        let source_dir = data_dir.join("source");
        let cache_dir = data_dir.join("cache");

        Self {
            data_dir,
            source_dir,
            cache_dir,
        }
    }

    /// Where a downloaded dataset is stored.
    pub fn source_file(&self) -> PathBuf {
        self.source_dir.join(DEFAULT_SOURCE_FILE)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.source_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }
}

pub fn file_present_nonempty(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(m) => m.is_file() && m.len() > 0,
        Err(_) => false,
    }
}

/// Sibling path used while a file is being written.
pub fn tmp_path(dest: &Path) -> PathBuf {
    let fname = dest
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    dest.with_file_name(format!("{fname}.part"))
}
