//! On-disk image of the work list.
//!
//! The whole list is a single JSON array. Writes go temp file -> fsync ->
//! rename, so a crash leaves either the complete old file or the complete new
//! one.

use agentwork_core::Work;
use std::ffi::OsStr;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::StoreSettings;
use crate::error::Result;
use crate::lock::SharedFileLock;

/// The JSON index file and its companion lock.
#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
    lock: SharedFileLock,
}

impl IndexFile {
    #[must_use]
    pub fn new(data_dir: &Path, settings: &StoreSettings) -> Self {
        Self {
            path: data_dir.join(&settings.index_file),
            lock: SharedFileLock::new(data_dir.join(settings.lock_file())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_else(|| self.path.as_os_str())
    }

    /// Read every item under a shared lock. A missing or empty file is an empty list.
    ///
    /// # Errors
    /// Returns error if locking, reading or parsing fails.
    pub fn read(&self) -> Result<Vec<Work>> {
        let _guard = self.lock.acquire_shared()?;

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the file with `items` under an exclusive lock.
    ///
    /// # Errors
    /// Returns error if locking, writing, syncing or the final rename fails.
    /// The previous file is left intact in every case.
    pub fn write(&self, items: &[Work]) -> Result<()> {
        let _guard = self.lock.acquire_exclusive()?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".works-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        serde_json::to_writer_pretty(&mut tmp, items)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), count = items.len(), "Wrote index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentwork_core::NewWork;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn index(tmp: &TempDir) -> IndexFile {
        IndexFile::new(tmp.path(), &StoreSettings::default())
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(index(&tmp).read().unwrap().is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let index = index(&tmp);
        let items = vec![NewWork::story("Story", "lead").into_work("lead".into(), Utc::now())];

        index.write(&items).unwrap();

        assert_eq!(index.read().unwrap(), items);
        assert!(tmp.path().join("works.json.lock").exists());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let index = index(&tmp);
        index.write(&[]).unwrap();
        index.write(&[]).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
    }

    #[test]
    fn test_failed_rename_keeps_previous_target() {
        let tmp = TempDir::new().unwrap();
        let index = index(&tmp);

        // A non-empty directory in place of the index cannot be replaced by rename.
        fs::create_dir(index.path()).unwrap();
        fs::write(index.path().join("keep"), "x").unwrap();

        assert!(index.write(&[]).is_err());
        assert!(index.path().join("keep").exists());
    }
}
