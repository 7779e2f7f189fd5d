use crate::{Error, Result};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard};

/// RocksDB-backed storage for every log served by one process.
///
/// Keys are slash-separated paths (`/trees/7`, `/pending/7/...`); a prefix
/// iterator returns every key strictly below a path segment.
pub struct LogDatastore {
    db: DB,
    path: PathBuf,
    commit_lock: Mutex<()>,
    // keeps the directory of an in-memory store alive for as long as the DB
    _temp_dir: Option<TempDir>,
}

impl std::fmt::Debug for LogDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDatastore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LogDatastore {
    pub fn new(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
            commit_lock: Mutex::new(()),
            _temp_dir: None,
        })
    }

    // "in-memory" database
    pub fn create_in_memory() -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::None);
        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path().to_path_buf();
        let db = DB::open(&opts, &temp_path)?;
        Ok(Self {
            db,
            path: temp_path,
            commit_lock: Mutex::new(()),
            _temp_dir: Some(temp_dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_data_by_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get_data_by_key(key).await? {
            Some(data) => Ok(Some(String::from_utf8(data)?)),
            None => Ok(None),
        }
    }

    pub async fn get_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.get_string(key).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.db.get_pinned(key)?.is_some())
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.db.delete(key)?;
        Ok(())
    }

    /// Applies every operation in `batch` atomically.
    pub async fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    /// Serializes read-check-write sequences. Hold the guard only across the
    /// final check and `write`, never across signing or other slow work.
    pub async fn commit_lock(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock().await
    }

    pub fn iterator(&self, prefix: &str) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>)>> + '_ {
        let mut readopts = rocksdb::ReadOptions::default();
        readopts.set_iterate_lower_bound(format!("{}/", prefix).as_bytes());
        readopts.set_iterate_upper_bound(format!("{}0", prefix).as_bytes());
        let iter = self.db.iterator_opt(IteratorMode::Start, readopts);
        iter.map(|result| result.map_err(|e| Error::Database(e.to_string())))
    }

    pub async fn count_keys(&self, prefix: &str) -> Result<u64> {
        let mut count = 0;
        for result in self.iterator(prefix) {
            result?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn find_max_int_key(&self, prefix: &str) -> Result<Option<u64>> {
        let mut max_value: Option<u64> = None;
        for result in self.iterator(prefix) {
            let (key, _) = result?;
            let key_str = String::from_utf8(key.to_vec())?;
            let value_str = key_str.split_at(prefix.len() + 1).1;
            if let Ok(value) = value_str.parse::<u64>() {
                max_value = Some(max_value.map_or(value, |m| m.max(value)));
            }
        }
        Ok(max_value)
    }
}
