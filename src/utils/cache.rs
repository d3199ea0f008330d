use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: i64,
    result: serde_json::Value,
}

/// JSON file cache with a time-to-live, one file per key.
#[derive(Debug, Clone)]
pub struct TtlCache {
    dir: PathBuf,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Stable file name: hex SHA-256 of the key's JSON. serde_json maps keep
    /// keys sorted, so equal keys always hash the same.
    pub fn file_for(&self, key: &serde_json::Value) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Returns the cached value for `key` if still fresh; otherwise runs
    /// `produce` and stores its result. Cache I/O failures never fail the call.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        key: &serde_json::Value,
        produce: F,
    ) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        let path = self.file_for(key);
        let now = chrono::Utc::now().timestamp();

        if path.exists() {
            match self.read_entry(&path) {
                Ok(entry) => {
                    let age = now.saturating_sub(entry.timestamp).max(0) as u64;
                    if age < self.ttl.as_secs() {
                        tracing::debug!(
                            "[CACHE] Using cached result {} (age={:.2}h)",
                            path.display(),
                            age as f64 / 3600.0
                        );
                        return Ok(entry.result);
                    }
                    tracing::info!(
                        "[CACHE] Cache expired {} (age={:.2}h), refreshing",
                        path.display(),
                        age as f64 / 3600.0
                    );
                }
                Err(e) => {
                    tracing::warn!("[CACHE] Read error ({}), refreshing", e);
                }
            }
        }

        let result = produce().await?;

        let entry = CacheEntry {
            timestamp: now,
            result,
        };
        if let Err(e) = self.write_entry(&path, &entry) {
            tracing::warn!("[CACHE] Write error ({}), skip caching", e);
        } else {
            tracing::debug!("[CACHE] Saved new cache {}", path.display());
        }

        Ok(entry.result)
    }

    fn read_entry(&self, path: &Path) -> Result<CacheEntry> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_entry(&self, path: &Path, entry: &CacheEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, serde_json::to_vec(entry)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::FactorError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fresh_entry_is_reused() {
        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(dir.path(), Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);
        let key = json!({"func": "dune.fetch", "ns": "Layer 1"});

        for _ in 0..2 {
            let value = cache
                .get_or_insert_with(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"rows": [1, 2, 3]}))
                })
                .await
                .unwrap();
            assert_eq!(value["rows"].as_array().unwrap().len(), 3);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refreshes() {
        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(dir.path(), Duration::from_secs(0));
        let calls = AtomicUsize::new(0);
        let key = json!("k");

        for _ in 0..2 {
            cache
                .get_or_insert_with(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(dir.path(), Duration::from_secs(3600));
        let key = json!("corrupt");
        std::fs::write(cache.file_for(&key), b"not json").unwrap();

        let value = cache
            .get_or_insert_with(&key, || async { Ok(json!("fresh")) })
            .await
            .unwrap();
        assert_eq!(value, json!("fresh"));
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = TtlCache::new(dir.path(), Duration::from_secs(3600));
        let key = json!("failing");

        let result = cache
            .get_or_insert_with(&key, || async {
                Err(FactorError::ProcessingError {
                    message: "boom".to_string(),
                })
            })
            .await;
        assert!(result.is_err());
        assert!(!cache.file_for(&key).exists());
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_value() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"regular file").unwrap();
        let cache = TtlCache::new(blocker.join("cache"), Duration::from_secs(3600));
        let key = json!("unwritable");

        let value = cache
            .get_or_insert_with(&key, || async { Ok(json!(5)) })
            .await
            .unwrap();
        assert_eq!(value, json!(5));
        assert!(!cache.file_for(&key).exists());
    }

    #[test]
    fn test_file_name_is_stable_for_key_order() {
        let cache = TtlCache::new("/tmp/nexintel-cache", Duration::from_secs(1));
        let a = json!({"a": 1, "b": 2});
        let b: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(cache.file_for(&a), cache.file_for(&b));
    }
}
