use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::warn;

/// Key holding the bearer token issued by the backend.
pub const ACCESS_TOKEN_KEY: &str = "app_access_token";
/// Key holding the user the token belongs to, as last confirmed by the backend.
pub const CURRENT_USER_KEY: &str = "current_user";
/// Key holding the cached tracked-user list.
pub const TRACKED_USERS_KEY: &str = "tracked_users";

/// Flat JSON key-value store standing in for browser local storage.
///
/// Every write rewrites the whole file.
pub struct Storage {
    file: PathBuf,
    data: Mutex<HashMap<String, Value>>,
}

impl Storage {
    /// Open the store in the default per-user data directory.
    pub async fn new() -> Result<Self> {
        Self::open(&default_data_dir()?).await
    }

    /// Open the store under `dir`, creating it if needed. A corrupt file is
    /// treated as empty.
    pub async fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let file = dir.join("storage.json");
        let data = match fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(file = %file.display(), "discarding unreadable storage: {err}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            file,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Retrieve a value by key.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().await.get(key).cloned()
    }

    pub async fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .await
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Retrieve and decode a typed value. Undecodable entries read as absent.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, "ignoring undecodable storage entry: {err}");
                None
            }
        }
    }

    /// Store a value under a key.
    pub async fn put(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let mut data = self.data.lock().await;
        data.insert(key.into(), value);
        self.flush(&data).await
    }

    pub async fn put_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        self.put(key, serde_json::to_value(value)?).await
    }

    /// Remove a key, returning whether it existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        let existed = data.remove(key).is_some();
        if existed {
            self.flush(&data).await?;
        }
        Ok(existed)
    }

    /// Drop everything.
    pub async fn clear(&self) -> Result<()> {
        let mut data = self.data.lock().await;
        data.clear();
        self.flush(&data).await
    }

    async fn flush(&self, data: &HashMap<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(data)?;
        fs::write(&self.file, bytes)
            .await
            .with_context(|| format!("writing {}", self.file.display()))?;
        Ok(())
    }
}

/// Per-user data directory for the client.
pub fn default_data_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("org", "socred", "socred")
        .context("no home directory to store session data in")?;
    Ok(proj.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        storage.put(ACCESS_TOKEN_KEY, json!("tok")).await.unwrap();
        drop(storage);

        let storage = Storage::open(dir.path()).await.unwrap();
        assert_eq!(storage.get_str(ACCESS_TOKEN_KEY).await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn clear_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        storage.put("a", json!(1)).await.unwrap();
        storage.put("b", json!(2)).await.unwrap();
        assert!(storage.remove("a").await.unwrap());
        assert!(!storage.remove("a").await.unwrap());
        storage.clear().await.unwrap();
        assert!(storage.get("b").await.is_none());

        let reopened = Storage::open(dir.path()).await.unwrap();
        assert!(reopened.get("b").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("storage.json"), b"{not json").unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        assert!(storage.get(ACCESS_TOKEN_KEY).await.is_none());
    }

    #[tokio::test]
    async fn typed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        storage.put_as("nums", &vec![1u32, 2, 3]).await.unwrap();
        let nums: Option<Vec<u32>> = storage.get_as("nums").await;
        assert_eq!(nums, Some(vec![1, 2, 3]));
        let wrong: Option<String> = storage.get_as("nums").await;
        assert!(wrong.is_none());
    }
}
