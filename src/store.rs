// ABOUTME: Persisted record store: credential, monitoring state, verifier slot, history
// ABOUTME: RecordStore trait with in-memory and JSON-file backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::errors::StorageError;
use crate::models::{Credential, HeartRateReading, MonitoringState};

/// Full set of records the subsystem persists
///
/// The verifier slot is transient by contract: written once per
/// authorization attempt, consumed exactly once at code exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedRecords {
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    monitoring: Option<MonitoringState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<HeartRateReading>,
}

/// Durable storage for the subsystem's persisted records
///
/// Pure storage: no validation logic lives here, and I/O failures
/// propagate to the caller rather than being swallowed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist the current credential, replacing any previous one
    async fn save_credential(&self, credential: &Credential) -> Result<(), StorageError>;
    /// Load the current credential, if any
    async fn load_credential(&self) -> Result<Option<Credential>, StorageError>;
    /// Remove the stored credential
    async fn clear_credential(&self) -> Result<(), StorageError>;

    /// Persist the monitoring loop state
    async fn save_monitoring_state(&self, state: &MonitoringState) -> Result<(), StorageError>;
    /// Load the monitoring loop state, if any
    async fn load_monitoring_state(&self) -> Result<Option<MonitoringState>, StorageError>;

    /// Overwrite the single PKCE verifier slot
    async fn save_code_verifier(&self, verifier: &str) -> Result<(), StorageError>;
    /// Consume the PKCE verifier slot, leaving it empty
    async fn take_code_verifier(&self) -> Result<Option<String>, StorageError>;

    /// Persist the bounded reading history
    async fn save_history(&self, history: &[HeartRateReading]) -> Result<(), StorageError>;
    /// Load the persisted reading history (empty when none was saved)
    async fn load_history(&self) -> Result<Vec<HeartRateReading>, StorageError>;
}

/// Volatile store backed by process memory
///
/// Used in tests and as the storage layer when durability is handled
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<PersistedRecords>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_credential(&self, credential: &Credential) -> Result<(), StorageError> {
        self.records.write().await.credential = Some(credential.clone());
        Ok(())
    }

    async fn load_credential(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.records.read().await.credential.clone())
    }

    async fn clear_credential(&self) -> Result<(), StorageError> {
        self.records.write().await.credential = None;
        Ok(())
    }

    async fn save_monitoring_state(&self, state: &MonitoringState) -> Result<(), StorageError> {
        self.records.write().await.monitoring = Some(state.clone());
        Ok(())
    }

    async fn load_monitoring_state(&self) -> Result<Option<MonitoringState>, StorageError> {
        Ok(self.records.read().await.monitoring.clone())
    }

    async fn save_code_verifier(&self, verifier: &str) -> Result<(), StorageError> {
        self.records.write().await.code_verifier = Some(verifier.to_owned());
        Ok(())
    }

    async fn take_code_verifier(&self) -> Result<Option<String>, StorageError> {
        Ok(self.records.write().await.code_verifier.take())
    }

    async fn save_history(&self, history: &[HeartRateReading]) -> Result<(), StorageError> {
        self.records.write().await.history = history.to_vec();
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<HeartRateReading>, StorageError> {
        Ok(self.records.read().await.history.clone())
    }
}

/// Durable store backed by a single JSON document on disk
///
/// Writes go through a temp file and atomic rename so a crash mid-write
/// never truncates the record set. All mutation is serialized by a lock.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a file store rooted at `path`
    ///
    /// The file is created lazily on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_records(&self) -> Result<PersistedRecords, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(PersistedRecords::default())
            }
            Err(e) => Err(StorageError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    async fn write_records(&self, records: &PersistedRecords) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StorageError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::Io {
                path: self.path.clone(),
                source: e,
            })
    }

    async fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut PersistedRecords),
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        mutate(&mut records);
        self.write_records(&records).await
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn save_credential(&self, credential: &Credential) -> Result<(), StorageError> {
        let credential = credential.clone();
        self.update(|records| records.credential = Some(credential))
            .await
    }

    async fn load_credential(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.read_records().await?.credential)
    }

    async fn clear_credential(&self) -> Result<(), StorageError> {
        self.update(|records| records.credential = None).await
    }

    async fn save_monitoring_state(&self, state: &MonitoringState) -> Result<(), StorageError> {
        let state = state.clone();
        self.update(|records| records.monitoring = Some(state)).await
    }

    async fn load_monitoring_state(&self) -> Result<Option<MonitoringState>, StorageError> {
        Ok(self.read_records().await?.monitoring)
    }

    async fn save_code_verifier(&self, verifier: &str) -> Result<(), StorageError> {
        let verifier = verifier.to_owned();
        self.update(|records| records.code_verifier = Some(verifier))
            .await
    }

    async fn take_code_verifier(&self) -> Result<Option<String>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        let verifier = records.code_verifier.take();
        if verifier.is_some() {
            self.write_records(&records).await?;
        }
        Ok(verifier)
    }

    async fn save_history(&self, history: &[HeartRateReading]) -> Result<(), StorageError> {
        let history = history.to_vec();
        self.update(|records| records.history = history).await
    }

    async fn load_history(&self) -> Result<Vec<HeartRateReading>, StorageError> {
        Ok(self.read_records().await?.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_credential() -> Credential {
        Credential {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Utc::now() + Duration::hours(8),
            user_id: Some("U1".into()),
            scope: Some("heartrate profile".into()),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_credential() {
        let store = MemoryStore::new();
        let credential = sample_credential();
        store.save_credential(&credential).await.unwrap();
        assert_eq!(store.load_credential().await.unwrap(), Some(credential));

        store.clear_credential().await.unwrap();
        assert_eq!(store.load_credential().await.unwrap(), None);
    }

    #[tokio::test]
    async fn verifier_slot_is_consumed_once() {
        let store = MemoryStore::new();
        store.save_code_verifier("verifier-1").await.unwrap();
        store.save_code_verifier("verifier-2").await.unwrap();

        assert_eq!(
            store.take_code_verifier().await.unwrap(),
            Some("verifier-2".into())
        );
        assert_eq!(store.take_code_verifier().await.unwrap(), None);
    }
}
