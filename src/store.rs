//! Local reminder store implementations.

use crate::error::StorageError;
use crate::ports::ReminderStore;
use crate::types::reminder::Reminder;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

type Records = BTreeMap<String, Reminder>;

/// Reminders persisted as one JSON document on disk.
///
/// The document is read on first use and the in-memory copy is cached for the
/// lifetime of the store. Each mutation writes a temporary file and renames it
/// over the document; the cached copy only changes once that write succeeds.
#[derive(Debug)]
pub struct FileReminderStore {
    path: PathBuf,
    records: OnceCell<AsyncMutex<Records>>,
}

impl FileReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn records(&self) -> Result<&AsyncMutex<Records>, StorageError> {
        self.records
            .get_or_try_init(|| async { load(&self.path).await.map(AsyncMutex::new) })
            .await
    }

    async fn transaction<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Records) -> bool + Send,
    {
        let mut records = self.records().await?.lock().await;
        let mut next = records.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        persist(&self.path, &next).await?;
        *records = next;
        Ok(())
    }
}

async fn load(path: &Path) -> Result<Records, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Records::new()),
        Err(err) => return Err(err.into()),
    };
    let reminders: Vec<Reminder> = serde_json::from_slice(&bytes)?;
    Ok(reminders
        .into_iter()
        .filter_map(|reminder| Some((reminder.id.clone()?, reminder)))
        .collect())
}

async fn persist(path: &Path, records: &Records) -> Result<(), StorageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let reminders: Vec<&Reminder> = records.values().collect();
    let bytes = serde_json::to_vec_pretty(&reminders)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn record_key(reminder: &Reminder) -> Result<String, StorageError> {
    match reminder.id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StorageError::MissingId),
    }
}

impl ReminderStore for FileReminderStore {
    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        let records = self.records().await?.lock().await;
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, reminder: &Reminder) -> Result<(), StorageError> {
        let key = record_key(reminder)?;
        let reminder = reminder.clone();
        self.transaction(move |records| {
            records.insert(key, reminder);
            true
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        self.transaction(|records| records.remove(id).is_some())
            .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.transaction(|records| {
            let changed = !records.is_empty();
            records.clear();
            changed
        })
        .await
    }
}

/// Volatile store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryReminderStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("reminder store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .lock()
            .expect("reminder store lock")
            .contains_key(id)
    }
}

impl ReminderStore for MemoryReminderStore {
    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        let records = self.records.lock().expect("reminder store lock");
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, reminder: &Reminder) -> Result<(), StorageError> {
        let key = record_key(reminder)?;
        self.records
            .lock()
            .expect("reminder store lock")
            .insert(key, reminder.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        self.records.lock().expect("reminder store lock").remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.lock().expect("reminder store lock").clear();
        Ok(())
    }
}
