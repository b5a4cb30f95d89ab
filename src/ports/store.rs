use crate::error::StorageError;
use crate::types::reminder::Reminder;

/// Durable storage for pending reminders, keyed by reminder identifier.
pub trait ReminderStore: Send + Sync + 'static {
    fn get_all(&self) -> impl Future<Output = Result<Vec<Reminder>, StorageError>> + Send;

    /// Upserts by identifier. The reminder must already carry one.
    fn put(&self, reminder: &Reminder) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deleting an absent identifier is not an error.
    fn remove(&self, id: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
