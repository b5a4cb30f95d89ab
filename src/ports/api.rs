use crate::error::ApiError;
use crate::types::push::PushSubscription;
use crate::types::reminder::{CreateReminderResponse, Reminder, ReminderFilter};

/// The remote reminder service. Authentication is attached by the implementation.
pub trait ReminderApi: Send + Sync + 'static {
    fn create_reminder(
        &self,
        reminder: &Reminder,
    ) -> impl Future<Output = Result<CreateReminderResponse, ApiError>> + Send;

    fn list_reminders(
        &self,
        filter: &ReminderFilter,
    ) -> impl Future<Output = Result<Vec<Reminder>, ApiError>> + Send;

    fn public_key(&self) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn save_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn delete_subscription(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}
