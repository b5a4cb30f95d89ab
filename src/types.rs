pub mod notification;
pub mod protocol;
pub mod push;
pub mod reminder;

pub use notification::{NotificationAction, NotificationData, NotificationPayload};
pub use protocol::{Envelope, Reply, ReplyEnvelope, WorkerRequest};
pub use push::{PushSubscription, SubscriptionKeys, VapidConfig};
pub use reminder::{
    CreateReminderResponse, NotificationSettings, Reminder, ReminderFilter, ReminderList,
};
