pub mod api;
pub mod host;
pub mod platform;
pub mod push;
pub mod store;
pub mod time;

pub use api::ReminderApi;
pub use host::{Asset, AssetNetwork, NotificationDisplay, WindowClient, WindowClients};
pub use platform::{Capabilities, PermissionState, Platform};
pub use push::PushSender;
pub use store::ReminderStore;
pub use time::TimeProvider;
