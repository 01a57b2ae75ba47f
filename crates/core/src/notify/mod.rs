use crate::domain::notification::Notification;
use futures::stream::BoxStream;

pub mod error;
pub mod frame;
pub mod http;
pub mod sync;

pub use sync::{NotificationSync, NotificationView, SyncPhase};

/// Raw push payloads, one per event block, in arrival order. The stream ends
/// when the server closes the connection; an `Err` item is a transport
/// failure after which no more items are expected.
pub type PushStream = BoxStream<'static, anyhow::Result<String>>;

/// Remote, authoritative store of a user's notifications.
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    fn service_name(&self) -> &'static str;

    async fn fetch_all(&self, token: &str) -> anyhow::Result<Vec<Notification>>;

    async fn mark_read(&self, token: &str, id: &str) -> anyhow::Result<()>;

    async fn delete(&self, token: &str, id: &str) -> anyhow::Result<()>;

    async fn subscribe(&self, token: &str) -> anyhow::Result<PushStream>;
}
