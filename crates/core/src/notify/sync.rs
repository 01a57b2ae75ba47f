use crate::domain::notification::{sort_most_recent_first, Notification, NotificationFilter};
use crate::notify::frame::{parse_frame, PushFrame};
use crate::notify::NotificationService;
use crate::session::SessionContext;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Unauthenticated,
    Loading,
    Loaded,
}

/// Read-only snapshot of the local notification cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationView {
    /// Most recent first, except that pushed entries are always prepended.
    pub notifications: Vec<Notification>,
    pub loading: bool,
    pub phase: SyncPhase,
}

impl NotificationView {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn filtered(&self, filter: NotificationFilter) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(move |n| filter.matches(n))
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkAllReport {
    pub requested: usize,
    pub failed: usize,
}

/// Aborts the push task when dropped.
#[derive(Debug)]
struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Client-side notification cache kept in step with a [`NotificationService`].
///
/// All mutation goes through this type; consumers read snapshots via
/// [`NotificationSync::view`] or follow changes with [`NotificationSync::changes`].
pub struct NotificationSync {
    service: Arc<dyn NotificationService>,
    session: SessionContext,
    state: Arc<watch::Sender<NotificationView>>,
    subscription: Mutex<Option<Subscription>>,
}

impl NotificationSync {
    pub fn new(service: Arc<dyn NotificationService>, session: SessionContext) -> Self {
        let (state, _rx) = watch::channel(NotificationView::default());
        Self {
            service,
            session,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    pub fn view(&self) -> NotificationView {
        self.state.borrow().clone()
    }

    pub fn changes(&self) -> watch::Receiver<NotificationView> {
        self.state.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Opens the push connection and performs the initial load for the current
    /// session. Does nothing without a session token.
    pub async fn activate(&self) {
        if !self.session.is_authenticated() {
            tracing::debug!("no session token; notification sync stays inactive");
            return;
        }
        self.subscribe().await;
        self.refresh().await;
    }

    /// Replaces the whole cache with the server's list. Failures are logged and
    /// leave the cache as it was.
    pub async fn refresh(&self) {
        let Some(token) = self.session.token() else {
            tracing::warn!("refresh skipped: no session token");
            return;
        };

        self.state.send_modify(|v| {
            v.loading = true;
            v.phase = SyncPhase::Loading;
        });

        let result = self.service.fetch_all(&token).await;

        if !self.is_current_session(&token) {
            tracing::debug!("session changed during notification fetch; discarding result");
            return;
        }

        let fetched = match result {
            Ok(mut items) => {
                sort_most_recent_first(&mut items);
                tracing::info!(
                    service = self.service.service_name(),
                    count = items.len(),
                    "notifications loaded"
                );
                Some(items)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch notifications");
                None
            }
        };

        self.state.send_modify(|v| {
            if let Some(items) = fetched {
                v.notifications = items;
            }
            v.loading = false;
            v.phase = SyncPhase::Loaded;
        });
    }

    /// Opens the session's push connection, replacing any previous one.
    /// Returns whether a connection is now open.
    pub async fn subscribe(&self) -> bool {
        let Some(token) = self.session.token() else {
            tracing::warn!("subscribe skipped: no session token");
            return false;
        };

        let mut stream = match self.service.subscribe(&token).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "failed to open notification push stream");
                return false;
            }
        };

        if !self.is_current_session(&token) {
            tracing::debug!("session changed while connecting; dropping push stream");
            return false;
        }

        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(payload) => apply_push(&state, &payload),
                    Err(err) => {
                        // No reconnect here; the caller decides whether to subscribe again.
                        tracing::warn!(error = %err, "notification push stream failed; closing");
                        return;
                    }
                }
            }
            tracing::info!("notification push stream ended");
        });

        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Subscription { task });
        if previous.is_some() {
            tracing::debug!("replaced existing notification push stream");
        }
        true
    }

    /// Returns whether the server confirmed the change. The cache is only
    /// touched on success.
    pub async fn mark_as_read(&self, id: &str) -> bool {
        let Some(token) = self.session.token() else {
            tracing::warn!(id, "mark-as-read skipped: no session token");
            return false;
        };

        match self.service.mark_read(&token, id).await {
            Ok(()) => {
                self.state.send_modify(|v| {
                    for n in v.notifications.iter_mut().filter(|n| n.id == id) {
                        n.read = true;
                    }
                });
                true
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "failed to mark notification as read");
                false
            }
        }
    }

    pub async fn delete_notification(&self, id: &str) -> bool {
        let Some(token) = self.session.token() else {
            tracing::warn!(id, "delete skipped: no session token");
            return false;
        };

        match self.service.delete(&token, id).await {
            Ok(()) => {
                self.state.send_modify(|v| v.notifications.retain(|n| n.id != id));
                true
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "failed to delete notification");
                false
            }
        }
    }

    /// Confirms every unread entry concurrently, then marks those entries read
    /// in one update. Entries whose call failed are still shown as read;
    /// entries pushed while the calls are in flight keep their own state.
    pub async fn mark_all_as_read(&self) -> MarkAllReport {
        let Some(token) = self.session.token() else {
            tracing::warn!("mark-all-as-read skipped: no session token");
            return MarkAllReport::default();
        };

        let unread: HashSet<String> = self
            .state
            .borrow()
            .notifications
            .iter()
            .filter(|n| !n.read)
            .map(|n| n.id.clone())
            .collect();

        let results = futures::future::join_all(
            unread.iter().map(|id| self.service.mark_read(&token, id)),
        )
        .await;

        let mut failed = 0;
        for (id, result) in unread.iter().zip(&results) {
            if let Err(err) = result {
                failed += 1;
                tracing::warn!(id = id.as_str(), error = %err, "mark-all-as-read: request failed");
            }
        }
        if failed > 0 {
            tracing::warn!(
                failed,
                requested = unread.len(),
                "some notifications are read locally but not on the server"
            );
        }

        self.state.send_modify(|v| {
            for n in v.notifications.iter_mut().filter(|n| unread.contains(&n.id)) {
                n.read = true;
            }
        });

        MarkAllReport {
            requested: unread.len(),
            failed,
        }
    }

    /// Empties the local cache. Never calls the server.
    pub fn clear_notifications(&self) {
        self.state.send_modify(|v| v.notifications.clear());
    }

    /// Drops everything tied to the current session: the push connection and
    /// the cached notifications.
    pub fn end_session(&self) {
        let dropped = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if dropped.is_some() {
            tracing::info!("notification push stream closed (session ended)");
        }

        self.clear_notifications();
        self.state.send_modify(|v| {
            v.loading = false;
            v.phase = SyncPhase::Unauthenticated;
        });
    }

    /// Follows the session token: a new token activates the sync, losing the
    /// token ends the session. Runs until the returned handle is aborted.
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        let mut rx = self.session.watch();

        tokio::spawn(async move {
            loop {
                let token = rx.borrow_and_update().clone();
                match token {
                    Some(_) => sync.activate().await,
                    None => sync.end_session(),
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn is_current_session(&self, token: &str) -> bool {
        self.session.token().as_deref() == Some(token)
    }
}

fn apply_push(state: &watch::Sender<NotificationView>, payload: &str) {
    match parse_frame(payload) {
        Ok(PushFrame::Connected) => tracing::debug!("notification push stream connected"),
        Ok(PushFrame::Heartbeat) => tracing::trace!("notification heartbeat"),
        Ok(PushFrame::Comment(comment)) => tracing::trace!(%comment, "ignoring control frame"),
        Ok(PushFrame::Notification(n)) => {
            tracing::info!(id = %n.id, kind = ?n.kind, "notification received");
            state.send_modify(|v| v.notifications.insert(0, n));
        }
        Err(err) => tracing::warn!(error = %err, "discarding malformed push frame"),
    }
}
