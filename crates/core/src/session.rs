use std::sync::Arc;
use tokio::sync::watch;

/// Shared holder of the current session token.
///
/// Clones observe the same token. Removing the token (`logout`) is the signal
/// other components use to drop per-session state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: Arc<watch::Sender<Option<String>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionContext {
    pub fn new(token: Option<String>) -> Self {
        let (tx, _rx) = watch::channel(token.filter(|t| !t.trim().is_empty()));
        Self { token: Arc::new(tx) }
    }

    pub fn login(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            tracing::warn!("ignoring login with empty token");
            return;
        }
        self.token.send_replace(Some(token));
    }

    pub fn logout(&self) {
        self.token.send_if_modified(|current| current.take().is_some());
    }

    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().is_some()
    }

    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_logout_notifies_watchers() {
        let session = SessionContext::default();
        let mut rx = session.watch();
        assert!(!session.is_authenticated());

        session.login("tok-1");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("tok-1"));

        session.logout();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert!(session.token().is_none());
    }

    #[test]
    fn logout_without_session_is_silent() {
        let session = SessionContext::default();
        let rx = session.watch();
        session.logout();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn blank_tokens_are_not_sessions() {
        assert!(!SessionContext::new(Some("  ".to_string())).is_authenticated());
        let session = SessionContext::default();
        session.login("");
        assert!(!session.is_authenticated());
    }
}
