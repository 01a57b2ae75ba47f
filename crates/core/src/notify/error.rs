use reqwest::StatusCode;
use std::fmt;

#[derive(Debug, Clone)]
pub struct NotificationApiError {
    pub stage: &'static str,
    pub status: Option<StatusCode>,
    pub detail: String,
}

impl fmt::Display for NotificationApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "notification API error (stage={}, status={status}): {}",
                self.stage, self.detail
            ),
            None => write!(
                f,
                "notification API error (stage={}): {}",
                self.stage, self.detail
            ),
        }
    }
}

impl std::error::Error for NotificationApiError {}
