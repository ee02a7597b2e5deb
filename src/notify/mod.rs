use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Push-provider collaborator. Delivery is best effort: the dispatch worker
/// logs failures and never retries or surfaces them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        payload: &Value,
    ) -> Result<(), NotifyError>;
}

/// Stand-in provider that writes deliveries to the log. Used when no real
/// push gateway is wired in.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        push_token: &str,
        title: &str,
        _body: &str,
        payload: &Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(token = %push_token, title = %title, payload = %payload, "push notification");
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::{Notifier, NotifyError};

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, Value)>>,
        pub fail_tokens: Vec<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            push_token: &str,
            title: &str,
            _body: &str,
            payload: &Value,
        ) -> Result<(), NotifyError> {
            if self.fail_tokens.iter().any(|t| t == push_token) {
                return Err(NotifyError::Delivery(format!("token {push_token} rejected")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((push_token.to_string(), title.to_string(), payload.clone()));
            Ok(())
        }
    }
}
