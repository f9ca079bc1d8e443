//! Outbound email.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{FulfillmentError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<Email>,
    fail_on_send: bool,
}

/// Mailer that keeps every sent email in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<RwLock<InMemoryMailerState>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Returns the emails sent so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_send {
            return Err(FulfillmentError::Mailer(format!(
                "Could not deliver to {}",
                email.to
            )));
        }
        state.sent.push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            to: "ada@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn records_sent_email() {
        let mailer = InMemoryMailer::new();
        mailer.send(email()).await.unwrap();
        assert_eq!(mailer.sent(), vec![email()]);
    }

    #[tokio::test]
    async fn fail_on_send() {
        let mailer = InMemoryMailer::new();
        mailer.set_fail_on_send(true);
        assert!(mailer.send(email()).await.is_err());
        assert!(mailer.sent().is_empty());
    }
}
