//! Stub delivery for tests and dry runs

use async_trait::async_trait;
use digest_press_domain::{AssembledDigest, Delivery, DeliveryError, DeliveryReceipt};
use std::sync::Mutex;

/// Records what it was asked to send; optionally fails every send
#[derive(Debug, Default)]
pub struct StubDelivery {
    fail_with: Option<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl StubDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A delivery whose every send fails with a transport error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// `(recipient, subject)` of every accepted send
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Delivery for StubDelivery {
    async fn send(
        &self,
        digest: &AssembledDigest,
        recipient: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if let Some(message) = &self.fail_with {
            return Err(DeliveryError::Transport(message.clone()));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        sent.push((recipient.to_string(), digest.subject.clone()));

        Ok(DeliveryReceipt {
            message_id: Some(format!("stub-{}", sent.len())),
        })
    }

    fn channel(&self) -> &'static str {
        "stub"
    }
}
