//! SMTP delivery through lettre

use async_trait::async_trait;
use digest_press_domain::{AssembledDigest, Delivery, DeliveryError, DeliveryReceipt};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::macros::format_description;
use uuid::Uuid;

use crate::secrets::EnvCredential;

/// How the connection to the relay is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (port 465)
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS (port 587)
    StartTls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    /// Display name on the From header
    pub from_name: String,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            security: SmtpSecurity::Tls,
            from_name: "Digest Press".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Sends the digest as an HTML email with the EPUB attached
pub struct SmtpDelivery {
    config: SmtpConfig,
    username: EnvCredential,
    password: EnvCredential,
}

impl SmtpDelivery {
    /// `username` doubles as the sender address
    pub fn new(config: SmtpConfig, username: EnvCredential, password: EnvCredential) -> Self {
        Self {
            config,
            username,
            password,
        }
    }

    fn build_message(
        &self,
        digest: &AssembledDigest,
        from: &str,
        recipient: &str,
        message_id: &str,
    ) -> Result<Message, DeliveryError> {
        let address: Address = from
            .parse()
            .map_err(|e| DeliveryError::Config(format!("Invalid sender address {}: {}", from, e)))?;
        let from = Mailbox::new(Some(self.config.from_name.clone()), address);
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| DeliveryError::Message(format!("Invalid recipient {}: {}", recipient, e)))?;

        let epub_type = ContentType::parse("application/epub+zip")
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&digest.subject)
            .message_id(Some(message_id.to_string()))
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(digest.html.clone()))
                    .singlepart(
                        Attachment::new(attachment_name(digest)).body(digest.ebook.clone(), epub_type),
                    ),
            )
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }

    fn transport(&self, username: &str, password: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = match self.config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            }
        }
        .map_err(|e| DeliveryError::Config(format!("Invalid SMTP relay {}: {}", self.config.host, e)))?;

        Ok(builder
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build())
    }
}

/// Attachment file name, e.g. `digest-2026-10-16.epub`
fn attachment_name(digest: &AssembledDigest) -> String {
    let date = digest
        .manifest
        .created_at
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "issue".to_string());
    format!("digest-{}.epub", date)
}

#[async_trait]
impl Delivery for SmtpDelivery {
    async fn send(
        &self,
        digest: &AssembledDigest,
        recipient: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let username = self
            .username
            .expose()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;
        let password = self
            .password
            .expose()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;

        let message_id = format!("<{}@digest-press>", Uuid::new_v4());
        let message = self.build_message(digest, username, recipient, &message_id)?;
        let transport = self.transport(username, password)?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            recipient = %recipient,
            subject = %digest.subject,
            "Sending digest email"
        );

        let response = transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::debug!(code = %response.code(), "SMTP relay accepted message");

        Ok(DeliveryReceipt {
            message_id: Some(message_id),
        })
    }

    fn channel(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_press_domain::DigestManifest;
    use secrecy::SecretString;
    use time::macros::datetime;

    fn digest() -> AssembledDigest {
        AssembledDigest {
            subject: "Digest Press - October 16, 2026".to_string(),
            html: "<html><body><h1>Digest Press</h1></body></html>".to_string(),
            ebook: b"PK-epub-bytes".to_vec(),
            manifest: DigestManifest {
                date: "October 16, 2026".to_string(),
                created_at: datetime!(2026-10-16 07:00 UTC),
                article_count: 1,
                source_names: vec!["Channel".to_string()],
                article_titles: vec!["Talk".to_string()],
                template_hash: "abc".to_string(),
            },
        }
    }

    fn delivery() -> SmtpDelivery {
        SmtpDelivery::new(
            SmtpConfig::default(),
            EnvCredential::new("GMAIL_ADDRESS", SecretString::new("sender@example.com".into())),
            EnvCredential::new("GMAIL_APP_PASSWORD", SecretString::new("app-password".into())),
        )
    }

    #[test]
    fn message_carries_html_body_and_epub_attachment() {
        let message = delivery()
            .build_message(&digest(), "sender@example.com", "reader@example.com", "<id@digest-press>")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Digest Press - October 16, 2026"));
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("<sender@example.com>"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("application/epub+zip"));
        assert!(raw.contains("digest-2026-10-16.epub"));
    }

    #[test]
    fn invalid_recipient_is_message_error() {
        let result = delivery().build_message(&digest(), "sender@example.com", "not an address", "<id@x>");
        assert!(matches!(result, Err(DeliveryError::Message(_))));
    }

    #[tokio::test]
    async fn missing_credentials_are_config_errors() {
        let delivery = SmtpDelivery::new(
            SmtpConfig::default(),
            EnvCredential::missing("GMAIL_ADDRESS"),
            EnvCredential::missing("GMAIL_APP_PASSWORD"),
        );

        match delivery.send(&digest(), "reader@example.com").await {
            Err(DeliveryError::Config(message)) => assert!(message.contains("GMAIL_ADDRESS")),
            other => panic!("expected config error, got {:?}", other.map(|r| r.message_id)),
        }
    }
}
