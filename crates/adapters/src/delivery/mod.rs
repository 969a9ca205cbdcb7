//! Digest delivery channels

pub mod outbox;
pub mod smtp;
pub mod stub;

pub use outbox::{OutboxDelivery, OutboxError, OutboxWriter};
pub use smtp::{SmtpConfig, SmtpDelivery, SmtpSecurity};
pub use stub::StubDelivery;
