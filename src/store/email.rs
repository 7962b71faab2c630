//! Email notifier trait.

use crate::types::EmailStatus;
use async_trait::async_trait;

/// Outbound email notifier invoked by finalize.
///
/// Implementations report failure through [`EmailStatus::Failed`] rather
/// than an error: a provider failure is non-fatal to finalize.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> EmailStatus;
}

/// Notifier that skips every send. Useful when no provider is configured.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl EmailNotifier for NoopNotifier {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> EmailStatus {
        EmailStatus::Skipped {
            reason: "no email provider configured".to_string(),
        }
    }
}
