//! Outbound notifications about finalized commands.

pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

use crate::tracker::CreatedIssue;

pub use slack::SlackNotifier;

/// Fire-and-forget delivery of command outcomes.
///
/// Errors are returned so callers can log them; they never change session
/// state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_created(&self, issue: &CreatedIssue) -> Result<()>;

    async fn notify_error(&self, message: &str) -> Result<()>;
}
