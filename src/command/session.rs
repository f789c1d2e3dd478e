//! Two-state command session controller.
//!
//! IDLE until a trusted speaker says the trigger phrase, then COLLECTING:
//! every caption is buffered and re-extracted until the fields are
//! non-empty and the quiescence window since the trigger has passed. The
//! command is then handed to the backend and the session always resets.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::extractor::{FieldExtractor, FieldMap};
use super::status::{SessionPhase, SessionStatusHandle};
use crate::captions::TranscriptEvent;
use crate::notify::Notifier;
use crate::tracker::{CreatedIssue, IssueBackend};

pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(2000);

/// Buffered state of the command currently being dictated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSession {
    pub accumulated_texts: Vec<String>,
    pub trigger_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub active: bool,
}

impl CommandSession {
    fn begin(&mut self, text: &str, at: DateTime<Utc>) {
        *self = Self {
            accumulated_texts: vec![text.to_string()],
            trigger_time: Some(at),
            last_activity: Some(at),
            active: true,
        };
    }

    fn append(&mut self, text: &str, at: DateTime<Utc>) {
        self.accumulated_texts.push(text.to_string());
        self.last_activity = Some(at);
    }

    /// Clears every field at once and hands back what was buffered.
    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// How a finalized command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Created(CreatedIssue),
    Failed(String),
}

pub struct CommandController {
    extractor: FieldExtractor,
    backend: Arc<dyn IssueBackend>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn Clock>,
    quiescence: Duration,
    idle_expiry: Option<Duration>,
    session: CommandSession,
    status: SessionStatusHandle,
}

impl CommandController {
    pub fn new(extractor: FieldExtractor, backend: Arc<dyn IssueBackend>) -> Self {
        Self {
            extractor,
            backend,
            notifier: None,
            clock: Arc::new(SystemClock),
            quiescence: DEFAULT_QUIESCENCE,
            idle_expiry: None,
            session: CommandSession::default(),
            status: SessionStatusHandle::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_quiescence(mut self, quiescence: Duration) -> Self {
        self.quiescence = quiescence;
        self
    }

    pub fn with_idle_expiry(mut self, expiry: Option<Duration>) -> Self {
        self.idle_expiry = expiry;
        self
    }

    pub fn with_status(mut self, status: SessionStatusHandle) -> Self {
        self.status = status;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        if self.session.active {
            SessionPhase::Collecting
        } else {
            SessionPhase::Idle
        }
    }

    pub fn buffer(&self) -> &[String] {
        &self.session.accumulated_texts
    }

    pub fn trigger_time(&self) -> Option<DateTime<Utc>> {
        self.session.trigger_time
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    /// Offer one caption to the state machine.
    ///
    /// Returns the outcome when this event finalized a command.
    pub async fn handle(&mut self, event: TranscriptEvent) -> Option<CommandOutcome> {
        self.expire_idle().await;

        if !self.session.active {
            if !self.extractor.contains_trigger(&event.text) {
                return None;
            }
            if !event.is_trusted_speaker {
                debug!(
                    "Ignoring trigger from untrusted speaker {:?}",
                    event.speaker.as_deref().unwrap_or("unknown")
                );
                return None;
            }

            info!(
                "Command triggered by {}",
                event.speaker.as_deref().unwrap_or("unknown speaker")
            );
            self.session.begin(&event.text, event.timestamp);
            self.status.start_collecting(event.timestamp, 1).await;
            return None;
        }

        self.session.append(&event.text, event.timestamp);
        self.status
            .set_buffered(self.session.accumulated_texts.len())
            .await;

        let fields = self
            .extractor
            .extract_fields(self.session.accumulated_texts.as_slice());
        if fields.is_empty() || !self.quiescence_elapsed() {
            return None;
        }

        Some(self.finalize(fields).await)
    }

    /// Abandon a COLLECTING session that has been silent past the expiry.
    ///
    /// Returns true when a session was dropped.
    pub async fn expire_idle(&mut self) -> bool {
        let Some(expiry) = self.idle_expiry else {
            return false;
        };
        if !self.session.active {
            return false;
        }

        let Some(last) = self.session.last_activity else {
            return false;
        };
        if !exceeds(self.clock.now() - last, expiry) {
            return false;
        }

        let abandoned = self.session.take();
        self.status.reset().await;
        warn!(
            "Abandoned command session after {}s without captions ({} segments buffered)",
            expiry.as_secs(),
            abandoned.accumulated_texts.len()
        );
        true
    }

    fn quiescence_elapsed(&self) -> bool {
        self.session
            .trigger_time
            .map(|trigger| exceeds(self.clock.now() - trigger, self.quiescence))
            .unwrap_or(false)
    }

    async fn finalize(&mut self, fields: FieldMap) -> CommandOutcome {
        let command_id = Uuid::new_v4();
        let session = self.session.take();
        self.status.reset().await;

        info!(
            "Finalizing command {} from {} segments: {}",
            command_id,
            session.accumulated_texts.len(),
            serde_json::to_string(&fields).unwrap_or_default()
        );

        let outcome = match self.backend.create_issue(&fields).await {
            Ok(issue) => {
                info!("Command {} created {} ({})", command_id, issue.identifier, issue.url);
                if !issue.ignored_fields.is_empty() {
                    info!("Ignored fields: {}", issue.ignored_fields.join(", "));
                }
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.notify_created(&issue).await {
                        warn!("Failed to send created notification: {:#}", e);
                    }
                }
                CommandOutcome::Created(issue)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Command {} failed: {}", command_id, message);
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.notify_error(&message).await {
                        warn!("Failed to send error notification: {:#}", e);
                    }
                }
                CommandOutcome::Failed(message)
            }
        };

        self.status.record_outcome(&outcome, self.clock.now()).await;
        outcome
    }
}

/// Strictly greater than; negative spans never exceed.
fn exceeds(elapsed: chrono::Duration, threshold: Duration) -> bool {
    elapsed
        .to_std()
        .map(|elapsed| elapsed > threshold)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{KeywordSpec, ManualClock};
    use crate::error::{CommandError, CommandResult};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<FieldMap>>,
        fail: bool,
    }

    #[async_trait]
    impl IssueBackend for FakeBackend {
        async fn create_issue(&self, fields: &FieldMap) -> CommandResult<CreatedIssue> {
            self.calls.lock().unwrap().push(fields.clone());
            if self.fail {
                return Err(CommandError::MissingRequiredField("team".to_string()));
            }
            Ok(CreatedIssue {
                identifier: "ENG-1".to_string(),
                url: "https://tracker.example/ENG-1".to_string(),
                applied_fields: BTreeMap::new(),
                ignored_fields: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct FailingNotifier {
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify_created(&self, issue: &CreatedIssue) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(issue.identifier.clone());
            anyhow::bail!("webhook unreachable")
        }

        async fn notify_error(&self, message: &str) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(message.to_string());
            anyhow::bail!("webhook unreachable")
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
    }

    fn extractor() -> FieldExtractor {
        let keywords = KeywordSpec::new([
            ("title", vec!["title"]),
            ("team", vec!["team"]),
            ("project", vec!["project"]),
            ("label", vec!["label"]),
        ])
        .unwrap();
        FieldExtractor::new("please create issue", keywords).unwrap()
    }

    fn controller(backend: Arc<FakeBackend>, clock: &ManualClock) -> CommandController {
        CommandController::new(extractor(), backend).with_clock(Arc::new(clock.clone()))
    }

    fn event(clock: &ManualClock, text: &str, trusted: bool) -> TranscriptEvent {
        TranscriptEvent::new(text, Some("Dana".to_string()), clock.now(), trusted)
    }

    #[tokio::test]
    async fn test_untrusted_trigger_is_ignored() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock);

        let outcome = controller
            .handle(event(&clock, "Please create issue title spam", false))
            .await;

        assert!(outcome.is_none());
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.buffer().is_empty());
        assert!(controller.trigger_time().is_none());
    }

    #[tokio::test]
    async fn test_text_without_trigger_stays_idle() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock);

        controller.handle(event(&clock, "title team project", true)).await;
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_trusted_trigger_starts_collecting() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;

        assert_eq!(controller.phase(), SessionPhase::Collecting);
        assert_eq!(controller.buffer(), ["Please create issue"]);
        assert_eq!(controller.trigger_time(), Some(start()));

        let status = controller.status().get().await;
        assert_eq!(status.phase, SessionPhase::Collecting);
        assert_eq!(status.buffered_segments, 1);
    }

    #[tokio::test]
    async fn test_collecting_appends_any_speaker() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(300));
        let other = TranscriptEvent::new("title login broken", Some("Sam".to_string()), clock.now(), false);
        controller.handle(other).await;

        assert_eq!(controller.buffer(), ["Please create issue", "title login broken"]);
        assert_eq!(controller.phase(), SessionPhase::Collecting);
    }

    #[tokio::test]
    async fn test_no_finalize_before_threshold() {
        let clock = ManualClock::new(start());
        let backend = Arc::new(FakeBackend::default());
        let mut controller = controller(backend.clone(), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(1999));
        let outcome = controller
            .handle(event(&clock, "title login broken team platform", true))
            .await;

        assert!(outcome.is_none());
        assert_eq!(controller.phase(), SessionPhase::Collecting);
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_finalize_at_exact_threshold() {
        let clock = ManualClock::new(start());
        let backend = Arc::new(FakeBackend::default());
        let mut controller = controller(backend.clone(), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(2000));
        let outcome = controller
            .handle(event(&clock, "title login broken team platform", true))
            .await;

        assert!(outcome.is_none());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_after_threshold() {
        let clock = ManualClock::new(start());
        let backend = Arc::new(FakeBackend::default());
        let mut controller = controller(backend.clone(), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(2001));
        let outcome = controller
            .handle(event(&clock, "title login broken team platform", true))
            .await;

        assert!(matches!(outcome, Some(CommandOutcome::Created(ref i)) if i.identifier == "ENG-1"));
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.buffer().is_empty());
        assert!(controller.trigger_time().is_none());

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].text("title"), Some("login broken"));
        assert_eq!(calls[0].text("team"), Some("platform"));

        let status = controller.status().get().await;
        assert_eq!(status.phase, SessionPhase::Idle);
        assert_eq!(status.commands_created, 1);
    }

    #[tokio::test]
    async fn test_custom_quiescence() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock)
            .with_quiescence(Duration::from_millis(500));

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(501));
        let outcome = controller.handle(event(&clock, "team platform", true)).await;
        assert!(outcome.is_some());
    }

    #[tokio::test]
    async fn test_empty_fields_never_finalize() {
        let clock = ManualClock::new(start());
        let backend = Arc::new(FakeBackend::default());
        let mut controller = controller(backend.clone(), &clock);

        controller.handle(event(&clock, "Please create issue.", true)).await;
        clock.advance(chrono::Duration::seconds(30));
        let outcome = controller.handle(event(&clock, "", true)).await;

        assert!(outcome.is_none());
        assert_eq!(controller.phase(), SessionPhase::Collecting);
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_resets_and_fresh_session_is_clean() {
        let clock = ManualClock::new(start());
        let backend = Arc::new(FakeBackend {
            fail: true,
            ..Default::default()
        });
        let notifier = Arc::new(FailingNotifier::default());
        let mut controller =
            controller(backend.clone(), &clock).with_notifier(notifier.clone());

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::seconds(3));
        let outcome = controller
            .handle(event(&clock, "title first command", true))
            .await;

        assert_eq!(
            outcome,
            Some(CommandOutcome::Failed(
                "team is required but not provided".to_string()
            ))
        );
        assert_eq!(
            *notifier.attempts.lock().unwrap(),
            vec!["team is required but not provided"]
        );
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.buffer().is_empty());
        assert!(controller.trigger_time().is_none());

        clock.advance(chrono::Duration::seconds(1));
        controller
            .handle(event(&clock, "please create issue again", true))
            .await;
        assert_eq!(controller.buffer(), ["please create issue again"]);
        assert_eq!(controller.trigger_time(), Some(clock.now()));

        let status = controller.status().get().await;
        assert_eq!(status.commands_failed, 1);
        assert_eq!(status.phase, SessionPhase::Collecting);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_change_outcome() {
        let clock = ManualClock::new(start());
        let notifier = Arc::new(FailingNotifier::default());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock)
            .with_notifier(notifier.clone());

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::seconds(3));
        let outcome = controller.handle(event(&clock, "team platform", true)).await;

        assert!(matches!(outcome, Some(CommandOutcome::Created(_))));
        assert_eq!(*notifier.attempts.lock().unwrap(), vec!["ENG-1"]);
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_second_trigger_while_collecting_is_appended() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::milliseconds(100));
        controller
            .handle(event(&clock, "please create issue title retry", true))
            .await;

        assert_eq!(controller.buffer().len(), 2);
        assert_eq!(controller.trigger_time(), Some(start()));
    }

    #[tokio::test]
    async fn test_idle_session_expires_before_event() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock)
            .with_idle_expiry(Some(Duration::from_secs(30)));

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::seconds(31));
        let outcome = controller.handle(event(&clock, "team platform", true)).await;

        assert!(outcome.is_none());
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_expire_idle_respects_activity() {
        let clock = ManualClock::new(start());
        let mut controller = controller(Arc::new(FakeBackend::default()), &clock)
            .with_idle_expiry(Some(Duration::from_secs(30)));

        assert!(!controller.expire_idle().await);

        controller.handle(event(&clock, "Please create issue", true)).await;
        clock.advance(chrono::Duration::seconds(1));
        controller.handle(event(&clock, "", true)).await;
        clock.advance(chrono::Duration::seconds(29));
        assert!(!controller.expire_idle().await);

        clock.advance(chrono::Duration::seconds(2));
        assert!(controller.expire_idle().await);
        assert_eq!(controller.status().get().await.phase, SessionPhase::Idle);
    }

    #[test]
    fn test_session_take_clears_everything() {
        let mut session = CommandSession::default();
        session.begin("please create issue", start());
        session.append("team platform", start());

        let taken = session.take();
        assert_eq!(taken.accumulated_texts.len(), 2);
        assert!(taken.active);
        assert_eq!(session, CommandSession::default());
    }
}
