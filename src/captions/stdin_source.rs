//! Line-oriented caption source for manual testing and piping.
//!
//! Each input line becomes one caption. Because nothing else may arrive
//! after the last dictated line, every line is followed by an empty caption
//! once the quiescence window has passed so the command can finalize.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{CaptionSource, SpeakerTracker, TranscriptEvent};

const QUIT_COMMANDS: &[&str] = &["quit", "exit", "q"];

pub struct StdinSource<R> {
    reader: R,
    speakers: SpeakerTracker,
    default_speaker: Option<String>,
    follow_up_delay: Duration,
}

impl StdinSource<BufReader<Stdin>> {
    pub fn stdin(
        speakers: SpeakerTracker,
        default_speaker: Option<String>,
        follow_up_delay: Duration,
    ) -> Self {
        Self::new(
            BufReader::new(tokio::io::stdin()),
            speakers,
            default_speaker,
            follow_up_delay,
        )
    }
}

impl<R> StdinSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(
        reader: R,
        speakers: SpeakerTracker,
        default_speaker: Option<String>,
        follow_up_delay: Duration,
    ) -> Self {
        Self {
            reader,
            speakers,
            default_speaker,
            follow_up_delay,
        }
    }

    fn event_for(&mut self, line: &str) -> TranscriptEvent {
        let now = Utc::now();
        let mut event = self.speakers.event_from_line(line, now);
        if event.speaker.is_none() {
            if let Some(speaker) = &self.default_speaker {
                let (speaker, trusted) = self.speakers.resolve(Some(speaker.clone()), now);
                event.speaker = speaker;
                event.is_trusted_speaker = trusted;
            }
        }
        event
    }

    fn schedule_follow_up(&self, event: &TranscriptEvent, tx: &mpsc::Sender<TranscriptEvent>) {
        let tx = tx.clone();
        let delay = self.follow_up_delay;
        let speaker = event.speaker.clone();
        let trusted = event.is_trusted_speaker;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(TranscriptEvent::new("", speaker, Utc::now(), trusted))
                .await;
        });
    }
}

#[async_trait]
impl<R> CaptionSource for StdinSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "stdin"
    }

    async fn run(self: Box<Self>, tx: mpsc::Sender<TranscriptEvent>) -> Result<()> {
        let mut source = *self;
        info!("Reading captions from stdin (lines like \"[Name] text\"; 'quit' to stop)");

        loop {
            let mut line = String::new();
            if source.reader.read_line(&mut line).await? == 0 {
                debug!("Caption input closed");
                return Ok(());
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if QUIT_COMMANDS.contains(&line.to_lowercase().as_str()) {
                info!("Caption input stopped");
                return Ok(());
            }

            let event = source.event_for(line);
            source.schedule_follow_up(&event, &tx);
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}
