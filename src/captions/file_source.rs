//! Caption source that follows a caption text file as it grows.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{CaptionSource, SpeakerTracker, TranscriptEvent};

/// Places meeting clients are known to write live captions to, relative to
/// the home directory.
const CAPTION_FILE_CANDIDATES: &[&str] = &[
    "Library/Application Support/Zoom/captions.txt",
    "Documents/Zoom/captions.txt",
    "Library/Logs/zoom/captions.txt",
    ".zoom/captions.txt",
];

pub struct CaptionFileSource {
    path: PathBuf,
    poll_interval: Duration,
    replay_existing: bool,
    speakers: SpeakerTracker,
}

impl CaptionFileSource {
    pub fn new(
        path: PathBuf,
        poll_interval: Duration,
        replay_existing: bool,
        speakers: SpeakerTracker,
    ) -> Self {
        Self {
            path,
            poll_interval,
            replay_existing,
            speakers,
        }
    }

    /// First existing well-known caption file, if any.
    pub fn discover() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        CAPTION_FILE_CANDIDATES
            .iter()
            .map(|rel| home.join(rel))
            .find(|path| path.exists())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Byte-level line assembly; only complete lines are released.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

#[async_trait]
impl CaptionSource for CaptionFileSource {
    fn name(&self) -> &'static str {
        "caption-file"
    }

    async fn run(self: Box<Self>, tx: mpsc::Sender<TranscriptEvent>) -> Result<()> {
        let mut source = *self;
        let mut offset = if source.replay_existing {
            0
        } else {
            file_len(&source.path).await.unwrap_or(0)
        };
        let mut buffer = LineBuffer::default();
        let mut missing_reported = false;
        let mut ticker = tokio::time::interval(source.poll_interval);

        info!("Monitoring caption file: {:?}", source.path);

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                debug!("Caption consumer gone, stopping file source");
                return Ok(());
            }

            let Some(len) = file_len(&source.path).await else {
                if !missing_reported {
                    warn!("Caption file {:?} does not exist yet", source.path);
                    missing_reported = true;
                }
                continue;
            };
            missing_reported = false;

            if len < offset {
                info!("Caption file truncated, reading from the start");
                offset = 0;
                buffer.clear();
            }
            if len == offset {
                continue;
            }

            let chunk = match read_from(&source.path, offset).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Error reading caption file: {}", e);
                    continue;
                }
            };
            offset += chunk.len() as u64;

            for line in buffer.push(&chunk) {
                let event = source.speakers.event_from_line(&line, Utc::now());
                debug!(
                    "Caption from {:?} (trusted: {}): {}",
                    event.speaker, event.is_trusted_speaker, event.text
                );
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

async fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut chunk = Vec::new();
    file.read_to_end(&mut chunk).await?;
    Ok(chunk)
}
