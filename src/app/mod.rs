use crate::api::{ApiServer, CaptionState, SessionState};
use crate::captions::{
    CaptionFileSource, CaptionSource, SpeakerTracker, StdinSource, TranscriptEvent,
};
use crate::command::{CommandController, CommandOutcome, SessionStatusHandle};
use crate::config::{CaptionSourceKind, Config};
use crate::notify::{Notifier, SlackNotifier};
use crate::tracker::{IssueBackend, IssueResolver, LinearClient};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

const EVENT_QUEUE_SIZE: usize = 256;
const EXPIRY_TICK: Duration = Duration::from_secs(1);
/// Extra wait after quiescence before the stdin source's follow-up caption.
const FOLLOW_UP_SLACK: Duration = Duration::from_millis(500);

/// Command-line overrides for `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub source: Option<CaptionSourceKind>,
    pub caption_file: Option<PathBuf>,
}

pub async fn run_service(config: Config, options: RunOptions) -> Result<()> {
    info!("Starting Ditto service");

    let source_kind = options.source.unwrap_or(config.captions.source);
    if source_kind == CaptionSourceKind::Http && !config.api.enabled {
        bail!("The http caption source needs the API enabled ([api] enabled = true)");
    }

    let extractor = config.parsing.extractor(None)?;
    let trigger_phrase = extractor.trigger_phrase().to_string();
    let status = SessionStatusHandle::default();

    let mut controller = CommandController::new(extractor.clone(), build_backend(&config)?)
        .with_quiescence(config.session.quiescence())
        .with_idle_expiry(config.session.idle_expiry())
        .with_status(status.clone());
    if let Some(notifier) = build_notifier(&config) {
        controller = controller.with_notifier(notifier);
    }

    if config.captions.trusted_speakers.is_empty() {
        warn!("No trusted speakers configured; no command can be triggered");
    } else {
        info!(
            "Trusted speakers: {}",
            config.captions.trusted_speakers.join(", ")
        );
    }

    let speakers = SpeakerTracker::new(
        &config.captions.trusted_speakers,
        config.captions.speaker_window_seconds,
    )?
    .with_reserved(extractor);
    let (tx, mut rx) = mpsc::channel::<TranscriptEvent>(EVENT_QUEUE_SIZE);

    let caption_state = match source_kind {
        CaptionSourceKind::Http => Some(CaptionState {
            tx: tx.clone(),
            speakers: Arc::new(Mutex::new(speakers.clone())),
        }),
        _ => None,
    };

    if let Some(source) = build_source(source_kind, &config, &options, speakers)? {
        let name = source.name();
        let source_tx = tx.clone();
        tokio::spawn(async move {
            match source.run(source_tx).await {
                Ok(()) => info!("Caption source '{}' stopped", name),
                Err(e) => error!("Caption source '{}' failed: {:#}", name, e),
            }
        });
    }
    // The controller loop ends once every producer is gone.
    drop(tx);

    if config.api.enabled {
        let api_server = ApiServer::new(
            config.api.port,
            SessionState {
                status,
                trigger_phrase: trigger_phrase.clone(),
                caption_source: source_kind.as_str(),
            },
            caption_state,
        );
        tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server failed: {}", e);
            }
        });
    }

    info!("Ditto is ready!");
    info!(
        "Say \"{}\" followed by field keywords to create an issue",
        trigger_phrase
    );

    let mut expiry_tick = tokio::time::interval(EXPIRY_TICK);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => match controller.handle(event).await {
                    Some(CommandOutcome::Created(issue)) => {
                        info!("Issue {} created: {}", issue.identifier, issue.url)
                    }
                    Some(CommandOutcome::Failed(message)) => {
                        warn!("Command dropped: {}", message)
                    }
                    None => {}
                },
                None => {
                    info!("All caption sources closed");
                    break;
                }
            },
            _ = expiry_tick.tick() => {
                controller.expire_idle().await;
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn build_backend(config: &Config) -> Result<Arc<dyn IssueBackend>> {
    let api_key = config
        .tracker
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .context("Tracker API key is not configured (set [tracker] api_key)")?;

    let client = LinearClient::new(api_key, config.tracker.api_url.clone());
    let resolver =
        IssueResolver::new(client).with_default_title(config.tracker.default_title.clone());
    Ok(Arc::new(resolver))
}

fn build_notifier(config: &Config) -> Option<Arc<dyn Notifier>> {
    if !config.slack.enabled {
        return None;
    }

    match config
        .slack
        .webhook_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
    {
        Some(url) => {
            info!("Slack notifications enabled for {}", config.slack.channel);
            Some(Arc::new(SlackNotifier::new(
                url,
                Some(config.slack.channel.clone()),
            )))
        }
        None => {
            warn!("Slack is enabled but no webhook_url is set; notifications disabled");
            None
        }
    }
}

fn build_source(
    kind: CaptionSourceKind,
    config: &Config,
    options: &RunOptions,
    speakers: SpeakerTracker,
) -> Result<Option<Box<dyn CaptionSource>>> {
    let source: Box<dyn CaptionSource> = match kind {
        CaptionSourceKind::File => {
            let path = options
                .caption_file
                .clone()
                .or_else(|| config.captions.caption_file.clone())
                .or_else(CaptionFileSource::discover)
                .context("No caption file configured and none found in the usual locations")?;

            Box::new(CaptionFileSource::new(
                path,
                config.captions.poll_interval(),
                config.captions.replay_existing,
                speakers,
            ))
        }
        CaptionSourceKind::Stdin => Box::new(StdinSource::stdin(
            speakers,
            config.captions.trusted_speakers.first().cloned(),
            config.session.quiescence() + FOLLOW_UP_SLACK,
        )),
        CaptionSourceKind::Http => return Ok(None),
    };

    Ok(Some(source))
}
