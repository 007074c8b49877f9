//! Video stage: bounded polling of a clip until its video is ready.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clients::{Clip, MusicGenerator};
use crate::observability::metrics::Metrics;
use crate::util::error::classify_error;
use crate::util::retry::PollPolicy;

use super::context::RunContext;

/// Terminal state of the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    /// The clip left the pending state. `video_url` can still be absent when
    /// the service finished without publishing one.
    Ready {
        video_url: Option<String>,
        attempts: u32,
    },
    /// Every allowed status check still reported the video as pending.
    Exhausted { attempts: u32 },
}

impl VideoOutcome {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::Exhausted { attempts } => *attempts,
        }
    }
}

#[async_trait]
pub trait VideoStage: Send + Sync {
    async fn await_video(&self, run: &RunContext, clip: &Clip) -> VideoOutcome;
}

/// Polls the music capability for clip status.
///
/// Each attempt waits `policy.delay_for_attempt(n)` and then fetches the clip
/// once, so at most `max_attempts` fetches happen and each fetched state is
/// inspected. A failed fetch consumes its attempt and polling continues.
pub struct VideoPoller {
    generator: Arc<dyn MusicGenerator>,
    policy: PollPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl VideoPoller {
    pub fn new(generator: Arc<dyn MusicGenerator>, policy: PollPolicy) -> Self {
        Self {
            generator,
            policy,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }
}

#[async_trait]
impl VideoStage for VideoPoller {
    async fn await_video(&self, run: &RunContext, clip: &Clip) -> VideoOutcome {
        if !clip.video_pending() {
            info!(run_id = %run.run_id, clip_id = %clip.id, "video ready at synthesis");
            return VideoOutcome::Ready {
                video_url: clip.video_url().map(ToString::to_string),
                attempts: 0,
            };
        }

        let max_attempts = self.policy.max_attempts();
        for attempt in 1..=max_attempts {
            sleep(self.policy.delay_for_attempt(attempt)).await;
            if let Some(metrics) = &self.metrics {
                metrics.video_poll_attempts.inc();
            }

            match self.generator.get_clip(&clip.id).await {
                Ok(current) if !current.video_pending() => {
                    info!(
                        run_id = %run.run_id,
                        clip_id = %clip.id,
                        attempt,
                        has_video = current.video_url().is_some(),
                        "video processing finished"
                    );
                    return VideoOutcome::Ready {
                        video_url: current.video_url().map(ToString::to_string),
                        attempts: attempt,
                    };
                }
                Ok(current) => {
                    debug!(
                        run_id = %run.run_id,
                        clip_id = %clip.id,
                        attempt,
                        max_attempts,
                        status = current.status.as_deref().unwrap_or("unknown"),
                        "video still pending"
                    );
                }
                Err(error) => {
                    warn!(
                        run_id = %run.run_id,
                        clip_id = %clip.id,
                        attempt,
                        error = ?error,
                        kind = classify_error(&error).as_str(),
                        "clip status check failed"
                    );
                }
            }
        }

        warn!(
            run_id = %run.run_id,
            clip_id = %clip.id,
            attempts = max_attempts,
            "video polling exhausted"
        );
        VideoOutcome::Exhausted {
            attempts: max_attempts,
        }
    }
}
