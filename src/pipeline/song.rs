//! Song stage: lyrics + theme → audio clip.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::{Clip, GenerateRequest, MusicGenerator};
use crate::util::error::classify_error;

use super::context::RunContext;
use super::lyrics::LyricsDocument;
use super::result::{Stage, StageError};
use super::theme::Theme;

/// Result of a synthesis attempt. Failure is a value, never a panic.
#[derive(Debug)]
pub enum SynthesisOutcome {
    Created(Clip),
    Empty,
    Failed(StageError),
}

#[async_trait]
pub trait SongStage: Send + Sync {
    async fn synthesize(
        &self,
        run: &RunContext,
        lyrics: &LyricsDocument,
        theme: &Theme,
    ) -> SynthesisOutcome;
}

/// Submits custom-mode, vocal, synchronous-wait requests with fixed style tags.
pub struct SunoSongStage {
    generator: Arc<dyn MusicGenerator>,
    tags: String,
    model: String,
}

impl SunoSongStage {
    pub fn new(
        generator: Arc<dyn MusicGenerator>,
        tags: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            tags: tags.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SongStage for SunoSongStage {
    async fn synthesize(
        &self,
        run: &RunContext,
        lyrics: &LyricsDocument,
        theme: &Theme,
    ) -> SynthesisOutcome {
        // Re-truncation is idempotent; the title matches the reported theme.
        let title = Theme::new(theme.as_str());
        let request =
            GenerateRequest::custom(lyrics.as_str(), &self.tags, title.as_str(), &self.model);

        let clips = match self.generator.generate(&request).await {
            Ok(clips) => clips,
            Err(error) => {
                warn!(
                    run_id = %run.run_id,
                    error = ?error,
                    kind = classify_error(&error).as_str(),
                    "music generation failed"
                );
                return SynthesisOutcome::Failed(StageError::service(Stage::Song, error));
            }
        };

        let Some(clip) = clips.into_iter().next() else {
            warn!(run_id = %run.run_id, "music generation returned no clips");
            return SynthesisOutcome::Empty;
        };
        if clip.audio_url().is_none() {
            warn!(run_id = %run.run_id, clip_id = %clip.id, "clip has no audio url");
            return SynthesisOutcome::Empty;
        }

        info!(
            run_id = %run.run_id,
            clip_id = %clip.id,
            video_pending = clip.video_pending(),
            "song synthesized"
        );
        SynthesisOutcome::Created(clip)
    }
}
