//! Pipeline orchestrator and builder for the song pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::{MusicGenerator, TextGenerator};
use crate::observability::metrics::Metrics;
use crate::util::retry::PollPolicy;

use super::context::RunContext;
use super::lyrics::{LlmLyricsStage, LyricsStage};
use super::prompt::PromptStyle;
use super::result::{PipelineResult, Stage, StageError};
use super::selections::Selections;
use super::song::{SongStage, SunoSongStage, SynthesisOutcome};
use super::theme::{LlmThemeStage, ThemeStage};
use super::video::{VideoOutcome, VideoPoller, VideoStage};

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// Lyrics, theme, song and video.
    #[default]
    Full,
    /// Lyrics and theme only; no music generation is requested.
    #[serde(alias = "text")]
    TextOnly,
}

impl StagePolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::TextOnly => "text",
        }
    }
}

impl fmt::Display for StagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "text" | "text_only" => Ok(Self::TextOnly),
            other => Err(anyhow!("unknown stage policy `{other}` (expected full or text)")),
        }
    }
}

/// Settings for the default stage implementations.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub llm_model: String,
    pub music_model: String,
    pub style_tags: String,
    pub prompt_style: PromptStyle,
    pub poll_policy: PollPolicy,
    pub stage_policy: StagePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4o-mini".to_string(),
            music_model: "chirp-v3-5".to_string(),
            style_tags: "六十年代台語歌曲風".to_string(),
            prompt_style: PromptStyle::default(),
            poll_policy: PollPolicy::default(),
            stage_policy: StagePolicy::Full,
        }
    }
}

/// Runs the stages strictly in sequence and maps their outcomes to a
/// [`PipelineResult`].
pub struct PipelineOrchestrator {
    stages: PipelineStages,
    policy: StagePolicy,
    metrics: Option<Arc<Metrics>>,
}

/// Container for all pipeline stages.
pub struct PipelineStages {
    lyrics: Arc<dyn LyricsStage>,
    theme: Arc<dyn ThemeStage>,
    song: Arc<dyn SongStage>,
    video: Arc<dyn VideoStage>,
}

/// Builder pattern for constructing `PipelineOrchestrator`.
#[derive(Default)]
pub struct PipelineBuilder {
    lyrics: Option<Arc<dyn LyricsStage>>,
    theme: Option<Arc<dyn ThemeStage>>,
    song: Option<Arc<dyn SongStage>>,
    video: Option<Arc<dyn VideoStage>>,
    policy: StagePolicy,
    metrics: Option<Arc<Metrics>>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with the default stage implementations.
    pub fn new(
        text: Arc<dyn TextGenerator>,
        music: Arc<dyn MusicGenerator>,
        settings: &PipelineSettings,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let style = Arc::new(settings.prompt_style.clone());
        let mut poller = VideoPoller::new(Arc::clone(&music), settings.poll_policy);
        if let Some(metrics) = &metrics {
            poller = poller.with_metrics(Arc::clone(metrics));
        }

        Self {
            stages: PipelineStages {
                lyrics: Arc::new(LlmLyricsStage::new(
                    Arc::clone(&text),
                    Arc::clone(&style),
                    settings.llm_model.clone(),
                )),
                theme: Arc::new(LlmThemeStage::new(
                    text,
                    style,
                    settings.llm_model.clone(),
                )),
                song: Arc::new(SunoSongStage::new(
                    music,
                    settings.style_tags.clone(),
                    settings.music_model.clone(),
                )),
                video: Arc::new(poller),
            },
            policy: settings.stage_policy,
            metrics,
        }
    }

    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Default stage policy of this orchestrator.
    #[must_use]
    pub fn policy(&self) -> StagePolicy {
        self.policy
    }

    /// Runs the pipeline with the orchestrator's default policy.
    pub async fn run(&self, run: &RunContext, selections: &Selections) -> PipelineResult {
        self.run_with_policy(run, selections, self.policy).await
    }

    /// Runs the pipeline once. Never returns an error: every failure is folded
    /// into the returned [`PipelineResult`].
    pub async fn run_with_policy(
        &self,
        run: &RunContext,
        selections: &Selections,
        policy: StagePolicy,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut active = ActiveRun::start(self.metrics.as_deref(), run, started);
        info!(run_id = %run.run_id, policy = %policy, "song pipeline started");

        let result = self.execute(run, selections, policy).await;

        active.finish(&result);
        info!(
            run_id = %run.run_id,
            outcome = result.outcome(),
            elapsed_ms = elapsed_ms(started),
            "song pipeline finished"
        );
        result
    }

    async fn execute(
        &self,
        run: &RunContext,
        selections: &Selections,
        policy: StagePolicy,
    ) -> PipelineResult {
        let stage_started = Instant::now();
        let lyrics = self.stages.lyrics.generate(run, selections).await;
        self.observe(run, Stage::Lyrics, stage_started);
        let lyrics = match lyrics {
            Ok(lyrics) => lyrics,
            Err(err) => {
                error!(run_id = %run.run_id, stage = %Stage::Lyrics, error = %err, "lyrics generation failed");
                return self.failed(Stage::Lyrics, &err);
            }
        };

        let stage_started = Instant::now();
        let theme = self.stages.theme.extract(run, &lyrics).await;
        self.observe(run, Stage::Theme, stage_started);
        let theme = match theme {
            Ok(theme) => theme,
            Err(err) => {
                error!(
                    run_id = %run.run_id,
                    stage = %Stage::Theme,
                    error = %err,
                    lyrics_chars = lyrics.as_str().chars().count(),
                    "theme extraction failed after lyrics were produced"
                );
                return self.failed(Stage::Theme, &err);
            }
        };

        if policy == StagePolicy::TextOnly {
            return PipelineResult::TextOnly {
                lyrics: lyrics.into_inner(),
                theme: theme.into_inner(),
            };
        }

        let stage_started = Instant::now();
        let synthesis = self.stages.song.synthesize(run, &lyrics, &theme).await;
        self.observe(run, Stage::Song, stage_started);
        let clip = match synthesis {
            SynthesisOutcome::Created(clip) => clip,
            SynthesisOutcome::Empty => {
                warn!(run_id = %run.run_id, error = %StageError::EmptyResult, "song stage produced nothing");
                self.record_failure(Stage::Song);
                return PipelineResult::PartialNoSong {
                    lyrics: lyrics.into_inner(),
                    theme: theme.into_inner(),
                };
            }
            SynthesisOutcome::Failed(err) => {
                warn!(run_id = %run.run_id, error = %err, "song stage failed, returning text only");
                self.record_failure(Stage::Song);
                return PipelineResult::PartialNoSong {
                    lyrics: lyrics.into_inner(),
                    theme: theme.into_inner(),
                };
            }
        };
        let Some(audio_url) = clip.audio_url().map(ToString::to_string) else {
            warn!(run_id = %run.run_id, clip_id = %clip.id, "created clip carries no audio url");
            self.record_failure(Stage::Song);
            return PipelineResult::PartialNoSong {
                lyrics: lyrics.into_inner(),
                theme: theme.into_inner(),
            };
        };

        let stage_started = Instant::now();
        let video = self.stages.video.await_video(run, &clip).await;
        self.observe(run, Stage::Video, stage_started);
        match video {
            VideoOutcome::Ready {
                video_url: Some(video_url),
                ..
            } => PipelineResult::Complete {
                lyrics: lyrics.into_inner(),
                theme: theme.into_inner(),
                audio_url,
                video_url,
            },
            VideoOutcome::Ready { video_url: None, .. } => {
                warn!(run_id = %run.run_id, clip_id = %clip.id, "video finished without a url");
                PipelineResult::PartialNoVideo {
                    lyrics: lyrics.into_inner(),
                    theme: theme.into_inner(),
                    audio_url,
                }
            }
            VideoOutcome::Exhausted { attempts } => {
                warn!(
                    run_id = %run.run_id,
                    clip_id = %clip.id,
                    error = %StageError::TimeoutExhausted { attempts },
                    "returning song without video"
                );
                self.record_failure(Stage::Video);
                PipelineResult::PartialNoVideo {
                    lyrics: lyrics.into_inner(),
                    theme: theme.into_inner(),
                    audio_url,
                }
            }
        }
    }

    fn failed(&self, stage: Stage, err: &StageError) -> PipelineResult {
        self.record_failure(stage);
        PipelineResult::Failed {
            stage,
            message: err.to_string(),
        }
    }

    fn record_failure(&self, stage: Stage) {
        if let Some(metrics) = &self.metrics {
            metrics.record_stage_failure(stage);
        }
    }

    fn observe(&self, run: &RunContext, stage: Stage, started: Instant) {
        let elapsed = started.elapsed();
        info!(
            run_id = %run.run_id,
            stage = %stage,
            elapsed_ms = elapsed_ms(started),
            "stage finished"
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_stage(stage, elapsed.as_secs_f64());
        }
    }
}

/// Tracks one in-flight run. Dropping it before `finish` means the run future
/// was cancelled; the active-runs gauge is released either way.
struct ActiveRun<'a> {
    metrics: Option<&'a Metrics>,
    run_id: Uuid,
    started: Instant,
    finished: bool,
}

impl<'a> ActiveRun<'a> {
    fn start(metrics: Option<&'a Metrics>, run: &RunContext, started: Instant) -> Self {
        if let Some(metrics) = metrics {
            metrics.active_runs.inc();
        }
        Self {
            metrics,
            run_id: run.run_id,
            started,
            finished: false,
        }
    }

    fn finish(&mut self, result: &PipelineResult) {
        self.finished = true;
        if let Some(metrics) = self.metrics {
            metrics.record_outcome(result);
        }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if let Some(metrics) = self.metrics {
            metrics.active_runs.dec();
            metrics
                .run_duration
                .observe(self.started.elapsed().as_secs_f64());
            if !self.finished {
                metrics.runs_cancelled.inc();
            }
        }
        if !self.finished {
            warn!(
                run_id = %self.run_id,
                elapsed_ms = elapsed_ms(self.started),
                "song pipeline cancelled before completion"
            );
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl PipelineBuilder {
    #[must_use]
    pub fn with_lyrics_stage(mut self, stage: Arc<dyn LyricsStage>) -> Self {
        self.lyrics = Some(stage);
        self
    }

    #[must_use]
    pub fn with_theme_stage(mut self, stage: Arc<dyn ThemeStage>) -> Self {
        self.theme = Some(stage);
        self
    }

    #[must_use]
    pub fn with_song_stage(mut self, stage: Arc<dyn SongStage>) -> Self {
        self.song = Some(stage);
        self
    }

    #[must_use]
    pub fn with_video_stage(mut self, stage: Arc<dyn VideoStage>) -> Self {
        self.video = Some(stage);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: StagePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    /// Returns an error when a stage has not been configured.
    pub fn build(self) -> Result<PipelineOrchestrator> {
        let stages = PipelineStages {
            lyrics: self
                .lyrics
                .ok_or_else(|| anyhow!("lyrics stage must be configured before build"))?,
            theme: self
                .theme
                .ok_or_else(|| anyhow!("theme stage must be configured before build"))?,
            song: self
                .song
                .ok_or_else(|| anyhow!("song stage must be configured before build"))?,
            video: self
                .video
                .ok_or_else(|| anyhow!("video stage must be configured before build"))?,
        };

        Ok(PipelineOrchestrator {
            stages,
            policy: self.policy,
            metrics: self.metrics,
        })
    }
}
