//! Run outcomes and the stage error taxonomy.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lyrics,
    Theme,
    Song,
    Video,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lyrics => "lyrics",
            Self::Theme => "theme",
            Self::Song => "song",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage failures.
///
/// Only `Service` from the lyrics and theme stages ends a run as `Failed`; the
/// other variants describe degraded outcomes.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} service call failed: {source:#}")]
    Service {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
    #[error("music generation returned no clips")]
    EmptyResult,
    #[error("video still pending after {attempts} status checks")]
    TimeoutExhausted { attempts: u32 },
}

impl StageError {
    pub(crate) fn service(stage: Stage, source: anyhow::Error) -> Self {
        Self::Service { stage, source }
    }
}

/// Outcome of one pipeline run, handed back to the caller for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Complete {
        lyrics: String,
        theme: String,
        audio_url: String,
        video_url: String,
    },
    PartialNoVideo {
        lyrics: String,
        theme: String,
        audio_url: String,
    },
    PartialNoSong {
        lyrics: String,
        theme: String,
    },
    /// Lyrics and theme only; produced by the text-only stage policy.
    TextOnly {
        lyrics: String,
        theme: String,
    },
    Failed {
        stage: Stage,
        message: String,
    },
}

impl PipelineResult {
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "complete",
            Self::PartialNoVideo { .. } => "partial_no_video",
            Self::PartialNoSong { .. } => "partial_no_song",
            Self::TextOnly { .. } => "text_only",
            Self::Failed { .. } => "failed",
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn lyrics(&self) -> Option<&str> {
        match self {
            Self::Complete { lyrics, .. }
            | Self::PartialNoVideo { lyrics, .. }
            | Self::PartialNoSong { lyrics, .. }
            | Self::TextOnly { lyrics, .. } => Some(lyrics),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        match self {
            Self::Complete { theme, .. }
            | Self::PartialNoVideo { theme, .. }
            | Self::PartialNoSong { theme, .. }
            | Self::TextOnly { theme, .. } => Some(theme),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn audio_url(&self) -> Option<&str> {
        match self {
            Self::Complete { audio_url, .. } | Self::PartialNoVideo { audio_url, .. } => {
                Some(audio_url)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        match self {
            Self::Complete { video_url, .. } => Some(video_url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn service_error_message_names_stage_and_cause() {
        let error = StageError::service(
            Stage::Theme,
            anyhow!("quota exceeded").context("chat completion request failed"),
        );

        let message = error.to_string();
        assert!(message.starts_with("theme service call failed"));
        assert!(message.contains("quota exceeded"));
    }

    #[test]
    fn results_serialize_with_status_tag() {
        let partial = PipelineResult::PartialNoVideo {
            lyrics: "[intro 阮阮]".into(),
            theme: "夕陽".into(),
            audio_url: "https://cdn.example.com/a.mp3".into(),
        };
        let failed = PipelineResult::Failed {
            stage: Stage::Lyrics,
            message: "boom".into(),
        };

        let partial = serde_json::to_value(&partial).expect("serializes");
        let failed = serde_json::to_value(&failed).expect("serializes");

        assert_eq!(partial["status"], "partial_no_video");
        assert_eq!(partial["audio_url"], "https://cdn.example.com/a.mp3");
        assert!(partial.get("video_url").is_none());
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["stage"], "lyrics");
    }

    #[test]
    fn accessors_expose_only_populated_fields() {
        let result = PipelineResult::PartialNoSong {
            lyrics: "lyrics".into(),
            theme: "theme".into(),
        };

        assert_eq!(result.lyrics(), Some("lyrics"));
        assert_eq!(result.theme(), Some("theme"));
        assert!(result.audio_url().is_none());
        assert!(result.video_url().is_none());
        assert_eq!(result.outcome(), "partial_no_song");
        assert!(!result.is_failed());
    }
}
