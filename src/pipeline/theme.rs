//! Theme stage: lyrics → bounded-length song title.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::{TextGenerator, TextRequest};
use crate::util::text::truncate_chars;

use super::context::RunContext;
use super::lyrics::LyricsDocument;
use super::prompt::PromptStyle;
use super::result::{Stage, StageError};

/// Title length ceiling, in Unicode scalar values.
pub const MAX_TITLE_LENGTH: usize = 50;

/// Song title, never longer than [`MAX_TITLE_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme(String);

impl Theme {
    /// Trims surrounding whitespace and truncates to the ceiling. A cut that
    /// lands after a space drops the trailing whitespace too.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut title = truncate_chars(text.trim(), MAX_TITLE_LENGTH);
        title.truncate(title.trim_end().len());
        Self(title)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ThemeStage: Send + Sync {
    async fn extract(&self, run: &RunContext, lyrics: &LyricsDocument)
    -> Result<Theme, StageError>;
}

/// Theme stage backed by the same text-generation capability as the lyrics.
pub struct LlmThemeStage {
    generator: Arc<dyn TextGenerator>,
    style: Arc<PromptStyle>,
    model: String,
}

impl LlmThemeStage {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        style: Arc<PromptStyle>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            style,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ThemeStage for LlmThemeStage {
    async fn extract(
        &self,
        run: &RunContext,
        lyrics: &LyricsDocument,
    ) -> Result<Theme, StageError> {
        let request = TextRequest {
            system: self.style.theme_system_role.clone(),
            prompt: self.style.theme_prompt(lyrics.as_str()),
            model: self.model.clone(),
        };

        let raw = self
            .generator
            .generate_text(&request)
            .await
            .map_err(|error| StageError::service(Stage::Theme, error))?;

        let raw_chars = raw.trim().chars().count();
        if raw_chars > MAX_TITLE_LENGTH {
            warn!(
                run_id = %run.run_id,
                raw_chars,
                max = MAX_TITLE_LENGTH,
                "theme exceeded length ceiling, truncating"
            );
        }
        let theme = Theme::new(&raw);
        info!(run_id = %run.run_id, theme = %theme, "theme extracted");

        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedTextGenerator, sample_lyrics};
    use anyhow::anyhow;
    use rstest::rstest;

    #[rstest]
    #[case("夕陽下的長椅", "夕陽下的長椅")]
    #[case("  金婚紀念\n", "金婚紀念")]
    #[case("", "")]
    fn theme_keeps_short_titles(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Theme::new(raw).as_str(), expected);
    }

    #[test]
    fn theme_never_exceeds_ceiling() {
        let samples = [
            "a".repeat(51),
            "回".repeat(200),
            "word ".repeat(40),
            "🎵".repeat(MAX_TITLE_LENGTH + 1),
            "x".repeat(MAX_TITLE_LENGTH),
        ];

        for raw in &samples {
            let theme = Theme::new(raw);
            assert!(theme.as_str().chars().count() <= MAX_TITLE_LENGTH, "{raw}");
        }
        assert_eq!(Theme::new(&"x".repeat(MAX_TITLE_LENGTH)).as_str().len(), MAX_TITLE_LENGTH);
    }

    #[rstest]
    #[case("永恆的愛".repeat(30))]
    #[case(format!("{} tail", "a".repeat(49)))]
    #[case(format!("{}\u{3000}夕陽", "晚".repeat(49)))]
    fn theme_is_idempotent(#[case] raw: String) {
        let once = Theme::new(&raw);
        let twice = Theme::new(once.as_str());

        assert_eq!(once, twice);
        assert_eq!(once.as_str(), once.as_str().trim_end());
    }

    #[test]
    fn cut_after_space_drops_trailing_whitespace() {
        let theme = Theme::new(&format!("{} tail", "a".repeat(49)));

        assert_eq!(theme.as_str(), "a".repeat(49));
    }

    #[tokio::test]
    async fn extract_truncates_long_responses() {
        let generator = Arc::new(ScriptedTextGenerator::new(vec![Ok("很長的標題".repeat(20))]));
        let stage = LlmThemeStage::new(
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            Arc::new(PromptStyle::default()),
            "gpt-4o-mini",
        );

        let theme = stage
            .extract(&RunContext::generate(), &LyricsDocument::new(sample_lyrics()))
            .await
            .expect("theme extracted");

        assert_eq!(theme.as_str().chars().count(), MAX_TITLE_LENGTH);
        let requests = generator.requests();
        assert_eq!(requests[0].system, "You are a professional song theme creator.");
        assert!(requests[0].prompt.contains("[Verse1]"));
        assert!(requests[0].prompt.contains("不超過50個字符"));
    }

    #[tokio::test]
    async fn extract_maps_failure_to_theme_stage() {
        let generator = Arc::new(ScriptedTextGenerator::new(vec![Err(anyhow!("connection reset"))]));
        let stage = LlmThemeStage::new(generator, Arc::new(PromptStyle::default()), "gpt-4o-mini");

        let error = stage
            .extract(&RunContext::generate(), &LyricsDocument::new("lyrics"))
            .await
            .expect_err("failure propagates");

        assert!(matches!(
            error,
            StageError::Service {
                stage: Stage::Theme,
                ..
            }
        ));
    }
}
