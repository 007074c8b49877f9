//! Lyrics stage: selections → structured lyrics text.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::clients::{TextGenerator, TextRequest};

use super::context::RunContext;
use super::prompt::PromptStyle;
use super::result::{Stage, StageError};
use super::selections::Selections;

/// Section labels requested from the lyricist, in order.
pub const SECTION_ORDER: [&str; 7] = [
    "Verse1", "Chorus", "Verse2", "Chorus", "Bridge", "Chorus", "Outro",
];

/// Generated lyrics, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsDocument(String);

impl LyricsDocument {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Bracketed labels in order of appearance, trimmed.
    #[must_use]
    pub fn section_labels(&self) -> Vec<&str> {
        let mut labels = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('[') {
            let after_open = &rest[open + 1..];
            let Some(close) = after_open.find(']') else {
                break;
            };
            labels.push(after_open[..close].trim());
            rest = &after_open[close + 1..];
        }
        labels
    }

    /// Whether the lyrics start with an intro label, end with an end label and
    /// contain the requested sections in order.
    ///
    /// Labels are compared case-insensitively with whitespace removed, so
    /// `[Verse 1]` matches `Verse1`. Extra labels in between are tolerated.
    #[must_use]
    pub fn follows_structure(&self) -> bool {
        let labels: Vec<String> = self
            .section_labels()
            .into_iter()
            .map(normalize_label)
            .collect();

        let (Some(first), Some(last)) = (labels.first(), labels.last()) else {
            return false;
        };
        if !first.starts_with("intro") || last != "end" {
            return false;
        }

        let mut expected = SECTION_ORDER.iter().map(|label| normalize_label(label)).peekable();
        for label in &labels {
            if expected.peek() == Some(label) {
                expected.next();
            }
        }
        expected.peek().is_none()
    }
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[async_trait]
pub trait LyricsStage: Send + Sync {
    async fn generate(
        &self,
        run: &RunContext,
        selections: &Selections,
    ) -> Result<LyricsDocument, StageError>;
}

/// Lyrics stage backed by a text-generation capability. No retry.
pub struct LlmLyricsStage {
    generator: Arc<dyn TextGenerator>,
    style: Arc<PromptStyle>,
    model: String,
}

impl LlmLyricsStage {
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
impl LyricsStage for LlmLyricsStage {
    async fn generate(
        &self,
        run: &RunContext,
        selections: &Selections,
    ) -> Result<LyricsDocument, StageError> {
        let request = TextRequest {
            system: self.style.lyricist_system_role.clone(),
            prompt: self.style.lyrics_prompt(selections),
            model: self.model.clone(),
        };
        debug!(run_id = %run.run_id, descriptor = %selections.descriptor(), "requesting lyrics");

        let text = self
            .generator
            .generate_text(&request)
            .await
            .map_err(|error| StageError::service(Stage::Lyrics, error))?;
        let lyrics = LyricsDocument::new(text);

        if !lyrics.follows_structure() {
            warn!(
                run_id = %run.run_id,
                labels = ?lyrics.section_labels(),
                "lyrics do not follow the requested section structure"
            );
        }
        info!(
            run_id = %run.run_id,
            chars = lyrics.as_str().chars().count(),
            "lyrics generated"
        );

        Ok(lyrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::selections::Category;
    use crate::pipeline::testing::{ScriptedTextGenerator, sample_lyrics};
    use anyhow::anyhow;

    #[test]
    fn section_labels_are_extracted_in_order() {
        let lyrics = LyricsDocument::new("[intro 阮阮]\n[ Verse1 ]\n歌詞\n[Chorus] [End");

        assert_eq!(lyrics.section_labels(), vec!["intro 阮阮", "Verse1", "Chorus"]);
    }

    #[test]
    fn sample_lyrics_follow_structure() {
        assert!(LyricsDocument::new(sample_lyrics()).follows_structure());
    }

    #[test]
    fn structure_tolerates_spacing_and_case() {
        let lyrics = LyricsDocument::new(
            "[Intro 阮阮] [verse 1] a [CHORUS] b [Verse 2] c [Chorus] d [Bridge] e [Chorus] f [Outro] [End]",
        );
        assert!(lyrics.follows_structure());
    }

    #[test]
    fn structure_rejects_missing_markers_or_reordered_sections() {
        let no_end = LyricsDocument::new("[intro] [Verse1] [Chorus] [Verse2] [Chorus] [Bridge] [Chorus] [Outro]");
        let reordered = LyricsDocument::new(
            "[intro] [Verse2] [Chorus] [Verse1] [Chorus] [Bridge] [Chorus] [Outro] [End]",
        );
        let empty = LyricsDocument::new("no labels at all");

        assert!(!no_end.follows_structure());
        assert!(!reordered.follows_structure());
        assert!(!empty.follows_structure());
    }

    #[tokio::test]
    async fn generate_sends_style_prompt_and_returns_text_verbatim() {
        let generator = Arc::new(ScriptedTextGenerator::new(vec![Ok("  raw lyrics  ".into())]));
        let stage = LlmLyricsStage::new(
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            Arc::new(PromptStyle::default()),
            "gpt-4o-mini",
        );
        let selections = Selections::new().with(Category::Mood, ["溫暖"]);

        let lyrics = stage
            .generate(&RunContext::generate(), &selections)
            .await
            .expect("lyrics generated");

        assert_eq!(lyrics.as_str(), "  raw lyrics  ");
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].system,
            "You are a professional Taiwanese song lyricist."
        );
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert!(requests[0].prompt.contains(r#""心情": ["溫暖"]"#));
    }

    #[tokio::test]
    async fn generate_maps_capability_failure_to_service_error() {
        let generator = Arc::new(ScriptedTextGenerator::new(vec![Err(anyhow!("quota exceeded"))]));
        let stage = LlmLyricsStage::new(generator, Arc::new(PromptStyle::default()), "gpt-4o-mini");

        let error = stage
            .generate(&RunContext::generate(), &Selections::new())
            .await
            .expect_err("failure propagates");

        assert!(matches!(
            error,
            StageError::Service {
                stage: Stage::Lyrics,
                ..
            }
        ));
        assert!(error.to_string().contains("quota exceeded"));
    }
}
