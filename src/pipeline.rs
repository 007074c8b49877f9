//! The song generation pipeline: lyrics → theme → song → video.

pub mod context;
pub mod lyrics;
pub mod orchestrator;
pub mod prompt;
pub mod result;
pub mod selections;
pub mod song;
#[cfg(test)]
pub(crate) mod testing;
pub mod theme;
pub mod video;

pub use context::RunContext;
pub use lyrics::{LlmLyricsStage, LyricsDocument, LyricsStage, SECTION_ORDER};
pub use orchestrator::{PipelineBuilder, PipelineOrchestrator, PipelineSettings, StagePolicy};
pub use prompt::PromptStyle;
pub use result::{PipelineResult, Stage, StageError};
pub use selections::{Category, CategoryInput, Selections, aggregate};
pub use song::{SongStage, SunoSongStage, SynthesisOutcome};
pub use theme::{LlmThemeStage, MAX_TITLE_LENGTH, Theme, ThemeStage};
pub use video::{VideoOutcome, VideoPoller, VideoStage};
