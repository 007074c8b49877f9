//! Prompt wording for the two text-generation calls.

use super::lyrics::SECTION_ORDER;
use super::selections::Selections;
use super::theme::MAX_TITLE_LENGTH;

/// Style knobs of the lyrics prompt.
///
/// The default reproduces the 1960s Taiwanese ballad instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptStyle {
    pub lyricist_system_role: String,
    pub theme_system_role: String,
    pub persona: String,
    pub tone: String,
    pub era: String,
    pub intro_marker: String,
    pub end_marker: String,
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self {
            lyricist_system_role: "You are a professional Taiwanese song lyricist.".to_string(),
            theme_system_role: "You are a professional song theme creator.".to_string(),
            persona: "世界頂尖的台語歌詞創作大師".to_string(),
            tone: "充滿溫暖、浪漫、緩慢、有感情".to_string(),
            era: "六十年代台語歌曲風".to_string(),
            intro_marker: "[intro 阮阮]".to_string(),
            end_marker: "[End]".to_string(),
        }
    }
}

impl PromptStyle {
    /// User prompt for the lyrics call.
    #[must_use]
    pub fn lyrics_prompt(&self, selections: &Selections) -> String {
        let structure = SECTION_ORDER
            .iter()
            .map(|label| format!("[{label}]"))
            .collect::<Vec<_>>()
            .join("-");

        format!(
            "你是[{persona}]，請你寫一首[{tone}]的歌詞。\n\
             描述[{descriptor}]。\n\
             音樂的風格是[{era}]。\n\
             詞曲的結構是{structure}(結構兩旁要加上方號[]，並與上一段有一個空格)\n\
             最前面加上 {intro} 最後面加上{end}",
            persona = self.persona,
            tone = self.tone,
            descriptor = selections.descriptor(),
            era = self.era,
            intro = self.intro_marker,
            end = self.end_marker,
        )
    }

    /// User prompt for the theme call; states the title length ceiling.
    #[must_use]
    pub fn theme_prompt(&self, lyrics: &str) -> String {
        format!(
            "根據以下歌詞，給出一個適合的歌曲主題：\n\n\
             {lyrics}\n\n\
             請提供一個簡潔而富有意境的主題，不超過{MAX_TITLE_LENGTH}個字符。"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::selections::Category;

    #[test]
    fn lyrics_prompt_embeds_descriptor_tone_era_and_structure() {
        let style = PromptStyle::default();
        let selections = Selections::new().with(Category::Theme, ["回憶過往"]);

        let prompt = style.lyrics_prompt(&selections);

        assert!(prompt.contains(r#"描述[{"主題": ["回憶過往"], "心情": []"#));
        assert!(prompt.contains("[充滿溫暖、浪漫、緩慢、有感情]"));
        assert!(prompt.contains("音樂的風格是[六十年代台語歌曲風]"));
        assert!(prompt.contains(
            "[Verse1]-[Chorus]-[Verse2]-[Chorus]-[Bridge]-[Chorus]-[Outro]"
        ));
        assert!(prompt.contains("最前面加上 [intro 阮阮] 最後面加上[End]"));
    }

    #[test]
    fn theme_prompt_states_length_ceiling() {
        let prompt = PromptStyle::default().theme_prompt("[Verse1] 夕陽");

        assert!(prompt.contains("[Verse1] 夕陽"));
        assert!(prompt.contains("不超過50個字符"));
    }
}
