//! User selections: fixed categories, preset catalogue and the aggregation of
//! picked options with free-text entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;

/// Fixed selection categories, in declaration order.
///
/// The derived `Ord` follows declaration order, so ordered maps keyed by
/// `Category` iterate in the same order the prompt lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[serde(alias = "主題")]
    Theme,
    #[serde(alias = "心情")]
    Mood,
    #[serde(alias = "物品")]
    Object,
    #[serde(alias = "場景")]
    Scene,
    #[serde(alias = "人物")]
    Person,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Theme,
        Category::Mood,
        Category::Object,
        Category::Scene,
        Category::Person,
    ];

    /// Display label, also used as the key in the prompt descriptor.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Theme => "主題",
            Self::Mood => "心情",
            Self::Object => "物品",
            Self::Scene => "場景",
            Self::Person => "人物",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Mood => "mood",
            Self::Object => "object",
            Self::Scene => "scene",
            Self::Person => "person",
        }
    }

    /// Preset options offered for this category.
    #[must_use]
    pub fn preset_options(self) -> &'static [&'static str] {
        match self {
            Self::Theme => &["回憶過往", "晚年幸福", "金婚紀念", "孫兒相伴", "永恆的愛"],
            Self::Mood => &["溫暖", "感恩", "柔情", "幸福", "懷舊"],
            Self::Object => &["老照片", "手織毛衣", "古董鐘錶", "婚戒", "祖傳首飾"],
            Self::Scene => &[
                "櫻花樹下",
                "古老庭院",
                "夕陽下的長椅",
                "餐廳裡的燭光晚餐",
                "鄉間小路",
            ],
            Self::Person => &["摯愛伴侶", "親密好友", "孫兒", "子女", "相伴一生的人"],
        }
    }
}

/// Category → ordered entries for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    entries: BTreeMap<Category, Vec<String>>,
}

impl Selections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entries of one category, replacing previous ones.
    #[must_use]
    pub fn with<I, S>(mut self, category: Category, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(category, values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn get(&self, category: Category) -> &[String] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// True when no category holds any entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Every category in declaration order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> + '_ {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }

    /// JSON-object descriptor embedded in the lyrics prompt.
    ///
    /// Keys are category labels in declaration order; non-ASCII text is kept as is.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let fields: Vec<String> = self
            .iter()
            .map(|(category, values)| {
                let key = Value::from(category.label());
                let values: Vec<String> = values
                    .iter()
                    .map(|value| Value::from(value.as_str()).to_string())
                    .collect();
                format!("{key}: [{}]", values.join(", "))
            })
            .collect();
        format!("{{{}}}", fields.join(", "))
    }
}

impl Serialize for Selections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, values) in self.iter() {
            map.serialize_entry(category.as_str(), values)?;
        }
        map.end()
    }
}

/// Raw input for one category: picked presets plus a free-text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub selected: Vec<String>,
    /// Comma-separated custom entries.
    #[serde(default)]
    pub custom: Option<String>,
}

/// Merges picked options and custom entries per category into [`Selections`].
///
/// Custom text is split on ASCII and full-width commas. Entries are trimmed and
/// empty ones dropped; picked options come first, custom entries after.
#[must_use]
pub fn aggregate(inputs: &BTreeMap<Category, CategoryInput>) -> Selections {
    let mut selections = Selections::new();
    for (category, input) in inputs {
        let picked = input.selected.iter().map(|value| value.trim());
        let custom = input
            .custom
            .as_deref()
            .into_iter()
            .flat_map(|raw| raw.split([',', '，']))
            .map(str::trim);
        let merged: Vec<String> = picked
            .chain(custom)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
            .collect();
        selections = selections.with(*category, merged);
    }
    selections
}
