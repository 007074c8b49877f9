use serde::{Deserialize, Serialize};

/// 楽曲生成リクエスト。
///
/// `custom_mode` と `wait_audio` はエンドポイント選択と待機モードに使い、
/// カスタムモードではタイトルとスタイルタグがそのまま使われる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    /// カスタムモードでは歌詞そのもの
    pub prompt: String,
    pub tags: String,
    pub title: String,
    pub make_instrumental: bool,
    pub wait_audio: bool,
    pub model: String,
    #[serde(skip)]
    pub custom_mode: bool,
}

impl GenerateRequest {
    /// 歌詞付き・カスタムモード・同期待機のリクエストを構築する。
    #[must_use]
    pub fn custom(
        lyrics: impl Into<String>,
        tags: impl Into<String>,
        title: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompt: lyrics.into(),
            tags: tags.into(),
            title: title.into(),
            make_instrumental: false,
            wait_audio: true,
            model: model.into(),
            custom_mode: true,
        }
    }
}

/// 生成されたクリップ。
///
/// ゲートウェイによっては `is_video_pending` を返さないため、
/// その場合は `video_url` が空かどうかで判定する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_video_pending: Option<bool>,
}

impl Clip {
    /// 音声URLを持つクリップを作成する（動画は処理中）。
    #[must_use]
    pub fn new(id: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            status: None,
            audio_url: Some(audio_url.into()),
            video_url: None,
            is_video_pending: Some(true),
        }
    }

    /// 動画の処理が終わったクリップとしてマークする。
    #[must_use]
    pub fn with_video(mut self, video_url: impl Into<String>) -> Self {
        self.video_url = Some(video_url.into());
        self.is_video_pending = Some(false);
        self
    }

    /// 動画がまだ処理中かどうか。
    #[must_use]
    pub fn video_pending(&self) -> bool {
        self.is_video_pending
            .unwrap_or_else(|| self.video_url().is_none())
    }

    /// 空文字列を除いた音声URL。
    #[must_use]
    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref().filter(|url| !url.is_empty())
    }

    /// 空文字列を除いた動画URL。
    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref().filter(|url| !url.is_empty())
    }
}
