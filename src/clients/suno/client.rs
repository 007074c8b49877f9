use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url, header::COOKIE};
use tracing::debug;

use super::models::{Clip, GenerateRequest};
use crate::clients::MusicGenerator;
use crate::util::{error::UpstreamStatus, redact::redact, text::truncate_error_message};

/// 楽曲生成ゲートウェイクライアントの設定。
#[derive(Clone)]
pub struct SunoConfig {
    pub base_url: String,
    pub cookie: String,
    /// `wait_audio` 付き生成呼び出しのタイムアウト
    pub generate_timeout: Duration,
    /// クリップ再取得のタイムアウト
    pub request_timeout: Duration,
}

impl fmt::Debug for SunoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SunoConfig")
            .field("base_url", &self.base_url)
            .field("cookie", &redact(&self.cookie))
            .field("generate_timeout", &self.generate_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Suno互換ゲートウェイとの通信を管理するクライアント。
#[derive(Clone)]
pub struct SunoClient {
    client: Client,
    base_url: Url,
    cookie: String,
    generate_timeout: Duration,
}

impl fmt::Debug for SunoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SunoClient")
            .field("base_url", &self.base_url.as_str())
            .field("cookie", &redact(&self.cookie))
            .finish_non_exhaustive()
    }
}

impl SunoClient {
    /// 新しいクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: SunoConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .build()
            .context("failed to build suno HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid suno base URL")?;

        Ok(Self {
            client,
            base_url,
            cookie: config.cookie,
            generate_timeout: config.generate_timeout,
        })
    }

    /// 楽曲を生成し、音声が用意できるまで待機する。
    ///
    /// # Errors
    /// 通信失敗、エラーステータス、または応答のパースに失敗した場合はエラーを返します。
    pub async fn generate_clips(&self, request: &GenerateRequest) -> Result<Vec<Clip>> {
        let endpoint = if request.custom_mode {
            "api/custom_generate"
        } else {
            "api/generate"
        };
        let url = self
            .base_url
            .join(endpoint)
            .context("failed to build song generation URL")?;

        debug!(
            title = %request.title,
            tags = %request.tags,
            model = %request.model,
            wait_audio = request.wait_audio,
            "sending song generation request"
        );

        let response = self
            .client
            .post(url)
            .header(COOKIE, &self.cookie)
            .json(request)
            .timeout(self.generate_timeout)
            .send()
            .await
            .context("song generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated_body = truncate_error_message(&body);
            return Err(anyhow::Error::new(UpstreamStatus(status)).context(format!(
                "song generation endpoint returned error status {status}: {truncated_body}"
            )));
        }

        response
            .json::<Vec<Clip>>()
            .await
            .context("failed to deserialize song generation response")
    }

    /// クリップの最新状態を取得する。
    ///
    /// # Errors
    /// 通信失敗、エラーステータス、または該当クリップが応答に含まれない場合はエラーを返します。
    pub async fn fetch_clip(&self, clip_id: &str) -> Result<Clip> {
        let mut url = self
            .base_url
            .join("api/get")
            .context("failed to build clip lookup URL")?;
        url.query_pairs_mut().append_pair("ids", clip_id);

        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.cookie)
            .send()
            .await
            .context("clip lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated_body = truncate_error_message(&body);
            return Err(anyhow::Error::new(UpstreamStatus(status)).context(format!(
                "clip lookup endpoint returned error status {status}: {truncated_body}"
            )));
        }

        let clips: Vec<Clip> = response
            .json()
            .await
            .context("failed to deserialize clip lookup response")?;

        clips
            .into_iter()
            .find(|clip| clip.id == clip_id)
            .ok_or_else(|| anyhow!("clip {clip_id} not found in lookup response"))
    }
}

#[async_trait]
impl MusicGenerator for SunoClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<Clip>> {
        self.generate_clips(request).await
    }

    async fn get_clip(&self, clip_id: &str) -> Result<Clip> {
        self.fetch_clip(clip_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SunoClient {
        SunoClient::new(SunoConfig {
            base_url: server.uri(),
            cookie: "session=abc123".to_string(),
            generate_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn generate_posts_custom_request_with_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/custom_generate"))
            .and(header("cookie", "session=abc123"))
            .and(body_partial_json(serde_json::json!({
                "title": "夕陽下的約定",
                "tags": "六十年代台語歌曲風",
                "make_instrumental": false,
                "wait_audio": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "clip-1",
                    "audio_url": "https://cdn.example.com/clip-1.mp3",
                    "video_url": "",
                    "is_video_pending": true,
                    "status": "streaming"
                },
                {
                    "id": "clip-2",
                    "audio_url": "https://cdn.example.com/clip-2.mp3"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let request =
            GenerateRequest::custom("[Verse1]", "六十年代台語歌曲風", "夕陽下的約定", "chirp-v3-5");
        let clips = client_for(&server)
            .generate_clips(&request)
            .await
            .expect("generation succeeds");

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].id, "clip-1");
        assert_eq!(clips[0].audio_url(), Some("https://cdn.example.com/clip-1.mp3"));
        assert!(clips[0].video_pending());
    }

    #[tokio::test]
    async fn generate_error_status_includes_truncated_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/custom_generate"))
            .respond_with(ResponseTemplate::new(402).set_body_string("insufficient credits"))
            .mount(&server)
            .await;

        let request = GenerateRequest::custom("lyrics", "tags", "title", "chirp-v3-5");
        let error = client_for(&server)
            .generate_clips(&request)
            .await
            .expect_err("402 should fail");

        assert!(error.to_string().contains("insufficient credits"));
    }

    #[tokio::test]
    async fn fetch_clip_selects_matching_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .and(query_param("ids", "clip-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "clip-1", "video_url": "https://cdn.example.com/clip-1.mp4"},
                {
                    "id": "clip-2",
                    "audio_url": "https://cdn.example.com/clip-2.mp3",
                    "video_url": "https://cdn.example.com/clip-2.mp4",
                    "is_video_pending": false
                }
            ])))
            .mount(&server)
            .await;

        let clip = client_for(&server)
            .fetch_clip("clip-2")
            .await
            .expect("lookup succeeds");

        assert_eq!(clip.video_url(), Some("https://cdn.example.com/clip-2.mp4"));
        assert!(!clip.video_pending());
    }

    #[tokio::test]
    async fn fetch_clip_fails_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .fetch_clip("clip-9")
            .await
            .expect_err("missing clip should fail");

        assert!(error.to_string().contains("clip-9"));
    }
}
