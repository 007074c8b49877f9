use std::{env, fmt, net::SocketAddr, num::NonZeroU32, time::Duration};

use thiserror::Error;

use crate::clients::{OpenAiConfig, SunoConfig};
use crate::observability::tracing::TracingSettings;
use crate::pipeline::{PipelineSettings, PromptStyle, StagePolicy};
use crate::util::{redact::redact, retry::PollPolicy};

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

#[derive(Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    openai_api_key: String,
    openai_base_url: String,
    llm_model: String,
    llm_timeout: Duration,
    suno_cookie: String,
    suno_base_url: String,
    suno_model_version: String,
    suno_generate_timeout: Duration,
    suno_request_timeout: Duration,
    song_style_tags: String,
    video_poll_interval: Duration,
    video_poll_max_attempts: NonZeroU32,
    video_poll_backoff_multiplier: Option<f64>,
    video_poll_max_interval: Duration,
    stage_policy: StagePolicy,
    otel_exporter_endpoint: Option<String>,
    otel_sampling_ratio: f64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_bind", &self.http_bind)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_timeout", &self.llm_timeout)
            .field("suno_cookie", &redact(&self.suno_cookie))
            .field("suno_base_url", &self.suno_base_url)
            .field("suno_model_version", &self.suno_model_version)
            .field("suno_generate_timeout", &self.suno_generate_timeout)
            .field("suno_request_timeout", &self.suno_request_timeout)
            .field("song_style_tags", &self.song_style_tags)
            .field("video_poll_interval", &self.video_poll_interval)
            .field("video_poll_max_attempts", &self.video_poll_max_attempts)
            .field(
                "video_poll_backoff_multiplier",
                &self.video_poll_backoff_multiplier,
            )
            .field("video_poll_max_interval", &self.video_poll_max_interval)
            .field("stage_policy", &self.stage_policy)
            .field("otel_exporter_endpoint", &self.otel_exporter_endpoint)
            .field("otel_sampling_ratio", &self.otel_sampling_ratio)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Song Worker の設定値を読み込み、検証する。
    ///
    /// 必須の環境変数が揃っていない場合や、数値／アドレスのパースに失敗した場合はエラーを返す。
    ///
    /// # Errors
    /// `OPENAI_API_KEY` か `SUNO_COOKIE` が未設定、もしくは各種値のパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("SONG_WORKER_HTTP_BIND", "0.0.0.0:9010")?;

        // Text generation
        let openai_api_key = env_var("OPENAI_API_KEY")?;
        let openai_base_url = env_or("OPENAI_BASE_URL", "https://api.openai.com/");
        let llm_model = env_or("LLM_MODEL", "gpt-4o-mini");
        let llm_timeout = parse_duration_secs("LLM_TIMEOUT_SECS", 120)?;

        // Music generation
        let suno_cookie = env_var("SUNO_COOKIE")?;
        let suno_base_url = env_or("SUNO_BASE_URL", "http://localhost:3000/");
        let suno_model_version = env_or("SUNO_MODEL_VERSION", "chirp-v3-5");
        let suno_generate_timeout = parse_duration_secs("SUNO_GENERATE_TIMEOUT_SECS", 600)?;
        let suno_request_timeout = parse_duration_secs("SUNO_REQUEST_TIMEOUT_SECS", 30)?;
        let song_style_tags = env_or("SONG_STYLE_TAGS", "六十年代台語歌曲風");

        // Video polling (default: 10s × 30)
        let video_poll_interval = parse_duration_secs("VIDEO_POLL_INTERVAL_SECS", 10)?;
        let video_poll_max_attempts = parse_non_zero_u32("VIDEO_POLL_MAX_ATTEMPTS", 30)?;
        let video_poll_backoff_multiplier =
            parse_optional_multiplier("VIDEO_POLL_BACKOFF_MULTIPLIER")?;
        let video_poll_max_interval = parse_duration_secs("VIDEO_POLL_MAX_INTERVAL_SECS", 300)?;

        let stage_policy = parse_stage_policy("PIPELINE_STAGES")?;

        // OpenTelemetry settings
        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let otel_sampling_ratio = parse_sampling_ratio("OTEL_SAMPLING_RATIO")?;

        Ok(Self {
            http_bind,
            openai_api_key,
            openai_base_url,
            llm_model,
            llm_timeout,
            suno_cookie,
            suno_base_url,
            suno_model_version,
            suno_generate_timeout,
            suno_request_timeout,
            song_style_tags,
            video_poll_interval,
            video_poll_max_attempts,
            video_poll_backoff_multiplier,
            video_poll_max_interval,
            stage_policy,
            otel_exporter_endpoint,
            otel_sampling_ratio,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn suno_base_url(&self) -> &str {
        &self.suno_base_url
    }

    #[must_use]
    pub fn suno_model_version(&self) -> &str {
        &self.suno_model_version
    }

    #[must_use]
    pub fn suno_generate_timeout(&self) -> Duration {
        self.suno_generate_timeout
    }

    #[must_use]
    pub fn suno_request_timeout(&self) -> Duration {
        self.suno_request_timeout
    }

    #[must_use]
    pub fn song_style_tags(&self) -> &str {
        &self.song_style_tags
    }

    #[must_use]
    pub fn stage_policy(&self) -> StagePolicy {
        self.stage_policy
    }

    #[must_use]
    pub fn otel_exporter_endpoint(&self) -> Option<&str> {
        self.otel_exporter_endpoint.as_deref()
    }

    /// トレーシング初期化に渡す設定。
    #[must_use]
    pub fn tracing(&self) -> TracingSettings {
        TracingSettings {
            otlp_endpoint: self.otel_exporter_endpoint.clone(),
            sampling_ratio: self.otel_sampling_ratio,
        }
    }

    /// ポーリング方針。倍率が設定されている場合のみバックオフを有効にする。
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        let policy =
            PollPolicy::fixed(self.video_poll_interval, self.video_poll_max_attempts.get());
        match self.video_poll_backoff_multiplier {
            Some(multiplier) => policy.with_backoff(multiplier, self.video_poll_max_interval),
            None => policy,
        }
    }

    #[must_use]
    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.openai_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            timeout: self.llm_timeout,
        }
    }

    #[must_use]
    pub fn suno(&self) -> SunoConfig {
        SunoConfig {
            base_url: self.suno_base_url.clone(),
            cookie: self.suno_cookie.clone(),
            generate_timeout: self.suno_generate_timeout,
            request_timeout: self.suno_request_timeout,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            llm_model: self.llm_model.clone(),
            music_model: self.suno_model_version.clone(),
            style_tags: self.song_style_tags.clone(),
            prompt_style: PromptStyle::default(),
            poll_policy: self.poll_policy(),
            stage_policy: self.stage_policy,
        }
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn env_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env_or(name, default);

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_u32(name: &'static str, default: u32) -> Result<NonZeroU32, ConfigError> {
    let raw = env_or(name, &default.to_string());
    let parsed = raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroU32::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env_or(name, &default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env_or(name, &default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_sampling_ratio(name: &'static str) -> Result<f64, ConfigError> {
    let ratio = parse_f64(name, 1.0)?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be between 0.0 and 1.0"),
        });
    }
    Ok(ratio)
}

fn parse_optional_multiplier(name: &'static str) -> Result<Option<f64>, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let parsed = raw.trim().parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if !parsed.is_finite() || parsed < 1.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be a finite value of at least 1.0"),
        });
    }
    Ok(Some(parsed))
}

fn parse_stage_policy(name: &'static str) -> Result<StagePolicy, ConfigError> {
    let raw = env_or(name, "full");
    raw.parse::<StagePolicy>()
        .map_err(|source| ConfigError::Invalid { name, source })
}

/// テスト用に本モジュールが読む環境変数をすべて消去する。
#[cfg(test)]
pub(crate) fn reset_test_env() {
    for name in ENV_VARS {
        // SAFETY: tests hold ENV_MUTEX while mutating the environment.
        unsafe {
            env::remove_var(name);
        }
    }
}

#[cfg(test)]
const ENV_VARS: [&str; 18] = [
    "SONG_WORKER_HTTP_BIND",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "LLM_MODEL",
    "LLM_TIMEOUT_SECS",
    "SUNO_COOKIE",
    "SUNO_BASE_URL",
    "SUNO_MODEL_VERSION",
    "SUNO_GENERATE_TIMEOUT_SECS",
    "SUNO_REQUEST_TIMEOUT_SECS",
    "SONG_STYLE_TAGS",
    "VIDEO_POLL_INTERVAL_SECS",
    "VIDEO_POLL_MAX_ATTEMPTS",
    "VIDEO_POLL_BACKOFF_MULTIPLIER",
    "VIDEO_POLL_MAX_INTERVAL_SECS",
    "PIPELINE_STAGES",
    "OTEL_EXPORTER_OTLP_ENDPOINT",
    "OTEL_SAMPLING_RATIO",
];
