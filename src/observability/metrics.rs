//! Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

use crate::pipeline::{PipelineResult, Stage};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // 実行結果カウンター
    pub runs_complete: Counter,
    pub runs_partial_no_video: Counter,
    pub runs_partial_no_song: Counter,
    pub runs_text_only: Counter,
    pub runs_failed: Counter,
    pub runs_cancelled: Counter,

    // ステージ失敗カウンター
    pub lyrics_failures: Counter,
    pub theme_failures: Counter,
    pub song_failures: Counter,
    pub video_timeouts: Counter,
    pub video_poll_attempts: Counter,

    // ヒストグラム
    pub lyrics_duration: Histogram,
    pub theme_duration: Histogram,
    pub song_duration: Histogram,
    pub video_poll_duration: Histogram,
    pub run_duration: Histogram,

    // ゲージ
    pub active_runs: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    #[allow(clippy::too_many_lines)]
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            runs_complete: register_counter_with_registry!(
                "song_runs_complete_total",
                "Runs that produced lyrics, theme, audio and video",
                registry
            )?,
            runs_partial_no_video: register_counter_with_registry!(
                "song_runs_partial_no_video_total",
                "Runs that produced audio but no video",
                registry
            )?,
            runs_partial_no_song: register_counter_with_registry!(
                "song_runs_partial_no_song_total",
                "Runs that produced lyrics and theme but no song",
                registry
            )?,
            runs_text_only: register_counter_with_registry!(
                "song_runs_text_only_total",
                "Runs executed with the text-only stage policy",
                registry
            )?,
            runs_failed: register_counter_with_registry!(
                "song_runs_failed_total",
                "Runs that failed in the lyrics or theme stage",
                registry
            )?,
            runs_cancelled: register_counter_with_registry!(
                "song_runs_cancelled_total",
                "Runs dropped before producing a result",
                registry
            )?,
            lyrics_failures: register_counter_with_registry!(
                "song_lyrics_failures_total",
                "Lyrics generation failures",
                registry
            )?,
            theme_failures: register_counter_with_registry!(
                "song_theme_failures_total",
                "Theme extraction failures",
                registry
            )?,
            song_failures: register_counter_with_registry!(
                "song_synthesis_failures_total",
                "Music generation failures or empty results",
                registry
            )?,
            video_timeouts: register_counter_with_registry!(
                "song_video_timeouts_total",
                "Runs whose video stayed pending through every status check",
                registry
            )?,
            video_poll_attempts: register_counter_with_registry!(
                "song_video_poll_attempts_total",
                "Total number of clip status checks",
                registry
            )?,
            lyrics_duration: register_histogram_with_registry!(
                "song_lyrics_duration_seconds",
                "Duration of lyrics generation",
                registry
            )?,
            theme_duration: register_histogram_with_registry!(
                "song_theme_duration_seconds",
                "Duration of theme extraction",
                registry
            )?,
            song_duration: register_histogram_with_registry!(
                "song_synthesis_duration_seconds",
                "Duration of music generation",
                registry
            )?,
            video_poll_duration: register_histogram_with_registry!(
                "song_video_poll_duration_seconds",
                "Duration spent polling for video completion",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                "song_run_duration_seconds",
                "Duration of an entire pipeline run",
                registry
            )?,
            active_runs: register_gauge_with_registry!(
                "song_active_runs",
                "Number of pipeline runs in progress",
                registry
            )?,
        })
    }

    /// 専用レジストリに登録したメトリクスを作成する（テスト用）。
    #[cfg(test)]
    pub(crate) fn new_isolated() -> Result<Self, prometheus::Error> {
        Self::new(&Registry::new())
    }

    /// 実行結果をカウントする。
    pub fn record_outcome(&self, result: &PipelineResult) {
        match result {
            PipelineResult::Complete { .. } => self.runs_complete.inc(),
            PipelineResult::PartialNoVideo { .. } => self.runs_partial_no_video.inc(),
            PipelineResult::PartialNoSong { .. } => self.runs_partial_no_song.inc(),
            PipelineResult::TextOnly { .. } => self.runs_text_only.inc(),
            PipelineResult::Failed { .. } => self.runs_failed.inc(),
        }
    }

    /// ステージの失敗をカウントする。
    pub fn record_stage_failure(&self, stage: Stage) {
        match stage {
            Stage::Lyrics => self.lyrics_failures.inc(),
            Stage::Theme => self.theme_failures.inc(),
            Stage::Song => self.song_failures.inc(),
            Stage::Video => self.video_timeouts.inc(),
        }
    }

    /// ステージの所要時間を記録する。
    pub fn observe_stage(&self, stage: Stage, seconds: f64) {
        let histogram = match stage {
            Stage::Lyrics => &self.lyrics_duration,
            Stage::Theme => &self.theme_duration,
            Stage::Song => &self.song_duration,
            Stage::Video => &self.video_poll_duration,
        };
        histogram.observe(seconds);
    }
}
