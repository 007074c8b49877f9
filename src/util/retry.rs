//! ポーリング間隔と試行回数の方針。
//!
//! 既定は固定間隔（10秒 × 30回）。バックオフ倍率を指定した場合のみ
//! 間隔が指数的に伸び、上限でキャップされる。
use std::time::Duration;

/// ポーリング方針の設定。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: u32,
    backoff_multiplier: Option<f64>,
    max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl PollPolicy {
    /// 既定のポーリング間隔。
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    /// 既定の最大試行回数。
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
    const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(300);

    /// 固定間隔のポーリング方針を作成する。
    #[must_use]
    pub const fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_multiplier: None,
            max_interval: Self::DEFAULT_MAX_INTERVAL,
        }
    }

    /// 指数バックオフを有効にする。倍率は1.0未満にならない。
    #[must_use]
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = Some(multiplier.max(1.0));
        self.max_interval = max_interval.max(self.interval);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_multiplier(&self) -> Option<f64> {
        self.backoff_multiplier
    }

    /// 指定された試行の前に待機する時間を計算する。
    ///
    /// # Arguments
    /// * `attempt` - 試行回数（1から開始）
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(multiplier) = self.backoff_multiplier else {
            return self.interval;
        };

        let exponent = i32::try_from(attempt.saturating_sub(1).min(64)).unwrap_or(64);
        let scaled = self.interval.as_secs_f64() * multiplier.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_interval)
    }
}
