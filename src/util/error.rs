//! エラー分類ユーティリティ。
//!
//! 分類はログ出力のためだけに使い、パイプラインは自動リトライしない。
use anyhow::Error;
use reqwest::StatusCode;

/// エラーの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// 一時的なエラー（ネットワークエラー、タイムアウト、5xx、429）
    Retryable,
    /// 再実行しても結果が変わらないエラー（バリデーション、4xx、レスポンス不正）
    NonRetryable,
    /// 認証・認可エラー（APIキーやCookieの失効）
    Fatal,
}

impl ErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::NonRetryable => "non_retryable",
            Self::Fatal => "fatal",
        }
    }
}

/// エラーチェーンをたどって種類を判定する。
#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    for cause in error.chain() {
        if let Some(reqwest_err) = cause.downcast_ref::<reqwest::Error>() {
            if reqwest_err.is_timeout() || reqwest_err.is_connect() {
                return ErrorKind::Retryable;
            }

            if let Some(status) = reqwest_err.status() {
                return classify_status(status);
            }
        }

        if let Some(status_err) = cause.downcast_ref::<UpstreamStatus>() {
            return classify_status(status_err.0);
        }
    }

    ErrorKind::NonRetryable
}

fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
            ErrorKind::Fatal
        }
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Retryable,
        status if status.is_server_error() => ErrorKind::Retryable,
        _ => ErrorKind::NonRetryable,
    }
}

/// 上流サービスが返したエラーステータス。
///
/// レスポンス本文はコンテキスト側に載せ、分類用にステータスだけを保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("upstream returned error status {0}")]
pub(crate) struct UpstreamStatus(pub(crate) StatusCode);
