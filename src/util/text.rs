//! テキスト処理ユーティリティ。
//!
//! 文字数ベースの切り詰めを提供します。

/// エラーメッセージの最大長
pub(crate) const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// 文字数（Unicodeスカラー値）で先頭 `max_chars` 文字に切り詰める。
///
/// 単語境界は考慮しない。
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// エラーメッセージを要約して切り詰める。
#[must_use]
pub(crate) fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated = truncate_chars(msg, MAX_ERROR_MESSAGE_LENGTH);
    format!("{truncated}... (truncated, {char_count} chars)")
}
