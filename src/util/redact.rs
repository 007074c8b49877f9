/// ログ出力用に秘匿値の先頭4文字だけを残す。
pub(crate) fn redact(input: &str) -> String {
    if input.chars().count() <= 4 {
        "****".to_string()
    } else {
        let head: String = input.chars().take(4).collect();
        format!("{head}***")
    }
}
