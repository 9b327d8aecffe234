/// 秘密値をログ出力用に伏せ字化する。先頭4文字だけ残す。
pub(crate) fn redact(input: &str) -> String {
    match input.char_indices().nth(4) {
        Some((boundary, _)) => format!("{}***", &input[..boundary]),
        None => "****".to_string(),
    }
}
