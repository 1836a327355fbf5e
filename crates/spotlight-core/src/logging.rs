/// Default cap for values interpolated into log records.
pub const LOG_VALUE_MAX_CHARS: usize = 200;

/// Truncate a value before it goes into a log record.
pub fn sanitize(msg: &str, max_chars: usize) -> String {
    let total = msg.chars().count();
    if total <= max_chars {
        return msg.to_string();
    }
    let head: String = msg.chars().take(max_chars).collect();
    format!("{}... (truncated, total length: {})", head, total)
}
