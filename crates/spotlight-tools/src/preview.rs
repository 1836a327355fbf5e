/// Cut `text` to at most `max_chars` characters, appending a marker with the
/// number of characters dropped. Returns the preview and whether it was cut.
pub fn bounded_preview(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }
    let head: String = text.chars().take(max_chars).collect();
    (
        format!("{}…[truncated {} chars]", head, total - max_chars),
        true,
    )
}

/// Render a response body for the model: JSON is re-serialized compactly,
/// anything else is wrapped as `{"text": ...}`.
pub fn render_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => serde_json::json!({ "text": body }).to_string(),
    }
}
