use std::fmt::Write;

use futures::future::BoxFuture;
use serde::Deserialize;

use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::traits::NativeTool;
use spotlight_core::types::{ToolContext, ToolOutcome};

// ── CurrentTimeTool ─────────────────────────────────────────────

pub struct CurrentTimeTool;

#[derive(Deserialize)]
struct CurrentTimeInput {
    #[serde(default)]
    format: Option<String>,
}

impl NativeTool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }
    fn timeout_secs(&self) -> u64 {
        5
    }
    fn description(&self) -> &str {
        "Get the current UTC date and time, optionally rendered with a strftime format."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": { "type": "string", "description": "strftime format, e.g. %Y-%m-%d %H:%M" }
            },
            "required": []
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move {
            let p: CurrentTimeInput = serde_json::from_value(input)
                .map_err(|e| SpotlightError::ToolValidation(e.to_string()))?;
            let now = chrono::Utc::now();

            let mut result = serde_json::json!({
                "utc": now.to_rfc3339(),
                "unix": now.timestamp(),
            });

            if let Some(fmt) = p.format {
                // Invalid specifiers surface as a fmt error instead of a panic
                let mut formatted = String::new();
                write!(formatted, "{}", now.format(&fmt)).map_err(|_| {
                    SpotlightError::ToolValidation(format!("invalid time format: {}", fmt))
                })?;
                result["formatted"] = serde_json::Value::String(formatted);
            }

            Ok(ToolOutcome::success(result.to_string()))
        })
    }
}
