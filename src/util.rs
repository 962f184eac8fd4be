//! Shared helpers for parsing external CLI output.

use serde_json::Value;

/// Parse the value printed by an external tool's stdout.
///
/// Tries the whole (trimmed) output as JSON first, then falls back to
/// extracting the outermost `{...}` object from noisy output (warnings,
/// progress lines). Anything else is surfaced as a plain string value.
pub fn parse_cli_value(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    if let Some(object) = extract_json_object(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&object) {
            return value;
        }
    }
    Value::String(trimmed.to_string())
}

/// Extract a JSON object from text that may contain other content, using
/// brace-counting to find the outermost object.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;

    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// The last non-empty line of a tool's stdout, where single-value results
/// (contract ids, wasm hashes) are printed.
pub fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())
}
