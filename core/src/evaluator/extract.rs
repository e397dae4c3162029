//! JSON salvage for free-text evaluator responses
//!
//! Two strategies, tried in order:
//! 1. Direct parse of the whole response
//! 2. Fence strip, then a brace-depth scan where the first balanced
//!    `{...}` span that parses wins
//!
//! Only JSON objects count; a bare string or number moves on to the next
//! strategy.

use serde_json::Value;
use tracing::debug;

/// Markdown fence markers removed before the brace scan.
const FENCE_MARKERS: [&str; 3] = ["```json", "```JSON", "```"];

/// Strategy that produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    DirectParse,
    BraceScan,
}

/// No strategy yielded a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no JSON object found in response ({0} bytes analyzed)")]
pub struct ExtractionError(pub usize);

/// Pull the first JSON object out of `content`.
pub fn extract_json_object(content: &str) -> Result<(Value, ExtractionMethod), ExtractionError> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(content.trim()) {
        return Ok((value, ExtractionMethod::DirectParse));
    }

    let stripped = strip_fences(content);
    if let Some(value) = scan_balanced_objects(&stripped) {
        debug!("JSON recovered by brace scan");
        return Ok((value, ExtractionMethod::BraceScan));
    }

    Err(ExtractionError(content.len()))
}

fn strip_fences(content: &str) -> String {
    FENCE_MARKERS
        .iter()
        .fold(content.to_string(), |text, marker| text.replace(marker, ""))
}

/// Depth counter over `{`/`}`. Braces inside string literals are counted
/// too; a span that fails to parse is simply skipped. Depth never drops
/// below zero, so a stray `}` is ignored.
fn scan_balanced_objects(text: &str) -> Option<Value> {
    let mut depth = 0usize;
    let mut start = 0usize;

    for (index, byte) in text.bytes().enumerate() {
        match byte {
            b'{' => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Ok(value @ Value::Object(_)) =
                        serde_json::from_str::<Value>(&text[start..=index])
                {
                    return Some(value);
                }
            }
            _ => {}
        }
    }
    None
}
