//! Minification engine: picks passes by content type and reports savings.

use crate::{format, json};
use serde_json::Value;
use tk_core::{estimate_text, ContentType, Minified, Minifier};
use tracing::debug;

const JSON_INSTRUCTION: &str =
    "Payload is compact JSON with null and empty fields removed; parse it and pretty-print for display.";
const CODE_INSTRUCTION: &str =
    "Payload is source code with trailing whitespace and blank-line runs removed; display as-is.";
const TEXT_INSTRUCTION: &str =
    "Payload is whitespace-normalized text; display as-is.";

/// Default minification collaborator.
#[derive(Debug, Clone, Default)]
pub struct MinificationEngine;

impl MinificationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Minify a raw string under the given content type.
    pub fn minify_str(&self, text: &str, content_type: ContentType) -> Minified {
        match content_type {
            ContentType::Json => match serde_json::from_str::<Value>(text) {
                Ok(v) => self.minify(&v, ContentType::Json),
                Err(_) => self.minify(&Value::String(text.to_string()), ContentType::Text),
            },
            other => self.minify(&Value::String(text.to_string()), other),
        }
    }
}

fn savings_pct(original: usize, result: usize) -> f64 {
    if original == 0 || result >= original {
        return 0.0;
    }
    let pct = (original - result) as f64 / original as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

fn as_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Minifier for MinificationEngine {
    fn minify(&self, payload: &Value, content_type: ContentType) -> Minified {
        let (original, data, instruction) = match content_type {
            ContentType::Json => (json::pretty(payload), json::compact(payload), JSON_INSTRUCTION),
            ContentType::Code => {
                let text = as_text(payload);
                let data = format::compress_code(&text);
                (text, data, CODE_INSTRUCTION)
            }
            ContentType::Text => {
                let text = as_text(payload);
                let data = format::compress_text(&text);
                (text, data, TEXT_INSTRUCTION)
            }
        };

        let original_tokens = estimate_text(&original);
        let result_tokens = estimate_text(&data);
        let pct = savings_pct(original_tokens, result_tokens);
        debug!(%content_type, original_tokens, result_tokens, savings_pct = pct, "minified payload");

        Minified {
            data,
            format: content_type.to_string(),
            original_tokens,
            result_tokens,
            savings_pct: pct,
            client_instruction: instruction.to_string(),
        }
    }
}
