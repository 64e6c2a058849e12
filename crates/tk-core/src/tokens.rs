//! Crude 4-characters-per-token estimation.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::fmt::Debug;
use std::io;

const CHARS_PER_TOKEN: usize = 4;

/// JSON with `", "` and `": "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn spaced_json(value: &Value) -> Option<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser).ok()?;
    String::from_utf8(buf).ok()
}

/// Estimate tokens for raw text. Empty text is 0, anything else at least 1.
pub fn estimate_text(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / CHARS_PER_TOKEN).max(1)
}

/// Estimate tokens for an arbitrary value.
///
/// Strings are measured directly, `null`/`None` is 0, everything else is
/// measured on its spaced JSON encoding (`{"a": 1, "b": [1, 2]}`). Non-ASCII
/// characters are counted as themselves, not as `\uXXXX` escapes. If
/// serialization fails the `Debug` rendering is measured instead, so this
/// never fails.
pub fn estimate<T: Serialize + Debug + ?Sized>(value: &T) -> usize {
    match serde_json::to_value(value) {
        Ok(Value::Null) => 0,
        Ok(Value::String(s)) => estimate_text(&s),
        Ok(other) => match spaced_json(&other) {
            Some(encoded) => estimate_text(&encoded),
            None => estimate_text(&other.to_string()),
        },
        Err(_) => estimate_text(&format!("{value:?}")),
    }
}
