//! Factor import-style lines shared across read results into one segment.
//!
//! Substitution is literal: every occurrence of a shared line anywhere in a
//! result's content is replaced, including occurrences that are not at the
//! start of a line (inside string literals, for example). Callers relying on
//! exact content must resolve the placeholder against the shared segment.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const SHARED_IMPORTS_KEY: &str = "_shared_imports";
pub const SHARED_IMPORTS_MARKER: &str = "# \u{2192} _shared_imports";

/// Line prefixes recognized as import directives. Kept to Python-style
/// imports: broader prefixes such as `use ` also match ordinary prose.
const IMPORT_PREFIXES: &[&str] = &["import ", "from "];

pub fn is_import_line(line: &str) -> bool {
    IMPORT_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn text_content(result: &Value) -> Option<&str> {
    result.get("content").and_then(Value::as_str)
}

/// Import lines occurring more than once across all contents, in order of
/// first appearance.
pub fn shared_import_lines(results: &[Value]) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for content in results.iter().filter_map(text_content) {
        for line in content.split('\n').filter(|l| is_import_line(l)) {
            let count = counts.entry(line).or_insert(0);
            if *count == 0 {
                order.push(line);
            }
            *count += 1;
        }
    }
    order
        .into_iter()
        .filter(|line| counts[line] > 1)
        .map(str::to_string)
        .collect()
}

/// Replace shared import lines with a marker referencing the shared segment.
///
/// Returns the shared-segment map; it is empty when nothing was shared and
/// the results are then left untouched.
pub fn deduplicate(results: &mut [Value]) -> BTreeMap<String, String> {
    let mut segments = BTreeMap::new();
    let shared = shared_import_lines(results);
    if shared.is_empty() {
        return segments;
    }

    for result in results.iter_mut() {
        let Some(content) = text_content(result) else {
            continue;
        };
        if !shared.iter().any(|line| content.contains(line.as_str())) {
            continue;
        }
        let replaced = shared
            .iter()
            .fold(content.to_string(), |acc, line| acc.replace(line.as_str(), SHARED_IMPORTS_MARKER));
        result["content"] = Value::String(replaced);
    }

    segments.insert(SHARED_IMPORTS_KEY.to_string(), shared.join("\n"));
    segments
}
