use super::pattern::splice;
use crate::error::{Result, VersyncError};
use serde_yaml::Value;
use std::ops::Range;

pub fn read(content: &str, file: &str, keys: &[String]) -> Result<String> {
    let doc: Value = serde_yaml::from_str(content).map_err(|e| VersyncError::ParseFailure {
        file: file.to_string(),
        message: format!("Failed to parse YAML: {}", e),
    })?;

    let mut current = &doc;
    for key in keys {
        current = current
            .as_mapping()
            .and_then(|mapping| mapping.get(key.as_str()))
            .ok_or_else(|| not_found(file, keys))?;
    }

    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(VersyncError::ParseFailure {
            file: file.to_string(),
            message: format!("'{}' is not a scalar value", keys.join(".")),
        }),
    }
}

/// Rewrites the scalar at `keys` in place.
///
/// Only the characters of the scalar itself change: its quotes (plain,
/// single or double), any trailing comment and every other line stay as
/// they were.
pub fn rewrite(content: &str, file: &str, keys: &[String], new_version: &str) -> Result<String> {
    // Validates the document and the key path before touching text.
    read(content, file, keys)?;

    let span = locate_scalar(content, keys).ok_or_else(|| VersyncError::ParseFailure {
        file: file.to_string(),
        message: format!(
            "'{}' is not a single-line scalar and cannot be rewritten in place",
            keys.join(".")
        ),
    })?;

    let updated = splice(content, span, new_version);
    if read(&updated, file, keys)? != new_version {
        return Err(VersyncError::ParseFailure {
            file: file.to_string(),
            message: format!("rewriting '{}' produced a different value", keys.join(".")),
        });
    }

    Ok(updated)
}

struct Line<'a> {
    start: usize,
    text: &'a str,
}

impl Line<'_> {
    fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start_matches(' ').len()
    }

    fn is_structural(&self) -> bool {
        let trimmed = self.text.trim();
        !(trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("---")
            || trimmed.starts_with("...")
            || trimmed.starts_with('%'))
    }

    /// Byte offset just past `key:` when this line defines `key`.
    fn key_end(&self, key: &str) -> Option<usize> {
        let indent = self.indent();
        let body = &self.text[indent..];
        let unquoted = strip_key(body, key)?;
        let rest = unquoted.trim_start_matches([' ', '\t']);
        let after_colon = rest.strip_prefix(':')?;
        if !(after_colon.is_empty() || after_colon.starts_with([' ', '\t'])) {
            return None;
        }
        Some(self.text.len() - after_colon.len())
    }
}

fn strip_key<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    for quote in ['"', '\''] {
        if let Some(rest) = body.strip_prefix(quote) {
            return rest.strip_prefix(key)?.strip_prefix(quote);
        }
    }
    body.strip_prefix(key)
}

fn split_lines(content: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in content.split_inclusive('\n') {
        let text = raw.trim_end_matches(['\n', '\r']);
        lines.push(Line { start, text });
        start += raw.len();
    }
    lines
}

/// Finds the byte range of the scalar literal at `keys`, inside quotes when quoted.
fn locate_scalar(content: &str, keys: &[String]) -> Option<Range<usize>> {
    let lines = split_lines(content);
    let mut idx = 0;
    let mut parent_indent: Option<usize> = None;
    let mut found: Option<(usize, usize)> = None;

    for key in keys {
        let mut level_indent: Option<usize> = None;
        found = None;

        while idx < lines.len() {
            let line = &lines[idx];
            idx += 1;
            if !line.is_structural() {
                continue;
            }

            let indent = line.indent();
            if parent_indent.is_some_and(|parent| indent <= parent) {
                return None;
            }
            let level = *level_indent.get_or_insert(indent);
            if indent != level {
                continue;
            }
            if let Some(end) = line.key_end(key) {
                found = Some((idx - 1, end));
                parent_indent = Some(indent);
                break;
            }
        }

        found?;
    }

    let (line_idx, value_offset) = found?;
    let line = &lines[line_idx];
    scalar_span(&line.text[value_offset..]).map(|span| {
        let base = line.start + value_offset;
        base + span.start..base + span.end
    })
}

fn scalar_span(rest: &str) -> Option<Range<usize>> {
    let lead = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let value = &rest[lead..];

    match value.chars().next()? {
        '"' => {
            let mut escaped = false;
            for (i, ch) in value.char_indices().skip(1) {
                match ch {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => return Some(lead + 1..lead + i),
                    _ => escaped = false,
                }
            }
            None
        }
        '\'' => {
            let bytes = value.as_bytes();
            let mut i = 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    return Some(lead + 1..lead + i);
                }
                i += 1;
            }
            None
        }
        '#' | '|' | '>' | '[' | '{' | '&' | '*' | '!' => None,
        _ => {
            let end = value.find(" #").or_else(|| value.find("\t#")).unwrap_or(value.len());
            let literal = value[..end].trim_end();
            Some(lead..lead + literal.len())
        }
    }
}

fn not_found(file: &str, keys: &[String]) -> VersyncError {
    VersyncError::LocatorNotFound {
        file: file.to_string(),
        locator: format!("Key '{}'", keys.join(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }

    const CITATION: &str = r#"cff-version: 1.2.0
title: "Test Project"
version: 1.0.0
date-released: "2024-01-01"
"#;

    #[test]
    fn reads_top_level_version() {
        assert_eq!(read(CITATION, "CITATION.cff", &keys("version")).unwrap(), "1.0.0");
    }

    #[test]
    fn rewrite_plain_scalar_only() {
        let updated = rewrite(CITATION, "CITATION.cff", &keys("version"), "2.0.0").unwrap();
        assert_eq!(updated, CITATION.replace("version: 1.0.0", "version: 2.0.0"));
    }

    #[test]
    fn rewrite_keeps_quote_style_and_comment() {
        let content = "cff-version: 1.2.0\nversion: '1.0.0' # release\ntitle: 'Demo'\n";
        let updated = rewrite(content, "CITATION.cff", &keys("version"), "1.0.1").unwrap();
        assert_eq!(updated, "cff-version: 1.2.0\nversion: '1.0.1' # release\ntitle: 'Demo'\n");

        let content = "version: \"1.0.0\"\n";
        let updated = rewrite(content, "CITATION.cff", &keys("version"), "1.0.1").unwrap();
        assert_eq!(updated, "version: \"1.0.1\"\n");
    }

    #[test]
    fn rewrite_nested_key_ignores_other_levels() {
        let content = r#"version: 0.0.1
metadata:
  owner:
    version: 9.9.9
  version: 1.2.3  # nested
other: true
"#;
        assert_eq!(read(content, "f.yaml", &keys("metadata.version")).unwrap(), "1.2.3");
        let updated = rewrite(content, "f.yaml", &keys("metadata.version"), "1.3.0").unwrap();
        assert_eq!(updated, content.replace("1.2.3", "1.3.0"));
    }

    #[test]
    fn missing_key_is_locator_error() {
        let err = read("title: x\n", "CITATION.cff", &keys("version")).unwrap_err();
        assert!(matches!(err, VersyncError::LocatorNotFound { .. }));
    }

    #[test]
    fn cannot_rewrite_block_value() {
        let content = "version:\n  - 1.0.0\n";
        assert!(rewrite(content, "f.yaml", &keys("version"), "2.0.0").is_err());
    }
}
