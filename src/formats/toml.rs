use crate::error::{Result, VersyncError};
use toml_edit::{DocumentMut, Item, Value};

/// Reads the value at the first key path that resolves.
///
/// `key_paths` lists alternative conventions in priority order, e.g.
/// `project.version` before `tool.poetry.version`.
pub fn read(content: &str, file: &str, key_paths: &[Vec<String>]) -> Result<String> {
    let doc = parse(content, file)?;
    let item = key_paths
        .iter()
        .find_map(|path| lookup(doc.as_item(), path))
        .ok_or_else(|| not_found(file, key_paths))?;

    scalar_to_string(item).ok_or_else(|| VersyncError::ParseFailure {
        file: file.to_string(),
        message: format!("'{}' is not a scalar value", describe(key_paths)),
    })
}

/// Replaces the value literal at the first resolving key path.
///
/// Comments, key order and whitespace of every other entry are kept, as is
/// the decoration (surrounding spaces and trailing comment) of the value itself.
/// A literal (single-quoted) string stays literal.
pub fn rewrite(
    content: &str,
    file: &str,
    key_paths: &[Vec<String>],
    new_version: &str,
) -> Result<String> {
    let mut doc = parse(content, file)?;
    let path = key_paths
        .iter()
        .find(|path| lookup(doc.as_item(), path).is_some())
        .ok_or_else(|| not_found(file, key_paths))?;

    let item = lookup_mut(doc.as_item_mut(), path).ok_or_else(|| not_found(file, key_paths))?;
    let decor = item.as_value().map(|v| v.decor().clone());

    *item = if is_literal_string(item) {
        Item::Value(literal_string(new_version))
    } else {
        toml_edit::value(new_version)
    };
    if let (Some(decor), Some(value)) = (decor, item.as_value_mut()) {
        *value.decor_mut() = decor;
    }

    Ok(doc.to_string())
}

fn parse(content: &str, file: &str) -> Result<DocumentMut> {
    content
        .parse::<DocumentMut>()
        .map_err(|e| VersyncError::ParseFailure {
            file: file.to_string(),
            message: format!("Failed to parse TOML: {}", e),
        })
}

fn lookup<'a>(root: &'a Item, path: &[String]) -> Option<&'a Item> {
    path.iter().try_fold(root, |item, key| item.get(key.as_str()))
}

fn lookup_mut<'a>(root: &'a mut Item, path: &[String]) -> Option<&'a mut Item> {
    path.iter()
        .try_fold(root, |item, key| item.get_mut(key.as_str()))
}

fn is_literal_string(item: &Item) -> bool {
    match item.as_value() {
        Some(Value::String(s)) => s.display_repr().starts_with('\''),
        _ => false,
    }
}

fn literal_string(text: &str) -> Value {
    if text.contains(['\'', '\n', '\r']) {
        return Value::from(text);
    }
    format!("'{text}'")
        .parse::<Value>()
        .unwrap_or_else(|_| Value::from(text))
}

fn scalar_to_string(item: &Item) -> Option<String> {
    let value = item.as_value()?;
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    if value.is_array() || value.is_inline_table() {
        return None;
    }

    let mut bare = value.clone();
    bare.decor_mut().clear();
    Some(bare.to_string())
}

fn describe(key_paths: &[Vec<String>]) -> String {
    key_paths
        .iter()
        .map(|path| path.join("."))
        .collect::<Vec<_>>()
        .join("' or '")
}

fn not_found(file: &str, key_paths: &[Vec<String>]) -> VersyncError {
    VersyncError::LocatorNotFound {
        file: file.to_string(),
        locator: format!("Key '{}'", describe(key_paths)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|p| p.split('.').map(str::to_string).collect())
            .collect()
    }

    const PYPROJECT: &str = r#"[project]
name = "test-project"
version = "1.0.0"
description = "Test project"
"#;

    #[test]
    fn reads_project_version() {
        let keys = paths(&["project.version", "tool.poetry.version"]);
        assert_eq!(read(PYPROJECT, "pyproject.toml", &keys).unwrap(), "1.0.0");
    }

    #[test]
    fn falls_back_to_poetry_convention() {
        let content = "[tool.poetry]\nname = \"test-project\"\nversion = \"2.5.10\"\n";
        let keys = paths(&["project.version", "tool.poetry.version"]);
        assert_eq!(read(content, "pyproject.toml", &keys).unwrap(), "2.5.10");

        let updated = rewrite(content, "pyproject.toml", &keys, "2.6.0").unwrap();
        assert_eq!(updated, content.replace("2.5.10", "2.6.0"));
    }

    #[test]
    fn missing_key_names_dotted_path() {
        let keys = paths(&["workspace.version"]);
        let err = read(PYPROJECT, "pixi.toml", &keys).unwrap_err();
        match err {
            VersyncError::LocatorNotFound { file, locator } => {
                assert_eq!(file, "pixi.toml");
                assert!(locator.contains("workspace.version"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rewrite_preserves_comments_and_layout() {
        let content = r#"# Project metadata
[project]
name    = "demo"   # aligned
version = "1.0.0"  # bumped by release tooling
authors = [
    "someone",
]

[tool.other]
version = "0.1.0"
"#;
        let keys = paths(&["project.version"]);
        let updated = rewrite(content, "pyproject.toml", &keys, "1.1.0").unwrap();
        assert_eq!(
            updated,
            content.replace(r#"version = "1.0.0""#, r#"version = "1.1.0""#)
        );
        assert_eq!(read(&updated, "pyproject.toml", &keys).unwrap(), "1.1.0");
    }

    #[test]
    fn rewrite_keeps_literal_string_quotes() {
        let content = "[project]\nname = 'demo'\nversion = '1.0.0'  # literal\n";
        let keys = paths(&["project.version"]);
        let updated = rewrite(content, "pyproject.toml", &keys, "2.0.0").unwrap();
        assert_eq!(updated, content.replace("'1.0.0'", "'2.0.0'"));
        assert_eq!(read(&updated, "pyproject.toml", &keys).unwrap(), "2.0.0");
    }

    #[test]
    fn malformed_document_is_parse_failure() {
        let content = "[project\nname = \"broken\"\n";
        let err = read(content, "pyproject.toml", &paths(&["project.version"])).unwrap_err();
        assert!(matches!(err, VersyncError::ParseFailure { .. }));
    }

    #[test]
    fn non_string_scalar_is_stringified() {
        let content = "[workspace]\nversion = 3\n";
        let keys = paths(&["workspace.version"]);
        assert_eq!(read(content, "pixi.toml", &keys).unwrap(), "3");
    }
}
