//! Keep a Changelog headers (`## [1.2.3] - 2024-01-15`).
//!
//! Link-reference definitions at the end of the document
//! (`[1.2.3]: https://.../compare/...`) are not rewritten.

use crate::error::{Result, VersyncError};
use regex::Regex;
use std::sync::LazyLock;

static RELEASE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## \[(.*?)\]").expect("valid changelog header regex"));

static UNRELEASED_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## \[Unreleased\]").expect("valid unreleased regex"));

/// Returns the first header label that is not `Unreleased` (case-insensitive).
pub fn read(content: &str, file: &str) -> Result<String> {
    RELEASE_HEADER
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|label| !label.eq_ignore_ascii_case("unreleased"))
        .map(str::to_string)
        .ok_or_else(|| VersyncError::NoReleasedVersion(file.to_string()))
}

/// Inserts `## [<version>] - <date>` right after the `## [Unreleased]` header.
///
/// Returns `None` when the document has no Unreleased header; the caller
/// decides how to report that.
pub fn insert_release(content: &str, new_version: &str, date: &str) -> Option<String> {
    let header = UNRELEASED_HEADER.find(content)?;
    let section = format!("\n\n## [{new_version}] - {date}");

    let mut out = String::with_capacity(content.len() + section.len());
    out.push_str(&content[..header.end()]);
    out.push_str(&section);
    out.push_str(&content[header.end()..]);
    Some(out)
}
