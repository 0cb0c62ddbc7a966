use crate::error::{Result, VersyncError};
use regex::Regex;

/// Compiles a user pattern in multi-line mode, requiring a capture group for the version.
pub fn compile(file: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(&format!("(?m){pattern}")).map_err(|e| VersyncError::ParseFailure {
        file: file.to_string(),
        message: format!("invalid pattern '{pattern}': {e}"),
    })?;

    if regex.captures_len() < 2 {
        return Err(VersyncError::ParseFailure {
            file: file.to_string(),
            message: format!("pattern '{pattern}' has no capture group for the version"),
        });
    }

    Ok(regex)
}

pub fn read(regex: &Regex, content: &str, file: &str) -> Result<String> {
    regex
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| not_found(regex, file))
}

pub fn rewrite(regex: &Regex, content: &str, file: &str, new_version: &str) -> Result<String> {
    splice_capture(regex, content, 1, new_version).ok_or_else(|| not_found(regex, file))
}

/// Replaces only the span of capture `group` inside the first match.
///
/// Everything before and after that span, including the rest of the match, is
/// copied through unchanged. Returns `None` when the pattern or the group does
/// not match.
pub(crate) fn splice_capture(
    regex: &Regex,
    content: &str,
    group: usize,
    replacement: &str,
) -> Option<String> {
    let span = regex.captures(content)?.get(group)?.range();
    Some(splice(content, span, replacement))
}

pub(crate) fn splice(content: &str, span: std::ops::Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..span.start]);
    out.push_str(replacement);
    out.push_str(&content[span.end..]);
    out
}

fn not_found(regex: &Regex, file: &str) -> VersyncError {
    VersyncError::LocatorNotFound {
        file: file.to_string(),
        locator: format!("pattern '{}'", regex.as_str().trim_start_matches("(?m)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_capture_of_first_match() {
        let regex = compile("version.txt", r#"^VERSION = "([^"]+)""#).unwrap();
        let content = "NAME = \"x\"\nVERSION = \"1.4.0\"\nVERSION = \"9.9.9\"\n";
        assert_eq!(read(&regex, content, "version.txt").unwrap(), "1.4.0");
    }

    #[test]
    fn rewrite_keeps_prefix_and_suffix_inside_match() {
        let regex = compile("setup.py", r#"version=['"]v?(\d+\.\d+\.\d+)-final['"]"#).unwrap();
        let content = "setup(\n    version='v1.0.0-final',\n)\n";
        let updated = rewrite(&regex, content, "setup.py", "1.1.0").unwrap();
        assert_eq!(updated, "setup(\n    version='v1.1.0-final',\n)\n");
    }

    #[test]
    fn rewrite_touches_only_first_match() {
        let regex = compile("f", r"^v=(\S+)$").unwrap();
        let updated = rewrite(&regex, "v=1.0.0\nv=1.0.0\n", "f", "2.0.0").unwrap();
        assert_eq!(updated, "v=2.0.0\nv=1.0.0\n");
    }

    #[test]
    fn missing_match_reports_locator() {
        let regex = compile("f", r"^version: (\S+)").unwrap();
        let err = read(&regex, "name: demo\n", "f").unwrap_err();
        assert!(matches!(err, VersyncError::LocatorNotFound { .. }));
        assert!(rewrite(&regex, "name: demo\n", "f", "1.0.0").is_err());
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        assert!(compile("f", r"version").is_err());
    }
}
