use super::pattern;
use crate::error::{Result, VersyncError};
use regex::Regex;
use std::sync::LazyLock;

static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<version>(.*?)</version>").expect("valid version tag regex"));

const LOCATOR: &str = "<version> tag";

/// Reads the first `<version>` element without parsing the document, so
/// namespaces and comments never get in the way.
pub fn read(content: &str, file: &str) -> Result<String> {
    VERSION_TAG
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| not_found(file))
}

pub fn rewrite(content: &str, file: &str, new_version: &str) -> Result<String> {
    pattern::splice_capture(&VERSION_TAG, content, 1, new_version).ok_or_else(|| not_found(file))
}

fn not_found(file: &str) -> VersyncError {
    VersyncError::LocatorNotFound {
        file: file.to_string(),
        locator: LOCATOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE_XML: &str = r#"<?xml version="1.0"?>
<package format="2">
  <name>test_package</name>
  <version>1.0.0</version>
  <description>Test package</description>
</package>"#;

    #[test]
    fn reads_version_tag() {
        assert_eq!(read(PACKAGE_XML, "package.xml").unwrap(), "1.0.0");
    }

    #[test]
    fn rewrite_is_byte_identical_elsewhere() {
        let updated = rewrite(PACKAGE_XML, "package.xml", "2.0.0").unwrap();
        assert_eq!(updated, PACKAGE_XML.replace("<version>1.0.0<", "<version>2.0.0<"));
        assert_eq!(read(&updated, "package.xml").unwrap(), "2.0.0");
    }

    #[test]
    fn only_first_tag_is_rewritten() {
        let content = "<package>\n  <version>1.0.0</version>\n  <depend><version>3.0.0</version></depend>\n</package>";
        let updated = rewrite(content, "package.xml", "1.1.0").unwrap();
        assert!(updated.contains("<version>1.1.0</version>"));
        assert!(updated.contains("<version>3.0.0</version>"));
    }

    #[test]
    fn missing_tag_is_locator_error() {
        let content = "<package>\n  <name>broken</name>\n  <!-- Missing version tag -->\n</package>";
        let err = read(content, "package.xml").unwrap_err();
        assert!(matches!(err, VersyncError::LocatorNotFound { .. }));
        assert!(err.to_string().contains("<version> tag"));
    }
}
