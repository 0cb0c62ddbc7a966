pub mod changelog;
pub mod cmake;
pub mod pattern;
pub mod toml;
pub mod xml;
pub mod yaml;

use crate::error::{Result, VersyncError};
use jiff::Zoned;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the version lives inside a file, per format.
#[derive(Debug, Clone)]
pub enum Locator {
    /// First `<version>` element of an XML manifest.
    XmlTag,
    /// Key path through nested TOML tables; alternatives are tried in order.
    TomlKeys(Vec<Vec<String>>),
    /// Key path through nested YAML mappings.
    YamlKeys(Vec<String>),
    /// Regular expression whose first capture group is the version.
    Pattern(Regex),
    /// Keep a Changelog release headers.
    Changelog,
    /// `project(... VERSION ...)` / `set(PROJECT_VERSION ...)` in CMake.
    CMake,
}

impl Locator {
    pub fn kind(&self) -> FormatKind {
        match self {
            Locator::XmlTag => FormatKind::Xml,
            Locator::TomlKeys(_) => FormatKind::Toml,
            Locator::YamlKeys(_) => FormatKind::Yaml,
            Locator::Pattern(_) => FormatKind::Regex,
            Locator::Changelog => FormatKind::Changelog,
            Locator::CMake => FormatKind::CMakeLists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Xml,
    Toml,
    Yaml,
    Regex,
    Changelog,
    CMakeLists,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormatKind::Xml => "Xml",
            FormatKind::Toml => "Toml",
            FormatKind::Yaml => "Yaml",
            FormatKind::Regex => "Regex",
            FormatKind::Changelog => "Changelog",
            FormatKind::CMakeLists => "CMakeLists",
        };
        f.write_str(label)
    }
}

/// What an update did to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEffect {
    /// The version literal was replaced; `note` carries anything the user should know.
    Rewritten { note: Option<String> },
    /// The file was intentionally left alone.
    Skipped { reason: String },
}

/// One tracked file and the locator of its version.
#[derive(Debug, Clone)]
pub struct VersionFile {
    path: PathBuf,
    locator: Locator,
}

impl VersionFile {
    pub fn new<P: AsRef<Path>>(path: P, locator: Locator) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            locator,
        }
    }

    pub fn xml<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Locator::XmlTag)
    }

    /// TOML file whose version may live under any of `key_paths` (dotted).
    pub fn toml<P: AsRef<Path>>(path: P, key_paths: &[&str]) -> Self {
        let paths = key_paths
            .iter()
            .map(|p| p.split('.').map(str::to_string).collect())
            .collect();
        Self::new(path, Locator::TomlKeys(paths))
    }

    pub fn yaml<P: AsRef<Path>>(path: P, key_path: &str) -> Self {
        let keys = key_path.split('.').map(str::to_string).collect();
        Self::new(path, Locator::YamlKeys(keys))
    }

    pub fn pattern<P: AsRef<Path>>(path: P, pattern: &str) -> Result<Self> {
        let path = path.as_ref();
        let regex = pattern::compile(&display_name(path), pattern)?;
        Ok(Self::new(path, Locator::Pattern(regex)))
    }

    pub fn changelog<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Locator::Changelog)
    }

    pub fn cmake<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Locator::CMake)
    }

    pub fn name(&self) -> String {
        display_name(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FormatKind {
        self.locator.kind()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the current version from the file.
    pub fn get(&self) -> Result<String> {
        let name = self.name();
        let content = self.read_content()?;

        let version = match &self.locator {
            Locator::XmlTag => xml::read(&content, &name),
            Locator::TomlKeys(paths) => toml::read(&content, &name, paths),
            Locator::YamlKeys(keys) => yaml::read(&content, &name, keys),
            Locator::Pattern(regex) => pattern::read(regex, &content, &name),
            Locator::Changelog => changelog::read(&content, &name),
            Locator::CMake => cmake::read(&content, &name),
        }?;

        debug!(file = %name, %version, "read version");
        Ok(version)
    }

    /// Writes `new_version` into the file, touching only the version literal.
    pub fn update(&self, new_version: &str) -> Result<UpdateEffect> {
        let name = self.name();
        let content = self.read_content()?;

        let (updated, note) = match &self.locator {
            Locator::XmlTag => (xml::rewrite(&content, &name, new_version)?, None),
            Locator::TomlKeys(paths) => (toml::rewrite(&content, &name, paths, new_version)?, None),
            Locator::YamlKeys(keys) => (yaml::rewrite(&content, &name, keys, new_version)?, None),
            Locator::Pattern(regex) => (
                pattern::rewrite(regex, &content, &name, new_version)?,
                None,
            ),
            Locator::CMake => (cmake::rewrite(&content, &name, new_version)?, None),
            Locator::Changelog => {
                let today = Zoned::now().strftime("%Y-%m-%d").to_string();
                match changelog::insert_release(&content, new_version, &today) {
                    Some(updated) => (
                        updated,
                        Some(format!(
                            "Updated {name} header. Note: Link definitions at the bottom were not updated automatically."
                        )),
                    ),
                    None => {
                        return Ok(UpdateEffect::Skipped {
                            reason: format!(
                                "Could not find '## [Unreleased]' in {name}. Skipping update."
                            ),
                        });
                    }
                }
            }
        };

        fs::write(&self.path, updated).map_err(|e| VersyncError::WriteFailure {
            file: name.clone(),
            message: e.to_string(),
        })?;

        debug!(file = %name, version = new_version, "wrote version");
        Ok(UpdateEffect::Rewritten { note })
    }

    fn read_content(&self) -> Result<String> {
        if !self.exists() {
            return Err(VersyncError::FileMissing(self.path.display().to_string()));
        }

        fs::read_to_string(&self.path).map_err(|e| VersyncError::ParseFailure {
            file: self.name(),
            message: format!("Failed to read file: {}", e),
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = tempdir().unwrap();
        let file = VersionFile::xml(dir.path().join("package.xml"));
        assert!(!file.exists());
        assert!(matches!(file.get(), Err(VersyncError::FileMissing(_))));
        assert!(matches!(file.update("1.0.0"), Err(VersyncError::FileMissing(_))));
    }

    #[test]
    fn every_variant_round_trips() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("package.xml"), "<package><version>1.0.0</version></package>\n").unwrap();
        fs::write(root.join("pyproject.toml"), "[project]\nversion = \"1.0.0\"\n").unwrap();
        fs::write(root.join("CITATION.cff"), "version: 1.0.0\n").unwrap();
        fs::write(root.join("VERSION.txt"), "release = v1.0.0\n").unwrap();
        fs::write(root.join("CHANGELOG.md"), "## [Unreleased]\n\n## [1.0.0] - 2024-01-15\n").unwrap();
        fs::write(root.join("CMakeLists.txt"), "project(Demo VERSION 1.0.0)\n").unwrap();

        let files = vec![
            VersionFile::xml(root.join("package.xml")),
            VersionFile::toml(root.join("pyproject.toml"), &["project.version"]),
            VersionFile::yaml(root.join("CITATION.cff"), "version"),
            VersionFile::pattern(root.join("VERSION.txt"), r"^release = v(\S+)$").unwrap(),
            VersionFile::changelog(root.join("CHANGELOG.md")),
            VersionFile::cmake(root.join("CMakeLists.txt")),
        ];

        for file in &files {
            assert_eq!(file.get().unwrap(), "1.0.0", "{}", file.name());
            let effect = file.update("1.4.2").unwrap();
            assert!(matches!(effect, UpdateEffect::Rewritten { .. }));
            assert_eq!(file.get().unwrap(), "1.4.2", "{}", file.name());
        }
    }

    #[test]
    fn changelog_without_unreleased_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        let content = "# Changelog\n\n## [1.0.0] - 2024-01-01\n\nInitial release\n";
        fs::write(&path, content).unwrap();

        let effect = VersionFile::changelog(&path).update("1.1.0").unwrap();
        assert!(matches!(effect, UpdateEffect::Skipped { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn changelog_update_uses_todays_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        fs::write(&path, "## [Unreleased]\n\n## [1.0.0] - 2024-01-15\n").unwrap();

        VersionFile::changelog(&path).update("1.1.0").unwrap();
        let today = Zoned::now().strftime("%Y-%m-%d").to_string();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("## [1.1.0] - {today}")));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(VersionFile::cmake("CMakeLists.txt").kind().to_string(), "CMakeLists");
        assert_eq!(VersionFile::yaml("CITATION.cff", "version").kind(), FormatKind::Yaml);
    }
}
