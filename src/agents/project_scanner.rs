use crate::agents::lock_refresh::LockRefreshAgent;
use crate::error::{Result, VersyncError};
use crate::formats::VersionFile;
use crate::utils::PathValidator;
use std::path::{Component, Path, PathBuf};

/// ProjectScannerAgent knows which metadata files carry the project version.
pub struct ProjectScannerAgent {
    project_path: PathBuf,
    extra_files: Vec<VersionFile>,
}

impl ProjectScannerAgent {
    /// Validates the root directory and canonicalises it.
    pub fn new<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let project_path = PathValidator::validate_project_path(project_path)?;
        Ok(Self {
            project_path,
            extra_files: Vec::new(),
        })
    }

    /// Tracks additional files given as `PATH=REGEX`, where capture group 1
    /// of the first match is the version. Paths are relative to the root.
    pub fn with_extra_files(mut self, specs: &[String]) -> Result<Self> {
        for spec in specs {
            let (path, pattern) = spec.split_once('=').ok_or_else(|| {
                VersyncError::ProjectValidation(format!(
                    "Invalid extra file '{spec}': expected PATH=REGEX"
                ))
            })?;

            let relative = Path::new(path.trim());
            let escapes_root = relative.as_os_str().is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes_root {
                return Err(VersyncError::ProjectValidation(format!(
                    "Extra file '{path}' must be a relative path inside the root"
                )));
            }

            self.extra_files
                .push(VersionFile::pattern(self.project_path.join(relative), pattern)?);
        }
        Ok(self)
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// The tracked files, in the order they are checked and updated.
    ///
    /// Built-in files come first, then any extra files in the order given.
    pub fn version_files(&self) -> Vec<VersionFile> {
        let root = &self.project_path;
        let mut files = vec![
            VersionFile::xml(root.join("package.xml")),
            VersionFile::toml(
                root.join("pyproject.toml"),
                &["project.version", "tool.poetry.version"],
            ),
            VersionFile::changelog(root.join("CHANGELOG.md")),
            VersionFile::toml(root.join("pixi.toml"), &["workspace.version"]),
            VersionFile::yaml(root.join("CITATION.cff"), "version"),
            VersionFile::cmake(root.join("CMakeLists.txt")),
        ];
        files.extend(self.extra_files.iter().cloned());
        files
    }

    pub fn lock_refresher(&self) -> LockRefreshAgent {
        LockRefreshAgent::pixi(&self.project_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatKind;
    use tempfile::tempdir;

    #[test]
    fn tracks_every_metadata_file() {
        let dir = tempdir().unwrap();
        let scanner = ProjectScannerAgent::new(dir.path()).unwrap();
        let files = scanner.version_files();

        let names: Vec<String> = files.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            [
                "package.xml",
                "pyproject.toml",
                "CHANGELOG.md",
                "pixi.toml",
                "CITATION.cff",
                "CMakeLists.txt"
            ]
        );
        assert_eq!(files[5].kind(), FormatKind::CMakeLists);
        assert!(files.iter().all(|f| f.path().starts_with(scanner.project_path())));
    }

    #[test]
    fn extra_files_use_the_pattern_extractor() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("version.h"),
            "#define DEMO_VERSION \"1.4.0\"\n",
        )
        .unwrap();

        let scanner = ProjectScannerAgent::new(dir.path())
            .unwrap()
            .with_extra_files(&[r#"version.h=DEMO_VERSION "([^"]+)""#.to_string()])
            .unwrap();
        let files = scanner.version_files();

        assert_eq!(files.len(), 7);
        assert_eq!(files[6].kind(), FormatKind::Regex);
        assert_eq!(files[6].get().unwrap(), "1.4.0");
    }

    #[test]
    fn extra_files_must_stay_inside_root() {
        let dir = tempdir().unwrap();
        let scanner = || ProjectScannerAgent::new(dir.path()).unwrap();

        for spec in ["no-separator", "../outside.txt=v(.*)", "/etc/hosts=(.*)", "=(.*)"] {
            assert!(
                scanner().with_extra_files(&[spec.to_string()]).is_err(),
                "{spec} should be rejected"
            );
        }
        assert!(
            scanner()
                .with_extra_files(&["VERSION=no group".to_string()])
                .is_err()
        );
    }

    #[test]
    fn rejects_missing_root() {
        let dir = tempdir().unwrap();
        assert!(ProjectScannerAgent::new(dir.path().join("missing")).is_err());
    }
}
