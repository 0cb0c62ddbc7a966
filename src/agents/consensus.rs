use crate::error::{Result, VersyncError};
use crate::formats::VersionFile;
use crate::versioning::describe_loose;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Found,
    Missing,
    Error,
}

/// Result of reading one tracked file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub version: Option<String>,
    pub status: FileStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consensus {
    Agreed(String),
    /// Every distinct value, sorted.
    Conflict(Vec<String>),
    Absent,
}

/// Versions read from every tracked file.
#[derive(Debug, Clone)]
pub struct ConsensusReport {
    pub files: Vec<FileReport>,
    pub versions: BTreeSet<String>,
}

impl ConsensusReport {
    /// Reads every existing file. Read failures are recorded per file, never raised.
    pub fn collect(files: &[VersionFile]) -> Self {
        let mut reports = Vec::with_capacity(files.len());
        let mut versions = BTreeSet::new();

        for file in files {
            let name = file.name();
            if !file.exists() {
                reports.push(FileReport {
                    file: name,
                    version: None,
                    status: FileStatus::Missing,
                    message: "File not found".to_string(),
                });
                continue;
            }

            match file.get() {
                Ok(version) => {
                    let message = describe_loose(&version).unwrap_or_default().to_string();
                    versions.insert(version.clone());
                    reports.push(FileReport {
                        file: name,
                        version: Some(version),
                        status: FileStatus::Found,
                        message,
                    });
                }
                Err(e) => {
                    debug!(file = %name, error = %e, "failed to read version");
                    reports.push(FileReport {
                        file: name,
                        version: None,
                        status: FileStatus::Error,
                        message: e.to_string(),
                    });
                }
            }
        }

        Self {
            files: reports,
            versions,
        }
    }

    pub fn consensus(&self) -> Consensus {
        match self.versions.len() {
            0 => Consensus::Absent,
            1 => self
                .versions
                .iter()
                .next()
                .map(|v| Consensus::Agreed(v.clone()))
                .unwrap_or(Consensus::Absent),
            _ => Consensus::Conflict(self.versions.iter().cloned().collect()),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|report| report.status == FileStatus::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// All files agree and none failed to parse.
    pub fn is_consistent(&self) -> bool {
        !self.has_errors() && self.versions.len() == 1
    }

    /// The agreed version, or the conflict / absence as a hard error.
    pub fn current_version(&self) -> Result<String> {
        match self.consensus() {
            Consensus::Agreed(version) => Ok(version),
            Consensus::Conflict(versions) => Err(VersyncError::Conflict(versions)),
            Consensus::Absent => Err(VersyncError::Absent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_files(root: &Path, xml: &str, toml: &str) -> Vec<VersionFile> {
        fs::write(root.join("package.xml"), format!("<version>{xml}</version>")).unwrap();
        fs::write(
            root.join("pyproject.toml"),
            format!("[project]\nversion = \"{toml}\"\n"),
        )
        .unwrap();
        vec![
            VersionFile::xml(root.join("package.xml")),
            VersionFile::toml(root.join("pyproject.toml"), &["project.version"]),
            VersionFile::cmake(root.join("CMakeLists.txt")),
        ]
    }

    #[test]
    fn agreeing_files_give_single_version() {
        let dir = tempdir().unwrap();
        let files = write_files(dir.path(), "1.2.3", "1.2.3");
        let report = ConsensusReport::collect(&files);

        assert_eq!(report.consensus(), Consensus::Agreed("1.2.3".into()));
        assert_eq!(report.current_version().unwrap(), "1.2.3");
        assert!(report.is_consistent());
        assert_eq!(report.files[2].status, FileStatus::Missing);
    }

    #[test]
    fn conflict_lists_sorted_distinct_versions() {
        let dir = tempdir().unwrap();
        let files = write_files(dir.path(), "2.0.0", "1.9.0");
        let report = ConsensusReport::collect(&files);

        assert_eq!(
            report.consensus(),
            Consensus::Conflict(vec!["1.9.0".into(), "2.0.0".into()])
        );
        match report.current_version().unwrap_err() {
            VersyncError::Conflict(versions) => assert_eq!(versions, vec!["1.9.0", "2.0.0"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_files_is_absent() {
        let dir = tempdir().unwrap();
        let files = vec![VersionFile::xml(dir.path().join("package.xml"))];
        let report = ConsensusReport::collect(&files);

        assert_eq!(report.consensus(), Consensus::Absent);
        assert!(matches!(report.current_version(), Err(VersyncError::Absent)));
        assert!(!report.is_consistent());
    }

    #[test]
    fn parse_errors_are_collected_not_raised() {
        let dir = tempdir().unwrap();
        let mut files = write_files(dir.path(), "1.0.0", "1.0.0");
        fs::write(dir.path().join("CITATION.cff"), "title: no version\n").unwrap();
        files.push(VersionFile::yaml(dir.path().join("CITATION.cff"), "version"));

        let report = ConsensusReport::collect(&files);
        assert_eq!(report.current_version().unwrap(), "1.0.0");
        assert!(report.has_errors());
        assert!(!report.is_consistent());
        let error = report.errors().next().unwrap();
        assert_eq!(error.file, "CITATION.cff");
        assert!(error.message.contains("version"));
    }

    #[test]
    fn loose_versions_are_annotated() {
        let dir = tempdir().unwrap();
        let files = write_files(dir.path(), "1.0.0-rc.1", "1.0.0-rc.1");
        let report = ConsensusReport::collect(&files);
        assert!(report.files[0].message.contains("pre-release"));
    }
}
