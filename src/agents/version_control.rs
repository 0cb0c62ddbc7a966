use crate::error::{Result, VersyncError};
use crate::utils::PathValidator;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Placeholder substituted by the commit and tag templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

pub const DEFAULT_COMMIT_MESSAGE: &str = "chore: bump version to {version}";
pub const DEFAULT_TAG_NAME: &str = "v{version}";
pub const DEFAULT_TAG_MESSAGE: &str = "Release version {version}";

pub fn render_template(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}

/// VersionControlAgent commits and tags release changes through the git CLI.
pub struct VersionControlAgent {
    repo_root: PathBuf,
}

impl VersionControlAgent {
    /// Finds the repository containing `start`, searching parent directories.
    ///
    /// Returns `Ok(None)` when `start` is not inside a git work tree.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Option<Self>> {
        let start = start.as_ref();
        let output = run_git(start, &["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            debug!(path = %start.display(), "not a git repository");
            return Ok(None);
        }

        let top_level = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let repo_root = PathValidator::validate_project_path(&top_level)
            .map_err(|err| VersyncError::GitOperation(format!("Invalid repository root: {err}")))?;
        Ok(Some(Self { repo_root }))
    }

    /// True when the work tree has uncommitted changes.
    pub fn is_dirty(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain"])?;
        ensure_success(&output, "git status")?;
        Ok(!output.stdout.is_empty())
    }

    /// Stages `files` and commits them.
    ///
    /// When the repository uses pre-commit hooks and the first commit fails,
    /// the files are re-staged (hooks may have reformatted them) and the
    /// commit is retried once.
    pub fn commit_files(&self, files: &[PathBuf], message: &str) -> Result<()> {
        let relative = files
            .iter()
            .map(|file| {
                PathValidator::relative_to(file, &self.repo_root)
                    .map(|p| p.to_string_lossy().into_owned())
                    .map_err(|err| {
                        VersyncError::GitOperation(format!("Refusing to stage unsafe path: {err}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.stage(&relative)?;
        let output = self.run_git(&["commit", "-m", message])?;
        if output.status.success() {
            return Ok(());
        }

        if !self.repo_root.join(".pre-commit-config.yaml").exists() {
            return ensure_success(&output, "git commit");
        }

        debug!("commit failed with pre-commit hooks configured, retrying once");
        self.stage(&relative)?;
        let retry = self.run_git(&["commit", "-m", message])?;
        ensure_success(&retry, "git commit (after hook updates)")
    }

    pub fn tag_exists(&self, tag_name: &str) -> Result<bool> {
        let output = self.run_git(&["tag", "--list", tag_name])?;
        ensure_success(&output, "git tag --list")?;
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    /// Creates an annotated tag.
    pub fn create_tag(&self, tag_name: &str, message: &str) -> Result<()> {
        validate_tag_name(tag_name)?;
        let output = self.run_git(&["tag", "-a", tag_name, "-m", message])?;
        ensure_success(&output, "git tag")
    }

    fn stage(&self, files: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        let output = self.run_git(&args)?;
        ensure_success(&output, "git add")
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        run_git(&self.repo_root, args)
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!(dir = %dir.display(), "git {}", args.join(" "));
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .map_err(|e| {
            VersyncError::GitOperation(format!(
                "Failed to execute git command '{}': {e}",
                args.join(" ")
            ))
        })
}

fn ensure_success(output: &Output, command: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    Err(VersyncError::GitOperation(format!(
        "{} failed: {}",
        command,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Rejects names git would refuse or misread as options.
fn validate_tag_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('-')
        || name.starts_with('.')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("@{")
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));

    if invalid {
        return Err(VersyncError::GitOperation(format!(
            "Invalid tag name '{name}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_version_placeholder() {
        assert_eq!(
            render_template(DEFAULT_COMMIT_MESSAGE, "1.2.3"),
            "chore: bump version to 1.2.3"
        );
        assert_eq!(render_template(DEFAULT_TAG_NAME, "1.2.3"), "v1.2.3");
        assert_eq!(
            render_template("release {version} ({version})", "2.0.0"),
            "release 2.0.0 (2.0.0)"
        );
    }

    #[test]
    fn accepts_conventional_tag_names() {
        assert!(validate_tag_name("v1.2.3").is_ok());
        assert!(validate_tag_name("release/1.2.3").is_ok());
    }

    #[test]
    fn rejects_unsafe_tag_names() {
        for name in ["", "-v1.0.0", "v1 .0", "v1..0", "v1.0.0.lock", "v1:0", "v1^0"] {
            assert!(validate_tag_name(name).is_err(), "{name:?} should be rejected");
        }
    }
}
