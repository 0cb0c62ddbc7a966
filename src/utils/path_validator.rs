use crate::error::{Result, VersyncError};
use std::path::{Path, PathBuf};

/// Path checks for the project root and for files handed to git.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises the project root.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            VersyncError::ProjectValidation(format!("Invalid root '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(VersyncError::ProjectValidation(format!(
                "Root '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            let canonical_forbidden = forbidden_path
                .canonicalize()
                .unwrap_or_else(|_| forbidden_path.to_path_buf());

            if canonical.starts_with(forbidden_path) || canonical.starts_with(&canonical_forbidden)
            {
                return Err(VersyncError::ProjectValidation(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Ensures the file resides inside `base_dir`, returning its path relative to it.
    pub fn relative_to(file_path: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_file = file_path.canonicalize().map_err(|e| {
            VersyncError::ProjectValidation(format!(
                "Invalid file path '{}': {e}",
                file_path.display()
            ))
        })?;
        let canonical_base = base_dir.canonicalize().map_err(|e| {
            VersyncError::ProjectValidation(format!(
                "Invalid base directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        canonical_file
            .strip_prefix(&canonical_base)
            .map(Path::to_path_buf)
            .map_err(|_| {
                VersyncError::ProjectValidation(format!(
                    "'{}' is outside '{}'",
                    file_path.display(),
                    base_dir.display()
                ))
            })
    }
}
