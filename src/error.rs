use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersyncError {
    #[error("File not found: {0}")]
    FileMissing(String),

    #[error("{locator} not found in {file}")]
    LocatorNotFound { file: String, locator: String },

    #[error("Failed to parse {file}: {message}")]
    ParseFailure { file: String, message: String },

    #[error("Failed to write {file}: {message}")]
    WriteFailure { file: String, message: String },

    #[error("No released version found in {0}")]
    NoReleasedVersion(String),

    #[error("Invalid semver format: '{0}' (strict X.Y.Z required)")]
    InvalidFormat(String),

    #[error("Cannot apply a {kind} bump to {version}: component overflows")]
    VersionOverflow { version: String, kind: String },

    #[error("Multiple versions found: {}", .0.join(", "))]
    Conflict(Vec<String>),

    #[error("No version found in any files")]
    Absent,

    #[error("Could not read a version from: {}", .0.join(", "))]
    UnreadableFiles(Vec<String>),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VersyncError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            VersyncError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, VersyncError>;
