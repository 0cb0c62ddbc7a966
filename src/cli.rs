use crate::agents::version_control::{
    DEFAULT_COMMIT_MESSAGE, DEFAULT_TAG_MESSAGE, DEFAULT_TAG_NAME,
};
use crate::versioning::BumpKind;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "versync",
    about = "Keep the project version in sync across package.xml, pyproject.toml, pixi.toml, CITATION.cff, CMakeLists.txt and CHANGELOG.md",
    version,
    author,
    group(
        ArgGroup::new("operation")
            .required(true)
            .args(["check_version", "list_files", "update_version", "bump"])
    )
)]
pub struct Cli {
    /// Check that every tracked file carries the same version
    #[arg(long)]
    pub check_version: bool,

    /// List the tracked version files
    #[arg(long)]
    pub list_files: bool,

    /// Set the version in every file (strict X.Y.Z)
    #[arg(long, value_name = "X.Y.Z")]
    pub update_version: Option<String>,

    /// Bump the current consensus version
    #[arg(long, value_enum, value_name = "KIND")]
    pub bump: Option<BumpKind>,

    /// Project root directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Show what would change without modifying files
    #[arg(long)]
    pub dry_run: bool,

    /// Answer yes to every confirmation
    #[arg(long)]
    pub confirm: bool,

    /// Print only the resulting version string
    #[arg(long)]
    pub short: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Commit the updated files to git
    #[arg(long)]
    pub git_commit: bool,

    /// Create an annotated git tag for the new version
    #[arg(long)]
    pub git_tag: bool,

    /// Commit message template ({version} is replaced)
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_COMMIT_MESSAGE)]
    pub commit_message: String,

    /// Tag name template ({version} is replaced)
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_TAG_NAME)]
    pub tag_name: String,

    /// Tag message template ({version} is replaced)
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_TAG_MESSAGE)]
    pub tag_message: String,

    /// Regenerate pixi.lock after updating pixi.toml
    #[arg(long)]
    pub update_lock: bool,

    /// Also track PATH, whose version is capture group 1 of REGEX (repeatable)
    #[arg(long = "extra-file", value_name = "PATH=REGEX")]
    pub extra_files: Vec<String>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// The selected operation; exactly one is guaranteed by the argument group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Check,
    List,
    Update(String),
    Bump(BumpKind),
}

impl Cli {
    pub fn operation(&self) -> Operation {
        if let Some(version) = &self.update_version {
            Operation::Update(version.clone())
        } else if let Some(kind) = self.bump {
            Operation::Bump(kind)
        } else if self.list_files {
            Operation::List
        } else {
            Operation::Check
        }
    }

    pub fn is_json(&self) -> bool {
        self.output_format == OutputFormat::Json
    }

    /// JSON and `--short` keep stdout for the result only.
    pub fn is_machine(&self) -> bool {
        self.short || self.is_json()
    }
}
