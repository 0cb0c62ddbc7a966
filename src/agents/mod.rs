pub mod consensus;
pub mod lock_refresh;
pub mod project_scanner;
pub mod version_control;

pub mod update;

pub use consensus::{Consensus, ConsensusReport, FileReport, FileStatus};
pub use project_scanner::ProjectScannerAgent;
pub use version_control::VersionControlAgent;
