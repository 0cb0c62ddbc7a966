use super::backup::BackupSet;
use super::cancel::CancelToken;
use crate::agents::consensus::ConsensusReport;
use crate::agents::lock_refresh::LockRefreshAgent;
use crate::error::{Result, VersyncError};
use crate::formats::{UpdateEffect, VersionFile};
use crate::output::Console;
use crate::versioning::{BumpKind, VersionTriple, bump_version};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// How the target version is chosen.
#[derive(Debug, Clone)]
pub enum TargetRequest {
    /// Set exactly this version (strict X.Y.Z).
    Explicit(String),
    /// Bump the current consensus version.
    Bump(BumpKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub previous: Option<String>,
    pub target: String,
}

/// Target version and the files to write it into.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    target: ResolvedTarget,
    files: Vec<VersionFile>,
}

impl UpdatePlan {
    pub fn new(target: ResolvedTarget, files: Vec<VersionFile>) -> Self {
        Self { target, files }
    }

    pub fn target(&self) -> &str {
        &self.target.target
    }

    pub fn previous(&self) -> Option<&str> {
        self.target.previous.as_deref()
    }

    pub fn files(&self) -> &[VersionFile] {
        &self.files
    }
}

/// `Idle → ResolvingTarget → BackingUp → Applying → {Committed, RollingBack → Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    ResolvingTarget,
    BackingUp,
    Applying,
    RollingBack,
    Committed,
    Failed,
}

/// What a finished (or previewed) transaction did.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub previous_version: Option<String>,
    pub new_version: String,
    pub updated_files: Vec<String>,
    #[serde(skip)]
    pub updated_paths: Vec<PathBuf>,
    #[serde(skip)]
    pub skipped_files: Vec<String>,
    pub dry_run: bool,
    #[serde(skip)]
    pub state: TransactionState,
}

impl UpdateOutcome {
    fn new(plan: &UpdatePlan, dry_run: bool) -> Self {
        Self {
            previous_version: plan.previous().map(str::to_string),
            new_version: plan.target().to_string(),
            updated_files: Vec::new(),
            updated_paths: Vec::new(),
            skipped_files: Vec::new(),
            dry_run,
            state: TransactionState::Idle,
        }
    }
}

/// Drives one version update across every tracked file.
///
/// Either every existing file ends up at the target version, or all of them
/// are restored from the backup taken before the first write.
pub struct UpdateOrchestrator<'a> {
    console: &'a Console,
    cancel: &'a CancelToken,
    lock_refresh: Option<LockRefreshAgent>,
    state: TransactionState,
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(console: &'a Console, cancel: &'a CancelToken) -> Self {
        Self {
            console,
            cancel,
            lock_refresh: None,
            state: TransactionState::Idle,
        }
    }

    /// Regenerates the lock file as the last step of the transaction.
    pub fn with_lock_refresh(mut self, agent: LockRefreshAgent) -> Self {
        self.lock_refresh = Some(agent);
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Validates an explicit version or computes the bumped consensus version.
    pub fn resolve_target(
        &mut self,
        files: &[VersionFile],
        request: &TargetRequest,
    ) -> Result<ResolvedTarget> {
        self.transition(TransactionState::ResolvingTarget);

        let resolved = match request {
            TargetRequest::Explicit(version) => VersionTriple::parse(version).map(|triple| {
                ResolvedTarget {
                    previous: None,
                    target: triple.to_string(),
                }
            }),
            TargetRequest::Bump(kind) => self.bump_consensus(files, *kind),
        };

        if resolved.is_err() {
            self.transition(TransactionState::Failed);
        }
        resolved
    }

    fn bump_consensus(&self, files: &[VersionFile], kind: BumpKind) -> Result<ResolvedTarget> {
        let report = ConsensusReport::collect(files);
        for failure in report.errors() {
            self.console.warn(format!(
                "Warning: ignoring {}: {}",
                failure.file, failure.message
            ));
        }

        let current = report.current_version()?;
        let target = bump_version(&current, kind)?;
        Ok(ResolvedTarget {
            previous: Some(current),
            target,
        })
    }

    /// Writes the target version into every existing file of the plan.
    ///
    /// In dry-run mode nothing is written and no backup is taken; each file's
    /// current and would-be value is reported instead.
    pub fn apply(&mut self, plan: &UpdatePlan, dry_run: bool) -> Result<UpdateOutcome> {
        let mut outcome = UpdateOutcome::new(plan, dry_run);

        if dry_run {
            self.preview(plan, &mut outcome);
            self.transition(TransactionState::Committed);
            outcome.state = self.state;
            return Ok(outcome);
        }

        self.transition(TransactionState::BackingUp);
        let lock = self.lock_refresh.clone().filter(|agent| agent.applies());

        let mut targets: Vec<PathBuf> = plan
            .files()
            .iter()
            .filter(|file| file.exists())
            .map(|file| file.path().to_path_buf())
            .collect();
        if let Some(agent) = &lock {
            targets.push(agent.lock_file());
        }

        let backup = match BackupSet::snapshot(&targets) {
            Ok(backup) => backup,
            Err(e) => {
                self.transition(TransactionState::Failed);
                return Err(e);
            }
        };
        debug!(files = backup.len(), arena = %backup.arena_path().display(), "backup taken");

        self.transition(TransactionState::Applying);
        // Interrupts stay deferred until the rollback below has finished.
        let cancel = self.cancel;
        let armed = cancel.arm();
        let applied = self
            .apply_files(plan, &mut outcome)
            .and_then(|()| match &lock {
                Some(agent) => self.refresh_lock(agent, &mut outcome),
                None => Ok(()),
            })
            .and_then(|()| self.check_cancelled());

        let finished = match applied {
            Ok(()) => {
                if let Err(e) = backup.discard() {
                    warn!(error = %e, "could not remove backup directory");
                }
                self.transition(TransactionState::Committed);
                outcome.state = self.state;
                Ok(outcome)
            }
            Err(err) => {
                self.transition(TransactionState::RollingBack);
                let err = if self.cancel.is_cancelled() {
                    VersyncError::Cancelled
                } else {
                    err
                };
                let result = self.roll_back(backup, err);
                self.transition(TransactionState::Failed);
                Err(result)
            }
        };
        drop(armed);
        finished
    }

    fn apply_files(&self, plan: &UpdatePlan, outcome: &mut UpdateOutcome) -> Result<()> {
        for file in plan.files() {
            self.check_cancelled()?;

            let name = file.name();
            if !file.exists() {
                self.console
                    .line(format!("{} {} (not found)", "Skipping".yellow(), name));
                outcome.skipped_files.push(name);
                continue;
            }

            match file.update(plan.target()) {
                Ok(UpdateEffect::Rewritten { note }) => {
                    self.console.line(format!("{} {}", "Updated".green(), name));
                    if let Some(note) = note {
                        self.console.line(note.blue());
                    }
                    outcome.updated_files.push(name);
                    outcome.updated_paths.push(file.path().to_path_buf());
                }
                Ok(UpdateEffect::Skipped { reason }) => {
                    self.console.warn(format!("Warning: {reason}"));
                    outcome.skipped_files.push(name);
                }
                Err(e) => {
                    self.console
                        .error(format!("Failed to update {}: {}", name, e));
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn refresh_lock(&self, agent: &LockRefreshAgent, outcome: &mut UpdateOutcome) -> Result<()> {
        self.check_cancelled()?;
        agent.run(self.console)?;

        let lock_file = agent.lock_file();
        if lock_file.is_file() {
            self.console.line(format!(
                "{} {}",
                "Updated".green(),
                lock_file.display()
            ));
            outcome.updated_files.push(
                lock_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            outcome.updated_paths.push(lock_file);
        }
        Ok(())
    }

    fn preview(&self, plan: &UpdatePlan, outcome: &mut UpdateOutcome) {
        for file in plan.files() {
            let name = file.name();
            if !file.exists() {
                self.console
                    .line(format!("{} {} (not found)", "Skipping".yellow(), name));
                outcome.skipped_files.push(name);
                continue;
            }

            match file.get() {
                Ok(current) => {
                    self.console.line(format!(
                        "{} {}: {} → {}",
                        "Would update".cyan(),
                        name,
                        current,
                        plan.target()
                    ));
                    outcome.updated_files.push(name);
                }
                Err(e) => self
                    .console
                    .error(format!("Failed to update {}: {}", name, e)),
            }
        }

        if let Some(agent) = self.lock_refresh.as_ref().filter(|agent| agent.applies()) {
            self.console
                .line(format!("{} {}", "Would run".cyan(), agent.command_line()));
        }
    }

    /// Restores every snapshot. The returned error is what the caller reports.
    fn roll_back(&self, backup: BackupSet, cause: VersyncError) -> VersyncError {
        if backup.is_empty() {
            return cause;
        }
        self.console
            .warn(format!("Rolling back changes ({} file(s))...", backup.len()));

        match backup.restore() {
            Ok(restored) => {
                self.console
                    .warn(format!("Restored {} file(s) from backup.", restored));
                cause
            }
            Err(restore_err) => {
                self.console.error(format!("Rollback incomplete: {restore_err}"));
                VersyncError::Backup(format!("{cause}; {restore_err}"))
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(VersyncError::Cancelled);
        }
        Ok(())
    }

    fn transition(&mut self, next: TransactionState) {
        debug!(from = ?self.state, to = ?next, "transaction state");
        self.state = next;
    }
}
