use crate::agents::update::{
    CancelToken, TargetRequest, UpdateInteraction, UpdateOrchestrator, UpdateOutcome, UpdatePlan,
};
use crate::agents::version_control::render_template;
use crate::agents::{
    Consensus, ConsensusReport, FileReport, FileStatus, ProjectScannerAgent, VersionControlAgent,
};
use crate::cli::{Cli, Operation};
use crate::error::{Result, VersyncError};
use crate::output::Console;
use crate::versioning::validate_progression;
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, warn};

/// Consensus value reported when files disagree.
const MISMATCH: &str = "MISMATCH";

#[derive(Serialize)]
struct ListedFile {
    name: String,
    path: String,
    exists: bool,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    consensus_version: Option<&'a str>,
    consistent: bool,
    files: &'a [FileReport],
}

/// Dispatches the selected operation.
pub fn run(cli: &Cli, console: &Console, cancel: &CancelToken) -> Result<()> {
    let scanner = ProjectScannerAgent::new(&cli.root)?.with_extra_files(&cli.extra_files)?;

    match cli.operation() {
        Operation::List => execute_list(&scanner, cli, console),
        Operation::Check => execute_check(&scanner, cli, console),
        Operation::Update(version) => execute_update(
            &scanner,
            cli,
            console,
            cancel,
            TargetRequest::Explicit(version),
        ),
        Operation::Bump(kind) => {
            execute_update(&scanner, cli, console, cancel, TargetRequest::Bump(kind))
        }
    }
}

/// Execute the list workflow
pub fn execute_list(scanner: &ProjectScannerAgent, cli: &Cli, console: &Console) -> Result<()> {
    let files: Vec<ListedFile> = scanner
        .version_files()
        .iter()
        .map(|file| ListedFile {
            name: file.name(),
            path: file.path().display().to_string(),
            exists: file.exists(),
            kind: file.kind().to_string(),
        })
        .collect();

    if cli.is_json() {
        console.emit(serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    let name_width = column_width(files.iter().map(|f| f.name.as_str()), "File");
    let path_width = column_width(files.iter().map(|f| f.path.as_str()), "Path");

    console.line("Version Files".cyan().bold());
    console.line(
        format!(
            "  {:<name_width$}  {:<path_width$}  {:^6}  {}",
            "File", "Path", "Exists", "Type"
        )
        .bold(),
    );
    for file in &files {
        let exists = if file.exists {
            format!("{:^6}", "✓").green()
        } else {
            format!("{:^6}", "✗").red()
        };
        console.line(format!(
            "  {}  {}  {}  {}",
            format!("{:<name_width$}", file.name).cyan(),
            format!("{:<path_width$}", file.path).dimmed(),
            exists,
            file.kind.magenta()
        ));
    }

    Ok(())
}

/// Execute the check workflow
///
/// Fails when files disagree, when an existing file cannot be read, or when
/// no file carries a version at all.
pub fn execute_check(scanner: &ProjectScannerAgent, cli: &Cli, console: &Console) -> Result<()> {
    if !cli.short {
        console.line(
            format!("Checking versions in {}...", scanner.project_path().display())
                .blue()
                .bold(),
        );
    }

    let files = scanner.version_files();
    let report = ConsensusReport::collect(&files);
    let consensus = report.consensus();

    if cli.is_json() {
        let summary = CheckSummary {
            consensus_version: match &consensus {
                Consensus::Agreed(version) => Some(version.as_str()),
                Consensus::Conflict(_) => Some(MISMATCH),
                Consensus::Absent => None,
            },
            consistent: report.is_consistent(),
            files: &report.files,
        };
        console.emit(serde_json::to_string_pretty(&summary)?);
    } else if cli.short {
        if let Consensus::Agreed(version) = &consensus {
            console.emit(version);
        }
    } else {
        print_check_table(console, &report, &consensus);
    }

    if let Consensus::Conflict(versions) = consensus {
        return Err(VersyncError::Conflict(versions));
    }
    if report.has_errors() {
        return Err(VersyncError::UnreadableFiles(
            report.errors().map(|r| r.file.clone()).collect(),
        ));
    }
    let Consensus::Agreed(version) = consensus else {
        return Err(VersyncError::Absent);
    };

    if !cli.is_machine() {
        console.line(format!(
            "\n{} All files match version {}.",
            "SUCCESS:".green().bold(),
            version.bold()
        ));
    }
    Ok(())
}

fn print_check_table(console: &Console, report: &ConsensusReport, consensus: &Consensus) {
    let file_width = column_width(report.files.iter().map(|r| r.file.as_str()), "File");
    let version_width = column_width(
        report.files.iter().map(|r| r.version.as_deref().unwrap_or("-")),
        "Version",
    );

    console.blank();
    console.line("Version Check Summary".cyan().bold());
    console.line(
        format!(
            "  {:<file_width$}  {:<version_width$}  {:<7}  {}",
            "File", "Version", "Status", "Details"
        )
        .bold(),
    );

    for row in &report.files {
        let version = format!("{:<version_width$}", row.version.as_deref().unwrap_or("-"));
        let version = match (consensus, &row.version) {
            (Consensus::Agreed(agreed), Some(v)) if agreed == v => version.green(),
            (Consensus::Conflict(_), Some(_)) => version.yellow(),
            _ => version.normal(),
        };
        let status = match row.status {
            FileStatus::Found => format!("{:<7}", "Found").green(),
            FileStatus::Missing => format!("{:<7}", "Missing").yellow(),
            FileStatus::Error => format!("{:<7}", "Error").red(),
        };

        console.line(format!(
            "  {}  {}  {}  {}",
            format!("{:<file_width$}", row.file).cyan(),
            version,
            status,
            row.message
        ));
    }
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(header.len())
}

/// Execute the update workflow for an explicit version or a bump
pub fn execute_update(
    scanner: &ProjectScannerAgent,
    cli: &Cli,
    console: &Console,
    cancel: &CancelToken,
    request: TargetRequest,
) -> Result<()> {
    let files = scanner.version_files();
    let interaction = UpdateInteraction::new(cli.confirm);
    let mut orchestrator = UpdateOrchestrator::new(console, cancel);
    if cli.update_lock {
        orchestrator = orchestrator.with_lock_refresh(scanner.lock_refresher());
    }

    if let TargetRequest::Explicit(version) = &request {
        console.line(
            format!(
                "Updating versions to {} in {}...",
                version,
                scanner.project_path().display()
            )
            .blue()
            .bold(),
        );
    }

    let resolved = orchestrator.resolve_target(&files, &request)?;

    if let (TargetRequest::Bump(kind), Some(previous)) = (&request, resolved.previous.as_deref()) {
        let target = resolved.target.as_str();
        console.line(format!("Current version: {previous}").blue().bold());
        show_version_diff(console, previous, target);
        print_progression_warnings(console, &validate_progression(previous, target, *kind));

        if cli.dry_run {
            console.line(format!(
                "\n{} Would upgrade from {} to {}",
                "DRY RUN:".yellow().bold(),
                previous,
                target
            ));
        } else {
            console.blank();
            let question = format!("Do you want to upgrade from {previous} to {target}?");
            if !interaction.confirm(console, &question)? {
                console.warn("Upgrade cancelled.");
                return Ok(());
            }
        }

        console.line(
            format!("\nUpgrading version from {previous} to {target}...")
                .blue()
                .bold(),
        );
    }

    let plan = UpdatePlan::new(resolved, files);
    let outcome = orchestrator.apply(&plan, cli.dry_run)?;
    debug!(
        state = ?outcome.state,
        updated = outcome.updated_files.len(),
        skipped = outcome.skipped_files.len(),
        "update finished"
    );

    if cli.is_json() {
        console.emit(serde_json::to_string_pretty(&outcome)?);
    } else if cli.short {
        console.emit(&outcome.new_version);
    }

    if outcome.dry_run {
        console.line(format!(
            "\n{} No files were modified.",
            "DRY RUN COMPLETE:".yellow().bold()
        ));
        return Ok(());
    }

    if !cli.is_machine() {
        console.line(format!(
            "\n{} Version updated to {}.",
            "SUCCESS:".green().bold(),
            outcome.new_version
        ));
    }

    run_git_steps(scanner, cli, console, &interaction, &outcome);
    Ok(())
}

fn show_version_diff(console: &Console, old: &str, new: &str) {
    let components: Vec<String> = old
        .split('.')
        .zip(new.split('.'))
        .map(|(o, n)| {
            if o == n {
                o.dimmed().to_string()
            } else {
                format!("{} → {}", o.red(), n.green())
            }
        })
        .collect();

    console.blank();
    console.line("Version Change".yellow().bold());
    console.line(format!("  {}", components.join(".")));
    console.line(format!("  {} → {}", old.cyan(), new.green()));
    console.blank();
}

fn print_progression_warnings(console: &Console, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }

    console.line("⚠ Version Progression Warnings:".yellow().bold());
    for warning in warnings {
        console.warn(format!("  • {warning}"));
    }
    console.blank();
}

/// Commit and tag after a successful update. Failures here are reported
/// and never undo the update.
fn run_git_steps(
    scanner: &ProjectScannerAgent,
    cli: &Cli,
    console: &Console,
    interaction: &UpdateInteraction,
    outcome: &UpdateOutcome,
) {
    let offered = !cli.confirm;
    let want_commit = cli.git_commit || offered;
    let want_tag = cli.git_tag || offered;
    if !want_commit && !want_tag {
        return;
    }

    let repo = match VersionControlAgent::discover(scanner.project_path()) {
        Ok(Some(repo)) => repo,
        Ok(None) => {
            console.warn("Not a git repository, skipping git commit and tag.");
            return;
        }
        Err(e) => {
            warn!(error = %e, "git unavailable");
            console.error(format!("Skipping git steps: {e}"));
            return;
        }
    };

    let committed = want_commit && commit_release(&repo, cli, console, interaction, outcome);
    if want_tag && (cli.git_tag || committed) {
        tag_release(&repo, cli, console, interaction, &outcome.new_version);
    }
}

fn commit_release(
    repo: &VersionControlAgent,
    cli: &Cli,
    console: &Console,
    interaction: &UpdateInteraction,
    outcome: &UpdateOutcome,
) -> bool {
    match repo.is_dirty() {
        Ok(true) if !outcome.updated_paths.is_empty() => {}
        Ok(_) => {
            console.warn("No changes to commit.");
            return false;
        }
        Err(e) => {
            console.error(format!("Failed to inspect repository: {e}"));
            return false;
        }
    }

    let message = render_template(&cli.commit_message, &outcome.new_version);
    match interaction.confirm(console, &format!("Commit changes with message: '{message}'?")) {
        Ok(true) => {}
        Ok(false) => {
            console.warn("Git commit skipped.");
            return false;
        }
        Err(e) => {
            console.error(format!("Failed to read answer: {e}"));
            return false;
        }
    }

    console.line(format!("$ git commit -m '{message}'").dimmed());
    match repo.commit_files(&outcome.updated_paths, &message) {
        Ok(()) => {
            console.line(format!("✓ Committed changes: {message}").green());
            true
        }
        Err(e) => {
            warn!(error = %e, "commit failed");
            console.error(format!("Failed to commit: {e}"));
            false
        }
    }
}

fn tag_release(
    repo: &VersionControlAgent,
    cli: &Cli,
    console: &Console,
    interaction: &UpdateInteraction,
    version: &str,
) {
    let tag_name = render_template(&cli.tag_name, version);
    let tag_message = render_template(&cli.tag_message, version);

    match repo.tag_exists(&tag_name) {
        Ok(false) => {}
        Ok(true) => {
            console.warn(format!("Tag {tag_name} already exists."));
            return;
        }
        Err(e) => {
            console.error(format!("Failed to list tags: {e}"));
            return;
        }
    }

    match interaction.confirm(console, &format!("Create git tag '{tag_name}'?")) {
        Ok(true) => {}
        Ok(false) => {
            console.warn("Git tag skipped.");
            return;
        }
        Err(e) => {
            console.error(format!("Failed to read answer: {e}"));
            return;
        }
    }

    console.line(format!("$ git tag -a {tag_name} -m '{tag_message}'").dimmed());
    match repo.create_tag(&tag_name, &tag_message) {
        Ok(()) => {
            console.line(format!("✓ Created tag: {tag_name}").green());
            console.line(format!("  To push: git push origin {tag_name}").dimmed());
        }
        Err(e) => {
            warn!(error = %e, "tag failed");
            console.error(format!("Failed to create tag: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::capture;
    use clap::Parser;
    use serde_json::Value;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn cli(root: &Path, args: &[&str]) -> Cli {
        let root = root.to_string_lossy().into_owned();
        let mut argv = vec!["versync", "--root", root.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn seed(root: &Path, version: &str) {
        fs::write(
            root.join("package.xml"),
            format!("<package>\n  <name>demo</name>\n  <version>{version}</version>\n</package>\n"),
        )
        .unwrap();
        fs::write(
            root.join("pyproject.toml"),
            format!("[project]\nname = \"demo\"\nversion = \"{version}\"\n"),
        )
        .unwrap();
        fs::write(
            root.join("CMakeLists.txt"),
            format!("cmake_minimum_required(VERSION 3.16)\nproject(demo VERSION {version} LANGUAGES CXX)\n"),
        )
        .unwrap();
    }

    fn run_captured(cli: &Cli) -> (Result<()>, String, String) {
        let (console, status, output) = capture(cli.is_machine());
        let cancel = CancelToken::new();
        let result = run(cli, &console, &cancel);
        (result, status.contents(), output.contents())
    }

    #[test]
    fn list_reports_every_tracked_file_as_json() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.0.0");

        let (result, _, output) =
            run_captured(&cli(dir.path(), &["--list-files", "--output-format", "json"]));
        result.unwrap();

        let listed: Value = serde_json::from_str(&output).unwrap();
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 6);
        assert_eq!(listed[0]["name"], "package.xml");
        assert_eq!(listed[0]["type"], "Xml");
        assert_eq!(listed[0]["exists"], true);
        assert_eq!(listed[2]["name"], "CHANGELOG.md");
        assert_eq!(listed[2]["exists"], false);
        assert_eq!(listed[5]["type"], "CMakeLists");
    }

    #[test]
    fn check_prints_consensus_in_short_mode() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");

        let (result, status, output) =
            run_captured(&cli(dir.path(), &["--check-version", "--short"]));
        result.unwrap();
        assert_eq!(output, "1.2.3\n");
        assert!(!status.contains("SUCCESS"));
    }

    #[test]
    fn check_text_reports_success() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");

        let (result, status, _) = run_captured(&cli(dir.path(), &["--check-version"]));
        result.unwrap();
        assert!(status.contains("Version Check Summary"));
        assert!(status.contains("All files match version"));
    }

    #[test]
    fn check_reports_mismatch() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");
        fs::write(dir.path().join("CITATION.cff"), "version: 1.3.0\n").unwrap();

        let (result, _, output) = run_captured(&cli(
            dir.path(),
            &["--check-version", "--output-format", "json"],
        ));
        assert!(matches!(result, Err(VersyncError::Conflict(ref v)) if v == &["1.2.3", "1.3.0"]));

        let summary: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(summary["consensus_version"], "MISMATCH");
        assert_eq!(summary["consistent"], false);
        assert_eq!(summary["files"][4]["file"], "CITATION.cff");
        assert_eq!(summary["files"][4]["status"], "found");
        assert_eq!(summary["files"][2]["status"], "missing");
    }

    #[test]
    fn check_fails_on_unreadable_file() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");
        fs::write(dir.path().join("pixi.toml"), "[workspace]\nname = \"demo\"\n").unwrap();

        let (result, _, output) = run_captured(&cli(
            dir.path(),
            &["--check-version", "--output-format", "json"],
        ));
        assert!(
            matches!(result, Err(VersyncError::UnreadableFiles(ref f)) if f == &["pixi.toml"])
        );

        let summary: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(summary["consensus_version"], "1.2.3");
        assert_eq!(summary["consistent"], false);
        assert_eq!(summary["files"][3]["status"], "error");
    }

    #[test]
    fn check_fails_without_any_version() {
        let dir = tempdir().unwrap();

        let (result, _, output) = run_captured(&cli(
            dir.path(),
            &["--check-version", "--output-format", "json"],
        ));
        assert!(matches!(result, Err(VersyncError::Absent)));

        let summary: Value = serde_json::from_str(&output).unwrap();
        assert!(summary["consensus_version"].is_null());
    }

    #[test]
    fn bump_updates_every_file() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");

        let (result, _, output) = run_captured(&cli(
            dir.path(),
            &["--bump", "patch", "--confirm", "--output-format", "json"],
        ));
        result.unwrap();

        let outcome: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(outcome["previous_version"], "1.2.3");
        assert_eq!(outcome["new_version"], "1.2.4");
        assert_eq!(outcome["dry_run"], false);
        assert_eq!(
            outcome["updated_files"],
            serde_json::json!(["package.xml", "pyproject.toml", "CMakeLists.txt"])
        );

        let cmake = fs::read_to_string(dir.path().join("CMakeLists.txt")).unwrap();
        assert!(cmake.contains("project(demo VERSION 1.2.4 LANGUAGES CXX)"));
        assert!(
            fs::read_to_string(dir.path().join("package.xml"))
                .unwrap()
                .contains("<version>1.2.4</version>")
        );
    }

    #[test]
    fn explicit_update_prints_new_version_in_short_mode() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");

        let (result, _, output) = run_captured(&cli(
            dir.path(),
            &["--update-version", "2.0.0", "--confirm", "--short"],
        ));
        result.unwrap();
        assert_eq!(output, "2.0.0\n");
        assert!(
            fs::read_to_string(dir.path().join("pyproject.toml"))
                .unwrap()
                .contains("version = \"2.0.0\"")
        );
    }

    #[test]
    fn explicit_update_rejects_loose_version() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");
        let before = fs::read_to_string(dir.path().join("pyproject.toml")).unwrap();

        let (result, _, _) = run_captured(&cli(
            dir.path(),
            &["--update-version", "2.0.0-rc.1", "--confirm"],
        ));
        assert!(matches!(result, Err(VersyncError::InvalidFormat(_))));
        assert_eq!(
            fs::read_to_string(dir.path().join("pyproject.toml")).unwrap(),
            before
        );
    }

    #[test]
    fn dry_run_bump_leaves_files_untouched() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "0.9.0");
        let before = fs::read_to_string(dir.path().join("CMakeLists.txt")).unwrap();

        let (result, status, output) = run_captured(&cli(
            dir.path(),
            &["--bump", "major", "--dry-run", "--output-format", "json"],
        ));
        result.unwrap();

        let outcome: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(outcome["new_version"], "1.0.0");
        assert_eq!(outcome["dry_run"], true);
        assert!(status.contains("DRY RUN COMPLETE"));
        assert_eq!(
            fs::read_to_string(dir.path().join("CMakeLists.txt")).unwrap(),
            before
        );
    }

    #[test]
    fn bump_refuses_conflicting_files() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "1.2.3");
        fs::write(dir.path().join("CITATION.cff"), "version: 1.2.2\n").unwrap();

        let (result, _, _) = run_captured(&cli(dir.path(), &["--bump", "minor", "--confirm"]));
        assert!(matches!(result, Err(VersyncError::Conflict(_))));
        assert!(
            fs::read_to_string(dir.path().join("package.xml"))
                .unwrap()
                .contains("<version>1.2.3</version>")
        );
    }
}
