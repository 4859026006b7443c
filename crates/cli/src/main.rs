mod logging;

use anatomist::path_util::canonical_root;
use anatomist::Snapshot;
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::config::IsolationMode;
use common::{Severity, WardenConfig};
use gauntlet::{CheckContext, CheckStatus, Gauntlet};
use lazarus::{find_quarantined, restore_quarantined, restore_tree};
use logging::{init_logging, LoggingConfig};
use oracle::{DetectionEngine, Report};
use reaper::{IsolationPipeline, LogStatus, ReaperError};
use shadow::BackupManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Find, verify and quarantine defects in AI-generated JS/TS code", long_about = None)]
struct Cli {
    /// Config file (default: <path>/warden.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// trace, debug, info, warn or error (default: $WARDEN_LOG_LEVEL or info).
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the five detectors and write a detection report.
    Scan {
        /// Project root to analyse.
        path: PathBuf,
    },
    /// Run the five verification layers and write a verification report.
    Verify {
        /// Project root to verify.
        path: PathBuf,
    },
    /// Back up the project, then quarantine flagged files.
    Quarantine {
        /// Project root.
        path: PathBuf,
        /// Project-relative files to quarantine.
        #[arg(long, num_args = 1.., required_unless_present = "from_report", conflicts_with = "from_report")]
        files: Vec<String>,
        /// Take the files from a saved detection report (JSON).
        #[arg(long)]
        from_report: Option<PathBuf>,
        /// Lowest severity that flags a file when reading a report.
        #[arg(long, value_enum, default_value_t = SeverityArg::High)]
        min_severity: SeverityArg,
        /// Roll everything back if any file fails.
        #[arg(long)]
        transactional: bool,
    },
    /// Put a quarantined file or a backup snapshot back.
    Restore {
        /// Project root.
        path: PathBuf,
        #[command(flatten)]
        source: RestoreSource,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct RestoreSource {
    /// Latest quarantined copy of this project-relative file.
    #[arg(long)]
    file: Option<String>,
    /// A specific quarantine copy.
    #[arg(long)]
    quarantined: Option<PathBuf>,
    /// A backup snapshot directory.
    #[arg(long)]
    backup: Option<PathBuf>,
    /// The most recent backup snapshot.
    #[arg(long)]
    latest: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SeverityArg {
    Critical,
    High,
    Medium,
    Low,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Critical => Severity::Critical,
            SeverityArg::High => Severity::High,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::Low => Severity::Low,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }

    let cli = Cli::parse();
    init_logging(LoggingConfig::resolve(cli.log_level.as_deref(), cli.log_json));

    match &cli.command {
        Commands::Scan { path } => {
            let config = load_config(cli.config.as_deref(), path)?;
            cmd_scan(path, &config)?
        }
        Commands::Verify { path } => {
            let config = load_config(cli.config.as_deref(), path)?;
            cmd_verify(path, &config).await?
        }
        Commands::Quarantine {
            path,
            files,
            from_report,
            min_severity,
            transactional,
        } => {
            let config = load_config(cli.config.as_deref(), path)?;
            let flagged = match from_report {
                Some(report) => Report::load(report)
                    .with_context(|| format!("cannot read detection report {}", report.display()))?
                    .flagged_files((*min_severity).into()),
                None => files.clone(),
            };
            cmd_quarantine(path, config, &flagged, *transactional).await?
        }
        Commands::Restore { path, source } => {
            let config = load_config(cli.config.as_deref(), path)?;
            cmd_restore(path, &config, source)?
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>, project_root: &Path) -> anyhow::Result<WardenConfig> {
    match explicit {
        Some(path) => WardenConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display())),
        None => WardenConfig::discover(project_root)
            .with_context(|| format!("cannot load config under {}", project_root.display())),
    }
}

fn rule() {
    println!("+------------------------------------------+");
}

fn title(text: &str) {
    rule();
    println!("| {:<40} |", text);
    rule();
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn cmd_scan(project_root: &Path, config: &WardenConfig) -> anyhow::Result<()> {
    let snapshot = Snapshot::build(project_root, config)
        .with_context(|| format!("cannot scan {}", project_root.display()))?;
    let engine = DetectionEngine::standard(config)?;
    let report = Report::build(&snapshot, engine.run(&snapshot));
    let logs = config.isolation.logs_path(snapshot.cache.root());
    let artifacts = report
        .write_artifacts(&logs)
        .with_context(|| format!("cannot write report to {}", logs.display()))?;

    title("WARDEN SCAN");
    println!("| Files scanned  : {:>22} |", report.files_scanned);
    println!("| Indicators     : {:>22} |", report.severity_counts.total());
    for severity in Severity::ALL {
        println!(
            "|   {:<12} : {:>22} |",
            severity.as_str(),
            report.severity_counts.get(severity)
        );
    }
    println!("| Status         : {:>22} |", report.status.as_str());
    rule();

    if report.indicators.is_empty() {
        println!("No indicators.");
    } else {
        println!("\nINDICATORS:");
        for i in &report.indicators {
            println!(
                "  [{}] {}:{} {} - {}",
                i.severity, i.file, i.line, i.kind, i.reason
            );
        }
    }

    for outcome in report.detectors.iter().filter(|o| o.failed()) {
        println!(
            "  detector {} failed: {}",
            outcome.name,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    if !report.recommendations.is_empty() {
        println!("\nRECOMMENDATIONS:");
        for (n, rec) in report.recommendations.iter().enumerate() {
            println!("  {}. {}", n + 1, rec);
        }
    }

    println!("\n{}", report.summary);
    println!("Report: {}", artifacts.json.display());
    println!("        {}", artifacts.markdown.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

async fn cmd_verify(project_root: &Path, config: &WardenConfig) -> anyhow::Result<()> {
    let root = canonical_root(project_root)
        .with_context(|| format!("cannot open {}", project_root.display()))?;
    let gauntlet = Gauntlet::standard(config)?;
    let ctx = Arc::new(CheckContext::new(root.clone(), config.clone()));
    let report = gauntlet.run(ctx).await;
    let logs = config.isolation.logs_path(&root);
    let artifacts = report
        .write_artifacts(&logs)
        .with_context(|| format!("cannot write report to {}", logs.display()))?;

    title("WARDEN VERIFY");
    println!("| Checks         : {:>22} |", report.checks().count());
    println!("| Passed         : {:>22} |", report.count(CheckStatus::Passed));
    println!("| Failed         : {:>22} |", report.count(CheckStatus::Failed));
    println!("| Warnings       : {:>22} |", report.count(CheckStatus::Warning));
    println!("| Status         : {:>22} |", report.status.as_str());
    rule();

    for layer in &report.layers {
        println!("\n{} [{}]", layer.kind, layer.status);
        for check in &layer.checks {
            match &check.error {
                Some(error) => println!("  {:<8} {} - {}", check.status.as_str(), check.name, error),
                None => println!("  {:<8} {}", check.status.as_str(), check.name),
            }
        }
    }

    println!("\n{}", report.summary);
    println!("Report: {}", artifacts.json.display());
    println!("        {}", artifacts.markdown.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// quarantine
// ---------------------------------------------------------------------------

async fn cmd_quarantine(
    project_root: &Path,
    config: WardenConfig,
    flagged: &[String],
    transactional: bool,
) -> anyhow::Result<()> {
    if flagged.is_empty() {
        println!("Nothing to quarantine.");
        return Ok(());
    }

    let mut pipeline = IsolationPipeline::new(project_root, config)
        .with_context(|| format!("cannot open {}", project_root.display()))?;
    if transactional {
        pipeline = pipeline.with_mode(IsolationMode::Transactional);
    }
    let run = match pipeline.run(flagged).await {
        Ok(run) => run,
        Err(e) => {
            if let ReaperError::RolledBack {
                report: Some(path), ..
            } = &e
            {
                eprintln!("Report of the rolled back run: {}", path.display());
            }
            return Err(e.into());
        }
    };
    let report = &run.report;

    title("WARDEN QUARANTINE");
    println!("| Quarantined    : {:>22} |", report.quarantined.len());
    println!("| Skipped        : {:>22} |", report.skipped.len());
    println!("| Failed         : {:>22} |", report.failed.len());
    println!("| Imports removed: {:>22} |", report.import_removals.len());
    println!("| Compile check  : {:>22} |", report.compile.status.to_string());
    println!("| Preserved      : {:>22} |", report.preserved.len());
    rule();

    for q in &report.quarantined {
        println!("  {} -> {}", q.original, q.quarantine_path.display());
    }
    for entry in report
        .log
        .entries()
        .iter()
        .filter(|e| matches!(e.status, LogStatus::Warning | LogStatus::Error))
    {
        println!(
            "  step {} {} {}: {}",
            entry.step, entry.action, entry.status, entry.message
        );
    }

    println!("\nBackup: {}", report.backup.path.display());
    println!("\nRECOVERY:");
    for step in &report.recovery {
        println!("{step}");
    }
    println!("Report: {}", run.artifacts.json.display());
    println!("        {}", run.artifacts.markdown.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

fn cmd_restore(
    project_root: &Path,
    config: &WardenConfig,
    source: &RestoreSource,
) -> anyhow::Result<()> {
    let root = canonical_root(project_root)
        .with_context(|| format!("cannot open {}", project_root.display()))?;
    let iso = &config.isolation;

    let quarantined = match (&source.file, &source.quarantined) {
        (Some(original), _) => {
            let store = iso.quarantine_path(&root);
            Some(find_quarantined(&store, original)?.with_context(|| {
                format!("no quarantined copy of {} in {}", original, store.display())
            })?)
        }
        (None, Some(copy)) => Some(copy.clone()),
        (None, None) => None,
    };
    if let Some(copy) = quarantined {
        let restored = restore_quarantined(&copy, &root)
            .with_context(|| format!("cannot restore {}", copy.display()))?;
        println!(
            "Restored {} ({} bytes) from {}",
            restored.original,
            restored.bytes,
            copy.display()
        );
        return Ok(());
    }

    let backup = match &source.backup {
        Some(dir) => dir.clone(),
        None => BackupManager::new(&root, &iso.backup_path(&root))
            .latest()?
            .with_context(|| format!("no backups under {}", iso.backup_path(&root).display()))?,
    };
    let restored = restore_tree(&backup, &root)
        .with_context(|| format!("cannot restore backup {}", backup.display()))?;

    title("WARDEN RESTORE");
    println!("| Files restored : {:>22} |", restored.files);
    println!("| Config files   : {:>22} |", restored.config_files.len());
    rule();
    println!("From {}", backup.display());
    Ok(())
}
