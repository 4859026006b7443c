//! The seven-step isolation pipeline.
//!
//! ```text
//! 1 dirs ─► 2 backup ─► 3 quarantine ─► 4 import cleanup ─► 5 compile check
//!                                                                │
//!                         7 recovery steps ◄─ 6 preserved set ◄──┘
//! ```
//!
//! Steps run strictly in order under an exclusive lock. The backup must
//! succeed before anything is mutated. In best-effort mode per-file failures
//! are logged and skipped; in transactional mode the first failure rolls
//! every mutation back and aborts.

use crate::cleanup::{importers_of, remove_quarantined_imports};
use crate::journal::Journal;
use crate::lock::IsolationLock;
use crate::log::{IsolationLog, LogStatus};
use crate::quarantine::quarantine_file;
use crate::report::{CompileResult, CompileStatus, FailedFile, IsolationReport, Rollback};
use crate::ReaperError;
use anatomist::imports::suffix_variants;
use anatomist::path_util::{canonical_root, join_relative};
use anatomist::FileCache;
use chrono::Utc;
use common::artifacts::ArtifactPaths;
use common::config::IsolationMode;
use common::WardenConfig;
use gauntlet::process::run_command;
use lazarus::instructions::{full_tree, per_file};
use regex::Regex;
use shadow::BackupManager;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::error;
use uuid::Uuid;

/// Report plus where it was written.
#[derive(Debug, Clone)]
pub struct IsolationRun {
    pub report: IsolationReport,
    pub artifacts: ArtifactPaths,
}

pub struct IsolationPipeline {
    root: PathBuf,
    config: WardenConfig,
}

impl IsolationPipeline {
    pub fn new(project_root: &Path, config: WardenConfig) -> Result<Self, ReaperError> {
        Ok(Self {
            root: canonical_root(project_root)?,
            config,
        })
    }

    pub fn with_mode(mut self, mode: IsolationMode) -> Self {
        self.config.isolation.mode = mode;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Quarantines `flagged` (project-relative paths).
    ///
    /// # Errors
    /// - `ReaperError::Locked` if another run holds the tree
    /// - backup failures (nothing has been mutated yet)
    /// - `ReaperError::RolledBack` in transactional mode, after the report
    ///   of the aborted run has been written
    pub async fn run(&self, flagged: &[String]) -> Result<IsolationRun, ReaperError> {
        let started = Instant::now();
        let at = Utc::now();
        let iso = &self.config.isolation;
        let mode = iso.mode;
        let mut log = IsolationLog::new();

        let _lock = IsolationLock::acquire(&iso.work_path(&self.root))?;

        // 1
        let quarantine_dir = iso.quarantine_path(&self.root);
        let logs_dir = iso.logs_path(&self.root);
        for dir in [iso.backup_path(&self.root), quarantine_dir.clone(), logs_dir.clone()] {
            std::fs::create_dir_all(&dir)?;
        }
        log.push(1, "create_directories", LogStatus::Success, "work directories ready");

        let cache = FileCache::collect(&self.root, &self.config.collector, &iso.work_dir)?;
        let (targets, rejected) = self.normalize(flagged);
        let variants = suffix_variants(&self.config.collector.extensions);

        // 2
        let affected = self.affected_files(&cache, &targets, &variants);
        let backup = BackupManager::new(&self.root, &iso.backup_path(&self.root))
            .with_exclusions(&self.config.collector.exclude_dirs)
            .with_work_dir(&iso.work_path(&self.root))
            .create(&iso.source_dirs, &affected, &iso.config_files, at)
            .inspect_err(|e| {
                log.push(2, "backup", LogStatus::Error, format!("backup failed: {e}"))
            })?;
        log.push_affecting(
            2,
            "backup",
            LogStatus::Success,
            format!("backup of {} files at {}", backup.files_copied, self.display(&backup.path)),
            affected,
        );

        // 3
        let mut journal = Journal::new();
        let mut quarantined = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut rolled_back = None;
        for raw in &rejected {
            log.push_affecting(
                3,
                "quarantine",
                LogStatus::Warning,
                format!("{raw} is outside the project, skipped"),
                vec![raw.clone()],
            );
            skipped.push(raw.clone());
        }
        for target in &targets {
            if !self.root.join(target).is_file() {
                log.push_affecting(
                    3,
                    "quarantine",
                    LogStatus::Warning,
                    format!("{target} not found, skipped"),
                    vec![target.clone()],
                );
                skipped.push(target.clone());
                continue;
            }
            match quarantine_file(&self.root, target, &quarantine_dir, at, &mut journal) {
                Ok(q) => {
                    log.push_affecting(
                        3,
                        "quarantine",
                        LogStatus::Success,
                        format!("{target} quarantined to {}", self.display(&q.quarantine_path)),
                        vec![target.clone()],
                    );
                    quarantined.push(q);
                }
                Err(e) => {
                    log.push_affecting(
                        3,
                        "quarantine",
                        LogStatus::Error,
                        format!("{target}: {e}"),
                        vec![target.clone()],
                    );
                    failed.push(FailedFile {
                        file: target.clone(),
                        error: e.to_string(),
                    });
                    if mode == IsolationMode::Transactional {
                        rolled_back = Some(Self::roll_back(3, &journal, target, &e, &mut log));
                        break;
                    }
                }
            }
        }
        if rolled_back.is_some() {
            quarantined.clear();
        }

        // 4
        let gone: BTreeSet<String> = quarantined.iter().map(|q| q.original.clone()).collect();
        let import_removals = if gone.is_empty() {
            Vec::new()
        } else {
            match remove_quarantined_imports(&self.root, &cache, &gone, &variants, &mut journal) {
                Ok(removals) => {
                    let edited: BTreeSet<String> =
                        removals.iter().map(|r| r.file.clone()).collect();
                    log.push_affecting(
                        4,
                        "remove_imports",
                        LogStatus::Success,
                        format!("{} import statements removed", removals.len()),
                        edited.into_iter().collect(),
                    );
                    removals
                }
                Err(e) => {
                    log.push(
                        4,
                        "remove_imports",
                        LogStatus::Error,
                        format!("import cleanup failed: {e}"),
                    );
                    if mode == IsolationMode::Transactional {
                        rolled_back =
                            Some(Self::roll_back(4, &journal, "import cleanup", &e, &mut log));
                        quarantined.clear();
                    }
                    Vec::new()
                }
            }
        };
        let gone: BTreeSet<String> = quarantined.iter().map(|q| q.original.clone()).collect();

        // 5
        let compile = if rolled_back.is_some() {
            CompileResult {
                status: CompileStatus::Warning,
                errors: 0,
                command: iso.compile_check.to_string(),
                message: Some("not run: changes were rolled back".into()),
            }
        } else {
            self.compile_check().await?
        };
        let status = match compile.status {
            CompileStatus::Success => LogStatus::Success,
            CompileStatus::Warning => LogStatus::Warning,
            CompileStatus::Error => LogStatus::Error,
        };
        log.push(
            5,
            "compile_check",
            status,
            match &compile.message {
                Some(m) => format!("compile check {}: {m}", compile.status),
                None => format!("compile check {} ({} errors)", compile.status, compile.errors),
            },
        );

        // 6
        let preserved: Vec<String> = cache
            .paths()
            .filter(|p| !gone.contains(*p))
            .map(str::to_string)
            .collect();
        log.push(6, "preserve", LogStatus::Success, format!("{} files preserved", preserved.len()));

        // 7
        let rebuild = &self.config.verification.build;
        let mut recovery = vec![full_tree(&self.display(&backup.path), &backup, rebuild)];
        recovery.extend(
            quarantined
                .iter()
                .map(|q| per_file(&self.display(&q.quarantine_path), &q.original, rebuild)),
        );
        log.push(
            7,
            "recovery",
            LogStatus::Success,
            format!("{} recovery procedures", recovery.len()),
        );

        let report = IsolationReport {
            run_id: Uuid::new_v4(),
            generated_at: at,
            root: self.root.display().to_string(),
            mode,
            backup,
            quarantined,
            skipped,
            failed,
            import_removals,
            compile,
            preserved,
            recovery,
            log,
            rolled_back,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        let written = report.write_artifacts(&logs_dir);

        match report.rolled_back.clone() {
            None => Ok(IsolationRun {
                artifacts: written?,
                report,
            }),
            Some(rb) => Err(ReaperError::RolledBack {
                file: rb.file,
                reason: rb.reason,
                failures: rb.failures,
                report: written
                    .inspect_err(|e| error!(error = %e, "cannot write report of rolled back run"))
                    .ok()
                    .map(|a| a.json),
            }),
        }
    }

    /// Files whose content the run may change: every existing target plus
    /// every cached file importing one.
    fn affected_files(
        &self,
        cache: &FileCache,
        targets: &[String],
        variants: &[String],
    ) -> Vec<String> {
        let existing: BTreeSet<String> = targets
            .iter()
            .filter(|t| self.root.join(t).is_file())
            .cloned()
            .collect();
        let importers = importers_of(cache, &existing, variants);
        let mut affected: Vec<String> = existing.into_iter().chain(importers).collect();
        affected.sort();
        affected.dedup();
        affected
    }

    /// Project-relative, forward-slash keys without duplicates, plus the
    /// inputs that point outside the project.
    fn normalize(&self, flagged: &[String]) -> (Vec<String>, Vec<String>) {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut rejected = Vec::new();
        for raw in flagged {
            let cleaned = raw.replace('\\', "/");
            let relative = Path::new(&cleaned)
                .strip_prefix(&self.root)
                .ok()
                .and_then(|p| p.to_str())
                .map(str::to_string)
                .unwrap_or(cleaned);
            match join_relative("", &relative) {
                Some(key) if !key.is_empty() => {
                    if seen.insert(key.clone()) {
                        out.push(key);
                    }
                }
                _ => rejected.push(raw.clone()),
            }
        }
        (out, rejected)
    }

    async fn compile_check(&self) -> Result<CompileResult, ReaperError> {
        let spec = &self.config.isolation.compile_check;
        let pattern = Regex::new(&self.config.verification.error_pattern)?;
        let timeout = Duration::from_secs(self.config.verification.timeout_secs);

        Ok(match run_command(spec, &self.root, timeout).await {
            Ok(out) => {
                let errors = out.error_count(&pattern);
                CompileResult {
                    status: CompileStatus::from_errors(errors),
                    errors,
                    command: spec.to_string(),
                    message: None,
                }
            }
            Err(e) => CompileResult {
                status: CompileStatus::Warning,
                errors: 0,
                command: spec.to_string(),
                message: Some(e.to_string()),
            },
        })
    }

    /// Undoes everything in `journal` and logs it under `step`.
    fn roll_back(
        step: u8,
        journal: &Journal,
        file: &str,
        cause: &ReaperError,
        log: &mut IsolationLog,
    ) -> Rollback {
        let failures = journal.rollback();
        let status = if failures == 0 {
            LogStatus::Warning
        } else {
            LogStatus::Error
        };
        log.push(
            step,
            "rollback",
            status,
            format!("rolled back {} files ({failures} rollback failures)", journal.touched()),
        );
        Rollback {
            file: file.to_string(),
            reason: cause.to_string(),
            restored: journal.touched(),
            failures,
        }
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
            .replace('\\', "/")
    }
}
