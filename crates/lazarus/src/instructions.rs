//! Literal, copy-pasteable recovery steps.

use crate::header::HEADER_LINES;
use common::config::CommandSpec;
use serde::{Deserialize, Serialize};
use shadow::BackupSnapshot;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryInstruction {
    pub title: String,
    /// Shell commands, run in order from the project root.
    pub commands: Vec<String>,
}

impl fmt::Display for RecoveryInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for cmd in &self.commands {
            writeln!(f, "  $ {cmd}")?;
        }
        Ok(())
    }
}

/// Restore everything from a backup snapshot, then rebuild.
///
/// `backup` is the snapshot directory relative to the project root.
pub fn full_tree(backup: &str, snapshot: &BackupSnapshot, rebuild: &CommandSpec) -> RecoveryInstruction {
    let mut commands = Vec::new();
    for dir in &snapshot.source_dirs {
        commands.push(format!(
            "rm -rf {} && cp -R {} {}",
            shell_quote(dir),
            shell_quote(&format!("{backup}/{dir}")),
            shell_quote(dir)
        ));
    }
    for file in &snapshot.files {
        commands.push(format!(
            "cp {} {}",
            shell_quote(&format!("{backup}/{file}")),
            shell_quote(file)
        ));
    }
    for name in &snapshot.config_files {
        commands.push(format!(
            "cp {} {}",
            shell_quote(&format!("{backup}/{}", BackupSnapshot::config_backup_name(name))),
            shell_quote(name)
        ));
    }
    commands.push(rebuild.to_string());

    RecoveryInstruction {
        title: format!("Full restore from backup `{backup}`"),
        commands,
    }
}

/// Restore one file from its quarantine copy (header stripped), then rebuild.
pub fn per_file(quarantined: &str, original: &str, rebuild: &CommandSpec) -> RecoveryInstruction {
    RecoveryInstruction {
        title: format!("Restore `{original}`"),
        commands: vec![
            format!(
                "tail -n +{} {} > {}",
                HEADER_LINES + 1,
                shell_quote(quarantined),
                shell_quote(original)
            ),
            rebuild.to_string(),
        ],
    }
}

/// Single-quotes `s` unless it is made of shell-safe characters only.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%=,".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
