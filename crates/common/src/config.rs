//! `warden.toml` configuration.
//!
//! Every section defaults independently, so a missing file, an empty file,
//! and a file that only overrides `[isolation] mode` are all valid.

use crate::capabilities::CapabilitySet;
use crate::rules::{default_broken_logic_rules, default_fake_api_rules, PatternRule, RuleTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name looked up at the project root by [`WardenConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "warden.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid pattern in rule table `{table}`: {source}")]
    Pattern {
        table: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub collector: CollectorConfig,
    pub capabilities: CapabilitySet,
    pub rules: RuleConfig,
    pub detection: DetectionConfig,
    pub verification: VerificationConfig,
    pub isolation: IsolationConfig,
}

impl WardenConfig {
    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads `<root>/warden.toml` if present, defaults otherwise.
    pub fn discover(project_root: &Path) -> Result<Self, ConfigError> {
        let candidate = project_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Source extensions without the leading dot.
    pub extensions: Vec<String>,
    /// Directory names pruned anywhere in the tree.
    pub exclude_dirs: Vec<String>,
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            extensions: ["ts", "tsx", "js", "jsx"].map(String::from).to_vec(),
            exclude_dirs: [
                "node_modules",
                "dist",
                "build",
                "out",
                "coverage",
                ".next",
                ".git",
                "target",
                ".warden",
                "quarantine",
            ]
            .map(String::from)
            .to_vec(),
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

impl CollectorConfig {
    pub fn is_source_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub fake_api: Vec<PatternRule>,
    pub broken_logic: Vec<PatternRule>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            fake_api: default_fake_api_rules(),
            broken_logic: default_broken_logic_rules(),
        }
    }
}

impl RuleConfig {
    pub fn fake_api_table(&self) -> Result<RuleTable, ConfigError> {
        RuleTable::compile(self.fake_api.clone()).map_err(|source| ConfigError::Pattern {
            table: "fake_api",
            source,
        })
    }

    pub fn broken_logic_table(&self) -> Result<RuleTable, ConfigError> {
        RuleTable::compile(self.broken_logic.clone()).map_err(|source| ConfigError::Pattern {
            table: "broken_logic",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Report each dependency cycle once, rotated to its smallest file path.
    pub dedupe_cycles: bool,
    pub snippet_width: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            dedupe_cycles: true,
            snippet_width: 160,
        }
    }
}

/// An opaque external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub type_check: CommandSpec,
    pub build: CommandSpec,
    pub lint: CommandSpec,
    pub unit_tests: CommandSpec,
    pub integration_tests: CommandSpec,
    pub audit: CommandSpec,
    /// Directory the build must produce, relative to the project root.
    pub artifact_dir: String,
    /// Istanbul `coverage-summary.json`, relative to the project root.
    pub coverage_summary: String,
    /// Minimum line coverage, in percent.
    pub coverage_threshold: f64,
    pub required_dirs: Vec<String>,
    pub timeout_secs: u64,
    /// Regex counting error lines in captured command output.
    pub error_pattern: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            type_check: CommandSpec::new("npx", ["tsc", "--noEmit"]),
            build: CommandSpec::new("npm", ["run", "build"]),
            lint: CommandSpec::new("npm", ["run", "lint"]),
            unit_tests: CommandSpec::new("npm", ["test"]),
            integration_tests: CommandSpec::new("npm", ["run", "test:integration"]),
            audit: CommandSpec::new("npm", ["audit", "--audit-level=high"]),
            artifact_dir: "dist".to_string(),
            coverage_summary: "coverage/coverage-summary.json".to_string(),
            coverage_threshold: 80.0,
            required_dirs: vec!["src".to_string()],
            timeout_secs: 300,
            error_pattern: r"(?i)\berror\b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Continue past per-file failures.
    #[default]
    BestEffort,
    /// Roll every mutated file back on the first per-file failure.
    Transactional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Root of all warden state, relative to the project root.
    pub work_dir: String,
    pub backup_dir: String,
    pub quarantine_dir: String,
    pub logs_dir: String,
    /// Source directories snapshotted before mutation.
    pub source_dirs: Vec<String>,
    /// Project config files copied as `<name>.backup`.
    pub config_files: Vec<String>,
    pub compile_check: CommandSpec,
    pub mode: IsolationMode,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            work_dir: ".warden".to_string(),
            backup_dir: "backups".to_string(),
            quarantine_dir: "quarantine".to_string(),
            logs_dir: "logs".to_string(),
            source_dirs: vec!["src".to_string()],
            config_files: ["package.json", "tsconfig.json", "package-lock.json"]
                .map(String::from)
                .to_vec(),
            compile_check: CommandSpec::new("npx", ["tsc", "--noEmit"]),
            mode: IsolationMode::BestEffort,
        }
    }
}

impl IsolationConfig {
    pub fn work_path(&self, root: &Path) -> PathBuf {
        root.join(&self.work_dir)
    }

    pub fn backup_path(&self, root: &Path) -> PathBuf {
        self.work_path(root).join(&self.backup_dir)
    }

    pub fn quarantine_path(&self, root: &Path) -> PathBuf {
        self.work_path(root).join(&self.quarantine_dir)
    }

    pub fn logs_path(&self, root: &Path) -> PathBuf {
        self.work_path(root).join(&self.logs_dir)
    }
}
