//! Scan, quarantine and restore against real project trees on disk.

use anatomist::path_util::canonical_root;
use anatomist::Snapshot;
use common::config::CommandSpec;
use common::{DetectionType, HealthStatus, Severity, WardenConfig};
use lazarus::{find_quarantined, restore_quarantined, QuarantineHeader};
use oracle::{DetectionEngine, Report};
use reaper::IsolationPipeline;
use std::fs;
use std::path::Path;

const HELPER: &str = "export function helper() {\n  return 1;\n}\n";
const RUNNER: &str = "function run() {\n  doStuff();\n}\nrun();\n";
const LIBRARY: &str = "export function doStuff() {\n  return 1;\n}\n";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(root: &Path, config: &WardenConfig) -> Report {
    let snapshot = Snapshot::build(root, config).unwrap();
    let run = DetectionEngine::standard(config).unwrap().run(&snapshot);
    Report::build(&snapshot, run)
}

fn isolation_config() -> WardenConfig {
    let mut config = WardenConfig::default();
    config.isolation.compile_check = CommandSpec::new("true", Vec::<String>::new());
    config
}

#[test]
fn test_orphan_and_undefined_call_give_warning() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.ts", HELPER);
    write(dir.path(), "b.ts", RUNNER);

    let report = scan(dir.path(), &WardenConfig::default());

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.indicators.len(), 2);

    let orphan = &report.indicators[0];
    assert_eq!(orphan.kind, DetectionType::Orphaned);
    assert_eq!(orphan.severity, Severity::Low);
    assert_eq!(orphan.file, "a.ts");
    assert!(orphan.reason.contains("helper"));

    let undefined = &report.indicators[1];
    assert_eq!(undefined.kind, DetectionType::UndefinedFunction);
    assert_eq!(undefined.severity, Severity::High);
    assert_eq!(undefined.file, "b.ts");
    assert!(undefined.reason.contains("doStuff"));

    assert_eq!(report.status, HealthStatus::Warning);
    assert_eq!(report.flagged_files(Severity::High), vec!["b.ts".to_string()]);
}

#[test]
fn test_scan_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.ts", HELPER);
    write(dir.path(), "b.ts", RUNNER);
    write(dir.path(), "c.ts", "import './d';\n");
    write(dir.path(), "d.ts", "import './c';\n");

    let first = scan(dir.path(), &WardenConfig::default());
    let second = scan(dir.path(), &WardenConfig::default());
    assert_eq!(first.indicators, second.indicators);
    assert_eq!(first.type_counts[&DetectionType::Circular], 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_quarantine_removes_import_and_stubs_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = "import { doStuff } from './b';\nexport function main() {\n  return doStuff();\n}\n";
    write(dir.path(), "src/a.ts", a);
    write(dir.path(), "src/b.ts", LIBRARY);

    let run = IsolationPipeline::new(dir.path(), isolation_config())
        .unwrap()
        .run(&["src/b.ts".to_string()])
        .await
        .unwrap();
    let report = &run.report;
    let root = canonical_root(dir.path()).unwrap();

    let cleaned = fs::read_to_string(root.join("src/a.ts")).unwrap();
    assert!(!cleaned.contains("import { doStuff } from './b';"));
    assert!(cleaned.starts_with("export function main()"));

    let stub = fs::read_to_string(root.join("src/b.ts")).unwrap();
    assert!(stub.contains("Quarantined by warden"));
    assert!(stub.ends_with("export {};\n"));

    assert_eq!(report.quarantined.len(), 1);
    let copy = &report.quarantined[0].quarantine_path;
    assert!(copy.starts_with(root.join(".warden/quarantine")));
    assert!(copy
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_src_b.ts"));
    let stored = fs::read(copy).unwrap();
    let (header, payload) = QuarantineHeader::parse(&stored).unwrap();
    assert_eq!(header.original, "src/b.ts");
    assert_eq!(payload, LIBRARY.as_bytes());
}

#[cfg(unix)]
#[tokio::test]
async fn test_restore_reproduces_original_bytes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/a.ts", HELPER);
    write(dir.path(), "src/b.ts", RUNNER);

    let config = isolation_config();
    let report = scan(dir.path(), &config);
    let flagged = report.flagged_files(Severity::High);
    assert_eq!(flagged, vec!["src/b.ts".to_string()]);

    IsolationPipeline::new(dir.path(), config.clone())
        .unwrap()
        .run(&flagged)
        .await
        .unwrap();
    let root = canonical_root(dir.path()).unwrap();
    assert_ne!(fs::read_to_string(root.join("src/b.ts")).unwrap(), RUNNER);

    let store = config.isolation.quarantine_path(&root);
    let copy = find_quarantined(&store, "src/b.ts").unwrap().unwrap();
    let restored = restore_quarantined(&copy, &root).unwrap();

    assert_eq!(restored.original, "src/b.ts");
    assert_eq!(fs::read_to_string(root.join("src/b.ts")).unwrap(), RUNNER);
}
