//! Calls that resolve to nothing, plus relative imports that point at no file.

use super::{line_snippet, Detector};
use crate::OracleError;
use anatomist::Snapshot;
use common::{DetectionType, Indicator, Severity};

pub struct UndefinedSymbolDetector {
    snippet_width: usize,
}

impl UndefinedSymbolDetector {
    pub fn new(snippet_width: usize) -> Self {
        Self { snippet_width }
    }
}

impl Detector for UndefinedSymbolDetector {
    fn name(&self) -> &'static str {
        "undefined_symbol"
    }

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
        let mut out = Vec::new();

        for table in snapshot.symbols.iter() {
            let Some(file) = snapshot.cache.get(&table.file) else {
                continue;
            };
            for call in table.calls.iter().filter(|c| !c.is_method) {
                if snapshot.symbols.resolves(&table.file, &call.name) {
                    continue;
                }
                out.push(
                    Indicator::new(
                        DetectionType::UndefinedFunction,
                        Severity::High,
                        &table.file,
                        call.line,
                        call.column,
                    )
                    .with_content(line_snippet(file, call.line, self.snippet_width))
                    .with_reason(format!(
                        "`{}` is called but never imported or defined",
                        call.name
                    ))
                    .with_suggestion(Some(format!(
                        "Import `{}` from the module that provides it, or define it here",
                        call.name
                    ))),
                );
            }
        }

        for missing in snapshot.graph.unresolved() {
            let content = snapshot
                .cache
                .get(&missing.file)
                .map(|f| line_snippet(f, missing.line, self.snippet_width))
                .unwrap_or_default();
            out.push(
                Indicator::new(
                    DetectionType::MissingImport,
                    Severity::High,
                    &missing.file,
                    missing.line,
                    missing.column,
                )
                .with_content(content)
                .with_reason(format!(
                    "Import `{}` does not resolve to any project file",
                    missing.specifier
                ))
                .with_suggestion(Some(
                    "Create the module or correct the import path".to_string(),
                )),
            );
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anatomist::FileCache;
    use common::config::CollectorConfig;
    use common::CapabilitySet;
    use std::sync::Arc;

    fn detect(sources: &[(&str, &str)], caps: CapabilitySet) -> Vec<Indicator> {
        let snap = Snapshot::from_cache(
            FileCache::from_sources("/p", sources.iter().copied()),
            Arc::new(caps),
            &CollectorConfig::default(),
        );
        UndefinedSymbolDetector::new(160).detect(&snap).unwrap()
    }

    #[test]
    fn test_unresolved_call() {
        let found = detect(
            &[("b.ts", "function run() {\n  doStuff();\n}\nrun();\n")],
            CapabilitySet::v1(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DetectionType::UndefinedFunction);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!((found[0].line, found[0].column), (2, 3));
        assert_eq!(found[0].content, "doStuff();");
    }

    #[test]
    fn test_resolution_sources() {
        let found = detect(
            &[(
                "a.ts",
                "import { helper } from './lib';\n\
                 import * as api from './api';\n\
                 const local = () => 1;\n\
                 helper();\n\
                 local();\n\
                 api.get();\n\
                 console.log('x');\n\
                 describe('suite', () => {});\n\
                 user?.save();\n\
                 // ghost();\n\
                 const s = \"phantom()\";\n",
            )],
            CapabilitySet::v1(),
        );
        // Only the two unresolved relative imports are reported.
        assert!(found
            .iter()
            .all(|i| i.kind == DetectionType::MissingImport));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_builtins_never_flagged_even_without_import() {
        let caps = CapabilitySet::minimal(["print"]);
        let found = detect(&[("a.ts", "print(1);\nconsole.log(2);\nsetTimeout(f);\n")], caps);
        let names: Vec<&str> = found.iter().map(|i| i.reason.as_str()).collect();
        assert_eq!(
            names,
            vec!["`setTimeout` is called but never imported or defined"]
        );
    }

    #[test]
    fn test_missing_import() {
        let found = detect(
            &[("src/a.ts", "import { x } from './nowhere';\nimport React from 'react';\nx();\n")],
            CapabilitySet::v1(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DetectionType::MissingImport);
        assert_eq!(found[0].line, 1);
        assert!(found[0].reason.contains("./nowhere"));
    }
}
