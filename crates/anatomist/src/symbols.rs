//! # Symbol Table Builder
//!
//! Two passes over the cache:
//! 1. **Extract**: per file, imported bindings, top-level exports and local
//!    definitions (functions, classes, variables, methods, parameters).
//! 2. **Mark**: an export is "used" when its name appears as a call-like token
//!    more than once in the same file. Cross-file use is invisible to this
//!    heuristic, so exports consumed only by other files stay unused.

use crate::cache::{FileCache, SourceFile};
use crate::lexer::{call_sites, is_identifier, is_keyword, mask_non_code, CallSite, LineIndex};
use common::CapabilitySet;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// How a name was brought into scope by an `import` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import { a } from 'm'` / `import { a as b } from 'm'`
    Named,
    /// `import * as ns from 'm'`
    Namespace,
    /// `import d from 'm'`
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Module specifier as written.
    pub origin: String,
    pub kind: ImportKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Heuristic: see the module docs.
    pub used: bool,
    pub line: usize,
    pub column: usize,
}

/// Per-file symbol facts.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub file: String,
    /// Local binding name → import.
    pub imports: BTreeMap<String, ImportBinding>,
    /// Exported name → entry.
    pub exports: BTreeMap<String, ExportEntry>,
    /// Locally defined name → defining file.
    pub definitions: BTreeMap<String, String>,
    /// Call-like tokens, computed once on masked content.
    pub calls: Vec<CallSite>,
}

impl SymbolTable {
    /// Extracts imports, exports, definitions and call sites from one file.
    /// `used` flags are left `false`; [`SymbolIndex::build`] marks them.
    pub fn extract(file: &SourceFile) -> Self {
        let masked = mask_non_code(&file.content);
        let index = LineIndex::new(&file.content);
        let mut table = SymbolTable {
            file: file.path.clone(),
            ..Default::default()
        };

        table.extract_imports(&file.content, &index);
        table.extract_exports(&masked, &index);
        table.extract_definitions(&masked);
        table.calls = call_sites(&masked, &index);
        table
    }

    /// `true` if `name` is imported or defined in this file.
    pub fn binds(&self, name: &str) -> bool {
        self.imports.contains_key(name) || self.definitions.contains_key(name)
    }

    fn extract_imports(&mut self, content: &str, index: &LineIndex) {
        for caps in import_re().captures_iter(content) {
            let (Some(clause), Some(origin)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let (line, _) = index.position(clause.start());
            for (name, kind) in parse_import_clause(clause.as_str()) {
                self.imports.insert(
                    name,
                    ImportBinding {
                        origin: origin.as_str().to_string(),
                        kind,
                        line,
                    },
                );
            }
        }
    }

    fn extract_exports(&mut self, masked: &str, index: &LineIndex) {
        for caps in export_decl_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                let (line, column) = index.position(name.start());
                self.exports.entry(name.as_str().to_string()).or_insert(ExportEntry {
                    used: false,
                    line,
                    column,
                });
            }
        }

        for caps in export_list_re().captures_iter(masked) {
            if caps.get(2).is_some() {
                // Re-export: the names belong to another module.
                continue;
            }
            let Some(list) = caps.get(1) else { continue };
            let mut offset = list.start();
            for item in list.as_str().split(',') {
                let item_start = offset + (item.len() - item.trim_start().len());
                offset += item.len() + 1;
                let item = item.trim();
                let exported = match item.split_once(" as ") {
                    Some((_, alias)) => alias.trim(),
                    None => item.trim_start_matches("type ").trim(),
                };
                if !is_identifier(exported) {
                    continue;
                }
                let (line, column) = index.position(item_start);
                self.exports.entry(exported.to_string()).or_insert(ExportEntry {
                    used: false,
                    line,
                    column,
                });
            }
        }
    }

    fn extract_definitions(&mut self, masked: &str) {
        let file = self.file.clone();
        let mut define = |name: &str| {
            if is_identifier(name) && !is_keyword(name) {
                self.definitions
                    .entry(name.to_string())
                    .or_insert_with(|| file.clone());
            }
        };

        for caps in function_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                define(name.as_str());
            }
            if let Some(params) = caps.get(2) {
                param_names(params.as_str()).for_each(&mut define);
            }
        }
        for caps in class_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                define(name.as_str());
            }
        }
        for caps in variable_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                define(name.as_str());
            }
        }
        for caps in destructure_re().captures_iter(masked) {
            if let Some(pattern) = caps.get(1) {
                param_names(pattern.as_str()).for_each(&mut define);
            }
        }
        for caps in method_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                define(name.as_str());
            }
        }
        for caps in arrow_params_re().captures_iter(masked) {
            if let Some(params) = caps.get(1) {
                param_names(params.as_str()).for_each(&mut define);
            }
        }
        for caps in arrow_single_re().captures_iter(masked) {
            if let Some(name) = caps.get(1) {
                define(name.as_str());
            }
        }
    }

    /// Second pass: marks exports whose name occurs as a call more than once.
    fn mark_used(&mut self) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for call in &self.calls {
            *counts.entry(call.name.as_str()).or_default() += 1;
        }
        for (name, entry) in self.exports.iter_mut() {
            entry.used = counts.get(name.as_str()).copied().unwrap_or(0) > 1;
        }
    }
}

/// All symbol tables of a run plus the injected capability set.
#[derive(Debug, Clone)]
pub struct SymbolIndex {
    tables: BTreeMap<String, SymbolTable>,
    capabilities: Arc<CapabilitySet>,
}

impl SymbolIndex {
    pub fn build(cache: &FileCache, capabilities: Arc<CapabilitySet>) -> Self {
        let mut tables: BTreeMap<String, SymbolTable> = cache
            .iter()
            .map(|file| (file.path.clone(), SymbolTable::extract(file)))
            .collect();
        for table in tables.values_mut() {
            table.mark_used();
        }
        Self {
            tables,
            capabilities,
        }
    }

    pub fn get(&self, file: &str) -> Option<&SymbolTable> {
        self.tables.get(file)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolTable> {
        self.tables.values()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Resolution order: imports, local definitions, builtins, common globals.
    pub fn resolves(&self, file: &str, name: &str) -> bool {
        self.tables
            .get(file)
            .map(|t| t.binds(name))
            .unwrap_or(false)
            || self.capabilities.resolves(name)
    }
}

/// Splits an import clause into `(local_name, kind)` bindings.
///
/// Handles `D`, `* as NS`, `{ a, b as c }` and their comma combinations, with
/// optional `type` modifiers.
pub fn parse_import_clause(clause: &str) -> Vec<(String, ImportKind)> {
    let clause = clause.trim();
    let clause = clause.strip_prefix("type ").unwrap_or(clause);
    let mut bindings = Vec::new();

    let (outer, named) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            format!("{}{}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    for part in outer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(rest) = part.strip_prefix('*') {
            let rest = rest.trim();
            let local = rest.strip_prefix("as").unwrap_or(rest).trim();
            if is_identifier(local) {
                bindings.push((local.to_string(), ImportKind::Namespace));
            }
        } else if is_identifier(part) {
            bindings.push((part.to_string(), ImportKind::Default));
        }
    }

    if let Some(named) = named {
        for item in named.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let item = item.strip_prefix("type ").unwrap_or(item);
            let local = match item.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => item,
            };
            if is_identifier(local) {
                bindings.push((local.to_string(), ImportKind::Named));
            }
        }
    }

    bindings
}

/// Binding names in a parameter list or destructuring pattern.
fn param_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').filter_map(|raw| {
        let raw = raw.trim().trim_start_matches("...");
        let raw = raw.trim_matches(|c: char| matches!(c, '{' | '}' | '[' | ']') || c.is_whitespace());
        // `a: b` in a destructuring pattern binds `b`; `a: T` in a parameter
        // list binds `a`. Taking the left side matches parameters, which are
        // the common case.
        let end = raw.find([':', '=', '?']).unwrap_or(raw.len());
        let name = raw[..end].trim();
        is_identifier(name).then_some(name)
    })
}

macro_rules! lazy_regex {
    ($fn_name:ident, $static_name:ident, $pattern:expr) => {
        static $static_name: OnceLock<Regex> = OnceLock::new();

        fn $fn_name() -> &'static Regex {
            $static_name.get_or_init(|| Regex::new($pattern).expect("Invalid symbol regex"))
        }
    };
}

lazy_regex!(
    import_re,
    IMPORT_RE,
    r#"(?m)^[ \t]*import\s+([^'"`;()=]+?)\s*\bfrom\s*['"]([^'"\n]+)['"]"#
);
lazy_regex!(
    export_decl_re,
    EXPORT_DECL_RE,
    r"(?m)^export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)"
);
lazy_regex!(
    export_list_re,
    EXPORT_LIST_RE,
    r"(?m)^export\s*(?:type\s*)?\{([^}]*)\}(\s*from\b)?"
);
lazy_regex!(
    function_re,
    FUNCTION_RE,
    r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)"
);
lazy_regex!(class_re, CLASS_RE, r"\bclass\s+([A-Za-z_$][\w$]*)");
lazy_regex!(
    variable_re,
    VARIABLE_RE,
    r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*[=:;,]"
);
lazy_regex!(
    destructure_re,
    DESTRUCTURE_RE,
    r"\b(?:const|let|var)\s*[{\[]([^}\]=]*)[}\]]\s*="
);
// No nested parens in the parameter list, so `run(function () {` and
// `retry(3, () => {` stay calls.
lazy_regex!(
    method_re,
    METHOD_RE,
    r"(?m)^[ \t]*(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*\*?([A-Za-z_$][\w$]*)\s*\([^()]*\)\s*(?::\s*[^{;=]+)?\{"
);
lazy_regex!(arrow_params_re, ARROW_PARAMS_RE, r"\(([^()]*)\)\s*(?::\s*[^=]+?)?=>");
lazy_regex!(arrow_single_re, ARROW_SINGLE_RE, r"([A-Za-z_$][\w$]*)\s*=>");

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> SymbolTable {
        let mut t = SymbolTable::extract(&SourceFile {
            path: "src/x.ts".into(),
            content: src.into(),
        });
        t.mark_used();
        t
    }

    #[test]
    fn test_import_forms() {
        let t = table(
            "import React, { useState as useS, type FC } from 'react';\n\
             import * as api from './api';\n\
             import def from \"./def\";\n\
             import {\n  a,\n  b,\n} from './multi';\n",
        );
        let kinds: Vec<(&str, ImportKind, &str)> = t
            .imports
            .iter()
            .map(|(n, b)| (n.as_str(), b.kind, b.origin.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("FC", ImportKind::Named, "react"),
                ("React", ImportKind::Default, "react"),
                ("a", ImportKind::Named, "./multi"),
                ("api", ImportKind::Namespace, "./api"),
                ("b", ImportKind::Named, "./multi"),
                ("def", ImportKind::Default, "./def"),
                ("useS", ImportKind::Named, "react"),
            ]
        );
        assert_eq!(t.imports["api"].line, 2);
    }

    #[test]
    fn test_exports() {
        let t = table(
            "export function helper() {}\n\
             export default class Widget {}\n\
             export const LIMIT = 5;\n\
             export interface Props {}\n\
             const inner = 1;\n\
             export { inner as renamed };\n\
             export { fromElsewhere } from './other';\n\
             // export function commented() {}\n\
             function nested() {\n  export const notTop = 1;\n}\n",
        );
        let names: Vec<&str> = t.exports.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["LIMIT", "Props", "Widget", "helper", "renamed"]);
        let helper = &t.exports["helper"];
        assert_eq!((helper.line, helper.column), (1, 17));
    }

    #[test]
    fn test_definitions() {
        let t = table(
            "function load(url: string, { retries = 3 }) {}\n\
             const handler = async (req, res) => {};\n\
             const { alpha, beta } = cfg;\n\
             let counter = 0;\n\
             class Service {\n  fetchAll(limit) {\n    return limit;\n  }\n}\n\
             items.map(item => item.id);\n",
        );
        for name in [
            "load", "url", "retries", "handler", "req", "res", "alpha", "beta", "counter",
            "Service", "fetchAll", "item",
        ] {
            assert!(t.definitions.contains_key(name), "missing definition {name}");
        }
        assert_eq!(t.definitions["load"], "src/x.ts");
        assert!(!t.definitions.contains_key("if"));
        assert!(!t.definitions.contains_key("map"));
    }

    #[test]
    fn test_control_flow_is_not_a_method() {
        let t = table("if (ready) {\n  go();\n}\nwhile (x) {\n}\n");
        assert!(t.definitions.is_empty());
    }

    #[test]
    fn test_callback_argument_is_not_a_method() {
        let t = table(
            "function run() {\n  doStuff(function () {\n  });\n  retry(3, () => {\n  });\n  each(x => {\n  });\n}\nrun();\n",
        );
        assert!(t.definitions.contains_key("run"));
        for name in ["doStuff", "retry", "each"] {
            assert!(!t.definitions.contains_key(name), "{name} is a call, not a definition");
        }
    }

    #[test]
    fn test_used_flag_is_single_file_call_count() {
        let t = table(
            "export function used() {}\n\
             export function unused() {}\n\
             export const value = 1;\n\
             used();\n\
             const s = 'unused()';\n",
        );
        assert!(t.exports["used"].used);
        assert!(!t.exports["unused"].used);
        // Never called, so never "used".
        assert!(!t.exports["value"].used);
    }

    #[test]
    fn test_index_resolution_uses_capabilities() {
        let cache = FileCache::from_sources(
            "/p",
            [("a.ts", "import { x } from './b';\nfunction y() {}\n")],
        );
        let index = SymbolIndex::build(&cache, Arc::new(CapabilitySet::minimal(["console"])));
        assert!(index.resolves("a.ts", "x"));
        assert!(index.resolves("a.ts", "y"));
        assert!(index.resolves("a.ts", "console"));
        assert!(!index.resolves("a.ts", "setTimeout"));
        assert!(!index.resolves("missing.ts", "x"));
    }

    #[test]
    fn test_parse_import_clause_combinations() {
        assert_eq!(
            parse_import_clause("D, * as NS"),
            vec![
                ("D".to_string(), ImportKind::Default),
                ("NS".to_string(), ImportKind::Namespace)
            ]
        );
        assert_eq!(
            parse_import_clause("type { A }"),
            vec![("A".to_string(), ImportKind::Named)]
        );
    }
}
