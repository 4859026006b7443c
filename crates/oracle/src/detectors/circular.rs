//! Import cycles.
//!
//! Depth-first search from every file not yet visited, keeping the active
//! path on a stack. Meeting a file that is already on the path closes a cycle:
//! the path slice from that file onward plus the file itself. The global
//! visited set stops whole subgraphs from being explored twice, but the same
//! cycle can still be reached from different starting points; `dedupe`
//! rotates every cycle to start at its smallest path and keeps one copy.

use super::{line_snippet, Detector};
use crate::OracleError;
use anatomist::{DependencyGraph, Snapshot};
use common::{DetectionType, Indicator, Severity};
use std::collections::{BTreeSet, HashSet};

pub struct CircularDependencyDetector {
    dedupe: bool,
    snippet_width: usize,
}

impl CircularDependencyDetector {
    pub fn new(dedupe: bool, snippet_width: usize) -> Self {
        Self {
            dedupe,
            snippet_width,
        }
    }
}

impl Detector for CircularDependencyDetector {
    fn name(&self) -> &'static str {
        "circular_dependency"
    }

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
        let graph = &snapshot.graph;
        let mut out = Vec::new();

        for cycle in find_cycles(graph, self.dedupe) {
            let (first, second) = (&cycle[0], &cycle[1]);
            let (line, column) = graph
                .edge(first, second)
                .map(|e| (e.line, e.column))
                .unwrap_or((1, 1));
            let content = snapshot
                .cache
                .get(first)
                .map(|f| line_snippet(f, line, self.snippet_width))
                .unwrap_or_default();
            let chain = cycle.join(" -> ");

            out.push(
                Indicator::new(DetectionType::Circular, Severity::High, first, line, column)
                    .with_content(content)
                    .with_reason(format!("Circular dependency: {chain}"))
                    .with_suggestion(Some(
                        "Move the shared code into a module both sides can import".to_string(),
                    )),
            );
        }
        Ok(out)
    }
}

/// Every cycle found by the DFS, each closed (`[a, b, a]`).
pub fn find_cycles(graph: &DependencyGraph, dedupe: bool) -> Vec<Vec<String>> {
    struct Frame<'g> {
        children: std::vec::IntoIter<&'g str>,
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();
    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();

    for start in graph.files() {
        if visited.contains(start) {
            continue;
        }

        let mut path: Vec<&str> = vec![start];
        let mut on_path: HashSet<&str> = HashSet::from([start]);
        let mut frames = vec![Frame {
            children: graph.imports_of(start).collect::<Vec<_>>().into_iter(),
        }];
        visited.insert(start);

        while let Some(frame) = frames.last_mut() {
            match frame.children.next() {
                Some(next) if on_path.contains(next) => {
                    let pos = path.iter().position(|p| *p == next).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|s| s.to_string()).collect();
                    cycle.push(next.to_string());

                    if dedupe {
                        let canonical = canonicalize(&cycle);
                        if seen.insert(canonical.clone()) {
                            cycles.push(canonical);
                        }
                    } else {
                        cycles.push(cycle);
                    }
                }
                Some(next) => {
                    if visited.insert(next) {
                        path.push(next);
                        on_path.insert(next);
                        frames.push(Frame {
                            children: graph.imports_of(next).collect::<Vec<_>>().into_iter(),
                        });
                    }
                }
                None => {
                    frames.pop();
                    if let Some(done) = path.pop() {
                        on_path.remove(done);
                    }
                }
            }
        }
    }

    cycles
}

/// Rotates a closed cycle so it starts (and ends) at its smallest file.
fn canonicalize(cycle: &[String]) -> Vec<String> {
    let open = &cycle[..cycle.len() - 1];
    let min = open
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated: Vec<String> = open[min..].iter().chain(&open[..min]).cloned().collect();
    rotated.push(rotated[0].clone());
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use anatomist::FileCache;

    fn graph(sources: &[(&str, &str)]) -> DependencyGraph {
        let cache = FileCache::from_sources("/p", sources.iter().copied());
        DependencyGraph::build(&cache, &["ts".to_string()])
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(&[("a.ts", "import './b';\n"), ("b.ts", "import './a';\n")]);
        let cycles = find_cycles(&g, true);
        assert_eq!(cycles, vec![vec!["a.ts", "b.ts", "a.ts"]]);
    }

    #[test]
    fn test_acyclic() {
        let g = graph(&[
            ("a.ts", "import './b';\nimport './c';\n"),
            ("b.ts", "import './c';\n"),
            ("c.ts", ""),
        ]);
        assert!(find_cycles(&g, true).is_empty());
        assert!(find_cycles(&g, false).is_empty());
    }

    #[test]
    fn test_self_import() {
        let g = graph(&[("a.ts", "import './a';\n")]);
        assert_eq!(find_cycles(&g, true), vec![vec!["a.ts", "a.ts"]]);
    }

    #[test]
    fn test_raw_mode_reports_each_closing_edge() {
        // a -> b -> c -> b and c -> a: two distinct cycles.
        let g = graph(&[
            ("a.ts", "import './b';\n"),
            ("b.ts", "import './c';\n"),
            ("c.ts", "import './a';\nimport './b';\n"),
        ]);
        let raw = find_cycles(&g, false);
        assert_eq!(
            raw,
            vec![
                vec!["a.ts", "b.ts", "c.ts", "a.ts"],
                vec!["b.ts", "c.ts", "b.ts"],
            ]
        );
    }

    #[test]
    fn test_canonicalize_rotates_to_smallest() {
        let cycle: Vec<String> = ["c.ts", "a.ts", "b.ts", "c.ts"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(canonicalize(&cycle), vec!["a.ts", "b.ts", "c.ts", "a.ts"]);
    }

    #[test]
    fn test_indicator_points_at_closing_import() {
        use common::config::CollectorConfig;
        use common::CapabilitySet;
        use std::sync::Arc;

        let snap = Snapshot::from_cache(
            FileCache::from_sources(
                "/p",
                [
                    ("a.ts", "// header\nimport { b } from './b';\n"),
                    ("b.ts", "import { a } from './a';\n"),
                ],
            ),
            Arc::new(CapabilitySet::v1()),
            &CollectorConfig::default(),
        );
        let found = CircularDependencyDetector::new(true, 160)
            .detect(&snap)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "a.ts");
        assert_eq!((found[0].line, found[0].column), (2, 20));
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].reason, "Circular dependency: a.ts -> b.ts -> a.ts");
    }
}
