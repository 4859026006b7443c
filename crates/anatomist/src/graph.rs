//! # Dependency Graph Builder
//!
//! Two-pass pipeline:
//! 1. **Forward Pass**: extract relative specifiers per file, resolve them
//!    against the cache, add `importer → target` edges.
//! 2. **Reverse Pass**: derive each node's `dependents` from incoming edges.
//!
//! Specifiers that resolve to nothing are kept aside as [`UnresolvedImport`]s
//! instead of becoming edges.

use crate::cache::FileCache;
use crate::imports::{extract_statements, resolve_specifier, suffix_variants};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::debug;

/// Location of the import statement that created an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    pub specifier: String,
    pub line: usize,
    pub column: usize,
}

/// Per-file adjacency, both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyNode {
    pub imports: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
}

/// A relative specifier no suffix variant of which is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImport {
    pub file: String,
    pub specifier: String,
    pub line: usize,
    pub column: usize,
}

/// File-level import graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ImportEdge>,
    index: BTreeMap<String, NodeIndex>,
    nodes: BTreeMap<String, DependencyNode>,
    unresolved: Vec<UnresolvedImport>,
}

impl DependencyGraph {
    /// Builds the graph over every cached file.
    ///
    /// `extensions` drives the suffix variants tried during resolution.
    pub fn build(cache: &FileCache, extensions: &[String]) -> Self {
        let variants = suffix_variants(extensions);
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();
        let mut nodes: BTreeMap<String, DependencyNode> = BTreeMap::new();
        let mut unresolved = Vec::new();

        for path in cache.paths() {
            index.insert(path.to_string(), graph.add_node(path.to_string()));
            nodes.insert(path.to_string(), DependencyNode::default());
        }

        // PASS 1: forward edges
        for file in cache.iter() {
            let from = index[&file.path];
            for stmt in extract_statements(&file.content) {
                if !stmt.is_relative() {
                    continue;
                }
                match resolve_specifier(&file.path, &stmt.specifier, cache, &variants) {
                    Some(target) => {
                        let to = index[&target];
                        if graph.find_edge(from, to).is_none() {
                            graph.add_edge(
                                from,
                                to,
                                ImportEdge {
                                    specifier: stmt.specifier.clone(),
                                    line: stmt.line,
                                    column: stmt.column,
                                },
                            );
                        }
                        if let Some(node) = nodes.get_mut(&file.path) {
                            node.imports.insert(target);
                        }
                    }
                    None => {
                        debug!(file = %file.path, specifier = %stmt.specifier, "unresolved relative import");
                        unresolved.push(UnresolvedImport {
                            file: file.path.clone(),
                            specifier: stmt.specifier,
                            line: stmt.line,
                            column: stmt.column,
                        });
                    }
                }
            }
        }

        // PASS 2: reverse edges
        for (path, &idx) in &index {
            let dependents: BTreeSet<String> = graph
                .edges_directed(idx, Direction::Incoming)
                .map(|edge| graph[edge.source()].clone())
                .collect();
            if let Some(node) = nodes.get_mut(path) {
                node.dependents = dependents;
            }
        }

        debug!(
            files = graph.node_count(),
            edges = graph.edge_count(),
            unresolved = unresolved.len(),
            "dependency graph built"
        );

        Self {
            graph,
            index,
            nodes,
            unresolved,
        }
    }

    pub fn node(&self, file: &str) -> Option<&DependencyNode> {
        self.nodes.get(file)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Direct import targets of `file`, in path order.
    pub fn imports_of(&self, file: &str) -> impl Iterator<Item = &str> {
        self.nodes
            .get(file)
            .into_iter()
            .flat_map(|node| node.imports.iter().map(String::as_str))
    }

    /// The edge `from → to`, if `from` imports `to`.
    pub fn edge(&self, from: &str, to: &str) -> Option<&ImportEdge> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    /// Every file that reaches `file` through one or more imports.
    /// `file` itself is included only if it sits on a cycle.
    pub fn transitive_dependents(&self, file: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let Some(&start) = self.index.get(file) else {
            return found;
        };

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                let source = edge.source();
                if visited.insert(source) {
                    found.insert(self.graph[source].clone());
                    queue.push_back(source);
                }
            }
        }
        found
    }

    pub fn unresolved(&self) -> &[UnresolvedImport] {
        &self.unresolved
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["ts".into(), "tsx".into(), "js".into()]
    }

    fn build(sources: &[(&str, &str)]) -> DependencyGraph {
        let cache = FileCache::from_sources("/p", sources.iter().copied());
        DependencyGraph::build(&cache, &exts())
    }

    #[test]
    fn test_empty_cache() {
        let graph = build(&[]);
        assert_eq!(graph.file_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_forward_and_reverse_edges_agree() {
        let graph = build(&[
            ("src/a.ts", "import { b } from './b';\nimport c from './lib';\n"),
            ("src/b.ts", "export const b = 1;\n"),
            ("src/lib/index.ts", "import { b } from '../b';\n"),
        ]);

        assert_eq!(
            graph.imports_of("src/a.ts").collect::<Vec<_>>(),
            vec!["src/b.ts", "src/lib/index.ts"]
        );
        for file in graph.files() {
            for target in graph.imports_of(file) {
                assert!(graph.node(target).unwrap().dependents.contains(file));
            }
        }
        let b = graph.node("src/b.ts").unwrap();
        assert_eq!(
            b.dependents.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["src/a.ts", "src/lib/index.ts"]
        );
    }

    #[test]
    fn test_edge_location_and_duplicates() {
        let graph = build(&[
            ("a.ts", "\nimport x from './b';\nimport { y } from './b';\n"),
            ("b.ts", ""),
        ]);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge("a.ts", "b.ts").unwrap();
        assert_eq!(edge.specifier, "./b");
        assert_eq!((edge.line, edge.column), (2, 16));
        assert!(graph.edge("b.ts", "a.ts").is_none());
    }

    #[test]
    fn test_unresolved_and_external_imports() {
        let graph = build(&[(
            "a.ts",
            "import React from 'react';\nimport { gone } from './gone';\n",
        )]);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.unresolved().len(), 1);
        assert_eq!(graph.unresolved()[0].specifier, "./gone");
        assert_eq!(graph.unresolved()[0].line, 2);
    }

    #[test]
    fn test_transitive_dependents() {
        // c <- b <- a, d isolated
        let graph = build(&[
            ("a.ts", "import './b';\n"),
            ("b.ts", "import './c';\n"),
            ("c.ts", ""),
            ("d.ts", ""),
        ]);
        let deps: Vec<String> = graph.transitive_dependents("c.ts").into_iter().collect();
        assert_eq!(deps, vec!["a.ts", "b.ts"]);
        assert!(graph.transitive_dependents("a.ts").is_empty());
        assert!(graph.transitive_dependents("missing.ts").is_empty());
    }

    #[test]
    fn test_cycle_includes_self_in_dependents() {
        let graph = build(&[("a.ts", "import './b';\n"), ("b.ts", "import './a';\n")]);
        let deps = graph.transitive_dependents("a.ts");
        assert!(deps.contains("a.ts"));
        assert!(deps.contains("b.ts"));
    }
}
