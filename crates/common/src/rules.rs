//! Table-driven pattern rules for the fake-API and broken-logic detectors.
//!
//! Rules are plain `{matcher, severity, reason, suggestion}` records that can
//! be loaded from `warden.toml`. A [`RuleTable`] compiles them once: every
//! literal matcher goes into a single Aho-Corasick automaton, every regex
//! matcher into its own [`Regex`].

use crate::Severity;
use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a rule recognises a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMatcher {
    Literal(String),
    Regex(String),
}

/// Which text of a line a rule is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Code only: string literals and comments are blanked first.
    #[default]
    Code,
    /// The raw line, comments and strings included.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub matcher: PatternMatcher,
    #[serde(default)]
    pub scope: RuleScope,
    pub severity: Severity,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl PatternRule {
    fn regex(id: &str, pattern: &str, severity: Severity, reason: &str, suggestion: &str) -> Self {
        Self {
            id: id.to_string(),
            matcher: PatternMatcher::Regex(pattern.to_string()),
            scope: RuleScope::Code,
            severity,
            reason: reason.to_string(),
            suggestion: Some(suggestion.to_string()),
        }
    }

    fn literal(id: &str, needle: &str, severity: Severity, reason: &str, suggestion: &str) -> Self {
        Self {
            id: id.to_string(),
            matcher: PatternMatcher::Literal(needle.to_string()),
            scope: RuleScope::Code,
            severity,
            reason: reason.to_string(),
            suggestion: Some(suggestion.to_string()),
        }
    }

    fn on_text(mut self) -> Self {
        self.scope = RuleScope::Text;
        self
    }
}

/// Stock fabrication markers.
pub fn default_fake_api_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::regex(
            "fake-call",
            r"\bfake[A-Z_]\w*\s*\(",
            Severity::Critical,
            "Call to a fabricated API",
            "Replace with a real implementation or an imported client",
        ),
        PatternRule::regex(
            "mock-call",
            r"\bmock[A-Z_]\w*\s*\(",
            Severity::Critical,
            "Mock-prefixed call in production code",
            "Move mocks into test files and call the real dependency here",
        ),
        PatternRule::regex(
            "placeholder-call",
            r"\bplaceholder\w*\s*\(",
            Severity::Critical,
            "Placeholder call stands in for missing logic",
            "Implement the behaviour the placeholder describes",
        ),
        PatternRule::regex(
            "dummy-call",
            r"\bdummy[A-Z_]\w*\s*\(",
            Severity::Critical,
            "Dummy data generator in production code",
            "Load real data or inject it from the caller",
        ),
        PatternRule::regex(
            "not-implemented",
            r"(?i)\bnot\s+implemented\b",
            Severity::Critical,
            "Explicit not-implemented marker",
            "Implement the function or remove the call path",
        )
        .on_text(),
        PatternRule::literal(
            "implement-me",
            "TODO: implement",
            Severity::Critical,
            "Implementation left as a TODO",
            "Implement the function or remove the call path",
        )
        .on_text(),
        PatternRule::literal(
            "example-endpoint",
            "api.example.com",
            Severity::Critical,
            "Request targets a fabricated example endpoint",
            "Point the request at a configured service URL",
        )
        .on_text(),
    ]
}

/// Stock anti-pattern table.
pub fn default_broken_logic_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::regex(
            "if-true",
            r"\bif\s*\(\s*true\s*\)",
            Severity::High,
            "Condition is always true",
            "Remove the condition or test the intended value",
        ),
        PatternRule::regex(
            "if-false",
            r"\bif\s*\(\s*false\s*\)",
            Severity::Medium,
            "Dead branch: condition is always false",
            "Delete the unreachable branch",
        ),
        PatternRule::regex(
            "return-undefined",
            r"\breturn\s+undefined\b",
            Severity::Low,
            "Explicit undefined return",
            "Return a meaningful value or use a bare `return`",
        ),
        PatternRule::regex(
            "empty-throw",
            r#"\bthrow\s+new\s+Error\s*\(\s*(?:''|""|``)?\s*\)"#,
            Severity::Medium,
            "Error thrown without a message",
            "Describe the failure in the error message",
        ),
        PatternRule::regex(
            "todo-marker",
            r"\b(?:TODO|FIXME)\b",
            Severity::Low,
            "Unfinished work marker",
            "Resolve the marker or track it in an issue",
        )
        .on_text(),
        PatternRule::regex(
            "while-true",
            r"\bwhile\s*\(\s*true\s*\)",
            Severity::High,
            "Unconditional loop",
            "Add an explicit exit condition",
        ),
    ]
}

/// One rule hit within a line. `column` is the 0-indexed byte offset.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub rule: &'a PatternRule,
    pub column: usize,
}

/// Compiled form of a rule list.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<PatternRule>,
    literals: Option<AhoCorasick>,
    /// `literal pattern index → rule index`
    literal_rules: Vec<usize>,
    regexes: Vec<(Regex, usize)>,
}

impl RuleTable {
    /// Compiles `rules`. Fails on the first invalid regex.
    pub fn compile(rules: Vec<PatternRule>) -> Result<Self, regex::Error> {
        let mut needles = Vec::new();
        let mut literal_rules = Vec::new();
        let mut regexes = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            match &rule.matcher {
                PatternMatcher::Literal(needle) => {
                    needles.push(needle.clone());
                    literal_rules.push(idx);
                }
                PatternMatcher::Regex(pattern) => {
                    regexes.push((Regex::new(pattern)?, idx));
                }
            }
        }

        let literals = if needles.is_empty() {
            None
        } else {
            // Literal needles are plain strings, construction cannot fail for them.
            AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(&needles)
                .ok()
        };

        Ok(Self {
            rules,
            literals,
            literal_rules,
            regexes,
        })
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first hit of every matching rule, in rule order, matching
    /// every rule against `line` whatever its scope.
    pub fn scan_line<'a>(&'a self, line: &str) -> Vec<RuleMatch<'a>> {
        self.matches(self.first_hits(line))
    }

    /// Like [`scan_line`](Self::scan_line), but `Code` rules only see `code`
    /// (the line with strings and comments blanked, same byte offsets) and
    /// `Text` rules see `raw`.
    pub fn scan<'a>(&'a self, raw: &str, code: &str) -> Vec<RuleMatch<'a>> {
        let in_code = self.first_hits(code);
        let in_text = self.first_hits(raw);
        let merged = self
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| match rule.scope {
                RuleScope::Code => in_code[idx],
                RuleScope::Text => in_text[idx],
            })
            .collect();
        self.matches(merged)
    }

    /// `rule index → first match column`
    fn first_hits(&self, line: &str) -> Vec<Option<usize>> {
        let mut first_hit: Vec<Option<usize>> = vec![None; self.rules.len()];

        if let Some(ac) = &self.literals {
            for mat in ac.find_overlapping_iter(line) {
                let rule_idx = self.literal_rules[mat.pattern().as_usize()];
                let slot = &mut first_hit[rule_idx];
                if slot.map_or(true, |col| mat.start() < col) {
                    *slot = Some(mat.start());
                }
            }
        }

        for (re, rule_idx) in &self.regexes {
            if let Some(m) = re.find(line) {
                first_hit[*rule_idx] = Some(m.start());
            }
        }
        first_hit
    }

    fn matches(&self, first_hit: Vec<Option<usize>>) -> Vec<RuleMatch<'_>> {
        first_hit
            .into_iter()
            .enumerate()
            .filter_map(|(idx, col)| {
                col.map(|column| RuleMatch {
                    rule: &self.rules[idx],
                    column,
                })
            })
            .collect()
    }
}
