//! Lexical helpers shared by the symbol builder and the detectors.
//!
//! Nothing here parses: string literals and comments are blanked out
//! byte-for-byte (so offsets stay valid) and call-like tokens are found with a
//! single regex over what is left.

use regex::Regex;
use std::sync::OnceLock;

/// Reserved words that are followed by `(` without being calls.
pub const KEYWORDS: &[&str] = &[
    "async",
    "await",
    "case",
    "catch",
    "class",
    "const",
    "constructor",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "of",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Replaces the contents of string literals, template literals and comments
/// with spaces. Newlines and the total byte length are preserved.
///
/// # Examples
/// ```
/// use anatomist::lexer::mask_non_code;
///
/// let masked = mask_non_code("call('x()'); // y()");
/// assert_eq!(masked, "call('   ');      ");
/// ```
pub fn mask_non_code(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
        Template,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    fn blank(out: &mut String, c: char) {
        if c == '\n' || c == '\r' {
            out.push(c);
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '\'' | '"' => {
                    out.push(c);
                    state = State::Str(c);
                }
                '`' => {
                    out.push(c);
                    state = State::Template;
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    blank(&mut out, c);
                    if let Some(next) = chars.next() {
                        blank(&mut out, next);
                    }
                } else if c == quote {
                    out.push(c);
                    state = State::Code;
                } else if c == '\n' {
                    // Unterminated literal: recover at end of line.
                    out.push(c);
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::Template => {
                if c == '\\' {
                    blank(&mut out, c);
                    if let Some(next) = chars.next() {
                        blank(&mut out, next);
                    }
                } else if c == '`' {
                    out.push(c);
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }

    out
}

/// Byte offset → 1-indexed `(line, column)` lookup.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// Column is the 1-indexed byte offset within the line.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.starts[line] + 1)
    }
}

/// An identifier immediately followed by `(`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub name: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    /// Preceded by `.` (member or optional-chaining call).
    pub is_method: bool,
}

static CALL_RE: OnceLock<Regex> = OnceLock::new();

fn call_re() -> &'static Regex {
    CALL_RE.get_or_init(|| Regex::new(r"[A-Za-z_$][\w$]*\s*\(").expect("Invalid call regex"))
}

/// Finds call-like tokens in already-masked code. Keywords are dropped.
pub fn call_sites(masked: &str, index: &LineIndex) -> Vec<CallSite> {
    let bytes = masked.as_bytes();
    let mut sites = Vec::new();

    for m in call_re().find_iter(masked) {
        let text = m.as_str();
        let name_end = text
            .find(|c: char| c.is_whitespace() || c == '(')
            .unwrap_or(text.len());
        let name = &text[..name_end];
        if is_keyword(name) {
            continue;
        }
        let start = m.start();
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        let is_method = bytes[..start]
            .iter()
            .rev()
            .find(|b| !b.is_ascii_whitespace())
            .map(|b| *b == b'.')
            .unwrap_or(false);
        let (line, column) = index.position(start);
        sites.push(CallSite {
            name: name.to_string(),
            offset: start,
            line,
            column,
            is_method,
        });
    }

    sites
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// `true` if `s` is a plain JS identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_preserves_length_and_lines() {
        let src = "a('s');\n/* b()\n c() */ d(`e()`);\n// f()\ng(\"h\\\"i()\");";
        let masked = mask_non_code(src);
        assert_eq!(masked.len(), src.len());
        assert_eq!(masked.lines().count(), src.lines().count());
        assert!(!masked.contains("b()"));
        assert!(!masked.contains("c()"));
        assert!(!masked.contains("e()"));
        assert!(!masked.contains("f()"));
        assert!(!masked.contains("i()"));
        assert!(masked.contains("d("));
        assert!(masked.contains("g("));
    }

    #[test]
    fn test_mask_multibyte() {
        let src = "x('🚀'); y()";
        let masked = mask_non_code(src);
        assert_eq!(masked.len(), src.len());
        assert!(masked.ends_with("y()"));
    }

    #[test]
    fn test_line_index() {
        let idx = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(idx.position(0), (1, 1));
        assert_eq!(idx.position(1), (1, 2));
        assert_eq!(idx.position(3), (2, 1));
        assert_eq!(idx.position(6), (3, 1));
        assert_eq!(idx.position(8), (4, 2));
    }

    #[test]
    fn test_call_sites() {
        let src = "if (x) {\n  doStuff();\n  api.get (1);\n  obj\n    .chain();\n  await load(a);\n}";
        let masked = mask_non_code(src);
        let idx = LineIndex::new(&masked);
        let calls = call_sites(&masked, &idx);
        let names: Vec<(&str, bool)> = calls
            .iter()
            .map(|c| (c.name.as_str(), c.is_method))
            .collect();
        assert_eq!(
            names,
            vec![
                ("doStuff", false),
                ("get", true),
                ("chain", true),
                ("load", false)
            ]
        );
        assert_eq!((calls[0].line, calls[0].column), (2, 3));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("foo"));
        assert!(is_identifier("$el"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
