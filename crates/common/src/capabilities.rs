//! Versioned capability set: names that resolve without an import or a local
//! definition.
//!
//! Injected into the Symbol Table Builder and the undefined-symbol detector
//! instead of living in a process-wide constant, so tests can swap in a
//! minimal set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Language builtins shipped with capability set v1.
const BUILTINS_V1: &[&str] = &[
    "Array",
    "ArrayBuffer",
    "BigInt",
    "Boolean",
    "Buffer",
    "DataView",
    "Date",
    "Error",
    "EvalError",
    "Float32Array",
    "Float64Array",
    "Function",
    "Int8Array",
    "Int16Array",
    "Int32Array",
    "Intl",
    "JSON",
    "Map",
    "Math",
    "Number",
    "Object",
    "Promise",
    "Proxy",
    "RangeError",
    "ReferenceError",
    "Reflect",
    "RegExp",
    "Set",
    "String",
    "Symbol",
    "SyntaxError",
    "TypeError",
    "URIError",
    "URL",
    "URLSearchParams",
    "Uint8Array",
    "Uint16Array",
    "Uint32Array",
    "WeakMap",
    "WeakSet",
    "alert",
    "atob",
    "btoa",
    "cancelAnimationFrame",
    "clearInterval",
    "clearTimeout",
    "console",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "eval",
    "fetch",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "queueMicrotask",
    "requestAnimationFrame",
    "require",
    "setImmediate",
    "setInterval",
    "setTimeout",
    "structuredClone",
];

/// Framework hooks and test-runner globals shipped with capability set v1.
const COMMON_GLOBALS_V1: &[&str] = &[
    "afterAll",
    "afterEach",
    "beforeAll",
    "beforeEach",
    "describe",
    "expect",
    "it",
    "jest",
    "test",
    "vi",
    "useCallback",
    "useContext",
    "useEffect",
    "useLayoutEffect",
    "useMemo",
    "useReducer",
    "useRef",
    "useState",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySet {
    pub version: u32,
    pub builtins: BTreeSet<String>,
    pub common_globals: BTreeSet<String>,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::v1()
    }
}

impl CapabilitySet {
    /// The stock set: JS/TS builtins plus common framework and test globals.
    pub fn v1() -> Self {
        Self {
            version: 1,
            builtins: BUILTINS_V1.iter().map(|s| s.to_string()).collect(),
            common_globals: COMMON_GLOBALS_V1.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// An empty set carrying only the given builtins.
    ///
    /// # Examples
    /// ```
    /// # use common::CapabilitySet;
    /// let caps = CapabilitySet::minimal(["print"]);
    /// assert!(caps.is_builtin("print"));
    /// assert!(!caps.resolves("console"));
    /// ```
    pub fn minimal<I, S>(builtins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version: 0,
            builtins: builtins.into_iter().map(Into::into).collect(),
            common_globals: BTreeSet::new(),
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn is_common_global(&self, name: &str) -> bool {
        self.common_globals.contains(name)
    }

    /// `true` if `name` needs no import or definition.
    pub fn resolves(&self, name: &str) -> bool {
        self.is_builtin(name) || self.is_common_global(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_contents() {
        let caps = CapabilitySet::v1();
        assert_eq!(caps.version, 1);
        assert!(caps.is_builtin("console"));
        assert!(caps.is_builtin("setTimeout"));
        assert!(caps.is_common_global("describe"));
        assert!(!caps.is_builtin("describe"));
        assert!(!caps.resolves("doStuff"));
    }

    #[test]
    fn test_minimal_has_no_globals() {
        let caps = CapabilitySet::minimal(Vec::<String>::new());
        assert!(!caps.resolves("console"));
        assert!(!caps.resolves("it"));
    }
}
