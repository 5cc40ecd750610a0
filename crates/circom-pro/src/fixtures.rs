//! Source-embedded proof fixtures and the entry-point marker.
//!
//! Circuits may carry default proof arguments as JSON inside tagged block
//! comments:
//!
//! ```text
//! /*
//!   proof.input = { "a": 3, "b": 5 }
//! */
//! ```
//!
//! `proof.verify` blocks carry a proof payload for verification the same
//! way. The entry-point marker `component main = ...;` decides whether a
//! source file is a standalone program at all.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Which fixture block to extract from a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    /// `proof.input = { ... }` — default proof-generation arguments.
    Input,
    /// `proof.verify = { ... }` — default proof payload for verification.
    Verify,
}

impl FixtureKind {
    pub fn tag(self) -> &'static str {
        match self {
            FixtureKind::Input => "proof.input",
            FixtureKind::Verify => "proof.verify",
        }
    }
}

fn main_component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*component\s+main\s*=[^;]+;").expect("main component regex")
    })
}

fn proof_input_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)/\*\s*\n\s*proof\.input\s*=\s*(\{.*?\})\s*\*/")
            .expect("proof.input fixture regex")
    })
}

fn proof_verify_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)/\*\s*\n\s*proof\.verify\s*=\s*(\{.*?\})\s*\*/")
            .expect("proof.verify fixture regex")
    })
}

/// True when the source declares a top-level `component main = ...;`,
/// i.e. it is a standalone program worth compiling and proving.
pub fn has_main_component(source: &str) -> bool {
    main_component_regex().is_match(source)
}

/// Extracts and parses one tagged fixture block from the source.
pub fn extract_proof_fixture(source: &str, kind: FixtureKind, path: &Path) -> Result<Value> {
    let re = match kind {
        FixtureKind::Input => proof_input_regex(),
        FixtureKind::Verify => proof_verify_regex(),
    };

    let raw = re
        .captures(source)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::FixtureMissing {
            tag: kind.tag(),
            path: path.to_path_buf(),
        })?;

    serde_json::from_str(&raw).map_err(|source| Error::FixtureInvalid {
        tag: kind.tag(),
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn main_component_detected_at_line_start() {
        assert!(has_main_component("component main = Multiplier(2);\n"));
        assert!(has_main_component(
            "// entry\n\n   component main = Multiplier(2);\n"
        ));
        assert!(has_main_component(
            "pragma circom 2.0.0;\ntemplate T() {}\ncomponent main = T();\n"
        ));
    }

    #[test]
    fn templates_without_main_are_not_programs() {
        assert!(!has_main_component(
            "pragma circom 2.0.0;\ntemplate Multiplier(n) { signal input a; }\n"
        ));
        // A mention inside a comment line is not a declaration.
        assert!(!has_main_component("// component main = T(); lives elsewhere\n"));
    }

    #[test]
    fn extracts_proof_input_block() {
        let source = r#"
template T() {}
component main = T();
/*
  proof.input = { "a": 3, "b": 5 }
*/
"#;
        let value =
            extract_proof_fixture(source, FixtureKind::Input, Path::new("t.circom")).unwrap();
        assert_eq!(value, json!({ "a": 3, "b": 5 }));
    }

    #[test]
    fn extracts_proof_verify_block() {
        let source = "/*\n proof.verify = { \"pi_a\": [1, 2] }\n*/\n";
        let value =
            extract_proof_fixture(source, FixtureKind::Verify, Path::new("t.circom")).unwrap();
        assert_eq!(value, json!({ "pi_a": [1, 2] }));
    }

    #[test]
    fn missing_fixture_is_reported_with_its_tag() {
        let err = extract_proof_fixture("component main = T();", FixtureKind::Input,
            Path::new("t.circom"))
        .unwrap_err();
        assert!(matches!(err, Error::FixtureMissing { tag: "proof.input", .. }));
    }

    #[test]
    fn malformed_json_is_reported_as_invalid() {
        let source = "/*\n proof.input = { a: }\n*/\n";
        let err = extract_proof_fixture(source, FixtureKind::Input, Path::new("t.circom"))
            .unwrap_err();
        assert!(matches!(err, Error::FixtureInvalid { tag: "proof.input", .. }));
    }
}
