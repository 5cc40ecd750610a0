//! Toolchain failure → diagnostic mapping.
//!
//! The external compiler reports failures as one message string with ANSI
//! color escapes, a formatted `error[CODE]: text` report and optionally a
//! quoted `"file":line:col` location. [`map_backend_failure`] scrapes that
//! into a single file-addressable [`Diagnostic`]; a malformed message falls
//! back to a sentinel code instead of failing the mapping.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::BackendFailure;

/// Sentinel code reported when the message carries no `error[CODE]:` report.
pub const SENTINEL_CODE: &str = "00000";

/// Fixed end column for diagnostic ranges; not derived from line length.
pub const END_COLUMN: u32 = 255;

/// Zero-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Half-open source range on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

/// One file-anchored compiler issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub range: Range,
    pub severity: Severity,
    pub related: Vec<String>,
}

fn ansi_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[\d;]+m").expect("ansi escape regex"))
}

fn error_report_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"error\[([^\]]+)\]\s*:\s*([^\n]+)").expect("error report regex"))
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)":(\d+):(\d+)"#).expect("location regex"))
}

/// Removes ANSI color escapes from a toolchain message.
pub fn strip_ansi(message: &str) -> String {
    ansi_escape_regex()
        .replace_all(message, "")
        .replace('\u{1b}', "")
}

/// Maps one toolchain failure to a diagnostic keyed by file path.
///
/// The returned path is the quoted location from the message when present,
/// otherwise `fallback_path` (the compiled circuit's own source). Callers
/// must route the diagnostic to the returned path, which may differ from
/// the file that was being compiled.
pub fn map_backend_failure(
    failure: &BackendFailure,
    fallback_path: &Path,
) -> (PathBuf, Diagnostic) {
    let message = strip_ansi(&failure.message);

    let (code, text) = match error_report_regex().captures(&message) {
        Some(caps) => (caps[1].to_string(), caps[2].trim_end().to_string()),
        None => (SENTINEL_CODE.to_string(), "Circom Compiler Error".to_string()),
    };

    let mut line = 1u32;
    let mut column = 1u32;
    let mut path = fallback_path.to_path_buf();
    if let Some(caps) = location_regex().captures(&message) {
        path = PathBuf::from(&caps[1]);
        line = caps[2].parse().unwrap_or(1);
        column = caps[3].parse().unwrap_or(1);
    }

    let diagnostic = Diagnostic {
        code,
        message: format!("{} - {}", failure.operator, text),
        range: Range {
            start: Position {
                line: line.saturating_sub(1),
                column: column.saturating_sub(1),
            },
            end: Position {
                line: line.saturating_sub(1),
                column: END_COLUMN,
            },
        },
        severity: Severity::Error,
        related: Vec::new(),
    };

    (path, diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(message: &str) -> BackendFailure {
        BackendFailure::new("compile", message)
    }

    #[test]
    fn maps_full_report_with_location() {
        let (path, diag) = map_backend_failure(
            &failure("\u{1b}[31merror[T1234]: something bad\n  \"foo.circom\":12:5"),
            Path::new("/ws/circuits/main.circom"),
        );

        assert_eq!(path, PathBuf::from("foo.circom"));
        assert_eq!(diag.code, "T1234");
        assert_eq!(diag.message, "compile - something bad");
        assert_eq!(diag.range.start, Position { line: 11, column: 4 });
        assert_eq!(diag.range.end, Position { line: 11, column: END_COLUMN });
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.related.is_empty());
    }

    #[test]
    fn malformed_message_falls_back_to_sentinel() {
        let (path, diag) = map_backend_failure(
            &failure("the compiler exploded for no stated reason"),
            Path::new("/ws/circuits/main.circom"),
        );

        assert_eq!(path, PathBuf::from("/ws/circuits/main.circom"));
        assert_eq!(diag.code, SENTINEL_CODE);
        assert_eq!(diag.message, "compile - Circom Compiler Error");
        assert_eq!(diag.range.start, Position { line: 0, column: 0 });
        assert_eq!(diag.range.end, Position { line: 0, column: END_COLUMN });
    }

    #[test]
    fn location_may_address_a_different_file() {
        let (path, _) = map_backend_failure(
            &failure("error[P1008]: include not found\n  \"lib/poseidon.circom\":3:1"),
            Path::new("/ws/circuits/main.circom"),
        );
        assert_eq!(path, PathBuf::from("lib/poseidon.circom"));
    }

    #[test]
    fn strips_ansi_color_escapes() {
        assert_eq!(
            strip_ansi("\u{1b}[1;31merror\u{1b}[0m: x"),
            "error: x".to_string()
        );
    }
}
