//! Run output reporting capability.
//!
//! The pipeline never renders anything itself: diagnostics and user-facing
//! notifications go through a [`Reporter`] so the language server can
//! publish to the editor, the CLI can print to the console, and tests can
//! record everything in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::diagnostics::Diagnostic;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Output sink for one orchestrator run.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Replaces the recorded diagnostics for one file. An empty list
    /// clears prior diagnostics for that file and no others.
    async fn set_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>);

    /// Surfaces a transient user-facing notification.
    async fn notify(&self, level: NoticeLevel, message: String);
}

/// In-memory reporter for tests and headless runs.
#[derive(Default)]
pub struct MemoryReporter {
    diagnostics: Mutex<HashMap<PathBuf, Vec<Diagnostic>>>,
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded diagnostics for one file; empty when cleared or never set.
    pub fn diagnostics_for(&self, path: &Path) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .expect("MemoryReporter diagnostics mutex poisoned")
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Files that currently have a (possibly empty) diagnostics entry.
    pub fn touched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .diagnostics
            .lock()
            .expect("MemoryReporter diagnostics mutex poisoned")
            .keys()
            .cloned()
            .collect();
        files.sort();
        files
    }

    /// All notifications surfaced so far, in order.
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices
            .lock()
            .expect("MemoryReporter notices mutex poisoned")
            .clone()
    }

    /// True when no diagnostics entry was ever written.
    pub fn is_empty(&self) -> bool {
        self.diagnostics
            .lock()
            .expect("MemoryReporter diagnostics mutex poisoned")
            .is_empty()
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn set_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>) {
        self.diagnostics
            .lock()
            .expect("MemoryReporter diagnostics mutex poisoned")
            .insert(path.to_path_buf(), diagnostics);
    }

    async fn notify(&self, level: NoticeLevel, message: String) {
        self.notices
            .lock()
            .expect("MemoryReporter notices mutex poisoned")
            .push((level, message));
    }
}
