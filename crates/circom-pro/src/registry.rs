//! Circuit registry abstraction for testability.
//!
//! The orchestrator never talks to the circuit toolchain directly; it goes
//! through the [`CircuitRegistry`] capability so production code can use the
//! process-backed [`crate::toolchain::CircomToolchain`] while tests inject
//! [`mock::MockRegistry`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendFailure;

/// Result type for registry operations; each one is independently failable.
pub type BackendResult<T> = std::result::Result<T, BackendFailure>;

/// One circuit known to the registry snapshot.
///
/// `source_path` is workspace-relative as loaded from the manifest and is
/// rewritten to absolute form exactly once per orchestrator run via
/// [`CircuitRegistry::rebase_paths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitDescriptor {
    /// Unique id within one registry snapshot.
    pub id: String,
    /// Path to the circuit source file.
    pub source_path: PathBuf,
    /// Display name derived from the source file name.
    pub base_name: String,
}

impl CircuitDescriptor {
    pub fn new(id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let base_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        Self {
            id: id.into(),
            source_path,
            base_name,
        }
    }

    /// Rewrites `source_path` from workspace-relative to absolute form.
    /// Idempotent: an already absolute path is left untouched.
    pub fn rebase(&mut self, workspace_root: &Path) {
        if self.source_path.is_relative() {
            self.source_path = workspace_root.join(&self.source_path);
        }
    }
}

/// Capability interface over the external circuit toolchain.
///
/// A fresh registry snapshot is constructed (or injected) per orchestrator
/// invocation; circuit ids are only assumed unique within one snapshot.
#[async_trait]
pub trait CircuitRegistry: Send + Sync {
    /// All circuit ids known to this snapshot, in enumeration order.
    fn list_circuit_ids(&self) -> Vec<String>;

    /// Descriptor for one circuit id.
    fn circuit(&self, id: &str) -> BackendResult<CircuitDescriptor>;

    /// One-shot path normalization applied to every entry before use.
    fn rebase_paths(&mut self, workspace_root: &Path);

    /// Compiles one circuit.
    async fn compile(&self, id: &str) -> BackendResult<()>;

    /// Generates a proof for one circuit from the given input.
    async fn gen_proof(&self, id: &str, input: &Value) -> BackendResult<Value>;

    /// Verifies a proof for one circuit. `Ok(false)` is a well-formed but
    /// invalid proof; `Err` is a toolchain failure.
    async fn verify_proof(&self, id: &str, proof: &Value) -> BackendResult<bool>;
}

pub mod mock {
    //! Scriptable registry double for pipeline tests.
    //!
    //! Available for integration tests and external test crates.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// One recorded side-effecting registry call, for verification.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RegistryCall {
        Compile(String),
        GenProof(String),
        VerifyProof(String),
    }

    /// Mock registry with per-circuit scriptable outcomes.
    ///
    /// Records every compile/prove/verify invocation so tests can assert
    /// exactly which circuits were touched.
    pub struct MockRegistry {
        circuits: Vec<CircuitDescriptor>,
        compile_failures: HashMap<String, BackendFailure>,
        gen_proof_failures: HashMap<String, BackendFailure>,
        verify_failures: HashMap<String, BackendFailure>,
        verify_result: bool,
        calls: Mutex<Vec<RegistryCall>>,
    }

    impl MockRegistry {
        pub fn new() -> Self {
            Self {
                circuits: Vec::new(),
                compile_failures: HashMap::new(),
                gen_proof_failures: HashMap::new(),
                verify_failures: HashMap::new(),
                verify_result: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Adds a circuit to the snapshot, in enumeration order.
        pub fn with_circuit(mut self, id: &str, source_path: impl Into<PathBuf>) -> Self {
            self.circuits.push(CircuitDescriptor::new(id, source_path));
            self
        }

        /// Scripts a compile failure for one circuit id.
        pub fn fail_compile(mut self, id: &str, operator: &str, message: &str) -> Self {
            self.compile_failures
                .insert(id.to_string(), BackendFailure::new(operator, message));
            self
        }

        /// Scripts a proof-generation failure for one circuit id.
        pub fn fail_gen_proof(mut self, id: &str, operator: &str, message: &str) -> Self {
            self.gen_proof_failures
                .insert(id.to_string(), BackendFailure::new(operator, message));
            self
        }

        /// Scripts a verifier exception for one circuit id.
        pub fn fail_verify(mut self, id: &str, operator: &str, message: &str) -> Self {
            self.verify_failures
                .insert(id.to_string(), BackendFailure::new(operator, message));
            self
        }

        /// Sets the verification outcome for well-formed proofs.
        pub fn verify_outcome(mut self, ok: bool) -> Self {
            self.verify_result = ok;
            self
        }

        /// Returns the recorded side-effecting calls, in order.
        pub fn calls(&self) -> Vec<RegistryCall> {
            self.calls
                .lock()
                .expect("MockRegistry calls mutex poisoned")
                .clone()
        }

        fn record(&self, call: RegistryCall) {
            self.calls
                .lock()
                .expect("MockRegistry calls mutex poisoned")
                .push(call);
        }
    }

    impl Default for MockRegistry {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CircuitRegistry for MockRegistry {
        fn list_circuit_ids(&self) -> Vec<String> {
            self.circuits.iter().map(|c| c.id.clone()).collect()
        }

        fn circuit(&self, id: &str) -> BackendResult<CircuitDescriptor> {
            self.circuits
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| BackendFailure::new("registry", format!("unknown circuit {id}")))
        }

        fn rebase_paths(&mut self, workspace_root: &Path) {
            for circuit in &mut self.circuits {
                circuit.rebase(workspace_root);
            }
        }

        async fn compile(&self, id: &str) -> BackendResult<()> {
            self.record(RegistryCall::Compile(id.to_string()));
            match self.compile_failures.get(id) {
                Some(failure) => Err(failure.clone()),
                None => Ok(()),
            }
        }

        async fn gen_proof(&self, id: &str, input: &Value) -> BackendResult<Value> {
            self.record(RegistryCall::GenProof(id.to_string()));
            match self.gen_proof_failures.get(id) {
                Some(failure) => Err(failure.clone()),
                None => Ok(json!({ "circuit": id, "input": input })),
            }
        }

        async fn verify_proof(&self, id: &str, _proof: &Value) -> BackendResult<bool> {
            self.record(RegistryCall::VerifyProof(id.to_string()));
            match self.verify_failures.get(id) {
                Some(failure) => Err(failure.clone()),
                None => Ok(self.verify_result),
            }
        }
    }
}
