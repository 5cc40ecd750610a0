//! Compile/proof orchestration pipeline.
//!
//! One [`CompileRequest`] resolves to a set of circuit ids, and each
//! resolved circuit runs through compile → prove → verify in sequence.
//! Cancellation is checked between steps, never mid-circuit: a newer
//! triggering event cancels the in-flight run's token and the run exits at
//! its next checkpoint (debounce-by-cancellation, no queue, no retry).
//!
//! # Pipeline order, per circuit
//! 1. Cancellation check — abort the whole run.
//! 2. Skip rule — no `component main = ...;` means nothing to build.
//! 3. Compile — success clears the file's diagnostics, failure records
//!    mapped diagnostics; proof/verify still run afterwards.
//! 4. Cancellation check.
//! 5. Generate proof — explicit input or `proof.input` fixture.
//! 6. Cancellation check.
//! 7. Verify proof — supplied/generated proof or `proof.verify` fixture;
//!    the outcome is a transient notification, never a diagnostic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::diagnostics::map_backend_failure;
use crate::error::{Error, Result};
use crate::fixtures::{self, FixtureKind};
use crate::registry::CircuitRegistry;
use crate::report::{NoticeLevel, Reporter};

/// One runs-to-completion slot: a run owns the process working directory
/// for its whole duration, so runs are serialized process-wide.
static WORKDIR_LOCK: Mutex<()> = Mutex::const_new(());

/// One compile-or-proof request.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Target a single circuit by id.
    pub circuit_id: Option<String>,
    /// Target every circuit built from this source file.
    pub source_path: Option<PathBuf>,
    /// Cooperative cancellation handle; checked at circuit boundaries.
    pub cancellation: CancellationToken,
    pub compile: bool,
    pub generate_proof: bool,
    /// Explicit proof input; falls back to the `proof.input` fixture.
    pub proof_input: Option<Value>,
    pub verify_proof: bool,
    /// Explicit proof payload; falls back to the generated proof, then the
    /// `proof.verify` fixture.
    pub proof_data: Option<Value>,
}

impl CompileRequest {
    /// A request with the default steps enabled and no target selector
    /// (resolves to every known circuit).
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            circuit_id: None,
            source_path: None,
            cancellation,
            compile: true,
            generate_proof: true,
            proof_input: None,
            verify_proof: true,
            proof_data: None,
        }
    }

    /// A request targeting every circuit built from one source file.
    pub fn for_file(source_path: impl Into<PathBuf>, cancellation: CancellationToken) -> Self {
        Self {
            source_path: Some(source_path.into()),
            ..Self::new(cancellation)
        }
    }

    /// A request targeting one circuit id.
    pub fn for_circuit(circuit_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            circuit_id: Some(circuit_id.into()),
            ..Self::new(cancellation)
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every resolved circuit was processed (failures included; nothing in
    /// the pipeline is fatal to the run).
    Completed,
    /// A newer event superseded this run; it stopped at a checkpoint.
    Cancelled,
}

/// The compile/proof orchestrator for one workspace.
pub struct CircomCompiler {
    workspace_root: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl CircomCompiler {
    pub fn new(workspace_root: impl Into<PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            reporter,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Runs one request against a registry snapshot.
    ///
    /// The working directory is redirected to the workspace root for the
    /// duration of the call and restored afterwards; per-step failures are
    /// caught individually so restoration always executes.
    pub async fn run(
        &self,
        registry: &mut dyn CircuitRegistry,
        request: CompileRequest,
    ) -> Result<RunOutcome> {
        let _serial = WORKDIR_LOCK.lock().await;
        let _cwd = WorkdirGuard::enter(&self.workspace_root)?;

        // Fix circuit paths once and for all, before any matching or
        // compilation side effect.
        registry.rebase_paths(&self.workspace_root);

        let targets = resolve_targets(registry, &request);
        debug!(targets = ?targets, "resolved compile targets");

        for id in targets {
            if request.cancellation.is_cancelled() {
                debug!("<debounce>");
                return Ok(RunOutcome::Cancelled);
            }

            let circuit = match registry.circuit(&id) {
                Ok(circuit) => circuit,
                Err(failure) => {
                    warn!(circuit = %id, %failure, "circuit lookup failed");
                    continue;
                }
            };

            let source = match tokio::fs::read_to_string(&circuit.source_path).await {
                Ok(source) => source,
                Err(e) => {
                    error!(circuit = %circuit.base_name, path = %circuit.source_path.display(),
                        "failed to read circuit source: {e}");
                    continue;
                }
            };

            if !fixtures::has_main_component(&source) {
                info!(circuit = %circuit.base_name, "compiling circuit ... skipped (no main)");
                continue;
            }

            if request.cancellation.is_cancelled() {
                debug!("<debounce>");
                return Ok(RunOutcome::Cancelled);
            }

            if request.compile {
                info!(circuit = %circuit.base_name, "compiling circuit ...");
                match registry.compile(&id).await {
                    Ok(()) => {
                        // A clean compile clears this file's prior issues.
                        self.reporter
                            .set_diagnostics(&circuit.source_path, Vec::new())
                            .await;
                    }
                    Err(failure) => {
                        error!(circuit = %circuit.base_name, %failure, "compile failed");
                        let (path, diagnostic) =
                            map_backend_failure(&failure, &circuit.source_path);
                        self.reporter.set_diagnostics(&path, vec![diagnostic]).await;
                        // Inherited policy: a failed compile does not gate
                        // the proof/verify steps for this circuit.
                    }
                }
            }

            if request.cancellation.is_cancelled() {
                debug!("<debounce>");
                return Ok(RunOutcome::Cancelled);
            }

            let mut proof = request.proof_data.clone();

            if request.generate_proof {
                let input = match &request.proof_input {
                    Some(input) => input.clone(),
                    None => match fixtures::extract_proof_fixture(
                        &source,
                        FixtureKind::Input,
                        &circuit.source_path,
                    ) {
                        Ok(input) => input,
                        Err(e) => {
                            error!(circuit = %circuit.base_name, "invalid proof input: {e}");
                            self.reporter
                                .notify(
                                    NoticeLevel::Error,
                                    format!("🔴 [{}] invalid proof input: {e}", circuit.base_name),
                                )
                                .await;
                            continue;
                        }
                    },
                };

                info!(circuit = %circuit.base_name, %input, "generating proof for input");
                match registry.gen_proof(&id, &input).await {
                    Ok(generated) => {
                        info!(circuit = %circuit.base_name, "proof generated");
                        proof = Some(generated);
                    }
                    Err(failure) => {
                        error!(circuit = %circuit.base_name, %failure, "proof generation failed");
                        self.reporter
                            .notify(
                                NoticeLevel::Error,
                                format!(
                                    "🔴 [{}] exception generating proof for input: {input}",
                                    circuit.base_name
                                ),
                            )
                            .await;
                        continue;
                    }
                }
            }

            if request.cancellation.is_cancelled() {
                debug!("<debounce>");
                return Ok(RunOutcome::Cancelled);
            }

            if request.verify_proof {
                let proof = match proof {
                    Some(proof) => proof,
                    None => match fixtures::extract_proof_fixture(
                        &source,
                        FixtureKind::Verify,
                        &circuit.source_path,
                    ) {
                        Ok(proof) => proof,
                        Err(e) => {
                            error!(circuit = %circuit.base_name, "invalid proof data: {e}");
                            self.reporter
                                .notify(
                                    NoticeLevel::Error,
                                    format!("🔴 [{}] invalid proof data: {e}", circuit.base_name),
                                )
                                .await;
                            continue;
                        }
                    },
                };

                match registry.verify_proof(&id, &proof).await {
                    Ok(true) => {
                        info!(circuit = %circuit.base_name, "proof verification successful");
                        self.reporter
                            .notify(
                                NoticeLevel::Info,
                                format!(
                                    "✔️ [{}] proof verification successful!",
                                    circuit.base_name
                                ),
                            )
                            .await;
                    }
                    Ok(false) => {
                        warn!(circuit = %circuit.base_name, "proof verification failed");
                        self.reporter
                            .notify(
                                NoticeLevel::Error,
                                format!("🔴 [{}] proof verification failed!", circuit.base_name),
                            )
                            .await;
                    }
                    Err(failure) => {
                        error!(circuit = %circuit.base_name, %failure, "proof verification error");
                        self.reporter
                            .notify(
                                NoticeLevel::Error,
                                format!(
                                    "🔴 [{}] exception verifying proof: {proof}",
                                    circuit.base_name
                                ),
                            )
                            .await;
                        continue;
                    }
                }
            }
        }

        info!("done compiling circuit 🏁");
        Ok(RunOutcome::Completed)
    }
}

/// Resolves the circuit ids a request addresses.
///
/// Runs exactly once per orchestrator invocation, after path rebasing and
/// before any compilation side effect:
/// - a known `circuit_id` is included;
/// - every circuit whose resolved source path equals `source_path` is
///   included (one file may back several circuits);
/// - with no circuit id given and nothing matched, fall back to all known
///   ids — the result is never empty in that case;
/// - set semantics, preserving registry enumeration order.
pub fn resolve_targets(registry: &dyn CircuitRegistry, request: &CompileRequest) -> Vec<String> {
    let all = registry.list_circuit_ids();
    let mut targets: IndexSet<String> = IndexSet::new();

    if let Some(id) = &request.circuit_id {
        if all.iter().any(|known| known == id) {
            targets.insert(id.clone());
        }
    }

    if let Some(path) = &request.source_path {
        for id in &all {
            if let Ok(circuit) = registry.circuit(id) {
                if &circuit.source_path == path {
                    targets.insert(id.clone());
                }
            }
        }
    }

    if targets.is_empty() && request.circuit_id.is_none() {
        targets.extend(all);
    }

    targets.into_iter().collect()
}

/// Scoped working-directory redirection, restored on drop.
struct WorkdirGuard {
    previous: PathBuf,
}

impl WorkdirGuard {
    fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        std::env::set_current_dir(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self { previous })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!(path = %self.previous.display(), "failed to restore working directory: {e}");
        }
    }
}
