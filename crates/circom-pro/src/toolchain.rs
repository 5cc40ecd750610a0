//! Process-backed circuit registry driving `circom` and `snarkjs`.
//!
//! Builds its snapshot from the `circuit.config.json` manifest and
//! implements each registry operation by spawning the external tool.
//! Tool failures are captured as [`BackendFailure`] with the raw console
//! output as the message (ANSI escapes and all), tagged with the failing
//! phase as the operator; the diagnostics scrape takes it from there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::BackendFailure;
use crate::project::ProjectConfig;
use crate::registry::{BackendResult, CircuitDescriptor, CircuitRegistry};

struct ToolchainCircuit {
    descriptor: CircuitDescriptor,
    compilation_mode: String,
}

/// Registry snapshot over the external circom/snarkjs toolchain.
///
/// Proof generation expects a proving key at `<outputDir>/<id>.zkey` and
/// verification a key at `<outputDir>/<id>.vkey.json`; producing those is
/// part of the project's trusted setup, outside this tool.
pub struct CircomToolchain {
    output_dir: PathBuf,
    circuits: Vec<ToolchainCircuit>,
}

impl CircomToolchain {
    /// Builds a snapshot from an already loaded manifest. Paths stay
    /// manifest-relative until the orchestrator rebases them.
    pub fn new(config: &ProjectConfig) -> Self {
        let input_dir = PathBuf::from(&config.build.input_dir);
        let circuits = config
            .build
            .circuits
            .iter()
            .map(|entry| ToolchainCircuit {
                descriptor: CircuitDescriptor::new(&entry.c_id, input_dir.join(&entry.file_name)),
                compilation_mode: entry.compilation_mode.clone(),
            })
            .collect();
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            circuits,
        }
    }

    /// Loads the workspace manifest and builds a snapshot from it.
    pub fn from_workspace(workspace_root: &Path) -> crate::Result<Self> {
        Ok(Self::new(&ProjectConfig::load(workspace_root)?))
    }

    fn find(&self, id: &str) -> BackendResult<&ToolchainCircuit> {
        self.circuits
            .iter()
            .find(|c| c.descriptor.id == id)
            .ok_or_else(|| BackendFailure::new("registry", format!("unknown circuit {id}")))
    }

    fn artifact(&self, name: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Witness-generator wasm emitted by `circom --wasm`.
    fn wasm_path(&self, id: &str) -> PathBuf {
        self.artifact(format!("{id}_js")).join(format!("{id}.wasm"))
    }

    async fn write_json(&self, path: &Path, value: &Value, operator: &str) -> BackendResult<()> {
        let raw = value.to_string();
        tokio::fs::write(path, raw).await.map_err(|e| {
            BackendFailure::new(operator, format!("failed to write {}: {e}", path.display()))
        })
    }

    async fn read_json(&self, path: &Path, operator: &str) -> BackendResult<Value> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            BackendFailure::new(operator, format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BackendFailure::new(operator, format!("invalid json in {}: {e}", path.display()))
        })
    }
}

/// Runs one external tool to completion, capturing its console output.
async fn run_tool(
    program: &str,
    args: &[&str],
    operator: &str,
) -> BackendResult<std::process::Output> {
    debug!(%program, ?args, "running toolchain command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| BackendFailure::new(operator, format!("failed to spawn {program}: {e}")))?;

    if output.status.success() {
        Ok(output)
    } else {
        let mut message = String::from_utf8_lossy(&output.stderr).into_owned();
        message.push_str(&String::from_utf8_lossy(&output.stdout));
        Err(BackendFailure::new(operator, message))
    }
}

#[async_trait]
impl CircuitRegistry for CircomToolchain {
    fn list_circuit_ids(&self) -> Vec<String> {
        self.circuits.iter().map(|c| c.descriptor.id.clone()).collect()
    }

    fn circuit(&self, id: &str) -> BackendResult<CircuitDescriptor> {
        self.find(id).map(|c| c.descriptor.clone())
    }

    fn rebase_paths(&mut self, workspace_root: &Path) {
        if self.output_dir.is_relative() {
            self.output_dir = workspace_root.join(&self.output_dir);
        }
        for circuit in &mut self.circuits {
            circuit.descriptor.rebase(workspace_root);
        }
    }

    async fn compile(&self, id: &str) -> BackendResult<()> {
        let circuit = self.find(id)?;
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            BackendFailure::new(
                "compile",
                format!("failed to create {}: {e}", self.output_dir.display()),
            )
        })?;

        let source = circuit.descriptor.source_path.display().to_string();
        let out = self.output_dir.display().to_string();
        let mut args = vec![source.as_str(), "--r1cs", "--output", out.as_str()];
        match circuit.compilation_mode.as_str() {
            "c" => args.push("--c"),
            _ => args.push("--wasm"),
        }

        run_tool("circom", &args, "compile").await?;
        info!(circuit = %circuit.descriptor.base_name, "circuit compiled");
        Ok(())
    }

    async fn gen_proof(&self, id: &str, input: &Value) -> BackendResult<Value> {
        let circuit = self.find(id)?;
        let input_path = self.artifact(format!("{id}.input.json"));
        let proof_path = self.artifact(format!("{id}.proof.json"));
        let public_path = self.artifact(format!("{id}.public.json"));
        let zkey_path = self.artifact(format!("{id}.zkey"));
        let wasm_path = self.wasm_path(id);

        self.write_json(&input_path, input, "genProof").await?;

        let input_arg = input_path.display().to_string();
        let wasm_arg = wasm_path.display().to_string();
        let zkey_arg = zkey_path.display().to_string();
        let proof_arg = proof_path.display().to_string();
        let public_arg = public_path.display().to_string();
        run_tool(
            "snarkjs",
            &[
                "groth16",
                "fullprove",
                input_arg.as_str(),
                wasm_arg.as_str(),
                zkey_arg.as_str(),
                proof_arg.as_str(),
                public_arg.as_str(),
            ],
            "genProof",
        )
        .await?;

        let proof = self.read_json(&proof_path, "genProof").await?;
        let public_signals = self.read_json(&public_path, "genProof").await?;
        info!(circuit = %circuit.descriptor.base_name, "proof generated");
        Ok(json!({ "proof": proof, "publicSignals": public_signals }))
    }

    async fn verify_proof(&self, id: &str, proof: &Value) -> BackendResult<bool> {
        let circuit = self.find(id)?;
        let vkey_path = self.artifact(format!("{id}.vkey.json"));
        let proof_path = self.artifact(format!("{id}.verify.proof.json"));
        let public_path = self.artifact(format!("{id}.verify.public.json"));

        let payload = proof.get("proof").cloned().unwrap_or_else(|| proof.clone());
        let public_signals = proof.get("publicSignals").cloned().unwrap_or(Value::Null);
        self.write_json(&proof_path, &payload, "verifyProof").await?;
        self.write_json(&public_path, &public_signals, "verifyProof")
            .await?;

        let vkey_arg = vkey_path.display().to_string();
        let public_arg = public_path.display().to_string();
        let proof_arg = proof_path.display().to_string();
        let result = run_tool(
            "snarkjs",
            &[
                "groth16",
                "verify",
                vkey_arg.as_str(),
                public_arg.as_str(),
                proof_arg.as_str(),
            ],
            "verifyProof",
        )
        .await;

        match result {
            Ok(_) => {
                info!(circuit = %circuit.descriptor.base_name, "proof verified");
                Ok(true)
            }
            // snarkjs exits non-zero for a well-formed but invalid proof.
            Err(failure) if failure.message.contains("Invalid proof") => Ok(false),
            Err(failure) => Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::CircuitEntry;

    fn config() -> ProjectConfig {
        let mut config = ProjectConfig::new("P");
        config.build.input_dir = "./circuits".to_string();
        config.build.circuits.push(CircuitEntry {
            c_id: "mul".to_string(),
            file_name: "sub/mul.circom".to_string(),
            compilation_mode: "wasm".to_string(),
        });
        config
    }

    #[test]
    fn snapshot_joins_input_dir_and_file_name() {
        let toolchain = CircomToolchain::new(&config());
        let circuit = toolchain.circuit("mul").expect("circuit");
        assert_eq!(circuit.source_path, PathBuf::from("./circuits/sub/mul.circom"));
        assert_eq!(circuit.base_name, "mul.circom");
    }

    #[test]
    fn rebase_anchors_sources_and_output_dir() {
        let mut toolchain = CircomToolchain::new(&config());
        toolchain.rebase_paths(Path::new("/ws"));
        let circuit = toolchain.circuit("mul").expect("circuit");
        assert_eq!(circuit.source_path, PathBuf::from("/ws/./circuits/sub/mul.circom"));
        assert_eq!(toolchain.wasm_path("mul"), PathBuf::from("/ws/./out/mul_js/mul.wasm"));
    }

    #[test]
    fn unknown_id_is_a_registry_failure() {
        let toolchain = CircomToolchain::new(&config());
        let failure = toolchain.circuit("nope").unwrap_err();
        assert_eq!(failure.operator, "registry");
    }
}
