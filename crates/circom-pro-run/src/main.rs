//! Circom Pro Run - drives the compile/proof pipeline from the console.
//!
//! `init` generates the `circuit.config.json` manifest by scanning the
//! workspace; `compile` runs the orchestrator against the circom/snarkjs
//! toolchain, with Ctrl-C wired to the run's cancellation token.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circom_pro::compiler::{CircomCompiler, CompileRequest, RunOutcome};
use circom_pro::diagnostics::Diagnostic;
use circom_pro::project::ProjectConfig;
use circom_pro::report::{NoticeLevel, Reporter};
use circom_pro::toolchain::CircomToolchain;

#[derive(Parser, Debug)]
#[command(name = "circom-pro-run")]
#[command(about = "Compile circom circuits, generate proofs and verify them")]
struct Cli {
    /// Workspace root containing circuit.config.json
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate circuit.config.json by scanning for *.circom sources
    Init {
        /// Project name written into the manifest
        #[arg(long, default_value = "MyCircuits")]
        name: String,
    },
    /// Compile circuits and run the proof pipeline
    Compile {
        /// Target a single circuit id
        #[arg(long)]
        circuit: Option<String>,

        /// Target every circuit built from this source file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Skip the compile step
        #[arg(long)]
        no_compile: bool,

        /// Skip proof generation
        #[arg(long)]
        no_prove: bool,

        /// Skip proof verification
        #[arg(long)]
        no_verify: bool,

        /// Explicit proof input as inline JSON (overrides the proof.input
        /// fixture)
        #[arg(long)]
        input: Option<String>,
    },
}

/// Prints diagnostics and notifications to the console.
struct ConsoleReporter;

#[async_trait::async_trait]
impl Reporter for ConsoleReporter {
    async fn set_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>) {
        for diagnostic in &diagnostics {
            eprintln!(
                "{}:{}:{} error[{}]: {}",
                path.display(),
                diagnostic.range.start.line + 1,
                diagnostic.range.start.column + 1,
                diagnostic.code,
                diagnostic.message
            );
        }
    }

    async fn notify(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Info => info!("{message}"),
            NoticeLevel::Warning => tracing::warn!("{message}"),
            NoticeLevel::Error => error!("{message}"),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circom_pro=info,circom_pro_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let workspace = match cli.workspace.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            error!("invalid workspace {}: {e}", cli.workspace.display());
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Init { name } => init(&workspace, &name),
        Command::Compile {
            circuit,
            file,
            no_compile,
            no_prove,
            no_verify,
            input,
        } => compile(&workspace, circuit, file, no_compile, no_prove, no_verify, input).await,
    }
}

fn init(workspace: &Path, name: &str) {
    let config = ProjectConfig::scan(name, workspace);
    info!(
        circuits = config.build.circuits.len(),
        "scanned workspace for *.circom sources"
    );

    match config.write_new(workspace) {
        Ok(true) => info!("👍 \"circuit.config.json\" created in the workspace."),
        Ok(false) => info!(
            "🤷 \"circuit.config.json\" already exists in the workspace. \
             rename or remove the file to autogenerate a new one."
        ),
        Err(e) => {
            error!("failed to write circuit.config.json: {e}");
            std::process::exit(1);
        }
    }
}

async fn compile(
    workspace: &Path,
    circuit: Option<String>,
    file: Option<PathBuf>,
    no_compile: bool,
    no_prove: bool,
    no_verify: bool,
    input: Option<String>,
) {
    let mut registry = match CircomToolchain::from_workspace(workspace) {
        Ok(registry) => registry,
        Err(e) => {
            error!("failed to load circuit.config.json: {e}");
            std::process::exit(1);
        }
    };

    let proof_input = match input.as_deref().map(serde_json::from_str) {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            error!("invalid --input json: {e}");
            std::process::exit(1);
        }
        None => None,
    };

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let request = CompileRequest {
        circuit_id: circuit,
        source_path: file.map(|f| f.canonicalize().unwrap_or(f)),
        cancellation: token,
        compile: !no_compile,
        generate_proof: !no_prove,
        proof_input,
        verify_proof: !no_verify,
        proof_data: None,
    };

    let compiler = CircomCompiler::new(workspace, std::sync::Arc::new(ConsoleReporter));
    match compiler.run(&mut registry, request).await {
        Ok(RunOutcome::Completed) => info!("🏁 done"),
        Ok(RunOutcome::Cancelled) => info!("🐟 run cancelled"),
        Err(e) => {
            error!("compile run failed: {e}");
            std::process::exit(1);
        }
    }
}
