//! Circom Language Server
//!
//! Language support for circom circuit sources:
//!
//! - **Hover**: documentation for language builtins
//! - **Unsafe-assignment hints**: every `<--` / `-->` occurrence is
//!   surfaced as a hint diagnostic
//! - **Compile on save**: each save cancels any in-flight compile run and
//!   starts a fresh one for the saved file (debounce-by-cancellation);
//!   compile failures are published as error diagnostics
//! - **Project bootstrap**: prompts once per session to generate
//!   `circuit.config.json` when missing

mod builtins;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circom_pro::compiler::{CircomCompiler, CompileRequest};
use circom_pro::diagnostics::{
    Diagnostic as CoreDiagnostic, Severity as CoreSeverity,
};
use circom_pro::project::ProjectConfig;
use circom_pro::report::{NoticeLevel, Reporter};
use circom_pro::toolchain::CircomToolchain;

/// Shared diagnostics state: compile results merged with on-the-fly
/// unsafe-assignment hints before publishing.
struct DiagnosticsHub {
    client: Client,
    documents: DashMap<Url, String>,
    compile: DashMap<PathBuf, Vec<CoreDiagnostic>>,
}

impl DiagnosticsHub {
    /// Publishes the combined diagnostics for one file.
    async fn publish(&self, uri: Url) {
        let mut diagnostics = Vec::new();

        if let Some(text) = self.documents.get(&uri) {
            diagnostics.extend(unsafe_assignment_hints(&text));
        }

        if let Ok(path) = uri.to_file_path() {
            if let Some(compile) = self.compile.get(&path) {
                diagnostics.extend(compile.iter().map(to_lsp_diagnostic));
            }
        }

        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

#[async_trait::async_trait]
impl Reporter for DiagnosticsHub {
    async fn set_diagnostics(&self, path: &Path, diagnostics: Vec<CoreDiagnostic>) {
        self.compile.insert(path.to_path_buf(), diagnostics);
        if let Ok(uri) = Url::from_file_path(path) {
            self.publish(uri).await;
        }
    }

    async fn notify(&self, level: NoticeLevel, message: String) {
        let typ = match level {
            NoticeLevel::Info => MessageType::INFO,
            NoticeLevel::Warning => MessageType::WARNING,
            NoticeLevel::Error => MessageType::ERROR,
        };
        self.client.show_message(typ, message).await;
    }
}

/// The circom language server backend.
struct Backend {
    client: Client,
    /// Workspace root, from `initialize`.
    workspace_root: RwLock<Option<PathBuf>>,
    hub: Arc<DiagnosticsHub>,
    /// Debounce slot: the token of the in-flight compile run. Each new
    /// trigger cancels it and installs a fresh one.
    compile_cancel: Mutex<CancellationToken>,
    /// One-shot suppression for the config-creation prompt, per session.
    config_prompted: AtomicBool,
}

impl Backend {
    fn new(client: Client) -> Self {
        let hub = Arc::new(DiagnosticsHub {
            client: client.clone(),
            documents: DashMap::new(),
            compile: DashMap::new(),
        });
        Self {
            client,
            workspace_root: RwLock::new(None),
            hub,
            compile_cancel: Mutex::new(CancellationToken::new()),
            config_prompted: AtomicBool::new(false),
        }
    }

    /// Makes sure the workspace carries a `circuit.config.json`, prompting
    /// the user to create one at most once per session.
    ///
    /// Returns false when there is no manifest and none was created; the
    /// triggering action is then skipped silently.
    async fn ensure_project_config(&self, root: &Path) -> bool {
        if ProjectConfig::exists(root) {
            return true;
        }
        if self.config_prompted.swap(true, Ordering::SeqCst) {
            return false;
        }

        let create = MessageActionItem {
            title: "Create".to_string(),
            properties: Default::default(),
        };
        let abort = MessageActionItem {
            title: "Abort".to_string(),
            properties: Default::default(),
        };
        let choice = self
            .client
            .show_message_request(
                MessageType::INFO,
                "Project configuration file `circuit.config.json` not found. Create it?"
                    .to_string(),
                Some(vec![create, abort]),
            )
            .await;

        if !matches!(choice, Ok(Some(ref item)) if item.title == "Create") {
            return false;
        }

        let config = ProjectConfig::scan("MyCircuits", root);
        match config.write_new(root) {
            Ok(true) => {
                self.client
                    .show_message(
                        MessageType::INFO,
                        "👍 \"circuit.config.json\" created in the workspace.",
                    )
                    .await;
                true
            }
            Ok(false) => {
                self.client
                    .show_message(
                        MessageType::WARNING,
                        "🤷 \"circuit.config.json\" already exists in the workspace.",
                    )
                    .await;
                true
            }
            Err(e) => {
                self.client
                    .show_message(
                        MessageType::ERROR,
                        format!("Failed to create \"circuit.config.json\": {e}"),
                    )
                    .await;
                false
            }
        }
    }

    /// Cancels the in-flight run, installs a fresh token, and starts a new
    /// compile run for one saved file.
    async fn compile_on_save(&self, source_path: PathBuf) {
        let Some(root) = self.workspace_root.read().await.clone() else {
            return;
        };
        if !self.ensure_project_config(&root).await {
            return;
        }

        let token = {
            let mut slot = self.compile_cancel.lock().await;
            slot.cancel();
            *slot = CancellationToken::new();
            slot.clone()
        };

        let request = CompileRequest::for_file(source_path, token);
        let reporter: Arc<dyn Reporter> = self.hub.clone();
        tokio::spawn(async move {
            let compiler = CircomCompiler::new(&root, reporter);
            match CircomToolchain::from_workspace(&root) {
                Ok(mut registry) => {
                    if let Err(e) = compiler.run(&mut registry, request).await {
                        error!("compile run failed: {e}");
                    }
                }
                Err(e) => error!("failed to load circuit.config.json: {e}"),
            }
        });
    }
}

/// Converts an LSP column (UTF-16 code units) to a byte offset in `line`,
/// clamped to the line end and always on a char boundary.
fn utf16_col_to_byte(line: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (idx, ch) in line.char_indices() {
        if units >= character {
            return idx;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

/// Converts a byte offset in `line` to an LSP column (UTF-16 code units).
fn byte_to_utf16_col(line: &str, byte_idx: usize) -> u32 {
    line[..byte_idx].chars().map(|c| c.len_utf16() as u32).sum()
}

/// Hint diagnostics for every `<--` / `-->` assignment in the source.
fn unsafe_assignment_hints(text: &str) -> Vec<Diagnostic> {
    let mut hints = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        for (byte_col, arrow) in line.match_indices("<--").chain(line.match_indices("-->")) {
            let col = byte_to_utf16_col(line, byte_col);
            hints.push(Diagnostic {
                range: Range {
                    start: Position::new(line_idx as u32, col),
                    end: Position::new(line_idx as u32, col + arrow.len() as u32),
                },
                severity: Some(DiagnosticSeverity::HINT),
                source: Some("circom-pro".to_string()),
                message: "❗ potentially unsafe signal assignment".to_string(),
                ..Default::default()
            });
        }
    }
    hints
}

fn to_lsp_diagnostic(diagnostic: &CoreDiagnostic) -> Diagnostic {
    Diagnostic {
        range: Range {
            start: Position::new(diagnostic.range.start.line, diagnostic.range.start.column),
            end: Position::new(diagnostic.range.end.line, diagnostic.range.end.column),
        },
        severity: Some(match diagnostic.severity {
            CoreSeverity::Error => DiagnosticSeverity::ERROR,
            CoreSeverity::Warning => DiagnosticSeverity::WARNING,
            CoreSeverity::Hint => DiagnosticSeverity::HINT,
        }),
        code: Some(NumberOrString::String(diagnostic.code.clone())),
        source: Some("Circom Compiler".to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

/// The word (alphanumeric/underscore run) under the cursor.
fn word_at_position(text: &str, position: Position) -> Option<String> {
    let line = text.lines().nth(position.line as usize)?;
    let col = utf16_col_to_byte(line, position.character);

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = line[..col]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(col);
    let end = line[col..]
        .char_indices()
        .find(|&(_, c)| !is_word(c))
        .map(|(i, _)| col + i)
        .unwrap_or(line.len());

    if start >= end {
        return None;
    }
    Some(line[start..end].to_string())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri)
            .and_then(|uri| uri.to_file_path().ok());
        *self.workspace_root.write().await = root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "circom-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(
                MessageType::INFO,
                "👑 (circom-pro) circom language server initialized",
            )
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.hub
            .documents
            .insert(uri.clone(), params.text_document.text);
        self.hub.publish(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // FULL sync: one change carrying the whole document.
        if let Some(change) = params.content_changes.into_iter().next() {
            self.hub.documents.insert(uri.clone(), change.text);
            self.hub.publish(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.hub.documents.remove(&uri);
        if let Ok(path) = uri.to_file_path() {
            self.hub.compile.remove(&path);
        }
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        if !path.extension().is_some_and(|ext| ext == "circom") {
            return;
        }
        self.compile_on_save(path).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let doc = match self.hub.documents.get(uri) {
            Some(doc) => doc.clone(),
            None => return Ok(None),
        };

        let Some(word) = word_at_position(&doc, position) else {
            return Ok(None);
        };

        Ok(builtins::lookup(&word).map(|builtin| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: builtins::format_hover_markdown(builtin),
            }),
            range: None,
        }))
    }
}

#[tokio::main]
async fn main() {
    // Stdout carries the LSP transport; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circom_lsp=info,circom_pro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_under_cursor_is_extracted() {
        let text = "signal input a;\ncomponent main = T();\n";
        assert_eq!(
            word_at_position(text, Position::new(0, 2)),
            Some("signal".to_string())
        );
        assert_eq!(
            word_at_position(text, Position::new(1, 10)),
            Some("component".to_string())
        );
        // Cursor on punctuation with whitespace before it: no word.
        assert_eq!(word_at_position("a ; b", Position::new(0, 2)), None);
    }

    #[test]
    fn word_lookup_survives_multibyte_lines() {
        // Columns are UTF-16 code units, not byte offsets; a naive byte
        // slice would split the 'ï' and panic.
        let text = "// naïve signal\n";
        assert_eq!(
            word_at_position(text, Position::new(0, 6)),
            Some("naïve".to_string())
        );
        assert_eq!(
            word_at_position(text, Position::new(0, 10)),
            Some("signal".to_string())
        );
        // Past the end of the line: clamped to the line end.
        assert_eq!(
            word_at_position(text, Position::new(0, 99)),
            Some("signal".to_string())
        );
    }

    #[test]
    fn unsafe_assignments_become_hints() {
        let text = "out <-- in * in;\nin2 --> out2;\nsafe <== ok;\n";
        let hints = unsafe_assignment_hints(text);
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].range.start, Position::new(0, 4));
        assert_eq!(hints[1].range.start, Position::new(1, 4));
        assert!(hints[0].message.contains("potentially unsafe"));
    }

    #[test]
    fn hint_columns_count_utf16_units() {
        // "ïï" is 4 bytes but 2 UTF-16 units; the arrow sits at column 3.
        let hints = unsafe_assignment_hints("ïï <-- x;\n");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].range.start, Position::new(0, 3));
        assert_eq!(hints[0].range.end, Position::new(0, 6));
    }

    #[tokio::test]
    async fn closing_a_document_drops_its_compile_diagnostics() {
        let (service, _socket) = LspService::new(Backend::new);
        let backend = service.inner();

        let path = PathBuf::from("/ws/mul.circom");
        let uri = Url::from_file_path(&path).unwrap();
        backend.hub.documents.insert(uri.clone(), "signal input a;".to_string());
        let stale = CoreDiagnostic {
            code: "T1234".to_string(),
            message: "stale".to_string(),
            range: circom_pro::diagnostics::Range {
                start: circom_pro::diagnostics::Position { line: 0, column: 0 },
                end: circom_pro::diagnostics::Position { line: 0, column: 1 },
            },
            severity: CoreSeverity::Error,
            related: Vec::new(),
        };
        backend.hub.compile.insert(path.clone(), vec![stale]);

        backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;

        assert!(!backend.hub.documents.contains_key(&uri));
        assert!(!backend.hub.compile.contains_key(&path));
    }
}
