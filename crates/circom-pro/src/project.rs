//! The `circuit.config.json` project manifest.
//!
//! Generated once by scanning the workspace for `*.circom` sources; the
//! manifest is consumed by the circuit toolchain, not by the orchestrator
//! itself. Field names on the wire (`cID`, `fileName`, `compilationMode`)
//! follow the established manifest format.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Manifest file name at the workspace root.
pub const MANIFEST_FILE_NAME: &str = "circuit.config.json";

/// Default compilation mode for generated entries.
pub const DEFAULT_COMPILATION_MODE: &str = "wasm";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_name: String,
    pub output_dir: String,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub input_dir: String,
    pub circuits: Vec<CircuitEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitEntry {
    #[serde(rename = "cID")]
    pub c_id: String,
    pub file_name: String,
    pub compilation_mode: String,
}

impl ProjectConfig {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            output_dir: "./out".to_string(),
            build: BuildConfig {
                input_dir: "./circuits".to_string(),
                circuits: Vec::new(),
            },
        }
    }

    /// Path of the manifest inside a workspace.
    pub fn manifest_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(MANIFEST_FILE_NAME)
    }

    /// True when the workspace already carries a manifest.
    pub fn exists(workspace_root: &Path) -> bool {
        Self::manifest_path(workspace_root).is_file()
    }

    /// Loads and parses the workspace manifest.
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let path = Self::manifest_path(workspace_root);
        let raw = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::ManifestNotFound(path.clone())
            } else {
                Error::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&raw).map_err(|source| Error::ManifestParse { path, source })
    }

    /// Builds a manifest by scanning `workspace_root` for `*.circom` files.
    ///
    /// `inputDir` is derived from the first path segment below the root;
    /// one entry is added per file with `fileName` relative to that
    /// inferred source root and `cID` taken from the file stem.
    pub fn scan(project_name: impl Into<String>, workspace_root: &Path) -> Self {
        let mut config = Self::new(project_name);

        let mut sources: Vec<PathBuf> = WalkDir::new(workspace_root)
            .into_iter()
            .filter_entry(|e| e.file_name() != "node_modules")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "circom"))
            .map(|e| e.into_path())
            .collect();
        sources.sort();

        for path in sources {
            config.add_circuit_path(workspace_root, &path);
        }
        config
    }

    /// Adds one circuit entry for a source file, inferring the source root.
    pub fn add_circuit_path(&mut self, workspace_root: &Path, path: &Path) {
        let rel = path.strip_prefix(workspace_root).unwrap_or(path);

        let c_id = rel
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut components = rel.components();
        let first = components.next();
        let rest: PathBuf = components.collect();

        let file_name = match (first, rest.as_os_str().is_empty()) {
            // Nested below a source directory: infer inputDir from the
            // first segment, fileName relative to it.
            (Some(Component::Normal(dir)), false) => {
                self.build.input_dir = format!("./{}", dir.to_string_lossy());
                rest.to_string_lossy().into_owned()
            }
            // Directly at the workspace root: keep the current inputDir.
            _ => rel.to_string_lossy().into_owned(),
        };

        self.build.circuits.push(CircuitEntry {
            c_id,
            file_name,
            compilation_mode: DEFAULT_COMPILATION_MODE.to_string(),
        });
    }

    /// Writes the manifest, refusing to overwrite an existing one.
    ///
    /// Returns `Ok(true)` when written, `Ok(false)` when a manifest was
    /// already present and left untouched.
    pub fn write_new(&self, workspace_root: &Path) -> Result<bool> {
        let path = Self::manifest_path(workspace_root);
        if path.exists() {
            return Ok(false);
        }
        let pretty = serde_json::to_string_pretty(self).map_err(|source| Error::ManifestParse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, pretty).map_err(|source| Error::Io { path, source })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "template T() {}\n").expect("write");
    }

    #[test]
    fn scan_infers_input_dir_from_first_segment() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("circuits/a.circom"));
        touch(&dir.path().join("circuits/sub/b.circom"));

        let config = ProjectConfig::scan("MyCircuits", dir.path());

        assert_eq!(config.build.input_dir, "./circuits");
        assert_eq!(config.build.circuits.len(), 2);
        assert_eq!(config.build.circuits[0].c_id, "a");
        assert_eq!(config.build.circuits[0].file_name, "a.circom");
        assert_eq!(config.build.circuits[1].c_id, "b");
        assert_eq!(config.build.circuits[1].file_name, "sub/b.circom");
        assert_eq!(config.build.circuits[1].compilation_mode, "wasm");
    }

    #[test]
    fn scan_ignores_non_circom_files_and_node_modules() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("circuits/a.circom"));
        touch(&dir.path().join("circuits/readme.md"));
        touch(&dir.path().join("node_modules/dep/c.circom"));

        let config = ProjectConfig::scan("P", dir.path());
        assert_eq!(config.build.circuits.len(), 1);
        assert_eq!(config.build.circuits[0].c_id, "a");
    }

    #[test]
    fn write_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ProjectConfig::new("P");

        assert!(config.write_new(dir.path()).expect("first write"));
        assert!(!config.write_new(dir.path()).expect("second write"));
    }

    #[test]
    fn manifest_round_trips_wire_field_names() {
        let mut config = ProjectConfig::new("P");
        config.build.circuits.push(CircuitEntry {
            c_id: "mul".to_string(),
            file_name: "mul.circom".to_string(),
            compilation_mode: "wasm".to_string(),
        });

        let raw = serde_json::to_string(&config).expect("serialize");
        assert!(raw.contains("\"cID\":\"mul\""));
        assert!(raw.contains("\"fileName\":\"mul.circom\""));
        assert!(raw.contains("\"compilationMode\":\"wasm\""));
        assert!(raw.contains("\"projectName\":\"P\""));
        assert!(raw.contains("\"inputDir\":\"./circuits\""));

        let parsed: ProjectConfig = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed, config);
    }
}
