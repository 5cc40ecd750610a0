//! # circom-pro
//!
//! Compile/proof orchestration for circom circuit projects.
//!
//! The crate drives an external circuit toolchain through the
//! [`CircuitRegistry`] capability: it resolves which circuits a request
//! addresses, then compiles, proves and verifies each one in sequence,
//! mapping toolchain failures into file-addressable diagnostics and
//! surfacing proof outcomes through a [`report::Reporter`].
//!
//! - [`compiler`] — the orchestration pipeline and target resolution
//! - [`registry`] — the injected toolchain capability and its test double
//! - [`toolchain`] — the process-backed production registry (circom/snarkjs)
//! - [`diagnostics`] — toolchain failure → diagnostic mapping
//! - [`fixtures`] — source-embedded proof fixtures and the entry-point marker
//! - [`project`] — the `circuit.config.json` manifest

pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod fixtures;
pub mod project;
pub mod registry;
pub mod report;
pub mod toolchain;

pub use compiler::{CircomCompiler, CompileRequest, RunOutcome};
pub use error::{BackendFailure, Error, Result};
pub use registry::{CircuitDescriptor, CircuitRegistry};
