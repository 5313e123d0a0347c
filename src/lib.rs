//! Sandbox manager - local registry and lifecycle for development sandboxes.
//!
//! A sandbox bundles a source repository, a language runtime
//! environment, and an interactive-shell profile under one name. This
//! library validates requests, drives the external tooling through a
//! narrow command seam, and keeps a JSON-file registry of sandbox
//! metadata in agreement with memory.

pub mod config;
pub mod entity;
pub mod env;
pub mod error;
pub mod launch;
pub mod profile;
pub mod registry;
pub mod repo;
pub mod response;
pub mod runner;
pub mod validate;
pub mod workflow;

pub use config::{Settings, SETTINGS_ENV};
pub use entity::{ProvisionedPaths, Sandbox, SandboxRecord, RECORD_VERSION};
pub use error::{Error, Result};
pub use registry::Registry;
pub use response::{normalize, OpStatus, OperationResult, RawResponse};
pub use runner::{CommandRunner, LocalRunner, RunOutput};
pub use validate::{Language, SUPPORTED_LANGUAGES};
pub use workflow::{CreateRequest, ProvisionStep, SyncRequest, TeardownStep, Workflow};
