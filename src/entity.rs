//! Sandbox entity and persisted record schema.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Schema version stamped on every materialized record.
pub const RECORD_VERSION: &str = "1.0.0";

/// One sandbox: a named bundle of repository, environment, and shell
/// profile managed as a single lifecycle unit.
///
/// Derived attributes (`repository`, `environment`, `profile`,
/// `location`, `version`) are empty strings until provisioning
/// materializes the entity; only `name` and `language` are set on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sandbox {
    /// Unique human-chosen name; also the record filename stem and the
    /// environment/profile identifier.
    pub name: String,
    /// Combined runtime token, e.g. `python3.6`.
    pub language: String,
    /// Clone source: a URL, or the working copy itself for locally
    /// initialized sandboxes.
    pub repository: String,
    /// Relative path to the exported environment descriptor.
    pub environment: String,
    /// Relative path to the generated shell-profile directory.
    pub profile: String,
    /// Relative path to the working copy.
    pub location: String,
    /// Record schema version.
    pub version: String,
}

impl Sandbox {
    /// A fresh, un-materialized sandbox.
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            repository: String::new(),
            environment: String::new(),
            profile: String::new(),
            location: String::new(),
            version: String::new(),
        }
    }

    /// True once provisioning has filled in the derived attributes.
    pub fn is_materialized(&self) -> bool {
        !self.version.is_empty()
    }

    /// Merges provisioning output into the entity and stamps the
    /// schema version. The single place derived fields are assigned.
    pub fn materialize(&mut self, paths: ProvisionedPaths) {
        self.repository = paths.repository;
        self.location = paths.location;
        self.environment = paths.environment;
        self.profile = paths.profile;
        self.version = RECORD_VERSION.to_string();
    }

    /// Read access to a field by its schema name; registry scans use
    /// this.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "language" => Some(&self.language),
            "repository" => Some(&self.repository),
            "environment" => Some(&self.environment),
            "profile" => Some(&self.profile),
            "location" => Some(&self.location),
            "version" => Some(&self.version),
            _ => None,
        }
    }
}

/// Derived paths produced by a completed provisioning sequence,
/// consumed whole by [`Sandbox::materialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedPaths {
    pub repository: String,
    pub location: String,
    pub environment: String,
    pub profile: String,
}

/// Persisted registry record: identity plus the sandbox payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxRecord {
    /// Unique integer identity, assigned at creation and stable for
    /// the record's life.
    #[serde(rename = "_id")]
    pub id: u32,
    pub sandbox: Sandbox,
}

impl SandboxRecord {
    /// Wraps a sandbox with a freshly drawn id.
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            id: rand::thread_rng().gen_range(1000..10_000),
            sandbox,
        }
    }

    /// Parses and validates a persisted record.
    ///
    /// Key presence is enforced by the schema (unknown keys rejected,
    /// missing keys fail deserialization); a zero id or empty name is
    /// rejected on top of that.
    pub fn from_json(raw: &str) -> Result<Self> {
        let record: SandboxRecord =
            serde_json::from_str(raw).map_err(|e| Error::Schema(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(Error::Schema("record id must be non-zero".to_string()));
        }
        if self.sandbox.name.is_empty() {
            return Err(Error::Schema("record has an empty sandbox name".to_string()));
        }
        Ok(())
    }

    /// Serializes with sorted keys and 4-space indentation so record
    /// files diff cleanly.
    pub fn to_pretty_json(&self) -> Result<String> {
        // Round-tripping through Value sorts the keys.
        let value = serde_json::to_value(self).map_err(|e| Error::Schema(e.to_string()))?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(&value, &mut ser).map_err(|e| Error::Schema(e.to_string()))?;

        String::from_utf8(buf).map_err(|e| Error::Schema(e.to_string()))
    }
}
