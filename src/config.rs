//! Settings for the sandbox manager.
//!
//! Every sandbox artifact lives under one context root; the settings
//! file names that root and the directories hanging off it. Loaded from
//! TOML, with defaults for everything except the root itself.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable consulted when no `--settings` flag is given.
pub const SETTINGS_ENV: &str = "SANDBOX_SETTINGS";

/// The context root all sandbox paths hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Absolute root directory. Persisted records store paths relative
    /// to this, so the whole context can be relocated.
    pub location: PathBuf,
}

/// Where the registry keeps its record files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Boxes directory, relative to the context root.
    #[serde(default = "default_boxes")]
    pub boxes: PathBuf,
}

fn default_boxes() -> PathBuf {
    PathBuf::from("containers/boxes")
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            boxes: default_boxes(),
        }
    }
}

/// Where working copies are cloned or initialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Repositories directory, relative to the context root.
    #[serde(default = "default_repositories")]
    pub location: PathBuf,
}

fn default_repositories() -> PathBuf {
    PathBuf::from("repositories")
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            location: default_repositories(),
        }
    }
}

/// Where shell profiles are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Profiles directory, relative to the context root.
    #[serde(default = "default_profiles")]
    pub location: PathBuf,

    /// Profile tooling repository cloned during `setup`.
    #[serde(default)]
    pub repository: Option<String>,
}

fn default_profiles() -> PathBuf {
    PathBuf::from("profiles/ipython")
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            location: default_profiles(),
            repository: None,
        }
    }
}

/// Where environment descriptors are exported, and which external
/// environment manager builds them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    /// Environments directory, relative to the context root.
    #[serde(default = "default_environments")]
    pub location: PathBuf,

    /// Environment tooling repository cloned during `setup`.
    #[serde(default)]
    pub repository: Option<String>,

    /// Environment-manager binary invoked for build/export/remove.
    #[serde(default = "default_manager")]
    pub manager: String,
}

fn default_environments() -> PathBuf {
    PathBuf::from("environments")
}

fn default_manager() -> String {
    "conda".to_string()
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            location: default_environments(),
            repository: None,
            manager: default_manager(),
        }
    }
}

/// Resolved configuration passed by reference into every registry and
/// workflow operation. There is no ambient global; whoever constructs
/// the workflow owns the settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub context: ContextSettings,

    #[serde(default)]
    pub containers: ContainerSettings,

    #[serde(default)]
    pub repositories: RepositorySettings,

    #[serde(default)]
    pub profiles: ProfileSettings,

    #[serde(default)]
    pub environments: EnvironmentSettings,
}

impl Settings {
    /// Settings with every section defaulted under the given root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            context: ContextSettings {
                location: root.into(),
            },
            containers: ContainerSettings::default(),
            repositories: RepositorySettings::default(),
            profiles: ProfileSettings::default(),
            environments: EnvironmentSettings::default(),
        }
    }

    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read settings at {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("invalid settings at {}: {}", path.display(), e))
        })
    }

    /// Resolves the settings location: explicit flag, then the
    /// `SANDBOX_SETTINGS` environment variable, then
    /// `<home>/.sandboxes/settings.toml`.
    pub fn resolve(flag: Option<&Path>) -> Result<Self> {
        if let Some(path) = flag {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            return Self::load(Path::new(&path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        Self::load(&home.join(".sandboxes").join("settings.toml"))
    }

    /// Absolute path of the registry's boxes directory.
    pub fn boxes_dir(&self) -> PathBuf {
        self.context.location.join(&self.containers.boxes)
    }

    /// Absolute path of the repositories directory.
    pub fn repositories_dir(&self) -> PathBuf {
        self.context.location.join(&self.repositories.location)
    }

    /// Absolute path of the profiles directory.
    pub fn profiles_dir(&self) -> PathBuf {
        self.context.location.join(&self.profiles.location)
    }

    /// Absolute path of the environments directory.
    pub fn environments_dir(&self) -> PathBuf {
        self.context.location.join(&self.environments.location)
    }

    /// Strips the context root from a derived path so records store
    /// relative paths. Paths outside the root (remote URLs included)
    /// pass through unchanged.
    pub fn strip_root(&self, path: &Path) -> String {
        path.strip_prefix(&self.context.location)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_with_defaults() {
        let toml = r#"
            [context]
            location = "/srv/sandboxes"
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();

        assert_eq!(settings.context.location, PathBuf::from("/srv/sandboxes"));
        assert_eq!(settings.containers.boxes, PathBuf::from("containers/boxes"));
        assert_eq!(settings.environments.manager, "conda");
        assert!(settings.profiles.repository.is_none());
    }

    #[test]
    fn settings_parse_overrides() {
        let toml = r#"
            [context]
            location = "/srv/sandboxes"

            [environments]
            manager = "mamba"
            repository = "https://example.com/envs.git"

            [containers]
            boxes = "boxes"
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();

        assert_eq!(settings.environments.manager, "mamba");
        assert_eq!(
            settings.environments.repository.as_deref(),
            Some("https://example.com/envs.git")
        );
        assert_eq!(settings.boxes_dir(), PathBuf::from("/srv/sandboxes/boxes"));
    }

    #[test]
    fn derived_dirs_hang_off_the_root() {
        let settings = Settings::with_root("/srv/sandboxes");

        assert_eq!(
            settings.boxes_dir(),
            PathBuf::from("/srv/sandboxes/containers/boxes")
        );
        assert_eq!(
            settings.repositories_dir(),
            PathBuf::from("/srv/sandboxes/repositories")
        );
        assert_eq!(
            settings.profiles_dir(),
            PathBuf::from("/srv/sandboxes/profiles/ipython")
        );
        assert_eq!(
            settings.environments_dir(),
            PathBuf::from("/srv/sandboxes/environments")
        );
    }

    #[test]
    fn strip_root_relativizes_paths_under_the_root() {
        let settings = Settings::with_root("/srv/sandboxes");

        assert_eq!(
            settings.strip_root(Path::new("/srv/sandboxes/repositories/demo")),
            "repositories/demo"
        );
    }

    #[test]
    fn strip_root_passes_foreign_paths_through() {
        let settings = Settings::with_root("/srv/sandboxes");

        assert_eq!(
            settings.strip_root(Path::new("https://example.com/demo.git")),
            "https://example.com/demo.git"
        );
        assert_eq!(settings.strip_root(Path::new("/elsewhere/x")), "/elsewhere/x");
    }

    #[test]
    fn load_missing_file_is_a_config_error() {
        let err = Settings::load(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
