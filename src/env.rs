//! Environment-manager collaborator client.
//!
//! Formats the external environment-manager commands (create, export,
//! remove, create-from-descriptor) and hands them to the command
//! runner. Also owns the per-family installer table and the YAML
//! descriptor synthesized for descriptor-driven creation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::response::{metadata, normalize, OperationResult};
use crate::runner::CommandRunner;
use crate::validate::Language;

/// Packages installed into every new environment unless overridden.
pub const DEFAULT_PACKAGES: &str = "ipython pip";

/// Per-family installer used when syncing an environment from a
/// working copy's dependency descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installer {
    /// Installer binary wired into the descriptor.
    pub installer: &'static str,
    /// Dependency file looked up in the working copy.
    pub filename: &'static str,
}

/// Installer table keyed by runtime family.
pub fn installer_for(language: &Language) -> Option<Installer> {
    match language.name.as_str() {
        "python" => Some(Installer {
            installer: "pip",
            filename: "requirements.txt",
        }),
        "nodejs" => Some(Installer {
            installer: "npm",
            filename: "package.json",
        }),
        _ => None,
    }
}

/// Serialized `<name>.yml` descriptor.
#[derive(Debug, Serialize)]
struct EnvDescriptor {
    name: String,
    dependencies: Vec<Value>,
}

pub struct EnvClient<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
}

impl<'a> EnvClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Creates the named environment pinned to the requested runtime.
    pub fn build(&self, name: &str, language: &Language, packages: &str) -> Result<OperationResult> {
        let command = format!(
            "{} create -yn {} {} {} --no-default-packages",
            self.settings.environments.manager,
            name,
            language.pin(),
            packages
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("environment", name.to_string()),
                ("language", language.pin()),
                ("packages", packages.to_string()),
            ]),
        ))
    }

    /// Exports the environment descriptor to `<environments>/<name>.yml`.
    pub fn export(&self, name: &str) -> Result<OperationResult> {
        let export_dir = self.settings.environments_dir();
        fs::create_dir_all(&export_dir)?;
        let filename = export_dir.join(format!("{}.yml", name));

        let command = format!(
            "{} env export -n {} | grep -v '^prefix: ' > {}",
            self.settings.environments.manager,
            name,
            filename.display()
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("environment", name.to_string()),
                ("export", export_dir.display().to_string()),
                ("filename", filename.display().to_string()),
            ]),
        ))
    }

    /// Removes the named environment entirely.
    pub fn remove(&self, name: &str) -> Result<OperationResult> {
        let command = format!(
            "{} remove --name {} --all --yes",
            self.settings.environments.manager, name
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([("environment", name.to_string())]),
        ))
    }

    /// Writes a descriptor pinning the runtime and pulling dependencies
    /// from the working copy, then creates the environment from it.
    pub fn sync(
        &self,
        name: &str,
        language: &Language,
        working_copy: &Path,
        packages: Option<&str>,
    ) -> Result<OperationResult> {
        let descriptor = self.write_descriptor(name, language, working_copy, packages)?;

        let command = format!(
            "{} env create -f {}",
            self.settings.environments.manager,
            descriptor.display()
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("environment", name.to_string()),
                ("export", self.settings.environments_dir().display().to_string()),
                ("filename", descriptor.display().to_string()),
            ]),
        ))
    }

    /// Synthesizes `<name>.yml`: runtime pin, installer, and a
    /// reference to the working copy's dependency file when present.
    /// An existing descriptor is left untouched.
    fn write_descriptor(
        &self,
        name: &str,
        language: &Language,
        working_copy: &Path,
        packages: Option<&str>,
    ) -> Result<PathBuf> {
        let installer = installer_for(language).ok_or_else(|| {
            Error::Usage(format!("no installer known for language '{}'", language.name))
        })?;

        let requirements = working_copy.join(installer.filename);
        let file_install = if requirements.is_file() {
            format!("-r file:{}", requirements.display())
        } else {
            "ipython".to_string()
        };

        let mut installer_section = Mapping::new();
        installer_section.insert(
            Value::String(installer.installer.to_string()),
            Value::Sequence(vec![Value::String(file_install)]),
        );

        let mut dependencies = vec![
            Value::String(language.pin()),
            Value::String(installer.installer.to_string()),
            Value::Mapping(installer_section),
        ];
        if let Some(packages) = packages {
            dependencies.push(Value::String(packages.to_string()));
        }

        let path = self.settings.environments_dir().join(format!("{}.yml", name));
        if !path.exists() {
            fs::create_dir_all(self.settings.environments_dir())?;
            let descriptor = EnvDescriptor {
                name: name.to_string(),
                dependencies,
            };
            let raw = serde_yaml::to_string(&descriptor).map_err(|e| {
                Error::Config(format!("cannot serialize environment descriptor: {}", e))
            })?;
            fs::write(&path, raw)?;
            tracing::info!(path = %path.display(), "wrote environment descriptor");
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::OpStatus;
    use crate::runner::RunOutput;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct RecordingRunner {
        commands: RefCell<Vec<String>>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &str) -> Result<RunOutput> {
            self.commands.borrow_mut().push(command.to_string());
            Ok(RunOutput {
                success: true,
                output: String::new(),
                command: command.to_string(),
            })
        }
    }

    #[test]
    fn installer_table_covers_supported_families() {
        let python = installer_for(&Language::parse("python3.6")).unwrap();
        assert_eq!(python.installer, "pip");
        assert_eq!(python.filename, "requirements.txt");

        let nodejs = installer_for(&Language::parse("nodejs")).unwrap();
        assert_eq!(nodejs.installer, "npm");

        assert!(installer_for(&Language::parse("ruby2.7")).is_none());
    }

    #[test]
    fn build_pins_language_and_packages() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);

        let result = client
            .build("demo", &Language::parse("python3.6"), DEFAULT_PACKAGES)
            .unwrap();

        assert_eq!(result.status, OpStatus::Successful);
        let command = &runner.commands.borrow()[0];
        assert!(command.starts_with("conda create -yn demo python=3.6"));
        assert!(command.contains("ipython pip"));
        assert!(command.ends_with("--no-default-packages"));
    }

    #[test]
    fn export_targets_the_environments_dir() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);

        let result = client.export("demo").unwrap();

        assert!(result.get("filename").unwrap().ends_with("demo.yml"));
        assert!(runner.commands.borrow()[0].contains("env export -n demo"));
        assert!(settings.environments_dir().is_dir());
    }

    #[test]
    fn remove_issues_a_full_environment_removal() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);

        client.remove("demo").unwrap();

        assert_eq!(
            runner.commands.borrow()[0],
            "conda remove --name demo --all --yes"
        );
    }

    #[test]
    fn sync_writes_a_descriptor_referencing_the_dependency_file() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let working_copy = dir.path().join("repositories/demo");
        fs::create_dir_all(&working_copy).unwrap();
        fs::write(working_copy.join("requirements.txt"), "requests\n").unwrap();

        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);
        let result = client
            .sync("demo", &Language::parse("python3.6"), &working_copy, None)
            .unwrap();

        assert_eq!(result.status, OpStatus::Successful);
        let descriptor = settings.environments_dir().join("demo.yml");
        assert!(descriptor.is_file());
        let raw = fs::read_to_string(&descriptor).unwrap();
        assert!(raw.contains("python=3.6"));
        assert!(raw.contains("requirements.txt"));
        assert!(runner.commands.borrow()[0].contains("env create -f"));
    }

    #[test]
    fn sync_falls_back_when_no_dependency_file_exists() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let working_copy = dir.path().join("repositories/bare");
        fs::create_dir_all(&working_copy).unwrap();

        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);
        client
            .sync("bare", &Language::parse("python3.6"), &working_copy, None)
            .unwrap();

        let raw = fs::read_to_string(settings.environments_dir().join("bare.yml")).unwrap();
        assert!(raw.contains("ipython"));
        assert!(!raw.contains("requirements.txt"));
    }

    #[test]
    fn sync_leaves_an_existing_descriptor_untouched() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        fs::create_dir_all(settings.environments_dir()).unwrap();
        let descriptor = settings.environments_dir().join("demo.yml");
        fs::write(&descriptor, "name: demo\n").unwrap();

        let runner = RecordingRunner::new();
        let client = EnvClient::new(&runner, &settings);
        client
            .sync("demo", &Language::parse("python3.6"), dir.path(), None)
            .unwrap();

        assert_eq!(fs::read_to_string(&descriptor).unwrap(), "name: demo\n");
    }
}
