//! Provisioning workflow: the ordered collaborator steps behind each
//! lifecycle operation.
//!
//! Each operation is a fixed sequence of collaborator invocations with
//! a normalization after every step. The first failing step aborts
//! create and sync; teardown is idempotent and resumable. There are no
//! retries and no rollback of completed steps.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::Settings;
use crate::entity::{ProvisionedPaths, Sandbox, SandboxRecord};
use crate::env::{EnvClient, DEFAULT_PACKAGES};
use crate::error::{Error, Result};
use crate::launch::Launcher;
use crate::profile::ProfileClient;
use crate::registry::Registry;
use crate::repo::RepoClient;
use crate::response::OperationResult;
use crate::runner::CommandRunner;
use crate::validate;

/// Forward provisioning states; each is reached by one collaborator
/// invocation (environment readiness takes two sequential calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Requested,
    RepoReady,
    EnvReady,
    ProfileReady,
    Registered,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::Requested => "requested",
            ProvisionStep::RepoReady => "repo-ready",
            ProvisionStep::EnvReady => "env-ready",
            ProvisionStep::ProfileReady => "profile-ready",
            ProvisionStep::Registered => "registered",
        };
        f.write_str(name)
    }
}

/// Teardown states for the remove flow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    EnvRemoved,
    RecordRemoved,
    ProfileRemoved,
    RepoRemoved,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownStep::EnvRemoved => "env-removed",
            TeardownStep::RecordRemoved => "record-removed",
            TeardownStep::ProfileRemoved => "profile-removed",
            TeardownStep::RepoRemoved => "repo-removed",
        };
        f.write_str(name)
    }
}

/// Inputs for the create flow.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub name: String,
    /// Combined runtime token, e.g. `python3.6`.
    pub language: String,
    /// Create a remote repository and clone it; otherwise initialize a
    /// local working copy with version control only.
    pub git: bool,
    pub packages: Option<String>,
}

/// Inputs for the sync flow. Exactly one mode must be selected:
/// `name` alone refreshes an existing sandbox, `repository` plus
/// `environment` builds a new one from a clone URL.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    pub name: Option<String>,
    pub repository: Option<String>,
    pub environment: Option<String>,
    pub language: Option<String>,
    pub packages: Option<String>,
}

enum SyncMode {
    Existing(String),
    FromRepository {
        url: String,
        environment: String,
        language: String,
    },
}

fn select_sync_mode(request: &SyncRequest) -> Result<SyncMode> {
    match (&request.name, &request.repository) {
        (Some(name), None) if request.environment.is_none() => {
            Ok(SyncMode::Existing(name.clone()))
        }
        (None, Some(url)) => {
            let environment = request.environment.clone().ok_or_else(|| {
                Error::Usage("sync from a repository needs --environment".to_string())
            })?;
            let language = request.language.clone().ok_or_else(|| {
                Error::Usage("sync from a repository needs --language".to_string())
            })?;
            Ok(SyncMode::FromRepository {
                url: url.clone(),
                environment,
                language,
            })
        }
        _ => Err(Error::Usage(
            "sync takes either --name or --repository with --environment, not both".to_string(),
        )),
    }
}

/// Drives the lifecycle operations. Borrows its settings, registry,
/// and runner; nothing here is global.
pub struct Workflow<'a> {
    settings: &'a Settings,
    registry: &'a mut Registry,
    runner: &'a dyn CommandRunner,
}

impl<'a> Workflow<'a> {
    pub fn new(
        settings: &'a Settings,
        registry: &'a mut Registry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            settings,
            registry,
            runner,
        }
    }

    /// Runs the full create flow and returns the registered record.
    ///
    /// Steps: repository init/create+clone → environment build +
    /// export → profile create → materialize → register → export.
    /// Export only happens after registration succeeds, so an id
    /// conflict can never leave an orphan record file.
    pub fn create(&mut self, request: CreateRequest) -> Result<SandboxRecord> {
        validate::verify_available_sandbox(self.registry, &request.name)?;
        let language = validate::verify_language(&request.language)?;
        let packages = request.packages.as_deref().unwrap_or(DEFAULT_PACKAGES);
        let name = request.name.as_str();

        let mut sandbox = Sandbox::new(name, request.language.as_str());
        tracing::info!(name = %name, step = %ProvisionStep::Requested, "creating sandbox");

        let repos = RepoClient::new(self.runner, self.settings);
        let envs = EnvClient::new(self.runner, self.settings);
        let profiles = ProfileClient::new(self.runner, self.settings);

        let repository = if request.git {
            repos.create_and_clone(name)?
        } else {
            repos.init_local(name, true)?
        };
        let repository = self.ensure(repository, ProvisionStep::RepoReady)?;
        self.advance(ProvisionStep::RepoReady);

        self.ensure(envs.build(name, &language, packages)?, ProvisionStep::EnvReady)?;
        let environment = self.ensure(envs.export(name)?, ProvisionStep::EnvReady)?;
        self.advance(ProvisionStep::EnvReady);

        let profile = self.ensure(profiles.create(name)?, ProvisionStep::ProfileReady)?;
        self.advance(ProvisionStep::ProfileReady);

        let paths = self.collect_paths(&repository, &environment, &profile)?;
        sandbox.materialize(paths);

        let record = SandboxRecord::new(sandbox);
        let created = record.clone();
        self.registry.register(record)?;
        self.registry.export(created.id)?;
        self.advance(ProvisionStep::Registered);

        Ok(created)
    }

    /// Runs the sync flow. Refreshing an existing sandbox returns
    /// `None`; building from a repository URL returns the new record.
    pub fn sync(&mut self, request: SyncRequest) -> Result<Option<SandboxRecord>> {
        match select_sync_mode(&request)? {
            SyncMode::Existing(name) => {
                self.sync_existing(&name, request.packages.as_deref())?;
                Ok(None)
            }
            SyncMode::FromRepository {
                url,
                environment,
                language,
            } => self
                .sync_from_repository(&url, &environment, &language, request.packages.as_deref())
                .map(Some),
        }
    }

    /// Read-through refresh of an existing sandbox: re-clone if the
    /// working copy is gone, re-sync the environment from the working
    /// copy's dependency file, rebuild the profile. No re-registration.
    fn sync_existing(&mut self, name: &str, packages: Option<&str>) -> Result<()> {
        validate::verify_name_sandbox(self.registry, name)?;
        let record = self
            .registry
            .import(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let language = validate::verify_language(&record.sandbox.language)?;

        let repos = RepoClient::new(self.runner, self.settings);
        let envs = EnvClient::new(self.runner, self.settings);
        let profiles = ProfileClient::new(self.runner, self.settings);

        let clone = self.ensure(
            repos.clone_url(&record.sandbox.repository)?,
            ProvisionStep::RepoReady,
        )?;
        self.advance(ProvisionStep::RepoReady);

        let working_copy = self
            .metadata_path(&clone, "export", ProvisionStep::RepoReady)?;
        self.ensure(
            envs.sync(name, &language, &working_copy, packages)?,
            ProvisionStep::EnvReady,
        )?;
        self.advance(ProvisionStep::EnvReady);

        self.ensure(profiles.create(name)?, ProvisionStep::ProfileReady)?;
        self.advance(ProvisionStep::ProfileReady);

        Ok(())
    }

    /// Builds a brand-new sandbox straight from a clone URL, without a
    /// prior create.
    fn sync_from_repository(
        &mut self,
        url: &str,
        environment: &str,
        language_token: &str,
        packages: Option<&str>,
    ) -> Result<SandboxRecord> {
        validate::verify_available_sandbox(self.registry, environment)?;
        let url = validate::verify_url(url)?;
        let language = validate::verify_language(language_token)?;

        let mut sandbox = Sandbox::new(environment, language_token);

        let repos = RepoClient::new(self.runner, self.settings);
        let envs = EnvClient::new(self.runner, self.settings);
        let profiles = ProfileClient::new(self.runner, self.settings);

        let clone = self.ensure(repos.clone_url(url.as_str())?, ProvisionStep::RepoReady)?;
        self.advance(ProvisionStep::RepoReady);

        let working_copy = self.metadata_path(&clone, "export", ProvisionStep::RepoReady)?;
        let synced = self.ensure(
            envs.sync(environment, &language, &working_copy, packages)?,
            ProvisionStep::EnvReady,
        )?;
        self.advance(ProvisionStep::EnvReady);

        let profile = self.ensure(profiles.create(environment)?, ProvisionStep::ProfileReady)?;
        self.advance(ProvisionStep::ProfileReady);

        let paths = self.collect_paths(&clone, &synced, &profile)?;
        sandbox.materialize(paths);

        let record = SandboxRecord::new(sandbox);
        let created = record.clone();
        self.registry.register(record)?;
        self.registry.export(created.id)?;
        self.advance(ProvisionStep::Registered);

        Ok(created)
    }

    /// Tears down a sandbox: environment (and its descriptor) →
    /// record → profile directory → repository directory.
    ///
    /// Idempotent: targets that are already absent are skipped with a
    /// warning so a partially torn-down sandbox can be removed again.
    /// A genuine collaborator failure still aborts.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        validate::verify_name_sandbox(self.registry, name)?;
        let record = match self.registry.import(name)? {
            Some(record) => record,
            None => self
                .registry
                .find("name", name)
                .cloned()
                .ok_or_else(|| Error::NotFound(name.to_string()))?,
        };
        let sandbox = record.sandbox;
        let root = &self.settings.context.location;

        let envs = EnvClient::new(self.runner, self.settings);
        let removal = envs.remove(name)?;
        if !removal.status.is_success() {
            return Err(Self::step_failure(removal, TeardownStep::EnvRemoved));
        }
        if !sandbox.environment.is_empty() {
            self.remove_path(&root.join(&sandbox.environment), TeardownStep::EnvRemoved)?;
        }
        tracing::info!(step = %TeardownStep::EnvRemoved, "teardown step complete");

        self.registry.delete(name)?;
        tracing::info!(step = %TeardownStep::RecordRemoved, "teardown step complete");

        if !sandbox.profile.is_empty() {
            self.remove_path(&root.join(&sandbox.profile), TeardownStep::ProfileRemoved)?;
        }
        tracing::info!(step = %TeardownStep::ProfileRemoved, "teardown step complete");

        if !sandbox.location.is_empty() {
            self.remove_path(&root.join(&sandbox.location), TeardownStep::RepoRemoved)?;
        }
        tracing::info!(step = %TeardownStep::RepoRemoved, "teardown step complete");

        Ok(())
    }

    /// Opens an interactive session inside the named sandbox.
    pub fn launch(&self, name: &str) -> Result<()> {
        validate::verify_name_sandbox(self.registry, name)?;
        let record = self
            .registry
            .import(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        let result = Launcher::new(self.runner, self.settings).open_session(&record)?;
        if !result.status.is_success() {
            return Err(Self::step_failure(result, "starter"));
        }
        Ok(())
    }

    /// Prepares the context root: clones the configured tooling
    /// repositories and creates the base directories. Idempotent.
    pub fn setup(&self) -> Result<()> {
        let repos = RepoClient::new(self.runner, self.settings);

        if let Some(url) = &self.settings.profiles.repository {
            self.ensure(repos.clone_url(url)?, "setup")?;
        }
        if let Some(url) = &self.settings.environments.repository {
            self.ensure(repos.clone_url(url)?, "setup")?;
        }

        fs::create_dir_all(self.settings.repositories_dir())?;
        fs::create_dir_all(self.settings.environments_dir())?;
        fs::create_dir_all(self.settings.profiles_dir())?;
        fs::create_dir_all(self.settings.boxes_dir())?;

        tracing::info!(root = %self.settings.context.location.display(), "context ready");
        Ok(())
    }

    /// Lists persisted records, optionally filtered by name.
    pub fn retrieve(&self, name: Option<&str>) -> Result<Vec<SandboxRecord>> {
        let records = self.registry.list_all()?;
        Ok(match name {
            Some(name) => records
                .into_iter()
                .filter(|r| r.sandbox.name == name)
                .collect(),
            None => records,
        })
    }

    /// Derives the relative paths stored on the entity from the three
    /// step outputs, stripping the context root.
    fn collect_paths(
        &self,
        repository: &OperationResult,
        environment: &OperationResult,
        profile: &OperationResult,
    ) -> Result<ProvisionedPaths> {
        let location = repository
            .get("export")
            .ok_or_else(|| Self::missing_metadata(ProvisionStep::RepoReady, "export"))?;
        let source = repository.get("url").unwrap_or(location);

        let descriptor = environment
            .get("filename")
            .ok_or_else(|| Self::missing_metadata(ProvisionStep::EnvReady, "filename"))?;

        let profile_dir = Path::new(
            profile
                .get("export")
                .ok_or_else(|| Self::missing_metadata(ProvisionStep::ProfileReady, "export"))?,
        )
        .join(format!(
            "profile_{}",
            profile
                .get("profile")
                .ok_or_else(|| Self::missing_metadata(ProvisionStep::ProfileReady, "profile"))?
        ));

        Ok(ProvisionedPaths {
            repository: self.settings.strip_root(Path::new(source)),
            location: self.settings.strip_root(Path::new(location)),
            environment: self.settings.strip_root(Path::new(descriptor)),
            profile: self.settings.strip_root(&profile_dir),
        })
    }

    /// Reads a path out of step metadata.
    fn metadata_path(
        &self,
        result: &OperationResult,
        key: &str,
        step: ProvisionStep,
    ) -> Result<std::path::PathBuf> {
        result
            .get(key)
            .map(std::path::PathBuf::from)
            .ok_or_else(|| Self::missing_metadata(step, key))
    }

    /// Fails the workflow if a normalized step reported failure.
    fn ensure(
        &self,
        result: OperationResult,
        step: impl fmt::Display,
    ) -> Result<OperationResult> {
        if result.status.is_success() {
            Ok(result)
        } else {
            Err(Self::step_failure(result, step))
        }
    }

    fn advance(&self, step: ProvisionStep) {
        tracing::info!(step = %step, "provisioning step complete");
    }

    /// Deletes a file or directory left behind by provisioning; an
    /// already absent target is skipped.
    fn remove_path(&self, path: &Path, step: TeardownStep) -> Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else if path.is_file() {
            fs::remove_file(path)?;
        } else {
            tracing::warn!(step = %step, path = %path.display(), "target already absent, skipping");
        }
        Ok(())
    }

    fn step_failure(result: OperationResult, step: impl fmt::Display) -> Error {
        Error::Collaborator {
            step: step.to_string(),
            command: result.command.clone(),
            detail: result
                .get("error")
                .unwrap_or("collaborator reported failure")
                .to_string(),
        }
    }

    fn missing_metadata(step: ProvisionStep, key: &str) -> Error {
        Error::Collaborator {
            step: step.to_string(),
            command: None,
            detail: format!("step output missing '{}'", key),
        }
    }
}
