//! Interactive session launcher.

use crate::config::Settings;
use crate::entity::SandboxRecord;
use crate::error::Result;
use crate::response::{metadata, normalize, OperationResult};
use crate::runner::CommandRunner;

pub struct Launcher<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
}

impl<'a> Launcher<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Opens an interactive session inside the sandbox: working copy
    /// as cwd, environment activated, shell started with the sandbox
    /// profile. Fire-and-forget; registry state is untouched.
    pub fn open_session(&self, record: &SandboxRecord) -> Result<OperationResult> {
        let sandbox = &record.sandbox;
        let working_copy = self.settings.context.location.join(&sandbox.location);
        let profiles_dir = self.settings.profiles_dir();

        let command = format!(
            "cd {} && {} run -n {} ipython --profile={} --ipython-dir={}",
            working_copy.display(),
            self.settings.environments.manager,
            sandbox.name,
            sandbox.name,
            profiles_dir.display()
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("environment", sandbox.name.clone()),
                ("profile", sandbox.name.clone()),
                ("repository", working_copy.display().to_string()),
            ]),
        ))
    }
}
