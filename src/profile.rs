//! Shell-profile collaborator client.

use std::fs;

use crate::config::Settings;
use crate::error::Result;
use crate::response::{metadata, normalize, OperationResult};
use crate::runner::CommandRunner;

pub struct ProfileClient<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
}

impl<'a> ProfileClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Creates the interactive-shell profile for a sandbox, scoped to
    /// its environment. The generator writes `profile_<name>` under
    /// the profiles directory.
    pub fn create(&self, name: &str) -> Result<OperationResult> {
        let export_dir = self.settings.profiles_dir();
        fs::create_dir_all(&export_dir)?;

        let command = format!(
            "{} run -n {} ipython profile create {} --ipython-dir {}",
            self.settings.environments.manager,
            name,
            name,
            export_dir.display()
        );
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("env", name.to_string()),
                ("profile", name.to_string()),
                ("export", export_dir.display().to_string()),
            ]),
        ))
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
    fn create_runs_the_profile_generator_inside_the_environment() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_root(dir.path());
        let runner = RecordingRunner {
            commands: RefCell::new(Vec::new()),
        };
        let client = ProfileClient::new(&runner, &settings);

        let result = client.create("demo").unwrap();

        assert_eq!(result.status, OpStatus::Successful);
        assert_eq!(result.get("profile"), Some("demo"));
        let command = &runner.commands.borrow()[0];
        assert!(command.starts_with("conda run -n demo ipython profile create demo"));
        assert!(settings.profiles_dir().is_dir());
    }
}
