//! Repository collaborator client.
//!
//! Formats the version-control commands (remote create, clone, local
//! init) and hands them to the command runner. Existing working copies
//! short-circuit to success so repeated runs stay idempotent.

use std::fs;

use serde_json::json;

use crate::config::Settings;
use crate::error::Result;
use crate::response::{metadata, normalize, OperationResult};
use crate::runner::CommandRunner;

pub struct RepoClient<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
}

impl<'a> RepoClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Creates a remote repository named after the sandbox and clones
    /// it under the repositories root (`gh` CLI).
    pub fn create_and_clone(&self, name: &str) -> Result<OperationResult> {
        let repos_dir = self.settings.repositories_dir();
        let target = repos_dir.join(name);
        if target.is_dir() {
            return Ok(self.existing(name, &target));
        }
        fs::create_dir_all(&repos_dir)?;

        let command = format!(
            "cd {} && gh repo create {} --private --clone",
            repos_dir.display(),
            name
        );
        let run = self.runner.run(&command)?;

        // gh prints the repository URL; fall back to the local path.
        let url = run
            .output
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("http"))
            .map(str::to_string)
            .unwrap_or_else(|| target.display().to_string());

        Ok(normalize(
            run.into(),
            metadata([
                ("url", url),
                ("repository", name.to_string()),
                ("export", target.display().to_string()),
            ]),
        ))
    }

    /// Clones `url` under the repositories root. An existing working
    /// copy is left untouched.
    pub fn clone_url(&self, url: &str) -> Result<OperationResult> {
        let folder = url
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .trim_end_matches(".git")
            .to_string();
        let target = self.settings.repositories_dir().join(&folder);
        if target.is_dir() {
            return Ok(self.existing(url, &target));
        }
        fs::create_dir_all(self.settings.repositories_dir())?;

        let command = format!("git clone {} {}", url, target.display());
        let run = self.runner.run(&command)?;

        Ok(normalize(
            run.into(),
            metadata([
                ("url", url.to_string()),
                ("repository", folder),
                ("export", target.display().to_string()),
            ]),
        ))
    }

    /// Creates a local working-copy folder, optionally initializing
    /// version control in it. No remote is involved.
    pub fn init_local(&self, name: &str, with_vcs: bool) -> Result<OperationResult> {
        let target = self.settings.repositories_dir().join(name);
        fs::create_dir_all(&target)?;

        let raw = if with_vcs {
            self.runner
                .run(&format!("cd {} && git init", target.display()))?
                .into()
        } else {
            // No command to issue; a bare success payload.
            json!({ "ok": true, "command": null }).into()
        };

        Ok(normalize(
            raw,
            metadata([
                ("repository", name.to_string()),
                ("export", target.display().to_string()),
            ]),
        ))
    }

    fn existing(&self, source: &str, target: &std::path::Path) -> OperationResult {
        tracing::warn!(path = %target.display(), "working copy already present, skipping");
        normalize(
            json!({ "ok": true, "command": null }).into(),
            metadata([
                ("url", source.to_string()),
                ("repository", stem(target)),
                ("export", target.display().to_string()),
                ("existing", "true".to_string()),
            ]),
        )
    }
}

fn stem(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
