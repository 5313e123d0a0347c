//! Command execution seam.
//!
//! The workflow never runs external tools directly; it hands command
//! strings to a [`CommandRunner`]. Production uses [`LocalRunner`],
//! tests substitute scripted implementations.

use std::process::Command;

use crate::error::Result;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Whether the command exited successfully.
    pub success: bool,
    /// Captured stdout (stderr appended on failure).
    pub output: String,
    /// The command string as issued.
    pub command: String,
}

/// Executes shell commands on behalf of the workflow.
///
/// A non-zero exit is not an error at this seam; it comes back as
/// `success: false` and the workflow decides. Only transport failures
/// (the command could not be spawned at all) surface as `Err`.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<RunOutput>;
}

/// Runs commands on the local machine through `sh -c`.
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    fn run(&self, command: &str) -> Result<RunOutput> {
        tracing::debug!(command = %command, "running local command");

        let output = Command::new("sh").arg("-c").arg(command).output()?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                if !captured.is_empty() {
                    captured.push('\n');
                }
                captured.push_str(stderr.trim_end());
            }
            tracing::warn!(command = %command, "local command failed");
        }

        Ok(RunOutput {
            success: output.status.success(),
            output: captured,
            command: command.to_string(),
        })
    }
}
