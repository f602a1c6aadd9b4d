//! External tool invocation.
//!
//! Every piece of heavy lifting (concatenation, trimming, tagging, probing)
//! is delegated to an external FFmpeg process. Each invocation is described
//! by a [`ToolCommand`] and executed by a [`CommandRunner`]; swapping the
//! runner lets tests exercise the whole pipeline without spawning anything.
//!
//! [`run_stage`] is the single place where an exit status is turned into a
//! [`LoopSyncError`].

use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{LoopSyncError, Stage};

/// A fully described external process: program, arguments, and the file it
/// is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// File the command writes on success, if any.
    pub artifact: Option<PathBuf>,
}

impl ToolCommand {
    /// Start describing an invocation of `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            artifact: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Record the file this command produces.
    #[must_use]
    pub fn produces(mut self, artifact: impl AsRef<Path>) -> Self {
        self.artifact = Some(artifact.as_ref().to_path_buf());
        self
    }

    /// Whether `arg` appears anywhere in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|candidate| candidate == arg)
    }

    /// The argument following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|candidate| candidate == flag)
            .and_then(|index| self.args.get(index + 1))
    }
}

impl Display for ToolCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What a finished process reported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Human-readable exit status (e.g. `"exit status: 1"`).
    pub status: String,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// The last non-empty line written to stderr.
    pub fn last_error_line(&self) -> Option<String> {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Executes [`ToolCommand`]s.
///
/// Implementations must block until the process exits. An `Err` means the
/// process could not be started; a process that ran and failed is an `Ok`
/// with `success == false`.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output.
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, LoopSyncError>;
}

/// Spawns real processes through [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, LoopSyncError> {
        log::debug!("Running {command}");

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| LoopSyncError::ToolSpawn {
                program: command.program.display().to_string(),
                reason: error.to_string(),
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run one pipeline stage, mapping a failed exit to
/// [`LoopSyncError::StageFailed`].
///
/// A successful command that was expected to write an artifact but did not
/// is reported as a failure of the same stage.
pub fn run_stage(
    runner: &dyn CommandRunner,
    stage: Stage,
    command: &ToolCommand,
) -> Result<ToolOutput, LoopSyncError> {
    let output = runner.run(command)?;

    if !output.success {
        log::warn!("{stage} exited unsuccessfully ({})", output.status);
        return Err(LoopSyncError::StageFailed {
            stage,
            status: output.status.clone(),
            detail: output.last_error_line(),
        });
    }

    if let Some(artifact) = &command.artifact
        && !artifact.exists()
    {
        return Err(LoopSyncError::StageFailed {
            stage,
            status: output.status.clone(),
            detail: Some(format!("{} was not written", artifact.display())),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_of_returns_following_argument() {
        let command = ToolCommand::new("ffmpeg").args(["-t", "12.5", "-y", "out.mp4"]);
        assert_eq!(command.value_of("-t").unwrap(), "12.5");
        assert!(command.value_of("-shortest").is_none());
        assert!(command.has_arg("-y"));
    }

    #[test]
    fn last_error_line_skips_trailing_blank_lines() {
        let output = ToolOutput {
            stderr: "first\nconcat.txt: Invalid data found\n\n".to_string(),
            ..ToolOutput::default()
        };
        assert_eq!(
            output.last_error_line().as_deref(),
            Some("concat.txt: Invalid data found")
        );
    }

    #[test]
    fn display_joins_program_and_arguments() {
        let command = ToolCommand::new("ffprobe").args(["-v", "error"]);
        assert_eq!(command.to_string(), "ffprobe -v error");
    }
}
