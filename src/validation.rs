//! Tool availability checks.
//!
//! [`check_tools`] runs `-version` on the configured `ffmpeg` and `ffprobe`
//! binaries and summarizes the outcome in a [`ValidationReport`].
//!
//! # Example
//!
//! ```no_run
//! use loopsync::{SystemRunner, ToolPaths, check_tools};
//!
//! let report = check_tools(&ToolPaths::default(), &SystemRunner);
//! if !report.is_valid() {
//!     eprint!("{report}");
//! }
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use crate::command::{CommandRunner, ToolCommand, run_stage};
use crate::config::ToolPaths;
use crate::error::Stage;

/// Summary of an environment check.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
    /// Issues that will make every job fail.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of entries (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

/// Check that `ffmpeg` and `ffprobe` can be started.
pub fn check_tools(tools: &ToolPaths, runner: &dyn CommandRunner) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_tool(&mut report, runner, "ffmpeg", &tools.ffmpeg);
    check_tool(&mut report, runner, "ffprobe", &tools.ffprobe);
    report
}

fn check_tool(
    report: &mut ValidationReport,
    runner: &dyn CommandRunner,
    name: &str,
    program: &Path,
) {
    let command = ToolCommand::new(program).arg("-version");
    match run_stage(runner, Stage::ToolCheck, &command) {
        Ok(output) => {
            let version = output
                .stdout
                .lines()
                .next()
                .map(str::trim)
                .filter(|line| !line.is_empty());
            match version {
                Some(line) => report.info.push(line.to_string()),
                None => report.warnings.push(format!(
                    "{name} ran but printed no version ({})",
                    program.display()
                )),
            }
        }
        Err(error) => report.errors.push(format!("{name} unavailable: {error}")),
    }
}
