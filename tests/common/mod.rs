//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use loopsync::{
    CommandRunner, DurationProbe, JobProgress, JobStage, LoopSyncError, ProgressCallback,
    ToolCommand, ToolOutput, ToolPaths, VideoLooper,
};

type FailWhen = Box<dyn Fn(&ToolCommand) -> bool + Send + Sync>;

/// Records every command and "succeeds" by creating the expected artifact.
#[derive(Default)]
pub struct FakeRunner {
    commands: Mutex<Vec<ToolCommand>>,
    fail_when: Option<FailWhen>,
    stdout: String,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (exit status 1) every command matching `predicate`.
    pub fn failing_when(
        mut self,
        predicate: impl Fn(&ToolCommand) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Fail every command whose output file is named `name`.
    pub fn failing_output(self, name: &'static str) -> Self {
        self.failing_when(move |command| {
            command
                .artifact
                .as_deref()
                .and_then(Path::file_name)
                .is_some_and(|file_name| file_name == name)
        })
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Output file names of the recorded commands, in order.
    pub fn outputs(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|command| command.artifact.as_deref())
            .filter_map(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, LoopSyncError> {
        self.commands.lock().unwrap().push(command.clone());

        if self.fail_when.as_ref().is_some_and(|fail| fail(command)) {
            return Ok(ToolOutput {
                success: false,
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: "Invalid data found when processing input\n".to_string(),
            });
        }

        if let Some(artifact) = &command.artifact {
            fs::write(artifact, b"")?;
        }

        Ok(ToolOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: self.stdout.clone(),
            stderr: String::new(),
        })
    }
}

/// Returns a fixed duration per file name; anything unknown measures `0.0`.
#[derive(Default)]
pub struct FakeProber {
    durations: HashMap<String, f64>,
}

impl FakeProber {
    pub fn new<'a>(durations: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            durations: durations
                .into_iter()
                .map(|(name, seconds)| (name.to_string(), seconds))
                .collect(),
        }
    }
}

impl DurationProbe for FakeProber {
    fn probe(&self, path: &Path) -> f64 {
        path.file_name()
            .and_then(|name| self.durations.get(name.to_string_lossy().as_ref()))
            .copied()
            .unwrap_or(0.0)
    }
}

/// A looper wired to fakes, plus a handle on the runner for assertions.
pub fn fake_looper(runner: FakeRunner, prober: FakeProber) -> (VideoLooper, Arc<FakeRunner>) {
    let runner = Arc::new(runner);
    let looper = VideoLooper::with_tools(ToolPaths::default())
        .with_runner(runner.clone())
        .with_prober(Arc::new(prober));
    (looper, runner)
}

/// Collects every progress update.
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(JobStage, Option<String>)>>,
}

impl RecordingProgress {
    pub fn stages(&self) -> Vec<JobStage> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|(stage, _)| *stage)
            .collect()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, progress: &JobProgress) {
        self.updates
            .lock()
            .unwrap()
            .push((progress.stage, progress.message.clone()));
    }
}

/// Argument list rendered as strings.
pub fn args_of(command: &ToolCommand) -> Vec<String> {
    command
        .args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}
