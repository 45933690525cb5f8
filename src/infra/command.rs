//! External command execution
//!
//! Every disk, mount and copy operation goes through a [`CommandRunner`].
//! [`SystemRunner`] spawns real processes; [`RecordingRunner`] records the
//! argv it is given so callers can be exercised without touching a disk.

use std::cell::RefCell;
use std::path::Path;
use std::process::Command;

use crate::error::CommandError;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument
    #[must_use]
    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Render as a shell-like command line for logs
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Capability to run an external program to completion
///
/// Implementations block until the program exits and turn a non-zero exit
/// into [`CommandError::Failed`].
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        tracing::debug!("Executing: {}", invocation.command_line());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|e| CommandError::Spawn {
                program: invocation.program.clone(),
                error: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            tracing::debug!("{}: {}", invocation.program, stdout.trim_end());
        }

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(CommandError::Failed {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Failure trigger for [`RecordingRunner`]
#[derive(Debug, Clone)]
struct FailureTrigger {
    program: String,
    arg: Option<String>,
}

/// Records invocations instead of running them
///
/// Every call succeeds with empty output unless it matches a failure trigger
/// registered with [`RecordingRunner::fail_on`]. Failing calls are recorded too.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Invocation>>,
    triggers: Vec<FailureTrigger>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any invocation of `program`, optionally only when one of its
    /// arguments equals `arg`
    #[must_use]
    pub fn fail_on(mut self, program: &str, arg: Option<&str>) -> Self {
        self.triggers.push(FailureTrigger {
            program: program.to_string(),
            arg: arg.map(String::from),
        });
        self
    }

    /// All invocations seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Invocations rendered as command lines
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Invocation::command_line).collect()
    }

    /// Invocations of one program
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    fn should_fail(&self, invocation: &Invocation) -> bool {
        self.triggers.iter().any(|t| {
            t.program == invocation.program
                && t.arg
                    .as_ref()
                    .map_or(true, |a| invocation.args.iter().any(|x| x == a))
        })
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.borrow_mut().push(invocation.clone());

        if self.should_fail(invocation) {
            return Err(CommandError::Failed {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        Ok(CommandOutput::default())
    }
}
