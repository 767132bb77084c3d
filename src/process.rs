//! External command invocation.
//!
//! Commands are built as structured argument lists with [`Cmd`] and executed
//! through a [`CommandRunner`], so callers never go through a shell and tests
//! can substitute a runner that records instead of spawning.

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

/// Output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CmdResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can execute a [`Cmd`].
pub trait CommandRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CmdResult>;
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CmdResult> {
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .with_context(|| format!("failed to spawn '{}'", cmd.program))?;
        Ok(CmdResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Records every command line and reports success, except for programs
/// registered with [`RecordingRunner::fail_program`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failing: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_program(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    /// Every recorded invocation as `[program, args...]`.
    pub fn calls(&self) -> Vec<Vec<String>> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CmdResult> {
        let mut line = vec![cmd.program.clone()];
        line.extend(cmd.argv());
        match self.calls.lock() {
            Ok(mut calls) => calls.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
        if self.failing.contains(&cmd.program) {
            return Ok(CmdResult {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{}: simulated failure", cmd.program),
            });
        }
        Ok(CmdResult {
            code: Some(0),
            ..CmdResult::default()
        })
    }
}

/// Command line builder.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self.args.push(a.as_ref().to_os_string());
        }
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Return the result instead of an error on non-zero exit.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments exactly as they are passed to the process.
    pub fn args_os(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as text; non-UTF-8 bytes are replaced.
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Rendered command line, for logs only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.argv())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run_with(&self, runner: &dyn CommandRunner) -> Result<CmdResult> {
        let result = runner.execute(self)?;
        if !result.success() && !self.allow_fail {
            let what = self
                .error_msg
                .clone()
                .unwrap_or_else(|| format!("'{}' failed", self.display()));
            bail!(
                "{} (exit {:?}): {}",
                what,
                result.code,
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    pub fn run(&self) -> Result<CmdResult> {
        self.run_with(&SystemRunner)
    }
}
