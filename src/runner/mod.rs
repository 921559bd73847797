//! The one capability the rest of the crate uses to talk to the outside world:
//! run a command line and collect what it printed.

pub mod process;
pub mod scripted;

pub use process::{OutputMode, ProcessRunner};
pub use scripted::ScriptedRunner;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit code {}", code),
            None => "signal".to_string(),
        }
    }
}

/// A single request to a [`CommandRunner`], kept by runners that record calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(argv: &[String], cwd: Option<&Path>, env: &[(String, String)]) -> Self {
        Self {
            argv: argv.to_vec(),
            cwd: cwd.map(Path::to_path_buf),
            env: env.to_vec(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cwd) = &self.cwd {
            write!(f, "(in {}) ", cwd.display())?;
        }
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Runs external commands. No retries; one call is one process.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> io::Result<CommandOutput> {
        (**self).run(argv, cwd, env).await
    }
}
