use super::{CommandOutput, CommandRunner};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// stdout and stderr are collected through pipes.
    Piped,
    /// stdout goes to this file, which is reopened and read back once the
    /// process has exited. The file is overwritten on every run.
    Capture(PathBuf),
    /// Both streams go to the terminal; nothing is collected.
    Inherit,
}

/// Spawns real processes. Dropping the future returned by `run` kills the
/// child, so callers can wrap it in a timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    mode: OutputMode,
}

impl ProcessRunner {
    pub fn piped() -> Self {
        Self { mode: OutputMode::Piped }
    }

    pub fn capture_to(path: impl Into<PathBuf>) -> Self {
        Self { mode: OutputMode::Capture(path.into()) }
    }

    pub fn inherit() -> Self {
        Self { mode: OutputMode::Inherit }
    }

    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    fn command(argv: &[String], cwd: Option<&Path>, env: &[(String, String)]) -> io::Result<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }

    async fn run_captured(
        path: &Path,
        argv: &[String],
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> io::Result<CommandOutput> {
        let (status, stderr) = {
            let capture = File::create(path)?;
            let mut cmd = Self::command(argv, cwd, env)?;
            cmd.stdout(Stdio::from(capture)).stderr(Stdio::piped());
            // `output()` would replace the file with a pipe
            let output = cmd.spawn()?.wait_with_output().await?;
            (output.status.code(), output.stderr)
        };

        let stdout = {
            let bytes = tokio::fs::read(path).await?;
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(CommandOutput {
            status,
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::piped()
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> io::Result<CommandOutput> {
        debug!("Running: {}", argv.join(" "));

        match &self.mode {
            OutputMode::Capture(path) => Self::run_captured(path, argv, cwd, env).await,
            OutputMode::Piped => {
                let output = Self::command(argv, cwd, env)?
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await?;
                Ok(CommandOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            OutputMode::Inherit => {
                let status = Self::command(argv, cwd, env)?
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await?;
                Ok(CommandOutput {
                    status: status.code(),
                    ..Default::default()
                })
            }
        }
    }
}
