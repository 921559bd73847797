//! Configure, build and test the simulator distribution. Every step is an
//! external command; any failure stops the step.

use crate::runner::CommandRunner;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const EXAMPLES_SUBDIR: &str = "kodo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCommand {
    Configure,
    Build,
    RunTests,
    Install,
}

impl FromStr for BuildCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "configure" => Ok(BuildCommand::Configure),
            "build" => Ok(BuildCommand::Build),
            "run_tests" => Ok(BuildCommand::RunTests),
            "install" => Ok(BuildCommand::Install),
            other => bail!("Unknown command: {}. Use: configure, build, run_tests or install", other),
        }
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildCommand::Configure => "configure",
            BuildCommand::Build => "build",
            BuildCommand::RunTests => "run_tests",
            BuildCommand::Install => "install",
        })
    }
}

/// Options bundle passed as JSON on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProperties {
    pub build_distclean: bool,
    pub waf_bundle_path: Option<String>,
    pub dependency_project: Option<String>,
    pub dependency_checkout: Option<String>,
    pub cxx_mkspec: Option<String>,
    /// `null` values become `--key`, anything else `--key=value`.
    pub tool_options: BTreeMap<String, Value>,
    pub ns3_path: Option<PathBuf>,
    pub valgrind_run: bool,
    pub python: String,
    pub ns3_repository: String,
    pub ns3_revision: String,
}

impl Default for BuildProperties {
    fn default() -> Self {
        Self {
            build_distclean: false,
            waf_bundle_path: None,
            dependency_project: None,
            dependency_checkout: None,
            cxx_mkspec: None,
            tool_options: BTreeMap::new(),
            ns3_path: None,
            valgrind_run: false,
            python: "python3".to_string(),
            ns3_repository: "http://code.nsnam.org/ns-3-dev/".to_string(),
            ns3_revision: "11767".to_string(),
        }
    }
}

impl BuildProperties {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid build properties")
    }

    pub fn tool_option_args(&self) -> Vec<String> {
        self.tool_options
            .iter()
            .map(|(key, value)| match value {
                Value::Null => format!("--{}", key),
                Value::String(s) => format!("--{}={}", key, s),
                other => format!("--{}={}", key, other),
            })
            .collect()
    }

    fn ns3_path(&self) -> Result<&Path> {
        self.ns3_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("`ns3_path` is required"))
    }
}

pub struct Builder<R> {
    properties: BuildProperties,
    runner: R,
    project_dir: Option<PathBuf>,
}

impl<R: CommandRunner> Builder<R> {
    pub fn new(properties: BuildProperties, runner: R) -> Self {
        Self {
            properties,
            runner,
            project_dir: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn execute(&self, command: BuildCommand) -> Result<()> {
        info!("Build step: {}", command);
        match command {
            BuildCommand::Configure => self.configure().await,
            BuildCommand::Build => self.build().await,
            BuildCommand::RunTests => self.run_tests().await,
            BuildCommand::Install => {
                info!("Nothing to install");
                Ok(())
            }
        }
    }

    pub async fn configure(&self) -> Result<()> {
        let props = &self.properties;
        let mkspec = props
            .cxx_mkspec
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("`cxx_mkspec` is required"))?;
        let ns3_path = props.ns3_path()?;

        let mut command = self.waf();
        if props.build_distclean {
            command.push("distclean".to_string());
        }
        command.push("configure".to_string());
        command.push("--git-protocol=git@".to_string());
        if let Some(bundle) = &props.waf_bundle_path {
            command.push(format!("--bundle-path={}", bundle));
        }
        match (&props.dependency_project, &props.dependency_checkout) {
            (Some(project), Some(checkout)) => command.push(format!("--{}-use-checkout={}", project, checkout)),
            (Some(project), None) => bail!("`dependency_checkout` is required with `dependency_project` ({})", project),
            _ => {}
        }
        command.push(format!("--cxx_mkspec={}", mkspec));
        command.extend(props.tool_option_args());
        self.run_command(&command, self.project_dir.as_deref()).await?;

        // stale examples from a previous install
        let examples = ns3_path.join("examples").join(EXAMPLES_SUBDIR);
        if examples.is_dir() {
            info!("Removing {}", examples.display());
            std::fs::remove_dir_all(&examples)?;
        }

        if !ns3_path.is_dir() {
            let clone = vec![
                "hg".to_string(),
                "clone".to_string(),
                props.ns3_repository.clone(),
                ns3_path.display().to_string(),
            ];
            self.run_command(&clone, self.project_dir.as_deref()).await?;
        }

        let pull = vec!["hg".to_string(), "pull".to_string()];
        self.run_command(&pull, Some(ns3_path)).await?;
        let checkout = vec!["hg".to_string(), "checkout".to_string(), props.ns3_revision.clone()];
        self.run_command(&checkout, Some(ns3_path)).await?;

        let mut enable = self.waf();
        enable.push("configure".to_string());
        enable.push("--enable-examples".to_string());
        self.run_command(&enable, Some(ns3_path)).await
    }

    pub async fn build(&self) -> Result<()> {
        let ns3_path = self.properties.ns3_path()?;
        let mut command = self.waf();
        command.extend(["build", "install", "-v"].map(String::from));
        command.push(format!("--ns3_path={}", ns3_path.display()));
        self.run_command(&command, self.project_dir.as_deref()).await
    }

    pub async fn run_tests(&self) -> Result<()> {
        let mut command = self.waf();
        command.extend(["-v", "--run_tests"].map(String::from));
        if self.properties.valgrind_run {
            command.push("--run_cmd=valgrind --error-exitcode=1 %s".to_string());
        }
        command.extend(self.properties.tool_option_args());
        self.run_command(&command, self.project_dir.as_deref()).await
    }

    fn waf(&self) -> Vec<String> {
        vec![self.properties.python.clone(), "waf".to_string()]
    }

    async fn run_command(&self, argv: &[String], cwd: Option<&Path>) -> Result<()> {
        info!("Running: {}", argv.join(" "));
        let output = self
            .runner
            .run(argv, cwd, &[])
            .await
            .with_context(|| format!("failed to launch {}", argv.join(" ")))?;
        if !output.success() {
            bail!(
                "Command failed with {}: {}\n{}",
                output.status_text(),
                argv.join(" "),
                output.stderr.trim()
            );
        }
        Ok(())
    }
}
