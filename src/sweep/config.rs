use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to launch one simulator trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub scenario: String,
    /// Pass scenario and flags as a single `--run "<scenario> <flags>"` string
    /// (the waf convention) instead of separate arguments.
    pub inline_run: bool,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            program: "./waf".to_string(),
            args: vec!["--run".to_string()],
            scenario: "test".to_string(),
            inline_run: true,
            working_dir: None,
            env: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn argv(&self, params: &TrialParams) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 9);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());

        let flags = params.flags();
        if self.inline_run {
            let mut run = self.scenario.clone();
            for flag in &flags {
                if !run.is_empty() {
                    run.push(' ');
                }
                run.push_str(flag);
            }
            argv.push(run);
        } else {
            if !self.scenario.is_empty() {
                argv.push(self.scenario.clone());
            }
            argv.extend(flags);
        }
        argv
    }
}

/// Parameters of a single simulator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialParams {
    pub num_packets: u32,
    pub enable_code: bool,
    pub symbols: u32,
    pub seed: u32,
    pub enable_recode: bool,
    /// Percentage of time the relay forwards, `100 - j`.
    pub relay_activity: u32,
    pub distance: i64,
}

impl TrialParams {
    pub fn flags(&self) -> Vec<String> {
        vec![
            format!("--numPackets={}", self.num_packets),
            format!("--EnableCode={}", self.enable_code as u8),
            format!("--Symbols={}", self.symbols),
            format!("--seed={}", self.seed),
            format!("--EnableRencode={}", self.enable_recode as u8),
            format!("--RelayActivity={}", self.relay_activity),
            format!("--distance={}", self.distance),
        ]
    }
}

impl fmt::Display for TrialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seed={} relay={}% distance={}",
            self.seed, self.relay_activity, self.distance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub name: String,
    pub simulator: SimulatorConfig,

    /// Outer loop over topology configurations `k`.
    pub first_configuration: u32,
    pub last_configuration: u32,
    /// distance = k * step + offset
    pub distance_step: i64,
    pub distance_offset: i64,

    /// Middle loop over `j`; the relay forwards `100 - j` percent of the time.
    pub first_relay_index: u32,
    pub last_relay_index: u32,

    /// Inner loop over seeds.
    pub first_seed: u32,
    pub last_seed: u32,

    pub num_packets: u32,
    pub enable_code: bool,
    pub symbols: u32,
    pub enable_recode: bool,

    pub trial_timeout_secs: Option<u64>,
    /// Where each trial's stdout is captured before parsing.
    pub capture_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            name: "relay_sweep".to_string(),
            simulator: SimulatorConfig::default(),
            first_configuration: 1,
            last_configuration: 3,
            distance_step: 250,
            distance_offset: -500,
            first_relay_index: 1,
            last_relay_index: 99,
            first_seed: 1,
            last_seed: 19,
            num_packets: 1800,
            enable_code: true,
            symbols: 30,
            enable_recode: false,
            trial_timeout_secs: None,
            capture_file: PathBuf::from("trial_output.txt"),
            output_dir: PathBuf::from("results"),
        }
    }
}

impl SweepConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: SweepConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_recode(mut self, enable: bool) -> Self {
        self.enable_recode = enable;
        self
    }

    pub fn with_configurations(mut self, first: u32, last: u32) -> Self {
        self.first_configuration = first;
        self.last_configuration = last;
        self
    }

    pub fn with_relay_indices(mut self, first: u32, last: u32) -> Self {
        self.first_relay_index = first;
        self.last_relay_index = last;
        self
    }

    pub fn with_seeds(mut self, first: u32, last: u32) -> Self {
        self.first_seed = first;
        self.last_seed = last;
        self
    }

    pub fn with_capture_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture_file = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_configuration > self.last_configuration {
            bail!(
                "Empty configuration range: {}..={}",
                self.first_configuration,
                self.last_configuration
            );
        }
        if self.first_relay_index > self.last_relay_index {
            bail!(
                "Empty relay index range: {}..={}",
                self.first_relay_index,
                self.last_relay_index
            );
        }
        if self.last_relay_index > 100 {
            bail!("Relay index {} is above 100", self.last_relay_index);
        }
        if self.first_seed > self.last_seed {
            bail!("Empty seed range: {}..={}", self.first_seed, self.last_seed);
        }
        if self.simulator.program.is_empty() {
            bail!("No simulator program configured");
        }
        Ok(())
    }

    pub fn configurations(&self) -> RangeInclusive<u32> {
        self.first_configuration..=self.last_configuration
    }

    pub fn relay_indices(&self) -> RangeInclusive<u32> {
        self.first_relay_index..=self.last_relay_index
    }

    pub fn seeds(&self) -> RangeInclusive<u32> {
        self.first_seed..=self.last_seed
    }

    pub fn distance(&self, configuration: u32) -> i64 {
        configuration as i64 * self.distance_step + self.distance_offset
    }

    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_secs.map(Duration::from_secs)
    }

    pub fn total_trials(&self) -> u64 {
        let span = |a: u32, b: u32| (b as u64 + 1).saturating_sub(a as u64);
        span(self.first_configuration, self.last_configuration)
            * span(self.first_relay_index, self.last_relay_index)
            * span(self.first_seed, self.last_seed)
    }

    pub fn trial_params(&self, configuration: u32, relay_index: u32, seed: u32) -> TrialParams {
        TrialParams {
            num_packets: self.num_packets,
            enable_code: self.enable_code,
            symbols: self.symbols,
            seed,
            enable_recode: self.enable_recode,
            relay_activity: 100u32.saturating_sub(relay_index),
            distance: self.distance(configuration),
        }
    }
}
