pub mod config;
pub mod point;

pub use config::{SimulatorConfig, SweepConfig, TrialParams};
pub use point::{ParameterPoint, PointAccumulator, Quantity};

use crate::error::{SweepError, TrialResult};
use crate::report::TrialOutcome;
use crate::runner::CommandRunner;
use anyhow::Result;
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The aggregated points of one outer configuration, in increasing `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub configuration: u32,
    pub distance: i64,
    pub points: Vec<ParameterPoint>,
}

impl SweepResult {
    pub fn new(configuration: u32, distance: i64) -> Self {
        Self {
            configuration,
            distance,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(relay probability, value)` for every point where the quantity exists.
    pub fn series(&self, quantity: Quantity) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.value(quantity).map(|v| (p.relay_probability, v)))
            .collect()
    }

    pub fn indices(&self) -> Vec<u32> {
        self.points.iter().map(|p| p.index).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepCounters {
    pub attempted: u64,
    pub completed: u64,
    pub skipped: u64,
}

/// Everything produced by one invocation of the sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRun {
    pub name: String,
    pub started_at: DateTime<Local>,
    pub config: SweepConfig,
    pub results: Vec<SweepResult>,
    pub counters: SweepCounters,
    pub interrupted: bool,
}

pub struct Sweep<R> {
    config: SweepConfig,
    runner: R,
    cancel: CancellationToken,
    show_progress: bool,
}

impl<R: CommandRunner> Sweep<R> {
    pub fn new(config: SweepConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn run(&self) -> Result<SweepRun> {
        self.config.validate()?;

        info!("Starting sweep: {}", self.config.name);
        info!(
            "Configurations: {}..={}, relay indices: {}..={}, seeds: {}..={}",
            self.config.first_configuration,
            self.config.last_configuration,
            self.config.first_relay_index,
            self.config.last_relay_index,
            self.config.first_seed,
            self.config.last_seed,
        );

        let pb = self.progress_bar()?;
        let mut run = SweepRun {
            name: self.config.name.clone(),
            started_at: Local::now(),
            config: self.config.clone(),
            results: Vec::new(),
            counters: SweepCounters::default(),
            interrupted: false,
        };

        for k in self.config.configurations() {
            let result = self.run_configuration(k, &mut run.counters, &pb).await;
            info!(
                "Configuration {} (distance {}): {} points",
                k,
                result.distance,
                result.len()
            );
            run.results.push(result);

            if self.cancel.is_cancelled() {
                break;
            }
        }

        run.interrupted = self.cancel.is_cancelled();
        if run.interrupted {
            pb.abandon_with_message("Sweep interrupted");
            warn!("Sweep interrupted, keeping results collected so far");
        } else {
            pb.finish_with_message("Sweep complete");
        }

        info!(
            "Trials: {} attempted, {} completed, {} skipped",
            run.counters.attempted, run.counters.completed, run.counters.skipped
        );
        Ok(run)
    }

    /// Middle loop for one configuration `k`.
    pub async fn run_configuration(
        &self,
        configuration: u32,
        counters: &mut SweepCounters,
        pb: &ProgressBar,
    ) -> SweepResult {
        let distance = self.config.distance(configuration);
        let mut result = SweepResult::new(configuration, distance);

        for j in self.config.relay_indices() {
            let acc = self.run_point(configuration, j, counters, pb).await;
            match acc.finish() {
                Some(point) => {
                    if point.guard_ratio.is_none() {
                        info!("k={} j={}: no non-innovative packets, guard ratio omitted", configuration, j);
                    }
                    for (quantity, value) in [
                        (Quantity::SourceRelayLoss, point.source_relay_loss),
                        (Quantity::RelayDestinationLoss, point.relay_destination_loss),
                        (Quantity::SourceDestinationLoss, point.source_destination_loss),
                    ] {
                        if value.is_none() {
                            debug!("k={} j={}: {} has a zero denominator", configuration, j, quantity);
                        }
                    }
                    result.points.push(point);
                }
                None => warn!("k={} j={}: no repetition completed, point skipped", configuration, j),
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        result
    }

    /// Inner loop over seeds for one relay setting.
    async fn run_point(
        &self,
        configuration: u32,
        relay_index: u32,
        counters: &mut SweepCounters,
        pb: &ProgressBar,
    ) -> PointAccumulator {
        let mut acc = PointAccumulator::new(relay_index);

        for seed in self.config.seeds() {
            if self.cancel.is_cancelled() {
                break;
            }

            let params = self.config.trial_params(configuration, relay_index, seed);
            counters.attempted += 1;

            let outcome = tokio::select! {
                outcome = self.run_trial(&params) => outcome,
                _ = self.cancel.cancelled() => {
                    counters.skipped += 1;
                    break;
                }
            };

            match outcome {
                Ok(outcome) => {
                    debug!("k={} {}: {:?}", configuration, params, outcome);
                    counters.completed += 1;
                    acc.push(outcome);
                }
                Err(e) => {
                    warn!("k={} {}: repetition skipped: {}", configuration, params, e);
                    counters.skipped += 1;
                }
            }

            pb.inc(1);
            pb.set_message(format!("k={} relay={}%", configuration, params.relay_activity));
        }

        acc
    }

    /// Launch the simulator once and parse its report.
    pub async fn run_trial(&self, params: &TrialParams) -> TrialResult<TrialOutcome> {
        let simulator = &self.config.simulator;
        let argv = simulator.argv(params);
        let call = self
            .runner
            .run(&argv, simulator.working_dir.as_deref(), &simulator.env);

        let output = match self.config.trial_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SweepError::Timeout(limit))??,
            None => call.await?,
        };

        if !output.success() {
            return Err(SweepError::ProcessFailed {
                status: output.status_text(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        TrialOutcome::parse(&output.stdout)
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(self.config.total_trials());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len} trials {msg}")?
                .progress_chars("█▓░"),
        );
        Ok(pb)
    }
}
