pub mod build;
pub mod error;
pub mod export;
pub mod plot;
pub mod report;
pub mod runner;
pub mod stats;
pub mod sweep;

pub use error::SweepError;
pub use report::{TrialOutcome, TrialReport};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use sweep::{Sweep, SweepConfig, SweepResult, SweepRun};

pub mod prelude {
    pub use crate::build::{BuildCommand, BuildProperties, Builder};
    pub use crate::plot::ChartFormat;
    pub use crate::report::{ReportField, TrialOutcome, TrialReport};
    pub use crate::runner::{CommandOutput, CommandRunner, ProcessRunner, ScriptedRunner};
    pub use crate::stats::Summary;
    pub use crate::sweep::{ParameterPoint, Quantity, Sweep, SweepConfig, SweepResult, SweepRun};
}
