pub mod logger;

pub use logger::PointLogger;

use crate::sweep::{Quantity, SweepResult, SweepRun};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Files written by [`save_run`].
#[derive(Debug, Clone)]
pub struct SavedRun {
    pub json: PathBuf,
    pub csv: Vec<PathBuf>,
}

pub fn run_stem(run: &SweepRun) -> String {
    format!("{}_{}", run.name, run.started_at.format("%Y%m%d_%H%M%S"))
}

/// Write the run as pretty JSON plus one CSV per configuration.
pub fn save_run(run: &SweepRun, dir: impl AsRef<Path>) -> Result<SavedRun> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let stem = run_stem(run);

    let json = dir.join(format!("{}.json", stem));
    fs::write(&json, serde_json::to_string_pretty(run)?)?;

    let mut csv = Vec::with_capacity(run.results.len());
    for result in &run.results {
        let path = dir.join(format!("{}_k{}.csv", stem, result.configuration));
        let mut logger = PointLogger::new(&path)?;
        logger.log_result(result)?;
        csv.push(path);
    }

    Ok(SavedRun { json, csv })
}

pub fn load_run(path: impl AsRef<Path>) -> Result<SweepRun> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let run = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(run)
}

/// Load a single run file, or every run file in a directory.
pub fn load_runs(path: impl AsRef<Path>) -> Result<Vec<SweepRun>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![load_run(path)?]);
    }
    if !path.is_dir() {
        anyhow::bail!("{} is neither a file nor a directory", path.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?.path();
        if entry.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(entry);
        }
    }
    files.sort();

    let mut runs = Vec::new();
    for file in files {
        match load_run(&file) {
            Ok(run) => runs.push(run),
            Err(e) => tracing::debug!("Skipping {}: {:#}", file.display(), e),
        }
    }
    Ok(runs)
}

const PGF_COLUMNS: [Quantity; 12] = [
    Quantity::Increased,
    Quantity::NotIncreased,
    Quantity::Difference,
    Quantity::TotalSent,
    Quantity::SourceSent,
    Quantity::RelaySent,
    Quantity::Throughput,
    Quantity::SourceDestinationLoss,
    Quantity::SourceRelayLoss,
    Quantity::RelayDestinationLoss,
    Quantity::Delay,
    Quantity::GuardRatio,
];

/// Whitespace separated table for pgfplots' `\addplot table`. Missing
/// ratios are written as `nan` so that rows stay aligned.
pub fn pgf_table(result: &SweepResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# configuration {} distance {}", result.configuration, result.distance);
    out.push_str("p");
    for q in PGF_COLUMNS {
        out.push(' ');
        out.push_str(q.column());
    }
    out.push('\n');

    for point in &result.points {
        let _ = write!(out, "{:.2}", point.relay_probability);
        for q in PGF_COLUMNS {
            match point.value(q) {
                Some(v) => {
                    let _ = write!(out, " {:.6}", v);
                }
                None => out.push_str(" nan"),
            }
        }
        out.push('\n');
    }
    out
}

pub fn export_pgf_data(run: &SweepRun, base: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let stem = base.to_string_lossy();
    let stem = stem.trim_end_matches(".dat");

    let mut written = Vec::new();
    for result in &run.results {
        let path = PathBuf::from(format!("{}_k{}.dat", stem, result.configuration));
        fs::write(&path, pgf_table(result))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TrialOutcome;
    use crate::sweep::{PointAccumulator, SweepConfig, SweepCounters};
    use chrono::Local;

    fn sample_run() -> SweepRun {
        let outcome = |not_increased: u64| TrialOutcome {
            increased: 20,
            not_increased,
            source_sent: 100,
            relay_sent: 40,
            received: 20 + not_increased,
            received_from_source: 60,
            received_from_relay: 30,
            relay_received: 80,
            source_received: 60,
            time: 0.25,
        };

        let mut result = SweepResult::new(2, 0);
        for (j, ni) in [(1, 4), (2, 0)] {
            let mut acc = PointAccumulator::new(j);
            acc.push(outcome(ni));
            result.points.push(acc.finish().unwrap());
        }

        SweepRun {
            name: "unit".to_string(),
            started_at: Local::now(),
            config: SweepConfig::default(),
            results: vec![result],
            counters: SweepCounters { attempted: 2, completed: 2, skipped: 0 },
            interrupted: false,
        }
    }

    #[test]
    fn pgf_rows_keep_alignment() {
        let run = sample_run();
        let table = pgf_table(&run.results[0]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("p increased not_increased"));
        assert!(lines[2].starts_with("0.99 20.000000 4.000000"));
        assert!(lines[3].starts_with("0.98 "));
        assert!(lines[3].ends_with(" nan"));
        let width = lines[1].split_whitespace().count();
        assert!(lines[2..].iter().all(|l| l.split_whitespace().count() == width));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let run = sample_run();
        let saved = save_run(&run, dir.path()).unwrap();

        assert_eq!(saved.csv.len(), 1);
        let csv = fs::read_to_string(&saved.csv[0]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("configuration,distance,index,relay_activity"));
        assert_eq!(lines.count(), 2);

        let loaded = load_run(&saved.json).unwrap();
        assert_eq!(loaded.results, run.results);
        assert_eq!(loaded.counters, run.counters);

        let all = load_runs(dir.path()).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn pgf_files_per_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("plots").join("relay.dat");
        let written = export_pgf_data(&sample_run(), &base).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("plots/relay_k2.dat"));
        assert!(written[0].exists());
    }
}
