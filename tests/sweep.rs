use relaysweep::prelude::*;
use relaysweep::runner::Invocation;
use std::io;

fn flag(inv: &Invocation, name: &str) -> Option<u32> {
    let prefix = format!("--{}=", name);
    inv.argv
        .iter()
        .flat_map(|a| a.split_whitespace())
        .find_map(|f| f.strip_prefix(prefix.as_str()))
        .and_then(|v| v.parse().ok())
}

/// Deterministic fake simulator: every number depends only on seed and
/// relay activity.
fn synthetic(inv: &Invocation) -> io::Result<CommandOutput> {
    let seed = flag(inv, "seed").unwrap_or(0) as u64;
    let relay = flag(inv, "RelayActivity").unwrap_or(0) as u64;
    let sent = 100 + seed;
    let sent_code = relay;
    let not_increased = (seed + relay) % 4;
    let increased = 30 + seed;
    Ok(CommandOutput::ok(format!(
        "Simulation starting\nsent: {}\nsent_code: {}\nreceived: {}\nnot increased: {}\nfrom_source: {}\nfrom_relay: {}\nreceived_relay: {}\ntime: {}\nincreased: {}\nrecevied_source: {}\nreceived_relay: {}\n",
        sent,
        sent_code,
        increased + not_increased,
        not_increased,
        sent / 3,
        sent_code / 2,
        0,
        0.01 * seed as f64,
        increased,
        sent / 3,
        sent / 2,
    )))
}

fn config() -> SweepConfig {
    SweepConfig::default()
        .with_configurations(1, 2)
        .with_relay_indices(1, 12)
        .with_seeds(1, 5)
}

#[tokio::test]
async fn series_are_aligned_and_ordered() {
    let run = Sweep::new(config(), ScriptedRunner::new(synthetic)).run().await.unwrap();

    assert_eq!(run.results.len(), 2);
    assert_eq!(run.counters.attempted, 2 * 12 * 5);
    assert_eq!(run.counters.skipped, 0);

    for result in &run.results {
        let indices = result.indices();
        assert_eq!(indices.len(), 12);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));

        for quantity in Quantity::ALL.iter().filter(|q| !q.is_derived()) {
            assert_eq!(result.series(*quantity).len(), result.len(), "{}", quantity);
        }
        // x axis is 1 - j/100
        let probabilities: Vec<f64> = result.series(Quantity::Increased).iter().map(|(p, _)| *p).collect();
        assert!((probabilities[0] - 0.99).abs() < 1e-12);
        assert!(probabilities.windows(2).all(|w| w[0] > w[1]));
    }

    assert_eq!(run.results[0].distance, -250);
    assert_eq!(run.results[1].distance, 0);
}

#[tokio::test]
async fn duplicate_keys_keep_last_value() {
    let run = Sweep::new(config().with_configurations(1, 1).with_relay_indices(1, 1), ScriptedRunner::new(synthetic))
        .run()
        .await
        .unwrap();
    let point = &run.results[0].points[0];
    // received_relay is printed twice; the second value is sent / 2
    let expected = (1..=5).map(|s| ((100 + s) / 2) as f64).sum::<f64>() / 5.0;
    assert_eq!(point.relay_received.mean, expected);
}

#[tokio::test]
async fn identical_inputs_give_identical_results() {
    let first = Sweep::new(config(), ScriptedRunner::new(synthetic)).run().await.unwrap();
    let second = Sweep::new(config(), ScriptedRunner::new(synthetic)).run().await.unwrap();

    assert_eq!(first.results, second.results);
    for (a, b) in first.results.iter().zip(&second.results) {
        for quantity in Quantity::ALL {
            let xs: Vec<u64> = a.series(quantity).iter().map(|(_, v)| v.to_bits()).collect();
            let ys: Vec<u64> = b.series(quantity).iter().map(|(_, v)| v.to_bits()).collect();
            assert_eq!(xs, ys);
        }
    }
}

#[tokio::test]
async fn failures_leave_denominator_untouched() {
    let runner = ScriptedRunner::new(|inv: &Invocation| -> io::Result<CommandOutput> {
        if flag(inv, "seed") == Some(3) {
            Ok(CommandOutput::failed(134, "Aborted (core dumped)"))
        } else {
            synthetic(inv)
        }
    });
    let run = Sweep::new(config(), runner).run().await.unwrap();
    let clean = Sweep::new(config().with_seeds(1, 5), ScriptedRunner::new(synthetic)).run().await.unwrap();

    assert_eq!(run.counters.skipped, 2 * 12);
    for (result, reference) in run.results.iter().zip(&clean.results) {
        assert_eq!(result.len(), reference.len());
        for point in &result.points {
            assert_eq!(point.repetitions, 4);
            // seeds 1, 2, 4, 5
            assert_eq!(point.increased.mean, (31.0 + 32.0 + 34.0 + 35.0) / 4.0);
        }
    }
}

#[tokio::test]
async fn guard_ratio_gap_does_not_shorten_other_series() {
    let runner = ScriptedRunner::new(|inv: &Invocation| -> io::Result<CommandOutput> {
        let relay = flag(inv, "RelayActivity").unwrap_or(0);
        let not_increased = if relay == 95 { 0 } else { 3 };
        Ok(CommandOutput::ok(format!(
            "increased:6\nnot increased:{}\nsent:10\nsent_code:5\nrecevied_source:7\nreceived:12\nfrom_source:8\nfrom_relay:3\ntime:0.5\nreceived_relay:4\n",
            not_increased
        )))
    });
    let run = Sweep::new(config().with_configurations(1, 1), runner).run().await.unwrap();
    let result = &run.results[0];

    assert_eq!(result.len(), 12);
    assert_eq!(result.series(Quantity::GuardRatio).len(), 11);
    assert_eq!(result.series(Quantity::Throughput).len(), 12);
    assert_eq!(result.series(Quantity::RelayDestinationLoss).len(), 12);

    let gap = result.points.iter().find(|p| p.relay_activity == 95).unwrap();
    assert_eq!(gap.index, 5);
    assert_eq!(gap.guard_ratio, None);
    assert_eq!(gap.throughput.unwrap().mean, (12.0 - 0.0) / 15.0);
}

#[cfg(unix)]
#[tokio::test]
async fn real_process_with_capture_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
for a in "$@"; do
  case "$a" in
    --seed=*) seed="${a#--seed=}" ;;
    --RelayActivity=*) relay="${a#--RelayActivity=}" ;;
  esac
done
if [ "$seed" = "3" ]; then
  echo "partial: $relay"
  echo "segfault in relay" >&2
  exit 139
fi
echo "sent: 10"
echo "sent_code: $relay"
echo "received: 12"
echo "not increased: 2"
echo "from_source: 8"
echo "from_relay: 3"
echo "received_relay: 4"
echo "time: 0.5"
echo "increased: $((6 + seed))"
echo "recevied_source: 7"
"#;

    let mut cfg = SweepConfig::default()
        .with_configurations(2, 2)
        .with_relay_indices(10, 11)
        .with_seeds(1, 3)
        .with_capture_file(dir.path().join("trial.out"));
    cfg.simulator = relaysweep::sweep::SimulatorConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string(), "fake-sim".to_string()],
        scenario: String::new(),
        inline_run: false,
        ..Default::default()
    };
    cfg.trial_timeout_secs = Some(30);

    let runner = ProcessRunner::capture_to(&cfg.capture_file);
    let run = Sweep::new(cfg, runner).run().await.unwrap();

    assert_eq!(run.counters.completed, 4);
    assert_eq!(run.counters.skipped, 2);
    let points = &run.results[0].points;
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].relay_activity, 90);
    assert_eq!(points[0].relay_sent.mean, 90.0);
    assert_eq!(points[1].relay_sent.mean, 89.0);
    // seeds 1 and 2 survive
    assert_eq!(points[0].increased.mean, 7.5);
    assert_eq!(points[0].repetitions, 2);
    // the last trial (relay 89%, seed 3) failed after writing to stdout
    let captured = std::fs::read_to_string(dir.path().join("trial.out")).unwrap();
    assert_eq!(captured, "partial: 89\n");
}

#[tokio::test]
async fn non_finite_time_is_skipped_and_run_reloads() {
    let runner = ScriptedRunner::new(|inv: &Invocation| -> io::Result<CommandOutput> {
        let mut out = synthetic(inv)?;
        if flag(inv, "seed") == Some(1) {
            out.stdout = out.stdout.replace("time: 0.01", "time: nan");
        }
        Ok(out)
    });
    let run = Sweep::new(config().with_configurations(1, 1), runner).run().await.unwrap();
    assert_eq!(run.counters.skipped, 12);
    assert!(run.results[0].points.iter().all(|p| p.delay.mean.is_finite()));

    let dir = tempfile::tempdir().unwrap();
    let saved = relaysweep::export::save_run(&run, dir.path()).unwrap();
    let loaded = relaysweep::export::load_run(&saved.json).unwrap();
    assert_eq!(loaded.results, run.results);
}
