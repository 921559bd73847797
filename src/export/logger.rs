use crate::sweep::{ParameterPoint, SweepResult};
use anyhow::Result;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// One CSV row: a parameter point flattened to its means and ratios.
#[derive(Debug, Serialize)]
struct PointRecord {
    configuration: u32,
    distance: i64,
    index: u32,
    relay_activity: u32,
    relay_probability: f64,
    repetitions: usize,
    increased: f64,
    not_increased: f64,
    difference: f64,
    total_sent: f64,
    source_sent: f64,
    relay_sent: f64,
    received_from_source: f64,
    received_from_relay: f64,
    relay_received: f64,
    delay: f64,
    delay_std: Option<f64>,
    throughput: Option<f64>,
    source_destination_loss: Option<f64>,
    source_relay_loss: Option<f64>,
    relay_destination_loss: Option<f64>,
    guard_ratio: Option<f64>,
}

impl PointRecord {
    fn new(result: &SweepResult, point: &ParameterPoint) -> Self {
        Self {
            configuration: result.configuration,
            distance: result.distance,
            index: point.index,
            relay_activity: point.relay_activity,
            relay_probability: point.relay_probability,
            repetitions: point.repetitions,
            increased: point.increased.mean,
            not_increased: point.not_increased.mean,
            difference: point.difference.mean,
            total_sent: point.total_sent.mean,
            source_sent: point.source_sent.mean,
            relay_sent: point.relay_sent.mean,
            received_from_source: point.received_from_source.mean,
            received_from_relay: point.received_from_relay.mean,
            relay_received: point.relay_received.mean,
            delay: point.delay.mean,
            delay_std: point.delay.std_dev,
            throughput: point.throughput.map(|t| t.mean),
            source_destination_loss: point.source_destination_loss,
            source_relay_loss: point.source_relay_loss,
            relay_destination_loss: point.relay_destination_loss,
            guard_ratio: point.guard_ratio,
        }
    }
}

pub struct PointLogger {
    writer: Writer<File>,
}

impl PointLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log(&mut self, result: &SweepResult, point: &ParameterPoint) -> Result<()> {
        self.writer.serialize(PointRecord::new(result, point))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_result(&mut self, result: &SweepResult) -> Result<()> {
        for point in &result.points {
            self.log(result, point)?;
        }
        Ok(())
    }
}
