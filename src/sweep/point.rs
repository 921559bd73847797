use crate::report::TrialOutcome;
use crate::stats::{self, Summary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything a sweep tracks per relay setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Increased,
    NotIncreased,
    Difference,
    TotalSent,
    SourceSent,
    RelaySent,
    ReceivedFromSource,
    ReceivedFromRelay,
    RelayReceived,
    Delay,
    Throughput,
    SourceDestinationLoss,
    SourceRelayLoss,
    RelayDestinationLoss,
    GuardRatio,
}

impl Quantity {
    pub const ALL: [Quantity; 15] = [
        Quantity::Increased,
        Quantity::NotIncreased,
        Quantity::Difference,
        Quantity::TotalSent,
        Quantity::SourceSent,
        Quantity::RelaySent,
        Quantity::ReceivedFromSource,
        Quantity::ReceivedFromRelay,
        Quantity::RelayReceived,
        Quantity::Delay,
        Quantity::Throughput,
        Quantity::SourceDestinationLoss,
        Quantity::SourceRelayLoss,
        Quantity::RelayDestinationLoss,
        Quantity::GuardRatio,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Quantity::Increased => "increased",
            Quantity::NotIncreased => "not_increased",
            Quantity::Difference => "difference",
            Quantity::TotalSent => "total_sent",
            Quantity::SourceSent => "source_sent",
            Quantity::RelaySent => "relay_sent",
            Quantity::ReceivedFromSource => "received_from_source",
            Quantity::ReceivedFromRelay => "received_from_relay",
            Quantity::RelayReceived => "relay_received",
            Quantity::Delay => "delay",
            Quantity::Throughput => "throughput",
            Quantity::SourceDestinationLoss => "source_destination_loss",
            Quantity::SourceRelayLoss => "source_relay_loss",
            Quantity::RelayDestinationLoss => "relay_destination_loss",
            Quantity::GuardRatio => "guard_ratio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quantity::Increased => "innovative packets",
            Quantity::NotIncreased => "non-innovative packets",
            Quantity::Difference => "innovative - non-innovative",
            Quantity::TotalSent => "sent by source and relay",
            Quantity::SourceSent => "source sending activity",
            Quantity::RelaySent => "relay sending activity",
            Quantity::ReceivedFromSource => "received from source",
            Quantity::ReceivedFromRelay => "received from relay",
            Quantity::RelayReceived => "relay receiving activity",
            Quantity::Delay => "delay",
            Quantity::Throughput => "throughput",
            Quantity::SourceDestinationLoss => "source to destination loss",
            Quantity::SourceRelayLoss => "source to relay loss",
            Quantity::RelayDestinationLoss => "relay to destination loss",
            Quantity::GuardRatio => "innovative / non-innovative",
        }
    }

    /// Ratios derived from the means may be missing for a point; everything
    /// else is present whenever the point is.
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            Quantity::Throughput
                | Quantity::SourceDestinationLoss
                | Quantity::SourceRelayLoss
                | Quantity::RelayDestinationLoss
                | Quantity::GuardRatio
        )
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The aggregate of all successful repetitions at one relay setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    /// Inner loop index `j`.
    pub index: u32,
    pub relay_activity: u32,
    /// `1 - j/100`
    pub relay_probability: f64,
    pub repetitions: usize,

    pub increased: Summary,
    pub not_increased: Summary,
    pub difference: Summary,
    pub total_sent: Summary,
    pub source_sent: Summary,
    pub relay_sent: Summary,
    pub received_from_source: Summary,
    pub received_from_relay: Summary,
    pub relay_received: Summary,
    pub delay: Summary,
    pub throughput: Option<Summary>,

    pub source_relay_loss: Option<f64>,
    pub relay_destination_loss: Option<f64>,
    pub source_destination_loss: Option<f64>,
    pub guard_ratio: Option<f64>,
}

impl ParameterPoint {
    pub fn summary(&self, quantity: Quantity) -> Option<&Summary> {
        match quantity {
            Quantity::Increased => Some(&self.increased),
            Quantity::NotIncreased => Some(&self.not_increased),
            Quantity::Difference => Some(&self.difference),
            Quantity::TotalSent => Some(&self.total_sent),
            Quantity::SourceSent => Some(&self.source_sent),
            Quantity::RelaySent => Some(&self.relay_sent),
            Quantity::ReceivedFromSource => Some(&self.received_from_source),
            Quantity::ReceivedFromRelay => Some(&self.received_from_relay),
            Quantity::RelayReceived => Some(&self.relay_received),
            Quantity::Delay => Some(&self.delay),
            Quantity::Throughput => self.throughput.as_ref(),
            _ => None,
        }
    }

    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::SourceDestinationLoss => self.source_destination_loss,
            Quantity::SourceRelayLoss => self.source_relay_loss,
            Quantity::RelayDestinationLoss => self.relay_destination_loss,
            Quantity::GuardRatio => self.guard_ratio,
            q => self.summary(q).map(|s| s.mean),
        }
    }
}

/// Collects the outcomes of one relay setting's repetitions. Owned by the
/// inner loop and consumed by [`PointAccumulator::finish`].
#[derive(Debug, Clone)]
pub struct PointAccumulator {
    index: u32,
    outcomes: Vec<TrialOutcome>,
}

impl PointAccumulator {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            outcomes: Vec::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn push(&mut self, outcome: TrialOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Reduce to per-quantity means. `None` when no repetition completed.
    pub fn finish(self) -> Option<ParameterPoint> {
        let outcomes = &self.outcomes;
        let summarize = |f: fn(&TrialOutcome) -> f64| -> Option<Summary> {
            let column: Vec<f64> = outcomes.iter().map(f).collect();
            stats::mean_stdv(&column)
        };

        let increased = summarize(|o| o.increased as f64)?;
        let not_increased = summarize(|o| o.not_increased as f64)?;
        let source_sent = summarize(|o| o.source_sent as f64)?;
        let relay_sent = summarize(|o| o.relay_sent as f64)?;
        let received_from_source = summarize(|o| o.received_from_source as f64)?;
        let received_from_relay = summarize(|o| o.received_from_relay as f64)?;
        let relay_received = summarize(|o| o.relay_received as f64)?;

        let throughputs: Vec<f64> = outcomes.iter().filter_map(TrialOutcome::throughput).collect();

        Some(ParameterPoint {
            index: self.index,
            relay_activity: 100u32.saturating_sub(self.index),
            relay_probability: 1.0 - self.index as f64 / 100.0,
            repetitions: outcomes.len(),
            difference: summarize(|o| o.difference() as f64)?,
            total_sent: summarize(|o| o.overall_sent() as f64)?,
            delay: summarize(|o| o.time)?,
            throughput: stats::mean_stdv(&throughputs),
            source_relay_loss: stats::loss_ratio(source_sent.mean, relay_received.mean),
            relay_destination_loss: stats::loss_ratio(relay_sent.mean, received_from_relay.mean),
            source_destination_loss: stats::loss_ratio(source_sent.mean, received_from_source.mean),
            guard_ratio: stats::ratio(increased.mean, not_increased.mean),
            increased,
            not_increased,
            source_sent,
            relay_sent,
            received_from_source,
            received_from_relay,
            relay_received,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(increased: u64, not_increased: u64, sent: u64, sent_code: u64) -> TrialOutcome {
        TrialOutcome {
            increased,
            not_increased,
            source_sent: sent,
            relay_sent: sent_code,
            received: increased + not_increased,
            received_from_source: sent / 2,
            received_from_relay: sent_code / 2,
            relay_received: sent / 4,
            source_received: sent / 2,
            time: 1.5,
        }
    }

    #[test]
    fn empty_accumulator_yields_nothing() {
        assert!(PointAccumulator::new(4).finish().is_none());
    }

    #[test]
    fn means_over_repetitions() {
        let mut acc = PointAccumulator::new(25);
        acc.push(outcome(10, 2, 100, 40));
        acc.push(outcome(20, 4, 200, 80));
        let point = acc.finish().unwrap();

        assert_eq!(point.repetitions, 2);
        assert_eq!(point.relay_activity, 75);
        assert_eq!(point.relay_probability, 0.75);
        assert_eq!(point.increased.mean, 15.0);
        assert_eq!(point.not_increased.mean, 3.0);
        assert_eq!(point.difference.mean, 12.0);
        assert_eq!(point.total_sent.mean, 210.0);
        assert_eq!(point.delay.mean, 1.5);
        assert_eq!(point.guard_ratio, Some(5.0));
        // relay received a quarter of what the source sent
        assert_eq!(point.source_relay_loss, Some(0.75));
        assert_eq!(point.relay_destination_loss, Some(0.5));
        assert_eq!(point.source_destination_loss, Some(0.5));
        assert!(point.increased.std_dev.unwrap() > 0.0);
    }

    #[test]
    fn zero_not_increased_drops_only_guard_ratio() {
        let mut acc = PointAccumulator::new(1);
        acc.push(outcome(10, 0, 100, 40));
        let point = acc.finish().unwrap();

        assert_eq!(point.guard_ratio, None);
        assert_eq!(point.value(Quantity::Increased), Some(10.0));
        assert!(point.source_relay_loss.is_some());
        assert!(point.throughput.is_some());
    }

    #[test]
    fn silent_relay_has_no_relay_loss() {
        let mut acc = PointAccumulator::new(99);
        acc.push(outcome(10, 1, 100, 0));
        let point = acc.finish().unwrap();

        assert_eq!(point.relay_destination_loss, None);
        assert_eq!(point.value(Quantity::RelaySent), Some(0.0));
    }

    #[test]
    fn throughput_skips_repetitions_without_traffic() {
        let mut acc = PointAccumulator::new(10);
        acc.push(outcome(0, 0, 0, 0));
        acc.push(outcome(6, 2, 10, 6));
        let point = acc.finish().unwrap();

        let throughput = point.throughput.unwrap();
        assert_eq!(throughput.samples, 1);
        assert_eq!(throughput.mean, 6.0 / 16.0);
        assert_eq!(point.repetitions, 2);
    }
}
