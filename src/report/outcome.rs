use super::{ReportField, TrialReport};
use crate::error::TrialResult;
use serde::{Deserialize, Serialize};

/// Values taken from one complete trial report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Rank-increasing packets at the destination.
    pub increased: u64,
    pub not_increased: u64,
    /// Packets sent by the source.
    pub source_sent: u64,
    /// Coded packets forwarded by the relay.
    pub relay_sent: u64,
    pub received: u64,
    pub received_from_source: u64,
    pub received_from_relay: u64,
    /// What the relay itself received from the source.
    pub relay_received: u64,
    pub source_received: u64,
    pub time: f64,
}

impl TrialOutcome {
    pub fn from_report(report: &TrialReport) -> TrialResult<Self> {
        report.ensure_complete()?;

        Ok(Self {
            increased: report.count(ReportField::Increased)?,
            not_increased: report.count(ReportField::NotIncreased)?,
            source_sent: report.count(ReportField::Sent)?,
            relay_sent: report.count(ReportField::SentCode)?,
            received: report.count(ReportField::Received)?,
            received_from_source: report.count(ReportField::FromSource)?,
            received_from_relay: report.count(ReportField::FromRelay)?,
            relay_received: report.count(ReportField::ReceivedRelay)?,
            source_received: report.count(ReportField::ReceivedSource)?,
            time: report.float(ReportField::Time)?,
        })
    }

    pub fn parse(text: &str) -> TrialResult<Self> {
        Self::from_report(&TrialReport::parse(text))
    }

    pub fn overall_sent(&self) -> u64 {
        self.source_sent.saturating_add(self.relay_sent)
    }

    pub fn difference(&self) -> i128 {
        i128::from(self.increased) - i128::from(self.not_increased)
    }

    /// Useful receptions per packet put on the air. `None` if nothing was sent.
    pub fn throughput(&self) -> Option<f64> {
        let overall = self.overall_sent();
        if overall == 0 {
            return None;
        }
        Some((self.received as f64 - self.not_increased as f64) / overall as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SweepError;

    const SAMPLE: &str = "sent:10\nsent_code:5\nreceived:12\nnot increased:2\nfrom_source:8\nfrom_relay:3\nreceived_relay:4\ntime:0.5\nincreased:6\nrecevied_source:7\n";

    #[test]
    fn derives_sent_and_throughput() {
        let outcome = TrialOutcome::parse(SAMPLE).unwrap();
        assert_eq!(outcome.overall_sent(), 15);
        assert_eq!(outcome.difference(), 4);
        assert_eq!(outcome.relay_received, 4);
        assert_eq!(outcome.time, 0.5);

        let throughput = outcome.throughput().unwrap();
        assert!((throughput - 0.6667).abs() < 1e-4);
        assert_eq!(throughput, 10.0 / 15.0);
    }

    #[test]
    fn zero_sent_has_no_throughput() {
        let text = SAMPLE.replace("sent:10", "sent:0").replace("sent_code:5", "sent_code:0");
        let outcome = TrialOutcome::parse(&text).unwrap();
        assert_eq!(outcome.throughput(), None);
    }

    #[test]
    fn missing_key_is_not_carried_over() {
        let text = SAMPLE.replace("not increased:2\n", "");
        match TrialOutcome::parse(&text) {
            Err(SweepError::IncompleteReport { missing }) => assert_eq!(missing, vec!["not increased"]),
            other => panic!("expected incomplete report, got {:?}", other),
        }
    }

    #[test]
    fn negative_difference() {
        let text = SAMPLE.replace("increased:6", "increased:1");
        let outcome = TrialOutcome::parse(&text).unwrap();
        assert_eq!(outcome.difference(), -1);
    }

    #[test]
    fn huge_counters_do_not_overflow() {
        let text = SAMPLE
            .replace("sent:10", &format!("sent:{}", u64::MAX))
            .replace("increased:6", &format!("increased:{}", u64::MAX))
            .replace("not increased:2", "not increased:0");
        let outcome = TrialOutcome::parse(&text).unwrap();
        assert_eq!(outcome.overall_sent(), u64::MAX);
        assert_eq!(outcome.difference(), i128::from(u64::MAX));
        assert!(outcome.throughput().is_some());
    }
}
