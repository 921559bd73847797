//! Parsing of the `key: value` report a simulator trial prints on stdout.

pub mod outcome;

pub use outcome::TrialOutcome;

use crate::error::{SweepError, TrialResult};
use std::collections::HashMap;
use std::fmt;

/// Keys a trial report must carry before an outcome can be derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    Increased,
    NotIncreased,
    Sent,
    SentCode,
    ReceivedSource,
    Received,
    FromSource,
    FromRelay,
    Time,
    ReceivedRelay,
}

impl ReportField {
    pub const ALL: [ReportField; 10] = [
        ReportField::Increased,
        ReportField::NotIncreased,
        ReportField::Sent,
        ReportField::SentCode,
        ReportField::ReceivedSource,
        ReportField::Received,
        ReportField::FromSource,
        ReportField::FromRelay,
        ReportField::Time,
        ReportField::ReceivedRelay,
    ];

    /// The key exactly as the simulator prints it.
    pub fn key(self) -> &'static str {
        match self {
            ReportField::Increased => "increased",
            ReportField::NotIncreased => "not increased",
            ReportField::Sent => "sent",
            ReportField::SentCode => "sent_code",
            // misspelled by the simulator, matched verbatim
            ReportField::ReceivedSource => "recevied_source",
            ReportField::Received => "received",
            ReportField::FromSource => "from_source",
            ReportField::FromRelay => "from_relay",
            ReportField::Time => "time",
            ReportField::ReceivedRelay => "received_relay",
        }
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Every `key: value` line of one trial's output. Later duplicates replace
/// earlier ones; lines without a colon are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialReport {
    fields: HashMap<String, String>,
}

impl TrialReport {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.to_string(), value.trim().to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: ReportField) -> Option<&str> {
        self.fields.get(field.key()).map(String::as_str)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        ReportField::ALL
            .iter()
            .filter(|f| self.get(**f).is_none())
            .map(|f| f.key())
            .collect()
    }

    pub fn ensure_complete(&self) -> TrialResult<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SweepError::IncompleteReport { missing })
        }
    }

    pub fn count(&self, field: ReportField) -> TrialResult<u64> {
        let value = self.require(field)?;
        value.parse().map_err(|_| SweepError::InvalidValue {
            field: field.key(),
            value: value.to_string(),
        })
    }

    /// Finite floats only; `nan` and `inf` cannot be aggregated or saved.
    pub fn float(&self, field: ReportField) -> TrialResult<f64> {
        let value = self.require(field)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SweepError::InvalidValue {
                field: field.key(),
                value: value.to_string(),
            })
    }

    fn require(&self, field: ReportField) -> TrialResult<&str> {
        self.get(field).ok_or(SweepError::IncompleteReport {
            missing: vec![field.key()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_duplicate() {
        let report = TrialReport::parse("sent: 3\nsent: 7\n");
        assert_eq!(report.get(ReportField::Sent), Some("7"));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn keys_are_exact_and_case_sensitive() {
        let report = TrialReport::parse("Sent: 3\n sent: 4\nnot increased:  9 \n");
        assert_eq!(report.get(ReportField::Sent), None);
        assert_eq!(report.get(ReportField::NotIncreased), Some("9"));
        assert_eq!(report.raw("Sent"), Some("3"));
    }

    #[test]
    fn ignores_lines_without_colon() {
        let report = TrialReport::parse("Simulation finished\n\nreceived:12\n");
        assert_eq!(report.len(), 1);
        assert_eq!(report.count(ReportField::Received).unwrap(), 12);
    }

    #[test]
    fn missing_fields_are_named() {
        let report = TrialReport::parse("sent:10\nsent_code:5\n");
        match report.ensure_complete() {
            Err(SweepError::IncompleteReport { missing }) => {
                assert_eq!(missing.len(), 8);
                assert!(missing.contains(&"not increased"));
                assert!(missing.contains(&"recevied_source"));
                assert!(!missing.contains(&"sent"));
            }
            other => panic!("expected incomplete report, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_numeric_value() {
        let report = TrialReport::parse("sent: many\n");
        assert!(matches!(
            report.count(ReportField::Sent),
            Err(SweepError::InvalidValue { field: "sent", .. })
        ));
    }

    #[test]
    fn rejects_non_finite_time() {
        for value in ["nan", "inf", "-inf", "NaN"] {
            let report = TrialReport::parse(&format!("time: {}\n", value));
            assert!(matches!(
                report.float(ReportField::Time),
                Err(SweepError::InvalidValue { field: "time", .. })
            ));
        }
        let report = TrialReport::parse("time: 0.25\n");
        assert_eq!(report.float(ReportField::Time).unwrap(), 0.25);
    }
}
