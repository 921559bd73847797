use serde::{Deserialize, Serialize};

/// Mean of a set of repetitions, plus the sample standard deviation when
/// there are at least two of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub samples: usize,
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Sample standard deviation around `mean`, using the n-1 denominator.
pub fn sample_std_dev(data: &[f64], mean: f64) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let sq = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    Some((sq / (data.len() - 1) as f64).sqrt())
}

pub fn mean_stdv(data: &[f64]) -> Option<Summary> {
    let mean = mean(data)?;
    Some(Summary {
        mean,
        std_dev: sample_std_dev(data, mean),
        samples: data.len(),
    })
}

/// `(a - b) / a`, or `None` when `a` is zero.
pub fn loss_ratio(sent: f64, received: f64) -> Option<f64> {
    if sent == 0.0 {
        None
    } else {
        Some((sent - received) / sent)
    }
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
