//! Per-session timing samples and their summary.

use std::fmt::{Display, Write as _};

/// Ordered durations in seconds, one per completed iteration.
///
/// Samples may be negative in one-way mode when the two clocks disagree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples(Vec<f64>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub discarded: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl Samples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, secs: f64) {
        self.0.push(secs);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    fn retained(&self, warmup: usize) -> &[f64] {
        &self.0[warmup.min(self.0.len())..]
    }

    /// Statistics over everything after the first `warmup` samples, or `None`
    /// if nothing is left.
    pub fn summary(&self, warmup: usize) -> Option<Summary> {
        let retained = self.retained(warmup);
        if retained.is_empty() {
            return None;
        }

        let count = retained.len();
        let mean = retained.iter().sum::<f64>() / count as f64;
        let min = retained.iter().copied().fold(f64::INFINITY, f64::min);
        let max = retained.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = retained.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        let mut sorted = retained.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(Summary {
            count,
            discarded: self.len() - count,
            mean,
            min,
            max,
            median,
            std_dev: variance.sqrt(),
        })
    }

    /// ASCII histogram of the retained samples, one line per bucket.
    pub fn histogram(&self, warmup: usize, buckets: usize, width: usize) -> String {
        let Some(summary) = self.summary(warmup) else {
            return String::new();
        };
        let buckets = buckets.max(1);

        let span = summary.max - summary.min;
        let mut counts = vec![0usize; buckets];
        for &sample in self.retained(warmup) {
            let index = if span > 0.0 {
                (((sample - summary.min) / span) * buckets as f64) as usize
            } else {
                0
            };
            counts[index.min(buckets - 1)] += 1;
        }

        let tallest = counts.iter().copied().max().unwrap_or(0).max(1);
        let step = span / buckets as f64;

        let mut plot = String::new();
        for (i, &count) in counts.iter().enumerate() {
            let lower = summary.min + step * i as f64;
            let bar = "#".repeat(count * width / tallest);
            let _ = writeln!(plot, "{:>10.3} ms | {:<width$} {}", lower * 1e3, bar, count);
        }

        plot
    }
}

impl From<Vec<f64>> for Samples {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "samples: {} (warm-up discarded: {}), mean: {:.3} ms, median: {:.3} ms, min: {:.3} ms, max: {:.3} ms, std dev: {:.3} ms",
            self.count,
            self.discarded,
            self.mean * 1e3,
            self.median * 1e3,
            self.min * 1e3,
            self.max * 1e3,
            self.std_dev * 1e3,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_known_samples() {
        let samples = Samples::from(vec![4.0, 1.0, 3.0, 2.0]);
        let summary = samples.summary(0).unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.discarded, 0);
        assert_eq!(summary.mean, 2.5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.median, 2.5);
        assert!((summary.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn warmup_discards_leading_samples_only_in_summary() {
        let samples = Samples::from(vec![100.0, 50.0, 1.0, 2.0, 3.0]);
        let summary = samples.summary(2).unwrap();

        assert_eq!(samples.len(), 5);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.discarded, 2);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.max, 3.0);
    }

    #[test]
    fn no_summary_when_everything_is_warmup() {
        let samples = Samples::from(vec![1.0, 2.0]);
        assert!(samples.summary(2).is_none());
        assert!(samples.summary(10).is_none());
        assert!(Samples::new().summary(0).is_none());
    }

    #[test]
    fn negative_one_way_samples_are_kept() {
        let samples = Samples::from(vec![-0.002, 0.004]);
        let summary = samples.summary(0).unwrap();
        assert_eq!(summary.min, -0.002);
        assert!((summary.mean - 0.001).abs() < 1e-12);
    }

    #[test]
    fn histogram_counts_every_retained_sample() {
        let samples = Samples::from(vec![0.001, 0.001, 0.002, 0.003, 0.010]);
        let plot = samples.histogram(0, 4, 20);

        let lines: Vec<&str> = plot.lines().collect();
        assert_eq!(lines.len(), 4);

        let total: usize = lines
            .iter()
            .map(|line| line.rsplit(' ').next().unwrap().parse::<usize>().unwrap())
            .sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn histogram_of_identical_samples_uses_first_bucket() {
        let samples = Samples::from(vec![0.5; 3]);
        let plot = samples.histogram(0, 3, 10);
        assert!(plot.lines().next().unwrap().ends_with("########## 3"));
    }
}
