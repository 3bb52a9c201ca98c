use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::InvariantViolation;

/// Label set of a single sample. A `BTreeMap` keeps keys unique and iterates
/// them lexicographically, which is the order every output uses.
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricType {
    Counter,
    Gauge,
    #[default]
    Untyped,
    Histogram,
    Summary,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Untyped => "untyped",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }

    /// Histograms and summaries are spread over several synthetic series.
    pub fn is_composite(&self) -> bool {
        matches!(self, MetricType::Histogram | MetricType::Summary)
    }
}

impl FromStr for MetricType {
    type Err = std::convert::Infallible;

    /// Unknown type names fall back to `Untyped`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "counter" => MetricType::Counter,
            "gauge" => MetricType::Gauge,
            "histogram" => MetricType::Histogram,
            "summary" => MetricType::Summary,
            _ => MetricType::Untyped,
        })
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramValue {
    pub sample_count: Option<u64>,
    pub sample_sum: Option<f64>,
    /// Sorted by `upper_bound`, ascending.
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryValue {
    pub sample_count: Option<u64>,
    pub sample_sum: Option<f64>,
    /// Sorted by `quantile`, ascending.
    pub quantiles: Vec<Quantile>,
}

/// Type specific payload of a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// Counter, gauge and untyped samples. May be NaN or infinite.
    Single(f64),
    Histogram(HistogramValue),
    Summary(SummaryValue),
}

impl SampleValue {
    pub fn empty_for(metric_type: MetricType) -> SampleValue {
        match metric_type {
            MetricType::Histogram => SampleValue::Histogram(HistogramValue::default()),
            MetricType::Summary => SampleValue::Summary(SummaryValue::default()),
            _ => SampleValue::Single(f64::NAN),
        }
    }

    pub fn sample_count(&self) -> Option<u64> {
        match self {
            SampleValue::Single(_) => None,
            SampleValue::Histogram(h) => h.sample_count,
            SampleValue::Summary(s) => s.sample_count,
        }
    }

    pub fn sample_sum(&self) -> Option<f64> {
        match self {
            SampleValue::Single(_) => None,
            SampleValue::Histogram(h) => h.sample_sum,
            SampleValue::Summary(s) => s.sample_sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: Labels,
    pub value: SampleValue,
}

impl MetricSample {
    pub fn new(labels: Labels, value: SampleValue) -> MetricSample {
        MetricSample { labels, value }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        match &self.value {
            SampleValue::Single(_) => Ok(()),
            SampleValue::Histogram(histogram) => {
                for pair in histogram.buckets.windows(2) {
                    // NaN bounds also fail this comparison
                    if !(pair[0].upper_bound < pair[1].upper_bound) {
                        return Err(InvariantViolation::new(format!(
                            "bucket bounds not strictly increasing: {} then {}",
                            pair[0].upper_bound, pair[1].upper_bound
                        )));
                    }
                }
                if let (Some(last), Some(count)) = (histogram.buckets.last(), histogram.sample_count)
                {
                    if last.upper_bound == f64::INFINITY && last.cumulative_count != count {
                        return Err(InvariantViolation::new(format!(
                            "+Inf bucket count {} differs from sample count {}",
                            last.cumulative_count, count
                        )));
                    }
                }
                Ok(())
            }
            SampleValue::Summary(summary) => {
                if let Some(q) = summary
                    .quantiles
                    .iter()
                    .find(|q| !(0.0..=1.0).contains(&q.quantile))
                {
                    return Err(InvariantViolation::new(format!(
                        "quantile {} outside [0, 1]",
                        q.quantile
                    )));
                }
                for pair in summary.quantiles.windows(2) {
                    if !(pair[0].quantile < pair[1].quantile) {
                        return Err(InvariantViolation::new(format!(
                            "quantiles not strictly increasing: {} then {}",
                            pair[0].quantile, pair[1].quantile
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub samples: Vec<MetricSample>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>) -> MetricFamily {
        MetricFamily {
            name: name.into(),
            help: String::new(),
            metric_type: MetricType::Untyped,
            samples: Vec::new(),
        }
    }

    pub fn details(&self) -> MetricDetails {
        MetricDetails {
            name: self.name.clone(),
            help: self.help.clone(),
            metric_type: self.metric_type,
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for sample in &self.samples {
            let composite = matches!(
                sample.value,
                SampleValue::Histogram(_) | SampleValue::Summary(_)
            );
            if composite != self.metric_type.is_composite() {
                return Err(InvariantViolation::new(format!(
                    "sample shape does not match family type {}",
                    self.metric_type
                ))
                .in_family(&self.name));
            }
            sample
                .check_invariants()
                .map_err(|e| e.in_family(&self.name))?;
        }
        Ok(())
    }
}

/// Family level metadata carried along with every selected sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDetails {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
}

/// One sample together with the metadata of the family it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub details: MetricDetails,
    pub sample: MetricSample,
}

impl Metric {
    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn labels(&self) -> &Labels {
        &self.sample.labels
    }

    /// `name{key="value",...}` with labels in key order, or the bare name.
    pub fn identifier(&self) -> String {
        if self.sample.labels.is_empty() {
            return self.details.name.clone();
        }
        let labels: Vec<String> = self
            .sample
            .labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        format!("{}{{{}}}", self.details.name, labels.join(","))
    }
}
