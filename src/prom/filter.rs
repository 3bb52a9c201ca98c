use std::collections::HashSet;

use super::model::{Labels, Metric};
use super::parser::Families;

/// A single `--label` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    /// `method`: the sample carries the label, whatever its value.
    Present(String),
    /// `method=post`: the sample carries exactly this pair.
    Equals(String, String),
}

impl LabelFilter {
    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            LabelFilter::Present(key) => labels.contains_key(key),
            LabelFilter::Equals(key, value) => labels.get(key) == Some(value),
        }
    }
}

impl From<&str> for LabelFilter {
    fn from(token: &str) -> Self {
        match token.split_once('=') {
            Some((key, value)) => LabelFilter::Equals(key.to_string(), value.to_string()),
            None => LabelFilter::Present(token.to_string()),
        }
    }
}

/// Selection applied to every fetch. Passed explicitly so concurrent
/// fetches can use different filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub names: HashSet<String>,
    pub labels: Vec<LabelFilter>,
}

impl FilterConfig {
    pub fn new<N, L>(names: N, labels: L) -> FilterConfig
    where
        N: IntoIterator,
        N::Item: Into<String>,
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        FilterConfig {
            names: names.into_iter().map(Into::into).collect(),
            labels: labels
                .into_iter()
                .map(|token| LabelFilter::from(token.as_ref()))
                .collect(),
        }
    }

    pub fn passes_name(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }

    /// Tokens are OR-combined: one matching token is enough.
    pub fn passes_labels(&self, labels: &Labels) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|filter| filter.matches(labels))
    }
}

/// Flatten the families into the samples passing `filter`. The order follows
/// the map's iteration order and is not meaningful.
pub fn select(families: &Families, filter: &FilterConfig) -> Vec<Metric> {
    families
        .values()
        .filter(|family| filter.passes_name(&family.name))
        .flat_map(|family| {
            let details = family.details();
            family
                .samples
                .iter()
                .filter(move |sample| filter.passes_labels(&sample.labels))
                .map(move |sample| Metric {
                    details: details.clone(),
                    sample: sample.clone(),
                })
        })
        .collect()
}
