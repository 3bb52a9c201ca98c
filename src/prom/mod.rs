mod model;
pub use self::model::Bucket;
pub use self::model::HistogramValue;
pub use self::model::Labels;
pub use self::model::Metric;
pub use self::model::MetricDetails;
pub use self::model::MetricFamily;
pub use self::model::MetricSample;
pub use self::model::MetricType;
pub use self::model::Quantile;
pub use self::model::SampleValue;
pub use self::model::SummaryValue;

mod error;
pub use self::error::FetchError;
pub use self::error::InvariantViolation;
pub use self::error::ParseError;

pub mod filter;
pub use self::filter::FilterConfig;
pub use self::filter::LabelFilter;

pub mod parser;
pub use self::parser::Families;

pub mod serializer;

mod metric_scraper;
pub use self::metric_scraper::MetricScraper;
pub use self::metric_scraper::ScraperConfig;

#[cfg(test)]
mod test_data;
