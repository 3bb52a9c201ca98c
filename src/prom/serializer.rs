//! Render selected samples as exposition text or as a JSON document.
//!
//! Both renderings are deterministic: families are ordered by name, labels by
//! key, buckets and quantiles by bound. Samples inside a family keep the order
//! they were fetched in.
use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Serialize, Serializer};

use super::model::{Labels, Metric, SampleValue};

/// Shortest round-trip rendering in `%g` style: plain decimals for exponents
/// in `[-4, 6)`, otherwise `d.ddde±XX`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{value}");
    };
    match exponent.parse::<i32>() {
        Ok(exp) if !(-4..6).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        _ => format!("{value}"),
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', r"\\").replace('\n', r"\n")
}

/// Writes `{k="v",...}` from a fresh sorted label set. The synthetic `le` or
/// `quantile` pair is merged in without touching the sample's own labels.
fn write_labels<W: Write>(
    writer: &mut W,
    labels: &Labels,
    synthetic: Option<(&str, String)>,
) -> io::Result<()> {
    let mut pairs: Vec<(&str, &str)> = labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if let Some((key, value)) = &synthetic {
        pairs.push((*key, value.as_str()));
        pairs.sort_by(|a, b| a.0.cmp(b.0));
    }
    if pairs.is_empty() {
        return Ok(());
    }
    write!(writer, "{{")?;
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, "{}=\"{}\"", key, escape_label_value(value))?;
    }
    write!(writer, "}}")
}

fn write_series<W: Write>(
    writer: &mut W,
    name: &str,
    suffix: &str,
    labels: &Labels,
    synthetic: Option<(&str, String)>,
    value: &str,
) -> io::Result<()> {
    write!(writer, "{name}{suffix}")?;
    write_labels(writer, labels, synthetic)?;
    writeln!(writer, " {value}")
}

fn write_sample<W: Write>(writer: &mut W, metric: &Metric) -> io::Result<()> {
    let name = metric.name();
    let labels = metric.labels();
    match &metric.sample.value {
        SampleValue::Single(value) => {
            write_series(writer, name, "", labels, None, &format_value(*value))?;
        }
        SampleValue::Histogram(histogram) => {
            for bucket in &histogram.buckets {
                write_series(
                    writer,
                    name,
                    "_bucket",
                    labels,
                    Some(("le", format_value(bucket.upper_bound))),
                    &bucket.cumulative_count.to_string(),
                )?;
            }
        }
        SampleValue::Summary(summary) => {
            for quantile in &summary.quantiles {
                write_series(
                    writer,
                    name,
                    "",
                    labels,
                    Some(("quantile", format_value(quantile.quantile))),
                    &format_value(quantile.value),
                )?;
            }
        }
    }
    if let Some(sum) = metric.sample.value.sample_sum() {
        write_series(writer, name, "_sum", labels, None, &format_value(sum))?;
    }
    if let Some(count) = metric.sample.value.sample_count() {
        write_series(writer, name, "_count", labels, None, &count.to_string())?;
    }
    Ok(())
}

/// Write the samples in exposition format, one block per family with its
/// `# HELP` and `# TYPE` header emitted once.
pub fn write_text<W: Write>(writer: &mut W, metrics: &[Metric]) -> io::Result<()> {
    let mut families: BTreeMap<&str, Vec<&Metric>> = BTreeMap::new();
    for metric in metrics {
        families.entry(metric.name()).or_default().push(metric);
    }

    for (i, (name, samples)) in families.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        let details = &samples[0].details;
        if !details.help.is_empty() {
            writeln!(writer, "# HELP {} {}", name, escape_help(&details.help))?;
        }
        writeln!(writer, "# TYPE {} {}", name, details.metric_type)?;
        for metric in samples {
            write_sample(writer, metric)?;
        }
    }
    Ok(())
}

pub fn to_text(metrics: &[Metric]) -> String {
    let mut buf = Vec::new();
    write_text(&mut buf, metrics).expect("writing to a Vec cannot fail");
    String::from_utf8(buf).expect("exposition text is valid UTF-8")
}

/// NaN and infinities have no JSON number form and are written as `null`.
fn nullable<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

fn nullable_option<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => nullable(value, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRecord {
    #[serde(serialize_with = "nullable")]
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileRecord {
    #[serde(serialize_with = "nullable")]
    pub quantile: f64,
    #[serde(serialize_with = "nullable")]
    pub value: f64,
}

/// One sample of the structured document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub help: &'a str,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub labels: &'a Labels,
    /// `null` for histograms and summaries.
    #[serde(serialize_with = "nullable_option")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "nullable_option"
    )]
    pub sample_sum: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<BucketRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quantiles: Vec<QuantileRecord>,
}

impl<'a> From<&'a Metric> for MetricRecord<'a> {
    fn from(metric: &'a Metric) -> Self {
        let value = &metric.sample.value;
        let mut record = MetricRecord {
            name: metric.name(),
            help: &metric.details.help,
            metric_type: metric.details.metric_type.as_str().to_ascii_uppercase(),
            labels: metric.labels(),
            value: None,
            sample_count: value.sample_count(),
            sample_sum: value.sample_sum(),
            buckets: Vec::new(),
            quantiles: Vec::new(),
        };
        match value {
            SampleValue::Single(v) => record.value = Some(*v),
            SampleValue::Histogram(histogram) => {
                record.buckets = histogram
                    .buckets
                    .iter()
                    .map(|b| BucketRecord {
                        upper_bound: b.upper_bound,
                        cumulative_count: b.cumulative_count,
                    })
                    .collect();
            }
            SampleValue::Summary(summary) => {
                record.quantiles = summary
                    .quantiles
                    .iter()
                    .map(|q| QuantileRecord {
                        quantile: q.quantile,
                        value: q.value,
                    })
                    .collect();
            }
        }
        record
    }
}

/// Build the structured document, ordered by family name.
pub fn to_document(metrics: &[Metric]) -> Vec<MetricRecord<'_>> {
    let mut sorted: Vec<&Metric> = metrics.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));
    sorted.into_iter().map(MetricRecord::from).collect()
}

/// Pretty printed JSON array of [`MetricRecord`]s.
pub fn to_json(metrics: &[Metric]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_document(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prom::filter::{select, FilterConfig};
    use crate::prom::model::{MetricDetails, MetricSample, MetricType};
    use crate::prom::parser::parse;
    use crate::prom::test_data;

    fn fetch(text: &str, names: &[&str], labels: &[&str]) -> Vec<Metric> {
        let families = parse(text).unwrap();
        select(&families, &FilterConfig::new(names.iter().copied(), labels))
    }

    #[test]
    fn formats_like_printf_g() {
        let cases: &[(f64, &str)] = &[
            (0.0, "0"),
            (1027.0, "1027"),
            (12.34, "12.34"),
            (53423.0, "53423"),
            (134335.0, "134335"),
            (4.478424e6, "4.478424e+06"),
            (1.7560473e7, "1.7560473e+07"),
            (1e6, "1e+06"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (-2.5e-7, "-2.5e-07"),
            (1e100, "1e+100"),
            (0.1, "0.1"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "+Inf"),
            (f64::NEG_INFINITY, "-Inf"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_value(*value), *expected, "{value}");
        }
    }

    #[test]
    fn counter_labels_are_sorted() {
        let metrics = fetch(test_data::EXPOSITION, &["http_requests_total"], &[]);
        let text = to_text(&metrics);
        assert!(text.starts_with(
            "# HELP http_requests_total The total number of HTTP requests.\n\
             # TYPE http_requests_total counter\n"
        ));
        assert!(text.contains("http_requests_total{code=\"200\",method=\"post\"} 1027\n"));
        assert!(text.contains("http_requests_total{code=\"400\",method=\"get\"} 3\n"));
        assert_eq!(text.matches("# TYPE").count(), 1);
    }

    #[test]
    fn histogram_text_output() {
        let metrics = fetch(test_data::SMALL_HISTOGRAM, &[], &[]);
        assert_eq!(
            to_text(&metrics),
            "# HELP latency_seconds Request latency.\n\
             # TYPE latency_seconds histogram\n\
             latency_seconds_bucket{le=\"0.1\"} 10\n\
             latency_seconds_bucket{le=\"0.2\"} 15\n\
             latency_seconds_bucket{le=\"0.4\"} 15\n\
             latency_seconds_bucket{le=\"+Inf\"} 20\n\
             latency_seconds_sum 3.5\n\
             latency_seconds_count 20\n"
        );
    }

    #[test]
    fn synthetic_labels_merge_in_key_order() {
        let metrics = fetch(test_data::LABELLED_HISTOGRAM, &[], &["method=put"]);
        let text = to_text(&metrics);
        assert!(text.contains("request_size_bytes_bucket{le=\"100\",method=\"put\"} 0\n"));
        assert!(text.contains("request_size_bytes_sum{method=\"put\"} 512\n"));
        assert!(text.contains("request_size_bytes_count{method=\"put\"} 1\n"));
        // base labels are never mutated by the synthetic le pair
        assert!(!metrics[0].labels().contains_key("le"));
    }

    #[test]
    fn summary_text_output() {
        let metrics = fetch(test_data::EXPOSITION, &["rpc_duration_seconds"], &[]);
        let text = to_text(&metrics);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "rpc_duration_seconds{quantile=\"0.01\"} 3102");
        assert_eq!(lines[6], "rpc_duration_seconds{quantile=\"0.99\"} 76656");
        assert_eq!(lines[7], "rpc_duration_seconds_sum 1.7560473e+07");
        assert_eq!(lines[8], "rpc_duration_seconds_count 2693");
    }

    #[test]
    fn families_are_sorted_and_separated() {
        let metrics = fetch(test_data::EXPOSITION, &[], &[]);
        let text = to_text(&metrics);
        let types: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("# TYPE "))
            .collect();
        assert_eq!(
            types,
            vec![
                "go_memstats_alloc_bytes gauge",
                "http_request_duration_seconds histogram",
                "http_requests_total counter",
                "process_cpu_seconds_total counter",
                "rpc_duration_seconds summary",
            ]
        );
        assert_eq!(text.matches("\n\n# HELP").count(), 4);
        assert!(text.contains("go_memstats_alloc_bytes 4.478424e+06\n"));
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let mut metrics = fetch(test_data::EXPOSITION, &[], &[]);
        let forward = to_text(&metrics);
        let json = to_json(&metrics).unwrap();
        // stable sort, so samples inside a family keep their order
        metrics.sort_by(|a, b| b.name().cmp(a.name()));
        assert_eq!(to_text(&metrics), forward);
        assert_eq!(to_json(&metrics).unwrap(), json);
    }

    #[test]
    fn text_round_trips_through_the_parser() {
        for document in [
            test_data::EXPOSITION,
            test_data::LABELLED_HISTOGRAM,
            test_data::SMALL_HISTOGRAM,
        ] {
            let families = parse(document).unwrap();
            let text = to_text(&select(&families, &FilterConfig::default()));
            assert_eq!(parse(&text).unwrap(), families, "{text}");
        }
    }

    #[test]
    fn escaped_text_round_trips() {
        let document = "# HELP msg Say \\\\ \\n things\n# TYPE msg gauge\nmsg{text=\"a \\\"b\\\"\\n\\\\\"} 1\n";
        let families = parse(document).unwrap();
        let text = to_text(&select(&families, &FilterConfig::default()));
        assert_eq!(text, document);
    }

    #[test]
    fn nan_gauge_renders_as_text_and_null() {
        let metrics = fetch(test_data::SPECIAL_VALUES, &[], &["sensor=stale"]);
        assert_eq!(metrics.len(), 1);
        assert!(to_text(&metrics).ends_with("temperature{sensor=\"stale\"} NaN\n"));

        let json: serde_json::Value = serde_json::from_str(&to_json(&metrics).unwrap()).unwrap();
        assert_eq!(json[0]["value"], serde_json::Value::Null);
        assert!(json[0].as_object().unwrap().contains_key("value"));
    }

    #[test]
    fn special_values_round_trip_as_text() {
        let metrics = fetch(test_data::SPECIAL_VALUES, &[], &[]);
        let reparsed = parse(&to_text(&metrics)).unwrap();
        let values: Vec<String> = reparsed["temperature"]
            .samples
            .iter()
            .map(|s| match s.value {
                SampleValue::Single(v) => format_value(v),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec!["NaN", "+Inf", "-Inf", "0.0015", "42"]);
    }

    #[test]
    fn json_document_shape() {
        let metrics = fetch(test_data::EXPOSITION, &[], &[]);
        let json: serde_json::Value = serde_json::from_str(&to_json(&metrics).unwrap()).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 8);
        assert_eq!(records[0]["name"], "go_memstats_alloc_bytes");

        let histogram = records
            .iter()
            .find(|r| r["name"] == "http_request_duration_seconds")
            .unwrap();
        assert_eq!(histogram["type"], "HISTOGRAM");
        assert_eq!(histogram["labels"], serde_json::json!({}));
        assert_eq!(histogram["sample_count"], 134335);
        assert_eq!(histogram["sample_sum"], 53423.0);
        assert_eq!(histogram["value"], serde_json::Value::Null);
        assert!(histogram.as_object().unwrap().contains_key("value"));
        let buckets = histogram["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0]["upper_bound"], 0.1);
        assert_eq!(buckets[9]["upper_bound"], serde_json::Value::Null);
        assert_eq!(buckets[9]["cumulative_count"], 134335);

        let summary = records
            .iter()
            .find(|r| r["name"] == "rpc_duration_seconds")
            .unwrap();
        assert_eq!(summary["quantiles"][0]["quantile"], 0.01);
        assert_eq!(summary["quantiles"][0]["value"], 3102.0);
        assert!(summary.get("buckets").is_none());

        let counter = records
            .iter()
            .find(|r| r["name"] == "http_requests_total")
            .unwrap();
        assert_eq!(counter["type"], "COUNTER");
        assert_eq!(counter["labels"]["method"], "post");
        assert_eq!(counter["value"], 1027.0);
        assert!(counter.get("sample_count").is_none());
    }

    #[test]
    fn every_record_carries_a_value() {
        let metrics = fetch(test_data::SMALL_HISTOGRAM, &[], &[]);
        let json: serde_json::Value = serde_json::from_str(&to_json(&metrics).unwrap()).unwrap();
        let record = json[0].as_object().unwrap();
        assert!(record.contains_key("value"));
        assert_eq!(record["value"], serde_json::Value::Null);
    }

    #[test]
    fn non_finite_composite_fields_render_as_null() {
        let text = "# TYPE h histogram\n\
                    h_bucket{le=\"+Inf\"} 2\n\
                    h_sum NaN\n\
                    h_count 2\n\
                    # TYPE s summary\n\
                    s{quantile=\"0.5\"} 1\n\
                    s{quantile=\"0.99\"} +Inf\n\
                    s_sum -Inf\n";
        let metrics = fetch(text, &[], &[]);
        let json: serde_json::Value = serde_json::from_str(&to_json(&metrics).unwrap()).unwrap();

        let histogram = &json[0];
        assert_eq!(histogram["name"], "h");
        assert!(histogram.as_object().unwrap().contains_key("sample_sum"));
        assert_eq!(histogram["sample_sum"], serde_json::Value::Null);
        assert_eq!(histogram["sample_count"], 2);

        let summary = &json[1];
        assert_eq!(summary["name"], "s");
        assert_eq!(summary["sample_sum"], serde_json::Value::Null);
        assert_eq!(summary["quantiles"][0]["value"], 1.0);
        assert_eq!(summary["quantiles"][1]["quantile"], 0.99);
        assert_eq!(summary["quantiles"][1]["value"], serde_json::Value::Null);
        assert!(summary["quantiles"][1].as_object().unwrap().contains_key("value"));
    }

    #[test]
    fn empty_help_is_omitted() {
        let metric = Metric {
            details: MetricDetails {
                name: "up".to_string(),
                help: String::new(),
                metric_type: MetricType::Untyped,
            },
            sample: MetricSample::new(Labels::new(), SampleValue::Single(1.0)),
        };
        assert_eq!(to_text(std::slice::from_ref(&metric)), "# TYPE up untyped\nup 1\n");
        let json: serde_json::Value =
            serde_json::from_str(&to_json(std::slice::from_ref(&metric)).unwrap()).unwrap();
        assert!(json[0].get("help").is_none());
        assert_eq!(json[0]["type"], "UNTYPED");
    }
}
