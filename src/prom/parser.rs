//! Line oriented parser for the Prometheus text exposition format.
//!
//! Histogram and summary families are spread over several synthetic series
//! (`_bucket`, `_sum`, `_count` and `quantile` labelled lines). The parser
//! folds them back into one [`MetricSample`] per distinct label set, so the
//! returned families only contain the canonical model.
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::error::ParseError;
use super::model::{Bucket, Labels, MetricFamily, MetricSample, MetricType, Quantile, SampleValue};

/// Parsed families keyed by name. Iteration order carries no meaning.
pub type Families = HashMap<String, MetricFamily>;

const BUCKET_LABEL: &str = "le";
const QUANTILE_LABEL: &str = "quantile";

/// Parse a complete exposition document. The first malformed line rejects
/// the whole document.
pub fn parse(text: &str) -> Result<Families, ParseError> {
    let mut parser = Parser::default();
    for (index, line) in text.lines().enumerate() {
        parser.parse_line(index + 1, line)?;
    }
    Ok(parser.finish())
}

fn metric_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("valid metric name regex"))
}

fn label_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid label name regex"))
}

#[derive(Debug)]
struct FamilyBuilder {
    family: MetricFamily,
    type_declared: bool,
    help_declared: bool,
    /// Position of the sample owning a label set, composite types only.
    by_labels: HashMap<Labels, usize>,
}

impl FamilyBuilder {
    fn new(name: &str) -> FamilyBuilder {
        FamilyBuilder {
            family: MetricFamily::new(name),
            type_declared: false,
            help_declared: false,
            by_labels: HashMap::new(),
        }
    }

    fn composite_sample(&mut self, labels: Labels) -> &mut SampleValue {
        let next = self.family.samples.len();
        let index = *self.by_labels.entry(labels.clone()).or_insert(next);
        if index == next {
            let value = SampleValue::empty_for(self.family.metric_type);
            self.family.samples.push(MetricSample::new(labels, value));
        }
        &mut self.family.samples[index].value
    }
}

/// Where a sample line belongs once its name has been resolved.
#[derive(Debug, PartialEq)]
enum Series<'a> {
    Plain(&'a str),
    Bucket(&'a str),
    Sum(&'a str),
    Count(&'a str),
}

#[derive(Debug)]
struct RawSample<'a> {
    name: &'a str,
    labels: Labels,
    value: f64,
}

#[derive(Debug, Default)]
struct Parser {
    families: HashMap<String, FamilyBuilder>,
}

impl Parser {
    fn parse_line(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        if let Some(comment) = line.strip_prefix('#') {
            return self.parse_comment(line_no, comment);
        }
        let raw = parse_sample_line(line_no, line)?;
        self.add_sample(line_no, raw)
    }

    fn family(&mut self, name: &str) -> &mut FamilyBuilder {
        self.families
            .entry(name.to_string())
            .or_insert_with(|| FamilyBuilder::new(name))
    }

    fn parse_comment(&mut self, line_no: usize, comment: &str) -> Result<(), ParseError> {
        let comment = comment.trim_start();
        let (keyword, rest) = split_token(comment);
        if keyword != "HELP" && keyword != "TYPE" {
            return Ok(());
        }
        let (name, rest) = split_token(rest);
        if !metric_name_regex().is_match(name) {
            return Err(ParseError::new(
                line_no,
                format!("invalid metric name '{name}' in {keyword} line"),
            ));
        }

        if keyword == "HELP" {
            let help = unescape(line_no, rest, false)?;
            let builder = self.family(name);
            if builder.help_declared {
                return Err(ParseError::new(
                    line_no,
                    format!("second HELP line for metric '{name}'"),
                ));
            }
            builder.help_declared = true;
            builder.family.help = help;
            return Ok(());
        }

        let (type_name, trailing) = split_token(rest);
        if type_name.is_empty() {
            return Err(ParseError::new(
                line_no,
                format!("missing type in TYPE line for metric '{name}'"),
            ));
        }
        if !trailing.is_empty() {
            return Err(ParseError::new(
                line_no,
                format!("unexpected text after type in TYPE line for metric '{name}'"),
            ));
        }
        let metric_type = type_name.parse::<MetricType>().unwrap_or_default();
        let builder = self.family(name);
        if builder.type_declared {
            return Err(ParseError::new(
                line_no,
                format!("second TYPE line for metric '{name}'"),
            ));
        }
        if !builder.family.samples.is_empty() {
            return Err(ParseError::new(
                line_no,
                format!("TYPE line for metric '{name}' after its samples"),
            ));
        }
        builder.type_declared = true;
        builder.family.metric_type = metric_type;
        Ok(())
    }

    fn declared_type(&self, name: &str) -> Option<MetricType> {
        self.families
            .get(name)
            .filter(|b| b.type_declared)
            .map(|b| b.family.metric_type)
    }

    fn resolve<'a>(&self, name: &'a str) -> Series<'a> {
        if let Some(base) = name.strip_suffix("_bucket") {
            if self.declared_type(base) == Some(MetricType::Histogram) {
                return Series::Bucket(base);
            }
        }
        if let Some(base) = name.strip_suffix("_sum") {
            if self.declared_type(base).is_some_and(|t| t.is_composite()) {
                return Series::Sum(base);
            }
        }
        if let Some(base) = name.strip_suffix("_count") {
            if self.declared_type(base).is_some_and(|t| t.is_composite()) {
                return Series::Count(base);
            }
        }
        Series::Plain(name)
    }

    fn add_sample(&mut self, line_no: usize, raw: RawSample<'_>) -> Result<(), ParseError> {
        let RawSample {
            name,
            mut labels,
            value,
        } = raw;

        match self.resolve(name) {
            Series::Plain(name) => {
                let builder = self.family(name);
                match builder.family.metric_type {
                    MetricType::Histogram => Err(ParseError::new(
                        line_no,
                        format!("histogram '{name}' sample without _bucket, _sum or _count suffix"),
                    )),
                    MetricType::Summary => {
                        let quantile = take_label(line_no, &mut labels, QUANTILE_LABEL, name)?;
                        let quantile = parse_float(&quantile).ok_or_else(|| {
                            ParseError::new(line_no, format!("invalid quantile '{quantile}'"))
                        })?;
                        if !(0.0..=1.0).contains(&quantile) {
                            return Err(ParseError::new(
                                line_no,
                                format!("quantile {quantile} outside [0, 1]"),
                            ));
                        }
                        let SampleValue::Summary(summary) = builder.composite_sample(labels) else {
                            unreachable!("summary family holds summary samples");
                        };
                        insert_sorted(
                            line_no,
                            &mut summary.quantiles,
                            Quantile { quantile, value },
                            |q| q.quantile,
                        )
                    }
                    _ => {
                        builder
                            .family
                            .samples
                            .push(MetricSample::new(labels, SampleValue::Single(value)));
                        Ok(())
                    }
                }
            }
            Series::Bucket(base) => {
                let bound = take_label(line_no, &mut labels, BUCKET_LABEL, name)?;
                let upper_bound = parse_float(&bound)
                    .filter(|b| !b.is_nan())
                    .ok_or_else(|| {
                        ParseError::new(line_no, format!("invalid bucket bound '{bound}'"))
                    })?;
                let cumulative_count = parse_count(line_no, value)?;
                let SampleValue::Histogram(histogram) = self.family(base).composite_sample(labels)
                else {
                    unreachable!("histogram family holds histogram samples");
                };
                insert_sorted(
                    line_no,
                    &mut histogram.buckets,
                    Bucket {
                        upper_bound,
                        cumulative_count,
                    },
                    |b| b.upper_bound,
                )
            }
            Series::Sum(base) => {
                let slot = match self.family(base).composite_sample(labels) {
                    SampleValue::Histogram(h) => &mut h.sample_sum,
                    SampleValue::Summary(s) => &mut s.sample_sum,
                    SampleValue::Single(_) => unreachable!("composite family"),
                };
                if slot.replace(value).is_some() {
                    return Err(ParseError::new(line_no, format!("duplicate series '{name}'")));
                }
                Ok(())
            }
            Series::Count(base) => {
                let count = parse_count(line_no, value)?;
                let slot = match self.family(base).composite_sample(labels) {
                    SampleValue::Histogram(h) => &mut h.sample_count,
                    SampleValue::Summary(s) => &mut s.sample_count,
                    SampleValue::Single(_) => unreachable!("composite family"),
                };
                if slot.replace(count).is_some() {
                    return Err(ParseError::new(line_no, format!("duplicate series '{name}'")));
                }
                Ok(())
            }
        }
    }

    fn finish(self) -> Families {
        self.families
            .into_iter()
            .filter(|(_, builder)| !builder.family.samples.is_empty())
            .map(|(name, builder)| (name, builder.family))
            .collect()
    }
}

/// Split off the first whitespace delimited token.
fn split_token(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (s, ""),
    }
}

fn take_label(
    line_no: usize,
    labels: &mut Labels,
    key: &str,
    name: &str,
) -> Result<String, ParseError> {
    labels.remove(key).ok_or_else(|| {
        ParseError::new(line_no, format!("series '{name}' is missing the '{key}' label"))
    })
}

fn insert_sorted<T>(
    line_no: usize,
    items: &mut Vec<T>,
    item: T,
    key: impl Fn(&T) -> f64,
) -> Result<(), ParseError> {
    let k = key(&item);
    match items.binary_search_by(|probe| key(probe).total_cmp(&k)) {
        Ok(_) => Err(ParseError::new(line_no, format!("duplicate bound {k}"))),
        Err(pos) => {
            items.insert(pos, item);
            Ok(())
        }
    }
}

/// Accepts decimal and exponent notation plus `NaN`, `+Inf` and `-Inf`.
fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

fn parse_count(line_no: usize, value: f64) -> Result<u64, ParseError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(ParseError::new(
            line_no,
            format!("count {value} is not a non-negative integer"),
        ))
    }
}

fn parse_sample_line(line_no: usize, line: &str) -> Result<RawSample<'_>, ParseError> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if !metric_name_regex().is_match(name) {
        return Err(ParseError::new(line_no, format!("invalid metric name '{name}'")));
    }

    let mut rest = &line[name_end..];
    let mut labels = Labels::new();
    if let Some(block) = rest.strip_prefix('{') {
        let (parsed, remainder) = parse_labels(line_no, block)?;
        labels = parsed;
        rest = remainder;
    } else if rest.trim_start().starts_with('{') {
        rest = rest.trim_start();
        let (parsed, remainder) = parse_labels(line_no, &rest[1..])?;
        labels = parsed;
        rest = remainder;
    }
    if rest.contains('}') {
        return Err(ParseError::new(line_no, "unbalanced braces"));
    }

    let mut tokens = rest.split_whitespace();
    let value_text = tokens
        .next()
        .ok_or_else(|| ParseError::new(line_no, format!("missing value for '{name}'")))?;
    let value = parse_float(value_text)
        .ok_or_else(|| ParseError::new(line_no, format!("invalid value '{value_text}'")))?;
    if let Some(timestamp) = tokens.next() {
        timestamp.parse::<i64>().map_err(|_| {
            ParseError::new(line_no, format!("invalid timestamp '{timestamp}'"))
        })?;
    }
    if let Some(extra) = tokens.next() {
        return Err(ParseError::new(
            line_no,
            format!("unexpected text '{extra}' after timestamp"),
        ));
    }

    Ok(RawSample {
        name,
        labels,
        value,
    })
}

/// Parse `key="value",...}` and return the labels plus the text after `}`.
fn parse_labels(line_no: usize, block: &str) -> Result<(Labels, &str), ParseError> {
    let mut labels = Labels::new();
    let mut rest = block;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }
        if rest.is_empty() {
            return Err(ParseError::new(line_no, "unbalanced braces"));
        }

        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .ok_or_else(|| ParseError::new(line_no, "unbalanced braces"))?;
        let key = &rest[..key_end];
        if !label_name_regex().is_match(key) {
            return Err(ParseError::new(line_no, format!("invalid label name '{key}'")));
        }
        rest = rest[key_end..].trim_start();
        rest = rest.strip_prefix('=').ok_or_else(|| {
            ParseError::new(line_no, format!("expected '=' after label name '{key}'"))
        })?;
        rest = rest.trim_start();
        rest = rest.strip_prefix('"').ok_or_else(|| {
            ParseError::new(line_no, format!("expected '\"' to open value of label '{key}'"))
        })?;

        let close = closing_quote(rest).ok_or_else(|| {
            ParseError::new(line_no, format!("unterminated value for label '{key}'"))
        })?;
        let value = unescape(line_no, &rest[..close], true)?;
        rest = &rest[close + 1..];
        if labels.insert(key.to_string(), value).is_some() {
            return Err(ParseError::new(line_no, format!("duplicate label name '{key}'")));
        }

        rest = rest.trim_start();
        if rest.is_empty() {
            return Err(ParseError::new(line_no, "unbalanced braces"));
        }
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
        } else if !rest.starts_with('}') {
            return Err(ParseError::new(
                line_no,
                format!("expected ',' or '}}' after label '{key}'"),
            ));
        }
    }
}

/// Byte offset of the first unescaped `"`.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Resolve `\\` and `\n`, plus `\"` inside label values.
fn unescape(line_no: usize, s: &str, label_value: bool) -> Result<String, ParseError> {
    if !s.contains('\\') {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('"') if label_value => out.push('"'),
            Some(other) => {
                return Err(ParseError::new(
                    line_no,
                    format!("invalid escape sequence '\\{other}'"),
                ))
            }
            None => return Err(ParseError::new(line_no, "dangling escape character")),
        }
    }
    Ok(out)
}
