use thiserror::Error;

/// A malformed exposition document. The whole document is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number in the scraped body.
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: usize, reason: impl Into<String>) -> ParseError {
        ParseError {
            line,
            reason: reason.into(),
        }
    }
}

/// Internal consistency check failure on a parsed family. Indicates a bug or
/// a self-contradicting endpoint; never silently corrected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violated in family '{family}': {reason}")]
pub struct InvariantViolation {
    pub family: String,
    pub reason: String,
}

impl InvariantViolation {
    pub fn new(reason: impl Into<String>) -> InvariantViolation {
        InvariantViolation {
            family: String::new(),
            reason: reason.into(),
        }
    }

    pub fn in_family(mut self, family: &str) -> InvariantViolation {
        self.family = family.to_string();
        self
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout or a broken body stream
    #[error("failed to fetch metrics from {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("received non-200 status code {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to parse metrics from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },

    #[error("inconsistent metrics from {url}: {source}")]
    Invariant {
        url: String,
        #[source]
        source: InvariantViolation,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            FetchError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}
