use serde_json::Value;
use thiserror::Error;

/// Malformed ramp or multi-region affinity syntax in a `-p` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid ramp pattern")]
pub struct InvalidPatternError;

/// A command line that cannot be compiled into a test plan. Parsing is
/// all-or-nothing: the first error aborts the whole parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unknown option {0}")]
    UnknownOption(String),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },
    #[error("cannot read body file {path}: {source}")]
    BodyFile {
        path: String,
        source: std::io::Error,
    },
    #[error("POST content must be < 20KB")]
    ContentTooLarge,
    #[error("no URL specified")]
    NoUrl,
    #[error("--screenshot allowed with --har only")]
    ScreenshotWithoutHar,
    #[error("--dump-har allowed with --har only")]
    DumpHarWithoutHar,
    #[error("cookie name must be alphanumeric: {0}")]
    ExtractName(String),
    #[error("variable name must be alphanumeric: {0}")]
    VariableName(String),
    #[error("Invalid variable args for {name}: {args}")]
    VariableArgs { name: String, args: String },
    #[error(transparent)]
    Pattern(#[from] InvalidPatternError),
}

/// The service refused the plan at submit time. Not retried; the caller may
/// submit a corrected plan.
#[derive(Debug, Clone, Error)]
#[error("submission rejected: {error}")]
pub struct SubmissionError {
    pub error: String,
    pub reason: Option<String>,
}

/// Terminal classification of a failed remote run, derived from the error
/// code in the result payload. The raw result is kept for diagnostics.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("DNS lookup failed")]
    Dns { raw: Value },
    #[error("connection to the target failed")]
    Connect { raw: Value },
    #[error("the target took too long to respond")]
    Timeout { raw: Value },
    #[error("the response could not be parsed")]
    ResponseParse { raw: Value },
    #[error("an assertion on the response failed")]
    AssertionFailed { raw: Value },
    #[error("the job failed")]
    Generic { raw: Option<Value> },
}

impl JobError {
    pub fn from_code(code: &str, raw: Value) -> Self {
        match code {
            "dns" => JobError::Dns { raw },
            "connect" => JobError::Connect { raw },
            "timeout" => JobError::Timeout { raw },
            "parse" => JobError::ResponseParse { raw },
            "assert" | "assertion" => JobError::AssertionFailed { raw },
            _ => JobError::Generic { raw: Some(raw) },
        }
    }

    pub fn raw(&self) -> Option<&Value> {
        match self {
            JobError::Dns { raw }
            | JobError::Connect { raw }
            | JobError::Timeout { raw }
            | JobError::ResponseParse { raw }
            | JobError::AssertionFailed { raw } => Some(raw),
            JobError::Generic { raw } => raw.as_ref(),
        }
    }
}

/// Transport-level failure: the request never produced a usable response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API host: {0}")]
    Host(#[from] url::ParseError),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
