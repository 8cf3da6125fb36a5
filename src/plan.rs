use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A compiled load test description. Serializing it produces the submission
/// document; fields marked `skip` only steer the local client and never go
/// over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestPlan {
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub keepalive: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub har: bool,
    #[serde(skip)]
    pub help: bool,
    #[serde(skip)]
    pub verbose: bool,
    #[serde(skip)]
    pub output: Option<String>,
    #[serde(skip)]
    pub dump_header: Option<String>,
    #[serde(skip)]
    pub screenshot_file: Option<String>,
    #[serde(skip)]
    pub har_file: Option<String>,
}

impl TestPlan {
    /// The single pattern container, created on first use.
    pub fn pattern_mut(&mut self) -> &mut Pattern {
        self.pattern.get_or_insert_with(Pattern::new)
    }
}

/// One HTTP interaction in a plan. Multi-step plans model scripted
/// transactions; headers and cookies keep their command-line order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Step {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(rename = "user-agent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub xtracts: HashMap<String, Extraction>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, Variable>,
}

/// Request body as an ordered list of fragments (literal or file-sourced).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Content {
    pub data: Vec<String>,
}

impl Content {
    pub fn byte_len(&self) -> usize {
        self.data.iter().map(|fragment| fragment.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslVersion {
    Tlsv1,
    Sslv2,
    Sslv3,
}

/// A named value extracted from a step's response for use downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extraction {
    #[serde(rename = "type")]
    pub kind: ExtractKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractKind {
    Cookie,
}

/// A named value generator, evaluated by the service for every generated
/// request. Bare alpha/number generators carry no bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Variable {
    List {
        entries: Vec<String>,
    },
    Alpha {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
    },
    Udid,
    Uuid,
}

/// Load ramp over time: an ordered list of interval segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub iterations: u64,
    pub intervals: Vec<Interval>,
}

impl Pattern {
    pub fn new() -> Self {
        Self {
            iterations: 1,
            intervals: Vec::new(),
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

/// One ramp segment. Multi-region segments additionally carry the
/// per-region split; `start`/`end` are then the sums over all regions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub iterations: u64,
    pub start: u64,
    pub end: u64,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Affinity {
    pub regions: Vec<RegionLoad>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionLoad {
    pub region: String,
    pub start: u64,
    pub end: u64,
}

/// Execution mode a completed plan maps to. Closed set: a new mode means
/// extending `classify` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sprint,
    Rush,
    Performance,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sprint => write!(f, "sprint"),
            Mode::Rush => write!(f, "rush"),
            Mode::Performance => write!(f, "performance"),
        }
    }
}

/// Picks the execution mode for a parsed plan. Total: exactly one mode
/// matches any plan.
pub fn classify(plan: &TestPlan) -> Mode {
    if plan.har {
        Mode::Performance
    } else if plan.pattern.is_some() {
        Mode::Rush
    } else {
        Mode::Sprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_url() -> TestPlan {
        TestPlan {
            steps: vec![Step {
                url: "http://example.com/".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_sprint() {
        assert_eq!(classify(&plan_with_url()), Mode::Sprint);
    }

    #[test]
    fn test_classify_rush() {
        let mut plan = plan_with_url();
        plan.pattern = Some(Pattern::new());
        assert_eq!(classify(&plan), Mode::Rush);
    }

    #[test]
    fn test_classify_performance_wins_over_pattern() {
        let mut plan = plan_with_url();
        plan.pattern = Some(Pattern::new());
        plan.har = true;
        assert_eq!(classify(&plan), Mode::Performance);
    }

    #[test]
    fn test_wire_document_shape() {
        let mut plan = plan_with_url();
        plan.keepalive = true;
        plan.verbose = true;
        plan.dump_header = Some("head.txt".to_string());
        plan.steps[0].user_agent = Some("curl/7.1".to_string());
        plan.steps[0].headers.push("X-A: 1".to_string());
        plan.steps[0]
            .variables
            .insert("id".to_string(), Variable::Uuid);

        let doc = serde_json::to_value(&plan).unwrap();
        assert_eq!(doc["steps"][0]["user-agent"], "curl/7.1");
        assert_eq!(doc["steps"][0]["headers"][0], "X-A: 1");
        assert_eq!(doc["steps"][0]["variables"]["id"]["type"], "uuid");
        assert_eq!(doc["keepalive"], true);
        // local-only switches stay off the wire
        assert!(doc.get("verbose").is_none());
        assert!(doc.get("dump_header").is_none());
        assert!(doc.get("har").is_none());
        assert!(doc.get("help").is_none());
    }

    #[test]
    fn test_variable_range_serialization() {
        let variable = Variable::Number {
            min: Some(1),
            max: Some(100),
            count: Some(50),
        };
        let doc = serde_json::to_value(&variable).unwrap();
        assert_eq!(doc["type"], "number");
        assert_eq!(doc["min"], 1);
        assert_eq!(doc["max"], 100);
        assert_eq!(doc["count"], 50);
    }
}
