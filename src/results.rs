use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::api::Transport;
use crate::error::ApiError;
use crate::plan::Mode;

/// Terminal payload of a finished job, one variant per execution mode.
/// Snapshots: constructed once and never written again.
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Sprint(SprintResult),
    Rush(RushResult),
    Performance(PerformanceResult),
}

impl TestResult {
    pub fn from_payload(
        mode: Mode,
        payload: Value,
        job_id: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(match mode {
            Mode::Sprint => TestResult::Sprint(serde_json::from_value(payload)?),
            Mode::Rush => TestResult::Rush(serde_json::from_value(payload)?),
            Mode::Performance => {
                let mut result: PerformanceResult = serde_json::from_value(payload)?;
                result.job_id = job_id.to_string();
                TestResult::Performance(result)
            }
        })
    }
}

/// Single request/response trace with timings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SprintResult {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<SprintStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SprintStep {
    #[serde(default)]
    pub connect: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub request: Option<Trace>,
    #[serde(default)]
    pub response: Option<Trace>,
}

/// One side of an HTTP exchange as echoed back by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Ramped run: ordered samples of volume, hits, errors and timeouts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RushResult {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimelinePoint {
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub executed: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub timeouts: u64,
    #[serde(default)]
    pub steps: Vec<StepTimeline>,
}

impl TimelinePoint {
    /// Requests completed in this sample.
    pub fn hits(&self) -> u64 {
        self.executed
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepTimeline {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub connect: f64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub timeouts: u64,
    #[serde(default)]
    pub asserts: u64,
}

/// Browser-level run: analysis plus the HAR document (no response bodies).
/// The job id sticks around only so a screenshot can be fetched later.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerformanceResult {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub har: Value,
    #[serde(skip)]
    pub job_id: String,
}

impl PerformanceResult {
    /// Entries of the HAR log. An unexpected document shape yields an
    /// empty list, not an error.
    pub fn entries(&self) -> Vec<HarEntry> {
        self.har
            .get("log")
            .and_then(|log| log.get("entries"))
            .cloned()
            .and_then(|entries| serde_json::from_value(entries).ok())
            .unwrap_or_default()
    }

    pub async fn fetch_screenshot<T: Transport>(&self, transport: &T) -> Result<Vec<u8>, ApiError> {
        transport.screenshot(&self.job_id).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub load_time: Option<u64>,
    #[serde(default)]
    pub problems: Vec<Problem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Minimal view over a HAR entry, enough for the result table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarEntry {
    #[serde(rename = "startedDateTime", default)]
    pub started: Option<String>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub request: HarRequest,
    #[serde(default)]
    pub response: HarResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HarRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HarResponse {
    #[serde(default)]
    pub status: u16,
}
