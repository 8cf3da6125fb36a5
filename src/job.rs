use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::api::Transport;
use crate::error::{ApiError, Error, JobError, SubmissionError};
use crate::plan::{classify, Mode, TestPlan};
use crate::results::TestResult;

/// Fixed wait between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A classified plan that has not been submitted yet.
#[derive(Debug, Clone)]
pub struct LoadTest {
    plan: TestPlan,
    mode: Mode,
}

impl LoadTest {
    pub fn new(plan: TestPlan) -> Self {
        let mode = classify(&plan);
        Self { plan, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    /// Submits the plan. On success the returned job carries the id and
    /// region assigned by the service; neither exists before this point.
    pub async fn queue<T: Transport>(self, transport: &T) -> Result<Job<'_, T>, Error> {
        let mut payload = serde_json::to_value(&self.plan).map_err(ApiError::Decode)?;
        if self.mode == Mode::Performance {
            // browser runs never carry the raw ramp key
            if let Some(doc) = payload.as_object_mut() {
                doc.remove("pattern");
            }
        }

        let response = transport.execute(&payload).await?;
        if let Some(error) = response.error {
            return Err(Error::Submission(SubmissionError {
                error,
                reason: response.reason,
            }));
        }

        let job_id = response
            .job_id
            .ok_or_else(|| ApiError::Protocol("queue response missing job_id".to_string()))?;
        let region = response
            .region
            .ok_or_else(|| ApiError::Protocol("queue response missing region".to_string()))?;
        debug!(job_id = %job_id, region = %region, mode = %self.mode, "job queued");

        Ok(Job {
            transport,
            mode: self.mode,
            job_id,
            region,
        })
    }
}

/// A queued remote job. Each instance owns exactly one job and is the only
/// poller of it.
#[derive(Debug)]
pub struct Job<'t, T: Transport> {
    transport: &'t T,
    mode: Mode,
    job_id: String,
    region: String,
}

impl<T: Transport> Job<'_, T> {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Polls until the job reaches a terminal state, sleeping a fixed
    /// interval between consecutive status calls. There is no deadline
    /// here: a stalled job polls forever unless the caller imposes one.
    pub async fn await_result(&self) -> Result<TestResult, Error> {
        let mut polled = false;
        loop {
            if polled {
                sleep(POLL_INTERVAL).await;
            }
            polled = true;

            let status = self.transport.job_status(&self.job_id).await?;
            if status.error.is_some() {
                return Err(JobError::Generic { raw: None }.into());
            }

            let state = status.status.as_deref().unwrap_or("");
            debug!(job_id = %self.job_id, state, "poll");
            if state == "queued" {
                continue;
            }
            if state == "running" && status.result.is_none() {
                continue;
            }

            let result = match status.result {
                Some(result) => result,
                None => return Err(JobError::Generic { raw: None }.into()),
            };

            if result.get("error").is_some() {
                let code = result
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(JobError::from_code(&code, result).into());
            }

            let result = TestResult::from_payload(self.mode, result, &self.job_id)
                .map_err(ApiError::Decode)?;
            return Ok(result);
        }
    }

    /// Asks the service to cancel the job. Advisory only: failures are
    /// logged and swallowed, and an in-flight `await_result` is not
    /// interrupted.
    pub async fn abort(&self) {
        if let Err(error) = self.transport.abort_job(&self.job_id).await {
            warn!(job_id = %self.job_id, %error, "abort request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{LoginResponse, QueueResponse, StatusResponse};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct ScriptedTransport {
        queue: Option<QueueResponse>,
        statuses: Mutex<VecDeque<StatusResponse>>,
        sent: Mutex<Option<serde_json::Value>>,
        status_calls: AtomicUsize,
        abort_calls: AtomicUsize,
        fail_abort: bool,
    }

    impl ScriptedTransport {
        fn with_statuses(statuses: Vec<StatusResponse>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, plan: &serde_json::Value) -> Result<QueueResponse, ApiError> {
            *self.sent.lock().unwrap() = Some(plan.clone());
            Ok(self.queue.clone().unwrap_or(QueueResponse {
                error: None,
                reason: None,
                job_id: Some("j123".to_string()),
                region: Some("california".to_string()),
            }))
        }

        async fn job_status(&self, _job_id: &str) -> Result<StatusResponse, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected status poll"))
        }

        async fn abort_job(&self, _job_id: &str) -> Result<(), ApiError> {
            self.abort_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_abort {
                return Err(ApiError::Protocol("nope".to_string()));
            }
            Ok(())
        }

        async fn login(&self) -> Result<LoginResponse, ApiError> {
            Ok(LoginResponse::default())
        }

        async fn screenshot(&self, _job_id: &str) -> Result<Vec<u8>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn status(state: &str, result: Option<serde_json::Value>) -> StatusResponse {
        StatusResponse {
            status: Some(state.to_string()),
            error: None,
            result,
        }
    }

    fn plan_for(command: &str) -> TestPlan {
        crate::parser::parse(command).unwrap()
    }

    #[tokio::test]
    async fn test_queue_records_job_id_and_region() {
        let transport = ScriptedTransport::default();
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        assert_eq!(job.job_id(), "j123");
        assert_eq!(job.region(), "california");
        assert_eq!(job.mode(), Mode::Sprint);
    }

    #[tokio::test]
    async fn test_queue_error_is_a_submission_error() {
        let transport = ScriptedTransport {
            queue: Some(QueueResponse {
                error: Some("validation".to_string()),
                reason: Some("bad plan".to_string()),
                job_id: None,
                region: None,
            }),
            ..Default::default()
        };
        let err = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap_err();
        match err {
            Error::Submission(submission) => {
                assert_eq!(submission.error, "validation");
                assert_eq!(submission.reason.as_deref(), Some("bad plan"));
            }
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rush_submission_keeps_the_pattern() {
        let transport = ScriptedTransport::default();
        let test = LoadTest::new(plan_for("-p 1-10:30 http://example.com/"));
        assert_eq!(test.mode(), Mode::Rush);
        test.queue(&transport).await.unwrap();
        let sent = transport.sent.lock().unwrap().clone().unwrap();
        assert_eq!(sent["pattern"]["intervals"][0]["end"], 10);
    }

    #[tokio::test]
    async fn test_performance_submission_strips_the_pattern() {
        let transport = ScriptedTransport::default();
        let test = LoadTest::new(plan_for("--har -p 1-10:30 http://example.com/"));
        assert_eq!(test.mode(), Mode::Performance);
        test.queue(&transport).await.unwrap();
        let sent = transport.sent.lock().unwrap().clone().unwrap();
        assert!(sent.get("pattern").is_none());
        assert_eq!(sent["har"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_to_completion_with_sleeps_between() {
        let transport = ScriptedTransport::with_statuses(vec![
            status("queued", None),
            status("running", None),
            status(
                "completed",
                Some(json!({"region": "california", "duration": 0.4, "steps": []})),
            ),
        ]);
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let result = job.await_result().await.unwrap();
        assert!(matches!(result, TestResult::Sprint(_)));
        assert_eq!(transport.status_calls.load(Ordering::SeqCst), 3);
        // three status calls, two intervening sleeps
        assert_eq!(started.elapsed(), POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_with_result_is_terminal() {
        let transport = ScriptedTransport::with_statuses(vec![status(
            "running",
            Some(json!({"region": "california", "timeline": []})),
        )]);
        let job = LoadTest::new(plan_for("-p 1-10:30 http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        let result = job.await_result().await.unwrap();
        assert!(matches!(result, TestResult::Rush(_)));
        assert_eq!(transport.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_error_code_maps_to_typed_error() {
        let transport = ScriptedTransport::with_statuses(vec![status(
            "completed",
            Some(json!({"error": "timeout", "region": "california"})),
        )]);
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        let err = job.await_result().await.unwrap_err();
        match err {
            Error::Job(JobError::Timeout { raw }) => {
                assert_eq!(raw["region"], "california");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_result_error_code_is_generic() {
        let transport = ScriptedTransport::with_statuses(vec![status(
            "completed",
            Some(json!({"error": "exploded"})),
        )]);
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        let err = job.await_result().await.unwrap_err();
        assert!(matches!(err, Error::Job(JobError::Generic { raw: Some(_) })));
    }

    #[tokio::test]
    async fn test_status_level_error_is_generic() {
        let transport = ScriptedTransport::with_statuses(vec![StatusResponse {
            status: Some("running".to_string()),
            error: Some("boom".to_string()),
            result: None,
        }]);
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        let err = job.await_result().await.unwrap_err();
        assert!(matches!(err, Error::Job(JobError::Generic { raw: None })));
    }

    #[tokio::test]
    async fn test_terminal_status_without_result_is_generic() {
        let transport =
            ScriptedTransport::with_statuses(vec![status("completed", None)]);
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        let err = job.await_result().await.unwrap_err();
        assert!(matches!(err, Error::Job(JobError::Generic { raw: None })));
    }

    #[tokio::test]
    async fn test_abort_swallows_failures() {
        let transport = ScriptedTransport {
            fail_abort: true,
            ..Default::default()
        };
        let job = LoadTest::new(plan_for("http://example.com/"))
            .queue(&transport)
            .await
            .unwrap();
        job.abort().await;
        assert_eq!(transport.abort_calls.load(Ordering::SeqCst), 1);
    }
}
