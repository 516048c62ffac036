//! Durable multi-step workflow runner.
//!
//! A workflow is an ordered list of named steps executed strictly
//! sequentially on a single logical thread of control. Each step is a unit
//! of work with its own recorded [`StepOutcome`]; the first step failure
//! aborts the remaining steps and fails the run with that step's error
//! attached. Completed steps are never rolled back — compensating actions
//! (such as writing a failed audit row) belong to the caller's failure
//! path.
//!
//! The runner keeps step results in memory only for the duration of the
//! run; a crash mid-run loses in-flight state. There is no automatic step
//! retry: one attempt per step per run. The only cancellation mechanism is
//! a single wall-clock budget for the whole run, enforced with
//! `tokio::time::timeout`.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Run lifecycle. Transitions are monotonic:
/// `Pending -> Running -> (Completed | Failed)`, terminal once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Recorded outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step_name: String,
    pub succeeded: bool,
    /// Step output serialized to JSON (success only).
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One invocation of a workflow definition. Mutated only by the runner;
/// persisting the outcome as an audit record is the caller's job.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub workflow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub step_results: Vec<StepOutcome>,
    /// Present iff the run failed: `"{kind}: {message}"`.
    pub error: Option<String>,
}

/// Handle passed to the workflow body for executing named steps.
pub struct StepContext {
    outcomes: Mutex<Vec<StepOutcome>>,
}

impl StepContext {
    fn new() -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Execute one named step, recording its outcome and timing.
    ///
    /// On failure the error is recorded against the step and returned, so
    /// the body's `?` aborts the remaining steps.
    pub async fn step<T, Fut>(&self, name: &str, work: Fut) -> Result<T>
    where
        T: Serialize,
        Fut: Future<Output = Result<T>>,
    {
        let started_at = Utc::now();
        debug!(step = name, "step started");
        let result = work.await;
        let finished_at = Utc::now();

        let outcome = match &result {
            Ok(value) => StepOutcome {
                step_name: name.to_string(),
                succeeded: true,
                output: serde_json::to_value(value).ok(),
                error: None,
                started_at,
                finished_at,
            },
            Err(err) => {
                warn!(step = name, error = %err, "step failed");
                StepOutcome {
                    step_name: name.to_string(),
                    succeeded: false,
                    output: None,
                    error: Some(err.to_string()),
                    started_at,
                    finished_at,
                }
            }
        };
        self.outcomes.lock().unwrap().push(outcome);

        result
    }

    fn take_outcomes(&self) -> Vec<StepOutcome> {
        std::mem::take(&mut *self.outcomes.lock().unwrap())
    }
}

/// Executes workflow bodies under a single wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowRunner {
    budget: Duration,
}

impl WorkflowRunner {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Run a workflow body to completion or failure.
    ///
    /// Returns the finished [`WorkflowRun`] together with the body's typed
    /// result, so callers get a synchronous error (kind + message) while
    /// the run record captures the same failure for auditing. The body
    /// receives a [`StepContext`] and should execute each unit of work via
    /// [`StepContext::step`].
    pub async fn run<T, F, Fut>(&self, workflow_id: &str, body: F) -> (WorkflowRun, Result<T>)
    where
        F: FnOnce(Arc<StepContext>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut run = WorkflowRun {
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            step_results: Vec::new(),
            error: None,
        };

        let ctx = Arc::new(StepContext::new());
        run.status = RunStatus::Running;
        debug!(workflow = workflow_id, budget_secs = self.budget.as_secs(), "run started");

        let result = match tokio::time::timeout(self.budget, body(ctx.clone())).await {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout {
                budget_secs: self.budget.as_secs(),
            }),
        };

        run.step_results = ctx.take_outcomes();
        run.completed_at = Some(Utc::now());
        match &result {
            Ok(_) => {
                run.status = RunStatus::Completed;
            }
            Err(err) => {
                run.status = RunStatus::Failed;
                run.error = Some(format!("{}: {}", err.kind(), err));
                warn!(workflow = workflow_id, error = %err, "run failed");
            }
        }

        (run, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> WorkflowRunner {
        WorkflowRunner::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_record_outcomes() {
        let (run, result) = runner()
            .run("wf", |ctx| async move {
                let a = ctx.step("first", async { Ok(2u32) }).await?;
                let b = ctx.step("second", async move { Ok(a * 3) }).await?;
                Ok(b)
            })
            .await;

        assert_eq!(result.unwrap(), 6);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error.is_none());
        assert!(run.completed_at.is_some());
        let names: Vec<&str> = run
            .step_results
            .iter()
            .map(|s| s.step_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(run.step_results.iter().all(|s| s.succeeded));
        assert_eq!(run.step_results[1].output, Some(serde_json::json!(6)));
    }

    #[tokio::test]
    async fn test_step_failure_aborts_remaining_steps() {
        let (run, result) = runner()
            .run("wf", |ctx| async move {
                ctx.step("ok", async { Ok(1u32) }).await?;
                ctx.step("boom", async {
                    Err::<u32, _>(Error::EmbeddingProvider("model unreachable".into()))
                })
                .await?;
                ctx.step("never", async { Ok(3u32) }).await
            })
            .await;

        assert!(matches!(result, Err(Error::EmbeddingProvider(_))));
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_results.len(), 2);
        assert!(run.step_results[0].succeeded);
        assert!(!run.step_results[1].succeeded);
        assert!(run.step_results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("model unreachable"));
        assert!(run.error.as_deref().unwrap().starts_with("embedding_provider:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_fails_with_timeout() {
        let runner = WorkflowRunner::new(Duration::from_secs(5));
        let (run, result) = runner
            .run("wf", |ctx| async move {
                ctx.step("slow", async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(1u32)
                })
                .await
            })
            .await;

        match result {
            Err(Error::Timeout { budget_secs }) => assert_eq!(budget_secs, 5),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().starts_with("timeout:"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let (run, _) = runner().run("wf", |_| async { Ok(()) }).await;
        // The run value handed back is terminal; nothing can move it again
        // because the runner is the only mutator and it has returned.
        assert_eq!(run.status, RunStatus::Completed);
    }
}
