//! Linear task workflow.
//!
//! Tasks run in declaration order. A task starts only when every earlier task
//! succeeded; once one fails, the remaining tasks are reported as skipped.
//! Nothing is retried.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::pipeline::FetchJob;

pub const FETCH_TASK_NAME: &str = "fetch_listings";

/// Failure reported by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    code: &'static str,
    message: String,
}

impl TaskError {
    pub fn new(code: &'static str, message: impl Display) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TaskError {}

/// One unit of work in a [`Workflow`]. On success a task returns a JSON summary.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub name: String,
    pub tasks: Vec<TaskReport>,
    pub latency_ms: u64,
}

impl WorkflowReport {
    pub fn is_success(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| task.status == TaskStatus::Succeeded)
    }

    pub fn failed_task(&self) -> Option<&TaskReport> {
        self.tasks
            .iter()
            .find(|task| task.status == TaskStatus::Failed)
    }
}

/// Ordered chain of tasks.
#[derive(Clone)]
pub struct Workflow {
    name: String,
    tasks: Vec<Arc<dyn Task>>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Append `task` after every task added so far.
    pub fn then(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    pub async fn run(&self) -> WorkflowReport {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(self.tasks.len());
        let mut upstream_failed = false;

        for task in &self.tasks {
            if upstream_failed {
                warn!(workflow = %self.name, task = task.name(), "skipping task after upstream failure");
                reports.push(TaskReport {
                    name: task.name().to_owned(),
                    status: TaskStatus::Skipped,
                    output: None,
                    error: None,
                    latency_ms: 0,
                });
                continue;
            }

            let task_started = Instant::now();
            info!(workflow = %self.name, task = task.name(), "running task");
            let result = task.run().await;
            let latency_ms = elapsed_ms(task_started);

            let report = match result {
                Ok(output) => TaskReport {
                    name: task.name().to_owned(),
                    status: TaskStatus::Succeeded,
                    output: Some(output),
                    error: None,
                    latency_ms,
                },
                Err(task_error) => {
                    error!(workflow = %self.name, task = task.name(), error = %task_error, "task failed");
                    upstream_failed = true;
                    TaskReport {
                        name: task.name().to_owned(),
                        status: TaskStatus::Failed,
                        output: None,
                        error: Some(task_error.to_string()),
                        latency_ms,
                    }
                }
            };
            reports.push(report);
        }

        WorkflowReport {
            name: self.name.clone(),
            tasks: reports,
            latency_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl Task for FetchJob {
    fn name(&self) -> &str {
        FETCH_TASK_NAME
    }

    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send + 'a>> {
        Box::pin(async move {
            let report = FetchJob::run(self)
                .await
                .map_err(|error| TaskError::new(error.code(), error))?;
            serde_json::to_value(report).map_err(|error| TaskError::new("workflow.output", error))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    struct ScriptedTask {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedTask {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Task for ScriptedTask {
        fn name(&self) -> &str {
            self.name
        }

        fn run<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(TaskError::new("test.failure", "scripted failure"))
                } else {
                    Ok(json!({"ok": true}))
                }
            })
        }
    }

    #[tokio::test]
    async fn runs_tasks_in_order_when_all_succeed() {
        let first = ScriptedTask::new("first", false);
        let second = ScriptedTask::new("second", false);
        let workflow = Workflow::new("demo").then(first.clone()).then(second.clone());

        let report = workflow.run().await;

        assert!(report.is_success());
        assert_eq!(workflow.task_names(), vec!["first", "second"]);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_skips_downstream_tasks() {
        let first = ScriptedTask::new("first", true);
        let second = ScriptedTask::new("second", false);
        let workflow = Workflow::new("demo").then(first.clone()).then(second.clone());

        let report = workflow.run().await;

        assert!(!report.is_success());
        assert_eq!(report.tasks[0].status, TaskStatus::Failed);
        assert_eq!(
            report.tasks[0].error.as_deref(),
            Some("test.failure: scripted failure")
        );
        assert_eq!(report.tasks[1].status, TaskStatus::Skipped);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.failed_task().map(|task| task.name.as_str()), Some("first"));
    }

    #[tokio::test]
    async fn empty_workflow_succeeds() {
        let report = Workflow::new("empty").run().await;
        assert!(report.is_success());
        assert!(report.tasks.is_empty());
    }
}
