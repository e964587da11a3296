//! Test data builders with sensible defaults.

use chrono::{DateTime, Utc};

use taskforge_domain::{TaskParams, TaskRun, TaskRunStatus};

/// Builder for test `TaskRun` entities.
pub struct TaskRunBuilder {
    run: TaskRun,
}

impl TaskRunBuilder {
    pub fn new() -> Self {
        Self {
            run: TaskRun {
                id: 0,
                task_name: "test_task".to_string(),
                start_time: Utc::now(),
                end_time: None,
                params: TaskParams::new(),
                status: TaskRunStatus::Started,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.run.id = id;
        self
    }

    pub fn with_task_name(mut self, name: &str) -> Self {
        self.run.task_name = name.to_string();
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.run.start_time = start_time;
        self
    }

    pub fn with_params(mut self, params: TaskParams) -> Self {
        self.run.params = params;
        self
    }

    pub fn with_status(mut self, status: TaskRunStatus) -> Self {
        self.run.status = status;
        self
    }

    pub fn finished(mut self, status: TaskRunStatus) -> Self {
        self.run.finish(status);
        self
    }

    pub fn build(self) -> TaskRun {
        self.run
    }
}

impl Default for TaskRunBuilder {
    fn default() -> Self {
        Self::new()
    }
}
