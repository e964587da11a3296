//! 绑定运行的结构化日志器
//!
//! 每条日志先镜像到进程级诊断输出（尽力而为），再通过存储端口持久
//! 化为 [`TaskRunLog`]。持久化失败不会使运行失败，但任务体可以检查
//! 返回值并自行处理。

use std::sync::Arc;

use taskforge_domain::{LogLevel, TaskRunLog, TaskRunRepository};
use taskforge_errors::SchedulerResult;

#[derive(Clone)]
pub struct RunLogger {
    task_run_id: i64,
    repo: Arc<dyn TaskRunRepository>,
    mirror: bool,
}

impl RunLogger {
    pub fn new(task_run_id: i64, repo: Arc<dyn TaskRunRepository>) -> Self {
        Self::with_mirror(task_run_id, repo, true)
    }

    pub fn with_mirror(task_run_id: i64, repo: Arc<dyn TaskRunRepository>, mirror: bool) -> Self {
        Self {
            task_run_id,
            repo,
            mirror,
        }
    }

    pub fn task_run_id(&self) -> i64 {
        self.task_run_id
    }

    pub async fn info(&self, message: impl Into<String>) -> SchedulerResult<()> {
        self.log(LogLevel::Info, message.into()).await
    }

    pub async fn debug(&self, message: impl Into<String>) -> SchedulerResult<()> {
        self.log(LogLevel::Debug, message.into()).await
    }

    pub async fn error(&self, message: impl Into<String>) -> SchedulerResult<()> {
        self.log(LogLevel::Error, message.into()).await
    }

    pub async fn success(&self, message: impl Into<String>) -> SchedulerResult<()> {
        self.log(LogLevel::Success, message.into()).await
    }

    async fn log(&self, level: LogLevel, message: String) -> SchedulerResult<()> {
        if self.mirror {
            match level {
                LogLevel::Info | LogLevel::Success => {
                    tracing::info!(task_run_id = self.task_run_id, "{}", message)
                }
                LogLevel::Debug => {
                    tracing::debug!(task_run_id = self.task_run_id, "{}", message)
                }
                LogLevel::Error => {
                    tracing::error!(task_run_id = self.task_run_id, "{}", message)
                }
            }
        }

        let mut entry = TaskRunLog::new(self.task_run_id, level, message);
        self.repo.save_task_run_log(&mut entry).await
    }
}
