//! 外层API使用的视图类型

use chrono::{DateTime, Utc};
use serde::Serialize;

use taskforge_dispatcher::ScheduleInfo;
use taskforge_domain::{TaskParams, TaskRun, TaskRunStatus};

/// 运行记录视图，带人类可读的执行时长
#[derive(Debug, Clone, Serialize)]
pub struct TaskExecution {
    pub id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: String,
    pub params: TaskParams,
    pub status: TaskRunStatus,
}

impl TaskExecution {
    pub fn from_run(run: &TaskRun) -> Self {
        let duration = match run.end_time {
            // 未结束的运行时长报告为 "ongoing"
            None => "ongoing".to_string(),
            Some(end) => {
                let seconds = (end - run.start_time).num_seconds().max(0) as u64;
                humantime::format_duration(std::time::Duration::from_secs(seconds)).to_string()
            }
        };
        Self {
            id: run.id,
            task_name: run.task_name.clone(),
            start_time: run.start_time,
            end_time: run.end_time,
            duration,
            params: run.params.clone(),
            status: run.status,
        }
    }
}

impl From<&TaskRun> for TaskExecution {
    fn from(run: &TaskRun) -> Self {
        Self::from_run(run)
    }
}

/// 任务及其计划列表
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub task_name: String,
    pub schedules: Vec<ScheduleInfo>,
}
