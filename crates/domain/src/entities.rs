use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::params::TaskParams;
use taskforge_errors::SchedulerError;

/// 任务运行状态
///
/// `started` 之后只会进入一个终止状态，终止状态不再变化。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskRunStatus {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl TaskRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 一次任务调用的持久化记录
///
/// id 为 0 表示尚未入库，首次保存时由存储端分配单调递增的 id。
/// end_time 为 None 表示仍在执行。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: i64,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: TaskParams,
    pub status: TaskRunStatus,
}

impl TaskRun {
    /// 构造一条刚启动的运行记录
    pub fn started(task_name: String, params: TaskParams) -> Self {
        Self {
            id: 0,
            task_name,
            start_time: Utc::now(),
            end_time: None,
            params,
            status: TaskRunStatus::Started,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// 进入终止状态并记录结束时间
    pub fn finish(&mut self, status: TaskRunStatus) {
        self.status = status;
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// 运行日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogLevel {
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "success")]
    Success,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Error => write!(f, "error"),
            Self::Success => write!(f, "success"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "error" => Ok(Self::Error),
            "success" => Ok(Self::Success),
            other => Err(SchedulerError::Configuration(format!(
                "无效的日志级别: {other}"
            ))),
        }
    }
}

/// 日志级别过滤器，`all` 表示不过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    All,
    Only(LogLevel),
}

impl LevelFilter {
    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == level,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            LogLevel::from_str(s).map(Self::Only)
        }
    }
}

/// 任务运行日志条目，只追加，不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunLog {
    pub id: i64,
    pub task_run_id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl TaskRunLog {
    pub fn new(task_run_id: i64, level: LogLevel, message: String) -> Self {
        Self {
            id: 0,
            task_run_id,
            timestamp: Utc::now(),
            level,
            message,
        }
    }
}
