//! # 调度与执行
//!
//! CRON表达式解析、计划管理器与执行分发器。

pub mod cron_utils;
pub mod execution;
pub mod intervals;
pub mod schedule;

pub use cron_utils::CronScheduler;
pub use execution::{ExecutionDispatcher, ExecutionTracker};
pub use schedule::{ScheduleInfo, ScheduleManager};

pub use taskforge_errors::{SchedulerError, SchedulerResult};
