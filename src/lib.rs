//! # Taskforge
//!
//! 可嵌入的任务调度与执行引擎。宿主应用注册带参数模式的命名任务，
//! 按需触发或绑定CRON计划；每次调用都会产生持久化的运行记录与有序
//! 的运行日志流，并且在途可单独取消。
//!
//! 存储是一个窄端口（[`TaskRunRepository`]），具体后端由宿主提供；
//! HTTP等外层界面同样作为适配器在核心之外实现。
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskforge::{task_fn, Engine, TaskParamType, TaskParams, TaskSchema};
//!
//! # async fn example(repo: Arc<dyn taskforge::TaskRunRepository>) -> anyhow::Result<()> {
//! let engine = Engine::new(repo);
//!
//! let schema = TaskSchema::empty().with_field("count", TaskParamType::Int);
//! let task = engine.register_task(
//!     "refresh",
//!     schema,
//!     task_fn(|token, params, logger| async move {
//!         let count = params.get_int("count")?;
//!         logger.info(format!("refreshing {count} items")).await?;
//!         tokio::select! {
//!             _ = token.cancelled() => {}
//!             _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
//!         }
//!         Ok(())
//!     }),
//! )?;
//!
//! task.register_schedule(TaskParams::new().with("count", 10), "@every 5m")?;
//! engine.start();
//!
//! let run_id = task.execute_now(TaskParams::new().with("count", 1)).await?;
//! engine.cancel_execution_by_id(run_id).await.ok();
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod engine;
mod views;

pub use engine::{Engine, TaskHandle};
pub use views::{TaskExecution, TaskInfo};

pub use taskforge_core::{
    task_fn, CredentialStore, EngineConfig, RunLogger, TaskDefinition, TaskFunc, TaskFuture,
    TaskRegistry,
};
pub use taskforge_dispatcher::{
    intervals, CronScheduler, ExecutionDispatcher, ExecutionTracker, ScheduleInfo,
};
pub use taskforge_domain::{
    params_from_struct, schema_from_struct, validate_params, LevelFilter, LogLevel, ParamValue,
    TaskParamType, TaskParams, TaskRun, TaskRunLog, TaskRunRepository, TaskRunStatus, TaskSchema,
};
pub use taskforge_errors::{SchedulerError, SchedulerResult};

/// 任务体使用的取消令牌
pub use tokio_util::sync::CancellationToken;
