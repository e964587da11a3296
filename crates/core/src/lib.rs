//! # 核心服务
//!
//! 引擎配置、任务注册表、运行日志器与认证凭据存储。

pub mod config;
pub mod credentials;
pub mod registry;
pub mod run_logger;

pub use config::EngineConfig;
pub use credentials::CredentialStore;
pub use registry::{task_fn, TaskDefinition, TaskFunc, TaskFuture, TaskRegistry};
pub use run_logger::RunLogger;

pub use taskforge_errors::{SchedulerError, SchedulerResult};
