//! # 领域模型
//!
//! 定义参数模型、任务运行实体以及引擎所消费的存储端口。
//! 具体存储适配器（关系型、文档型、文件系统）在核心之外实现。

pub mod entities;
pub mod params;
pub mod repositories;

pub use entities::{LevelFilter, LogLevel, TaskRun, TaskRunLog, TaskRunStatus};
pub use params::{
    params_from_struct, schema_from_struct, validate_params, ParamValue, TaskParamType, TaskParams,
    TaskSchema,
};
pub use repositories::TaskRunRepository;

pub use taskforge_errors::{SchedulerError, SchedulerResult};
