//! 引擎配置
//!
//! 嵌入式默认值加环境变量覆盖，前缀 `TASKFORGE`，层级分隔符 `__`。

use serde::{Deserialize, Serialize};

use taskforge_errors::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 运行日志是否镜像到进程级诊断输出（tracing）
    pub mirror_run_logs: bool,
    /// 运行记录列表的默认分页大小
    pub history_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::embedded_default()
    }
}

impl EngineConfig {
    /// 嵌入式默认配置
    pub fn embedded_default() -> Self {
        Self {
            mirror_run_logs: true,
            history_page_size: 20,
        }
    }

    /// 默认配置加环境变量覆盖
    ///
    /// 例如 `TASKFORGE_MIRROR_RUN_LOGS=false`、`TASKFORGE_HISTORY_PAGE_SIZE=50`。
    pub fn embedded_with_env() -> SchedulerResult<Self> {
        let defaults = Self::embedded_default();

        config::Config::builder()
            .set_default("mirror_run_logs", defaults.mirror_run_logs)
            .map_err(|e| SchedulerError::Configuration(e.to_string()))?
            .set_default("history_page_size", defaults.history_page_size as i64)
            .map_err(|e| SchedulerError::Configuration(e.to_string()))?
            .add_source(
                config::Environment::with_prefix("TASKFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SchedulerError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SchedulerError::Configuration(e.to_string()))
    }
}
