use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("任务未注册: {name}")]
    TaskNotFound { name: String },
    #[error("任务运行记录未找到: {id}")]
    RunNotFound { id: i64 },
    #[error("执行实例未找到或已结束: {id}")]
    ExecutionNotFound { id: i64 },
    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },
    #[error("缺少必需参数: {name}")]
    MissingParam { name: String },
    #[error("存在未声明的参数: {name}")]
    UnexpectedParam { name: String },
    #[error("参数 {name} 类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("不支持的参数类型: {value}")]
    UnsupportedSchemaType { value: String },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn storage_error<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(name: S) -> Self {
        Self::TaskNotFound { name: name.into() }
    }
    pub fn run_not_found(id: i64) -> Self {
        Self::RunNotFound { id }
    }
    pub fn execution_not_found(id: i64) -> Self {
        Self::ExecutionNotFound { id }
    }
    pub fn missing_param<S: Into<String>>(name: S) -> Self {
        Self::MissingParam { name: name.into() }
    }
    pub fn unexpected_param<S: Into<String>>(name: S) -> Self {
        Self::UnexpectedParam { name: name.into() }
    }
    pub fn type_mismatch<S: Into<String>>(name: S, expected: S, actual: S) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
    pub fn unsupported_schema_type<S: Into<String>>(value: S) -> Self {
        Self::UnsupportedSchemaType {
            value: value.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 判断错误是否属于参数校验类错误（同步返回给调用方，不产生运行记录）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SchedulerError::MissingParam { .. }
                | SchedulerError::UnexpectedParam { .. }
                | SchedulerError::TypeMismatch { .. }
                | SchedulerError::UnsupportedSchemaType { .. }
        )
    }

    /// 判断错误是否可能通过重试恢复
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::Storage(_))
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}
