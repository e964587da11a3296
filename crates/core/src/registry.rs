//! 任务注册表
//!
//! 名称到（任务体，参数模式）的映射。读多写少，使用读写锁保护的
//! 普通映射。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::run_logger::RunLogger;
use taskforge_domain::{TaskParams, TaskSchema};
use taskforge_errors::{SchedulerError, SchedulerResult};

/// 任务体返回的future
pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;

/// 任务体：(取消令牌, 参数快照, 绑定运行的日志器) -> 结果
///
/// 任务体在独立的并发上下文中执行，必须自行响应取消令牌；
/// 引擎不会强行终止任务。
pub type TaskFunc = Arc<dyn Fn(CancellationToken, TaskParams, RunLogger) -> TaskFuture + Send + Sync>;

/// 把异步闭包包装成 [`TaskFunc`]
pub fn task_fn<F, Fut>(f: F) -> TaskFunc
where
    F: Fn(CancellationToken, TaskParams, RunLogger) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |token, params, logger| Box::pin(f(token, params, logger)))
}

/// 已注册的任务：名称、参数模式与任务体
#[derive(Clone)]
pub struct TaskDefinition {
    name: String,
    schema: TaskSchema,
    func: TaskFunc,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, schema: TaskSchema, func: TaskFunc) -> Self {
        Self {
            name: name.into(),
            schema,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TaskSchema {
        &self.schema
    }

    /// 调用任务体
    pub fn invoke(
        &self,
        token: CancellationToken,
        params: TaskParams,
        logger: RunLogger,
    ) -> TaskFuture {
        (self.func)(token, params, logger)
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// 任务注册表
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<TaskDefinition>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册任务并返回共享定义
    ///
    /// 同名重复注册会覆盖旧定义（确定性行为）；已持有旧定义句柄的
    /// 调用方不受影响。
    pub fn register(&self, definition: TaskDefinition) -> Arc<TaskDefinition> {
        let definition = Arc::new(definition);
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(definition.name().to_string(), definition.clone());
        definition
    }

    pub fn lookup(&self, name: &str) -> SchedulerResult<Arc<TaskDefinition>> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    /// 遍历所有已注册任务，顺序不保证
    pub fn for_each(&self, mut f: impl FnMut(&Arc<TaskDefinition>)) {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        for definition in tasks.values() {
            f(definition);
        }
    }

    pub fn task_names(&self) -> Vec<String> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.task_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_domain::TaskParamType;

    fn noop() -> TaskFunc {
        task_fn(|_token, _params, _logger| async { Ok(()) })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = TaskRegistry::new();
        registry.register(TaskDefinition::new("cleanup", TaskSchema::empty(), noop()));

        let found = registry.lookup("cleanup").unwrap();
        assert_eq!(found.name(), "cleanup");
        assert!(registry.lookup("other").is_err());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let registry = TaskRegistry::new();
        registry.register(TaskDefinition::new("job", TaskSchema::empty(), noop()));

        let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
        registry.register(TaskDefinition::new("job", schema, noop()));

        let found = registry.lookup("job").unwrap();
        assert_eq!(found.schema().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_for_each_visits_all() {
        let registry = TaskRegistry::new();
        registry.register(TaskDefinition::new("a", TaskSchema::empty(), noop()));
        registry.register(TaskDefinition::new("b", TaskSchema::empty(), noop()));

        let mut names = Vec::new();
        registry.for_each(|task| names.push(task.name().to_string()));
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
