//! 引擎门面
//!
//! 持有任务注册表、计划管理器、执行分发器与凭据存储，对宿主暴露
//! 生命周期（start/shutdown）、按 id 取消与自省接口。

use std::sync::{Arc, Weak};

use tracing::info;
use uuid::Uuid;

use taskforge_core::{CredentialStore, EngineConfig, TaskDefinition, TaskFunc, TaskRegistry};
use taskforge_dispatcher::{ExecutionDispatcher, ScheduleInfo, ScheduleManager};
use taskforge_domain::{TaskParams, TaskRunRepository, TaskSchema};
use taskforge_errors::{SchedulerError, SchedulerResult};

use crate::views::TaskInfo;

pub(crate) struct EngineInner {
    repo: Arc<dyn TaskRunRepository>,
    config: EngineConfig,
    registry: TaskRegistry,
    credentials: CredentialStore,
    dispatcher: Arc<ExecutionDispatcher>,
    schedules: ScheduleManager,
}

/// 调度引擎
///
/// 构造后不会自动触发计划，需显式调用 [`Engine::start`]。克隆共享
/// 同一个引擎实例。
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// 用嵌入式默认配置构造引擎
    pub fn new(repo: Arc<dyn TaskRunRepository>) -> Self {
        Self::with_config(repo, EngineConfig::embedded_default())
    }

    pub fn with_config(repo: Arc<dyn TaskRunRepository>, config: EngineConfig) -> Self {
        let dispatcher = Arc::new(ExecutionDispatcher::new(
            repo.clone(),
            config.mirror_run_logs,
        ));
        let schedules = ScheduleManager::new(dispatcher.clone());
        Self {
            inner: Arc::new(EngineInner {
                repo,
                config,
                registry: TaskRegistry::new(),
                credentials: CredentialStore::new(),
                dispatcher,
                schedules,
            }),
        }
    }

    /// 注册任务
    ///
    /// 同名重复注册会覆盖旧定义。返回的句柄用于立即执行与计划操作。
    pub fn register_task(
        &self,
        name: impl Into<String>,
        schema: TaskSchema,
        func: TaskFunc,
    ) -> SchedulerResult<TaskHandle> {
        let definition = self
            .inner
            .registry
            .register(TaskDefinition::new(name, schema, func));
        info!("已注册任务 {}", definition.name());
        Ok(TaskHandle {
            task: definition,
            engine: Arc::downgrade(&self.inner),
        })
    }

    /// 按名称查找已注册任务
    pub fn lookup_task(&self, name: &str) -> SchedulerResult<TaskHandle> {
        let definition = self.inner.registry.lookup(name)?;
        Ok(TaskHandle {
            task: definition,
            engine: Arc::downgrade(&self.inner),
        })
    }

    /// 列出全部任务及其计划
    pub fn tasks(&self) -> Vec<TaskInfo> {
        let mut tasks = Vec::new();
        self.inner.registry.for_each(|definition| {
            tasks.push(TaskInfo {
                task_name: definition.name().to_string(),
                schedules: self.inner.schedules.list_schedules(definition.name()),
            });
        });
        tasks
    }

    /// 启动计划触发；此前注册的计划从这里开始生效
    pub fn start(&self) {
        self.inner.schedules.start();
        info!("任务调度引擎已启动");
    }

    /// 停机
    ///
    /// 停止计划触发，向全部在途执行发取消信号并尽力落 `cancelled`。
    /// 不等待任务体退出；需要静默的宿主自行编排等待。
    pub async fn shutdown(&self) {
        info!("任务调度引擎停机中");
        self.inner.schedules.shutdown();
        self.inner.dispatcher.cancel_all().await;
    }

    /// 按运行 id 取消在途执行
    pub async fn cancel_execution_by_id(&self, run_id: i64) -> SchedulerResult<()> {
        self.inner.dispatcher.cancel_by_id(run_id).await
    }

    /// 当前在途的运行 id 列表
    pub fn running_executions(&self) -> Vec<i64> {
        self.inner.dispatcher.tracker().running_ids()
    }

    pub fn is_started(&self) -> bool {
        self.inner.schedules.is_started()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// 存储端口，供外层适配器直接查询运行记录与日志
    pub fn repository(&self) -> Arc<dyn TaskRunRepository> {
        self.inner.repo.clone()
    }

    // 凭据存取，供外层Web/API适配器使用

    pub fn add_web_user(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner.credentials.add_web_user(username, password);
    }

    pub fn add_api_key(&self, key: impl Into<String>, description: impl Into<String>) {
        self.inner.credentials.add_api_key(key, description);
    }

    pub fn lookup_password(&self, username: &str) -> Option<String> {
        self.inner.credentials.lookup_password(username)
    }

    pub fn lookup_api_key(&self, key: &str) -> Option<String> {
        self.inner.credentials.lookup_api_key(key)
    }
}

/// 任务句柄
///
/// 持有任务定义与指向引擎的弱引用（关系而非所有权）；引擎被释放后
/// 句柄上的操作返回错误。
#[derive(Clone, Debug)]
pub struct TaskHandle {
    task: Arc<TaskDefinition>,
    engine: Weak<EngineInner>,
}

impl TaskHandle {
    fn engine(&self) -> SchedulerResult<Arc<EngineInner>> {
        self.engine
            .upgrade()
            .ok_or_else(|| SchedulerError::Internal("引擎已被释放".to_string()))
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn schema(&self) -> &TaskSchema {
        self.task.schema()
    }

    /// 立即执行一次，任务体开始前即返回运行 id
    pub async fn execute_now(&self, params: TaskParams) -> SchedulerResult<i64> {
        let engine = self.engine()?;
        engine.dispatcher.execute_now(&self.task, params).await
    }

    /// 绑定CRON计划
    pub fn register_schedule(
        &self,
        params: TaskParams,
        schedule: &str,
    ) -> SchedulerResult<ScheduleInfo> {
        let engine = self.engine()?;
        engine
            .schedules
            .register_schedule(self.task.clone(), params, schedule)
    }

    /// 删除计划，幂等
    pub fn delete_schedule(&self, entry_id: Uuid) -> SchedulerResult<()> {
        let engine = self.engine()?;
        engine.schedules.delete_schedule(self.task.name(), entry_id);
        Ok(())
    }

    /// 当前绑定的计划列表
    pub fn schedules(&self) -> Vec<ScheduleInfo> {
        match self.engine() {
            Ok(engine) => engine.schedules.list_schedules(self.task.name()),
            Err(_) => Vec::new(),
        }
    }
}
