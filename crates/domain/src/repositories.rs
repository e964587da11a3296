//! 存储端口
//!
//! 引擎消费的数据访问抽象，遵循依赖倒置原则；具体适配器在核心之外
//! 实现。所有操作都必须可并发调用，核心不做串行化。

use async_trait::async_trait;

use crate::entities::{LevelFilter, TaskRun, TaskRunLog};
use taskforge_errors::SchedulerResult;

/// 任务运行与运行日志的存储端口
#[async_trait]
pub trait TaskRunRepository: Send + Sync {
    /// 保存运行记录：id 为 0 时插入并把分配的 id 回写到 `run`，否则按 id 更新
    async fn save_task_run(&self, run: &mut TaskRun) -> SchedulerResult<()>;

    /// 按 id 查询，未找到返回 [`taskforge_errors::SchedulerError::RunNotFound`]
    async fn get_task_run_by_id(&self, id: i64) -> SchedulerResult<TaskRun>;

    /// 全部运行记录，按启动时间倒序
    async fn get_task_runs(&self) -> SchedulerResult<Vec<TaskRun>>;

    /// 指定任务的分页运行记录，页码从 1 开始，最新在前
    async fn get_paginated_task_runs_for_task_name(
        &self,
        name: &str,
        page: usize,
        size: usize,
    ) -> SchedulerResult<Vec<TaskRun>>;

    async fn get_task_runs_count_for_task_name(&self, name: &str) -> SchedulerResult<usize>;

    /// 追加一条运行日志并回写分配的 id
    async fn save_task_run_log(&self, entry: &mut TaskRunLog) -> SchedulerResult<()>;

    /// 某次运行的全部日志，按写入顺序
    async fn get_task_run_logs(&self, task_run_id: i64) -> SchedulerResult<Vec<TaskRunLog>>;

    /// 某次运行的分页日志，带级别过滤；返回 (当前页, 过滤后总条数)
    async fn get_paginated_task_run_logs(
        &self,
        task_run_id: i64,
        level: LevelFilter,
        page: usize,
        size: usize,
    ) -> SchedulerResult<(Vec<TaskRunLog>, usize)>;

    async fn close(&self) -> SchedulerResult<()>;
}
