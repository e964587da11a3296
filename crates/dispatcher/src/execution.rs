//! 执行分发器
//!
//! 负责运行的完整生命周期：校验参数、持久化启动记录、在独立的并发
//! 上下文中驱动任务体、落终止状态。每次运行持有一个取消令牌，按运行
//! id 登记在在途表中。
//!
//! 状态机：`started` 之后，任务体正常返回则 `completed`，返回错误则
//! `failed`；取消路径触发令牌后由任务体自行退出，终止保存根据令牌
//! 状态写入 `cancelled`。忽略取消令牌的任务体会正常跑完，响应取消
//! 是任务作者的责任。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use taskforge_core::{RunLogger, TaskDefinition};
use taskforge_domain::{validate_params, TaskParams, TaskRun, TaskRunRepository, TaskRunStatus};
use taskforge_errors::{SchedulerError, SchedulerResult};

/// 在途执行表：运行 id -> 取消令牌
///
/// 运行进入终止状态或被取消后移除；不在表中的运行无法取消。
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    running: Mutex<HashMap<i64, CancellationToken>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, run_id: i64, token: CancellationToken) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.insert(run_id, token);
    }

    fn remove(&self, run_id: i64) -> Option<CancellationToken> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&run_id)
    }

    fn drain(&self) -> Vec<(i64, CancellationToken)> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.drain().collect()
    }

    pub fn contains(&self, run_id: i64) -> bool {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.contains_key(&run_id)
    }

    pub fn running_ids(&self) -> Vec<i64> {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.running.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 执行分发器
pub struct ExecutionDispatcher {
    repo: Arc<dyn TaskRunRepository>,
    tracker: Arc<ExecutionTracker>,
    mirror_run_logs: bool,
}

impl ExecutionDispatcher {
    pub fn new(repo: Arc<dyn TaskRunRepository>, mirror_run_logs: bool) -> Self {
        Self {
            repo,
            tracker: Arc::new(ExecutionTracker::new()),
            mirror_run_logs,
        }
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    /// 立即执行一次任务
    ///
    /// 参数校验失败或启动记录保存失败时直接返回错误，不会产生任何
    /// 并发执行。成功时在任务体开始执行前就返回分配的运行 id。
    pub async fn execute_now(
        &self,
        task: &TaskDefinition,
        mut params: TaskParams,
    ) -> SchedulerResult<i64> {
        validate_params(task.schema(), &mut params)?;

        let mut run = TaskRun::started(task.name().to_string(), params.clone());
        if let Err(e) = self.repo.save_task_run(&mut run).await {
            error!("无法记录任务 {} 的启动: {}", task.name(), e);
            return Err(e);
        }
        let run_id = run.id;

        let token = CancellationToken::new();
        self.tracker.insert(run_id, token.clone());

        let logger = RunLogger::with_mirror(run_id, self.repo.clone(), self.mirror_run_logs);
        let body = task.invoke(token.clone(), params, logger.clone());
        let repo = self.repo.clone();
        let tracker = self.tracker.clone();
        let task_name = task.name().to_string();

        tokio::spawn(async move {
            debug!("任务 {} 的运行 {} 开始执行", task_name, run_id);
            let result = body.await;

            if token.is_cancelled() {
                run.status = TaskRunStatus::Cancelled;
                info!("任务 {} 的运行 {} 已取消", task_name, run_id);
            } else {
                match result {
                    Ok(()) => run.status = TaskRunStatus::Completed,
                    Err(e) => {
                        run.status = TaskRunStatus::Failed;
                        let _ = logger.error(format!("Task failed due to: {e}")).await;
                    }
                }
            }
            run.end_time = Some(Utc::now());

            // 终止保存失败只记录，不向外传播：任务体已经结束
            if let Err(e) = repo.save_task_run(&mut run).await {
                let _ = logger
                    .error(format!("Unable to save task run due to: {e}"))
                    .await;
            }
            tracker.remove(run_id);
        });

        Ok(run_id)
    }

    /// 取消一次在途执行
    ///
    /// 触发取消令牌并立即落 `cancelled`；令牌随即从在途表移除，
    /// 重复取消返回 [`SchedulerError::ExecutionNotFound`]。
    pub async fn cancel_by_id(&self, run_id: i64) -> SchedulerResult<()> {
        let token = self
            .tracker
            .remove(run_id)
            .ok_or(SchedulerError::ExecutionNotFound { id: run_id })?;
        token.cancel();

        let mut run = self.repo.get_task_run_by_id(run_id).await?;
        run.status = TaskRunStatus::Cancelled;
        run.end_time = Some(Utc::now());
        self.repo.save_task_run(&mut run).await?;

        info!("已取消运行 {}", run_id);
        Ok(())
    }

    /// 取消全部在途执行（停机清扫）
    ///
    /// 尽力而为：逐个触发令牌并落 `cancelled`，失败只记录；
    /// 不等待任务体退出。
    pub async fn cancel_all(&self) {
        for (run_id, token) in self.tracker.drain() {
            token.cancel();
            match self.repo.get_task_run_by_id(run_id).await {
                Ok(mut run) => {
                    run.status = TaskRunStatus::Cancelled;
                    run.end_time = Some(Utc::now());
                    if let Err(e) = self.repo.save_task_run(&mut run).await {
                        error!("停机时无法落运行 {} 的取消状态: {}", run_id, e);
                    }
                }
                Err(e) => error!("停机时无法读取运行 {}: {}", run_id, e),
            }
        }
    }
}
