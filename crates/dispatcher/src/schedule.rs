//! 计划管理器
//!
//! 把（任务、参数快照、CRON表达式）绑定为重复触发器。每个计划条目对应
//! 一个后台tokio任务，按 [`CronScheduler`] 计算的下次执行时间休眠，到点
//! 调用执行分发器。条目只存在于进程内，不跨重启持久化。
//!
//! 触发之间不做串行化：上一次运行未结束不会推迟下一次触发。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cron_utils::CronScheduler;
use crate::execution::ExecutionDispatcher;
use taskforge_core::TaskDefinition;
use taskforge_domain::{validate_params, TaskParams};
use taskforge_errors::SchedulerResult;

/// 对外暴露的计划条目视图
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub entry_id: Uuid,
    pub schedule: String,
    pub params: TaskParams,
    /// 下次执行时间（UTC Unix 秒），无法计算时为 0
    pub next_execution_ts: i64,
}

struct ScheduleEntry {
    id: Uuid,
    schedule: String,
    params: TaskParams,
    scheduler: CronScheduler,
    next_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    cancel: CancellationToken,
}

impl ScheduleEntry {
    fn info(&self) -> ScheduleInfo {
        // 固定表达式按当前时间重算；@every 间隔读取运行器维护的时钟
        let next = if self.scheduler.is_interval() {
            *self.next_at.read().unwrap_or_else(|e| e.into_inner())
        } else {
            self.scheduler.next_execution_time(Utc::now())
        };
        ScheduleInfo {
            entry_id: self.id,
            schedule: self.schedule.clone(),
            params: self.params.clone(),
            next_execution_ts: next.map(|t| t.timestamp()).unwrap_or(0),
        }
    }
}

/// 计划管理器
///
/// 条目按任务名分组；注册与查询互不阻塞。启动信号翻转前注册的计划
/// 不会触发。
pub struct ScheduleManager {
    entries: RwLock<HashMap<String, Vec<ScheduleEntry>>>,
    started_tx: watch::Sender<bool>,
    dispatcher: Arc<ExecutionDispatcher>,
}

impl ScheduleManager {
    pub fn new(dispatcher: Arc<ExecutionDispatcher>) -> Self {
        let (started_tx, _) = watch::channel(false);
        Self {
            entries: RwLock::new(HashMap::new()),
            started_tx,
            dispatcher,
        }
    }

    /// 计划是否在触发中
    pub fn is_started(&self) -> bool {
        *self.started_tx.borrow()
    }

    /// 开始触发已注册的计划
    pub fn start(&self) {
        let _ = self.started_tx.send(true);
        info!("计划触发已启动");
    }

    /// 停止触发并结束全部计划运行器
    pub fn shutdown(&self) {
        let _ = self.started_tx.send(false);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        for list in entries.values() {
            for entry in list {
                entry.cancel.cancel();
            }
        }
        info!("计划触发已停止");
    }

    /// 注册一个重复触发的计划
    ///
    /// 先按任务模式校验参数，再解析表达式；两者任一失败都不会安装
    /// 条目。返回包含下次执行时间的条目视图。
    pub fn register_schedule(
        &self,
        task: Arc<TaskDefinition>,
        mut params: TaskParams,
        expr: &str,
    ) -> SchedulerResult<ScheduleInfo> {
        validate_params(task.schema(), &mut params)?;
        let scheduler = CronScheduler::new(expr)?;

        let entry_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let next_at = Arc::new(RwLock::new(scheduler.next_execution_time(Utc::now())));

        let entry = ScheduleEntry {
            id: entry_id,
            schedule: expr.to_string(),
            params: params.clone(),
            scheduler: scheduler.clone(),
            next_at: next_at.clone(),
            cancel: cancel.clone(),
        };
        let info = entry.info();

        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries
                .entry(task.name().to_string())
                .or_default()
                .push(entry);
        }

        self.spawn_runner(task.clone(), params, scheduler, next_at, cancel);
        info!("已为任务 {} 注册计划 {} ({})", task.name(), entry_id, expr);
        Ok(info)
    }

    /// 删除计划，幂等：不存在的条目直接返回
    pub fn delete_schedule(&self, task_name: &str, entry_id: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = entries.get_mut(task_name) {
            list.retain(|entry| {
                if entry.id == entry_id {
                    entry.cancel.cancel();
                    info!("已删除任务 {} 的计划 {}", task_name, entry_id);
                    false
                } else {
                    true
                }
            });
        }
    }

    /// 列出某任务的全部计划，下次执行时间在调用时重算
    pub fn list_schedules(&self, task_name: &str) -> Vec<ScheduleInfo> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(task_name)
            .map(|list| list.iter().map(ScheduleEntry::info).collect())
            .unwrap_or_default()
    }

    fn spawn_runner(
        &self,
        task: Arc<TaskDefinition>,
        params: TaskParams,
        scheduler: CronScheduler,
        next_at: Arc<RwLock<Option<DateTime<Utc>>>>,
        cancel: CancellationToken,
    ) {
        let dispatcher = self.dispatcher.clone();
        let mut started = self.started_tx.subscribe();

        tokio::spawn(async move {
            loop {
                // 引擎未启动时挂起，删除条目可随时退出
                if !*started.borrow() {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = started.wait_for(|s| *s) => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                }

                let now = Utc::now();
                let Some(next) = scheduler.next_execution_time(now) else {
                    warn!(
                        "任务 {} 的计划 {} 没有后续执行时间，运行器退出",
                        task.name(),
                        scheduler.expression()
                    );
                    return;
                };
                {
                    let mut slot = next_at.write().unwrap_or_else(|e| e.into_inner());
                    *slot = Some(next);
                }

                let delay = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if !*started.borrow() {
                    // 休眠期间引擎停止，回到挂起状态
                    continue;
                }

                if let Err(e) = dispatcher.execute_now(task.as_ref(), params.clone()).await {
                    error!("定时触发任务 {} 失败: {}", task.name(), e);
                }
            }
        });
    }
}
