use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use taskforge::{
    intervals, task_fn, Engine, SchedulerError, TaskParamType, TaskParams, TaskRunRepository,
    TaskRunStatus, TaskSchema,
};
use taskforge_testing_utils::MockTaskRunRepository;

fn engine() -> (Arc<MockTaskRunRepository>, Engine) {
    let repo = Arc::new(MockTaskRunRepository::new());
    let engine = Engine::new(repo.clone());
    (repo, engine)
}

/// 计划触发：@every 1s 的计划在 2.5 秒内至少完成两次运行
#[tokio::test]
async fn test_schedule_fires_repeatedly() -> Result<()> {
    let (repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    task.register_schedule(TaskParams::new().with("x", 1), "@every 1s")?;
    engine.start();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    engine.shutdown().await;

    let runs = repo.get_task_runs().await?;
    let completed = runs
        .iter()
        .filter(|r| r.task_name == "task-a" && r.status == TaskRunStatus::Completed)
        .count();
    assert!(completed >= 2, "expected at least 2 completed runs, got {completed}");
    for run in &runs {
        assert_eq!(run.params.get_int("x")?, 1);
    }
    Ok(())
}

/// 删除计划后启动引擎：不产生任何运行
#[tokio::test]
async fn test_deleted_schedule_does_not_fire() -> Result<()> {
    let (repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let info = task.register_schedule(TaskParams::new().with("x", 1), "@every 1s")?;
    task.delete_schedule(info.entry_id)?;
    engine.start();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(repo.get_task_runs_count_for_task_name("task-a").await?, 0);
    assert!(task.schedules().is_empty());
    Ok(())
}

/// 启动之前注册的计划不触发
#[tokio::test]
async fn test_schedule_waits_for_engine_start() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "task-a",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    task.register_schedule(TaskParams::new(), "@every 500ms")?;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(repo.get_task_runs_count_for_task_name("task-a").await?, 0);
    Ok(())
}

/// 非法表达式注册失败，不安装条目
#[tokio::test]
async fn test_invalid_cron_expression() -> Result<()> {
    let (_repo, engine) = engine();
    let task = engine.register_task(
        "task-a",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let err = task
        .register_schedule(TaskParams::new(), "every minute or so")
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    assert!(task.schedules().is_empty());
    Ok(())
}

/// 计划注册前校验参数；校验失败不安装条目
#[tokio::test]
async fn test_schedule_params_validated() -> Result<()> {
    let (_repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let err = task
        .register_schedule(TaskParams::new().with("x", true), "@every 1m")
        .unwrap_err();
    assert!(matches!(err, SchedulerError::TypeMismatch { .. }));
    assert!(task.schedules().is_empty());
    Ok(())
}

/// 计划列表在读取时重算下次执行时间
#[tokio::test]
async fn test_list_schedules_next_execution() -> Result<()> {
    let (_repo, engine) = engine();
    let task = engine.register_task(
        "task-a",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let noon = task.register_schedule(TaskParams::new(), intervals::RUN_AT_NOON)?;
    let hourly = task.register_schedule(TaskParams::new(), intervals::RUN_EVERY_HOUR)?;

    let schedules = task.schedules();
    assert_eq!(schedules.len(), 2);
    let now = Utc::now().timestamp();
    for schedule in &schedules {
        assert!(schedule.next_execution_ts > now);
    }

    task.delete_schedule(noon.entry_id)?;
    let schedules = task.schedules();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].entry_id, hourly.entry_id);
    Ok(())
}

/// 长任务不推迟后续触发：同一计划的触发可以重叠
#[tokio::test]
async fn test_overlapping_firings_permitted() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "slow",
        TaskSchema::empty(),
        task_fn(|token, _params, _logger| async move {
            // 比触发间隔长得多的任务体，靠取消收尾
            token.cancelled().await;
            Ok(())
        }),
    )?;

    task.register_schedule(TaskParams::new(), "@every 300ms")?;
    engine.start();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let started = repo.get_task_runs_count_for_task_name("slow").await?;
    assert!(started >= 2, "expected overlapping runs, got {started}");

    engine.shutdown().await;
    Ok(())
}

/// 常量表达式可直接用于注册
#[tokio::test]
async fn test_interval_constants_register() -> Result<()> {
    let (_repo, engine) = engine();
    let task = engine.register_task(
        "task-a",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    for expr in [
        intervals::RUN_EVERY_MINUTE,
        intervals::RUN_EVERY_DAY,
        intervals::RUN_AT_MIDNIGHT,
        intervals::RUN_EVERY_SUNDAY_AT_MIDNIGHT,
    ] {
        task.register_schedule(TaskParams::new(), expr)?;
    }
    assert_eq!(task.schedules().len(), 4);
    Ok(())
}
