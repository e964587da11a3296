use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use taskforge::{
    task_fn, Engine, SchedulerError, TaskExecution, TaskParamType, TaskParams, TaskRun,
    TaskRunRepository, TaskRunStatus, TaskSchema,
};
use taskforge_testing_utils::MockTaskRunRepository;

fn engine() -> (Arc<MockTaskRunRepository>, Engine) {
    let repo = Arc::new(MockTaskRunRepository::new());
    let engine = Engine::new(repo.clone());
    (repo, engine)
}

async fn wait_until_finished(repo: &MockTaskRunRepository, run_id: i64) -> TaskRun {
    for _ in 0..200 {
        if let Ok(run) = repo.get_task_run_by_id(run_id).await {
            if run.is_finished() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not reach a terminal state in time");
}

/// 基础场景：成功的运行经历两次保存并以 completed 结束
#[tokio::test]
async fn test_execute_now_happy_path() -> Result<()> {
    let (repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        }),
    )?;

    let run_id = task.execute_now(TaskParams::new().with("x", 3)).await?;
    assert!(run_id > 0);

    let run = wait_until_finished(&repo, run_id).await;
    assert_eq!(run.status, TaskRunStatus::Completed);
    assert!(run.end_time.unwrap() > run.start_time);
    assert_eq!(run.task_name, "task-a");
    assert_eq!(run.params.get_int("x")?, 3);
    // 启动保存 + 终止保存
    assert_eq!(repo.save_task_run_calls(), 2);
    Ok(())
}

/// 校验失败不产生任何运行记录
#[tokio::test]
async fn test_validation_failure_observes_no_save() -> Result<()> {
    let (repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let err = task
        .execute_now(TaskParams::new().with("y", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::MissingParam { .. } | SchedulerError::UnexpectedParam { .. }
    ));
    assert_eq!(repo.save_task_run_calls(), 0);
    assert!(engine.running_executions().is_empty());
    Ok(())
}

/// 任务体返回错误：终止状态 failed，且恰有一条包含错误信息的 error 日志
#[tokio::test]
async fn test_failing_body() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "boomer",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Err(anyhow::anyhow!("boom")) }),
    )?;

    let run_id = task.execute_now(TaskParams::new()).await?;
    let run = wait_until_finished(&repo, run_id).await;
    assert_eq!(run.status, TaskRunStatus::Failed);

    let logs = repo.get_task_run_logs(run_id).await?;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, taskforge::LogLevel::Error);
    assert!(logs[0].message.contains("boom"));
    Ok(())
}

/// 取消在途执行：状态 cancelled，结束时间被填充
#[tokio::test]
async fn test_cancellation() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "sleeper",
        TaskSchema::empty(),
        task_fn(|token, _params, logger| async move {
            logger.info("waiting for cancellation").await.ok();
            token.cancelled().await;
            Ok(())
        }),
    )?;

    let run_id = task.execute_now(TaskParams::new()).await?;
    assert_eq!(engine.running_executions(), vec![run_id]);

    engine.cancel_execution_by_id(run_id).await?;
    let run = wait_until_finished(&repo, run_id).await;
    assert_eq!(run.status, TaskRunStatus::Cancelled);
    assert!(run.end_time.is_some());
    Ok(())
}

/// 第二次取消返回 ExecutionNotFound
#[tokio::test]
async fn test_double_cancel() -> Result<()> {
    let (_repo, engine) = engine();
    let task = engine.register_task(
        "sleeper",
        TaskSchema::empty(),
        task_fn(|token, _params, _logger| async move {
            token.cancelled().await;
            Ok(())
        }),
    )?;

    let run_id = task.execute_now(TaskParams::new()).await?;
    engine.cancel_execution_by_id(run_id).await?;
    let err = engine.cancel_execution_by_id(run_id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::ExecutionNotFound { .. }));
    Ok(())
}

/// 启动记录保存失败：返回存储错误，不派发任务体
#[tokio::test]
async fn test_start_save_failure_returns_error() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "task-a",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    repo.fail_next_save_run();
    let err = task.execute_now(TaskParams::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Storage(_)));
    assert!(engine.running_executions().is_empty());
    assert!(repo.get_task_runs().await?.is_empty());
    Ok(())
}

/// 停机向所有在途执行发取消信号并落 cancelled，不等待任务体
#[tokio::test]
async fn test_shutdown_cancels_inflight_runs() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "sleeper",
        TaskSchema::empty(),
        task_fn(|token, _params, _logger| async move {
            token.cancelled().await;
            Ok(())
        }),
    )?;

    let first = task.execute_now(TaskParams::new()).await?;
    let second = task.execute_now(TaskParams::new()).await?;
    assert_eq!(engine.running_executions().len(), 2);

    engine.shutdown().await;
    assert!(engine.running_executions().is_empty());

    for run_id in [first, second] {
        let run = wait_until_finished(&repo, run_id).await;
        assert_eq!(run.status, TaskRunStatus::Cancelled);
        assert!(run.end_time.is_some());
    }
    Ok(())
}

/// 注册后查找返回同一任务；同名重复注册覆盖旧定义
#[tokio::test]
async fn test_registry_lookup_and_overwrite() -> Result<()> {
    let (_repo, engine) = engine();
    engine.register_task(
        "job",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    let found = engine.lookup_task("job")?;
    assert_eq!(found.name(), "job");
    assert!(found.schema().is_empty());

    engine.register_task(
        "job",
        TaskSchema::empty().with_field("x", TaskParamType::Int),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;
    let found = engine.lookup_task("job")?;
    assert_eq!(found.schema().len(), 1);

    assert!(matches!(
        engine.lookup_task("ghost").unwrap_err(),
        SchedulerError::TaskNotFound { .. }
    ));
    Ok(())
}

/// 运行中记录的时长视图为 "ongoing"，结束后为人类可读时长
#[tokio::test]
async fn test_execution_view_duration() -> Result<()> {
    let (repo, engine) = engine();
    let task = engine.register_task(
        "sleeper",
        TaskSchema::empty(),
        task_fn(|token, _params, _logger| async move {
            token.cancelled().await;
            Ok(())
        }),
    )?;

    let run_id = task.execute_now(TaskParams::new()).await?;
    let ongoing = TaskExecution::from_run(&repo.get_task_run_by_id(run_id).await?);
    assert_eq!(ongoing.duration, "ongoing");

    engine.cancel_execution_by_id(run_id).await?;
    let run = wait_until_finished(&repo, run_id).await;
    let finished = TaskExecution::from_run(&run);
    assert_ne!(finished.duration, "ongoing");
    Ok(())
}

/// 凭据存取供外层适配器使用
#[tokio::test]
async fn test_credential_stores() -> Result<()> {
    let (_repo, engine) = engine();

    engine.add_web_user("admin", "secret");
    engine.add_api_key("key-1", "ci pipeline");

    assert_eq!(engine.lookup_password("admin").as_deref(), Some("secret"));
    assert_eq!(engine.lookup_password("ghost"), None);
    assert_eq!(engine.lookup_api_key("key-1").as_deref(), Some("ci pipeline"));
    assert_eq!(engine.lookup_api_key("key-2"), None);
    Ok(())
}

/// 任务列表包含每个任务当前绑定的计划
#[tokio::test]
async fn test_tasks_listing() -> Result<()> {
    let (_repo, engine) = engine();
    let schema = TaskSchema::empty().with_field("x", TaskParamType::Int);
    let task = engine.register_task(
        "task-a",
        schema,
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;
    engine.register_task(
        "task-b",
        TaskSchema::empty(),
        task_fn(|_token, _params, _logger| async { Ok(()) }),
    )?;

    task.register_schedule(TaskParams::new().with("x", 1), "@every 1h")?;

    let mut tasks = engine.tasks();
    tasks.sort_by(|a, b| a.task_name.cmp(&b.task_name));
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].task_name, "task-a");
    assert_eq!(tasks[0].schedules.len(), 1);
    assert!(tasks[1].schedules.is_empty());
    Ok(())
}
