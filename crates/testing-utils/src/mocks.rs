//! Mock implementation of the storage port
//!
//! In-memory `TaskRunRepository` usable from unit and integration tests
//! without a real database. Supports injecting save failures and counting
//! `save_task_run` calls so lifecycle tests can assert how often the
//! dispatcher persisted a run.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use taskforge_domain::{LevelFilter, TaskRun, TaskRunLog, TaskRunRepository};
use taskforge_errors::{SchedulerError, SchedulerResult};

#[derive(Debug, Default)]
pub struct MockTaskRunRepository {
    runs: Mutex<Vec<TaskRun>>,
    logs: Mutex<Vec<TaskRunLog>>,
    next_run_id: AtomicI64,
    next_log_id: AtomicI64,
    save_run_calls: AtomicUsize,
    fail_next_save_run: AtomicBool,
    fail_next_save_log: AtomicBool,
    closed: AtomicBool,
}

impl MockTaskRunRepository {
    pub fn new() -> Self {
        Self {
            next_run_id: AtomicI64::new(1),
            next_log_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Make the next `save_task_run` fail with a storage error.
    pub fn fail_next_save_run(&self) {
        self.fail_next_save_run.store(true, Ordering::SeqCst);
    }

    /// Make the next `save_task_run_log` fail with a storage error.
    pub fn fail_next_save_log(&self) {
        self.fail_next_save_log.store(true, Ordering::SeqCst);
    }

    /// Number of `save_task_run` calls observed (including failed ones).
    pub fn save_task_run_calls(&self) -> usize {
        self.save_run_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_runs(&self) -> std::sync::MutexGuard<'_, Vec<TaskRun>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_logs(&self) -> std::sync::MutexGuard<'_, Vec<TaskRunLog>> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TaskRunRepository for MockTaskRunRepository {
    async fn save_task_run(&self, run: &mut TaskRun) -> SchedulerResult<()> {
        self.save_run_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_save_run.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::storage_error("injected save failure"));
        }

        let mut runs = self.lock_runs();
        if run.id == 0 {
            run.id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
            runs.push(run.clone());
        } else {
            let existing = runs
                .iter_mut()
                .find(|r| r.id == run.id)
                .ok_or(SchedulerError::RunNotFound { id: run.id })?;
            *existing = run.clone();
        }
        Ok(())
    }

    async fn get_task_run_by_id(&self, id: i64) -> SchedulerResult<TaskRun> {
        let runs = self.lock_runs();
        runs.iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(SchedulerError::RunNotFound { id })
    }

    async fn get_task_runs(&self) -> SchedulerResult<Vec<TaskRun>> {
        let mut runs = self.lock_runs().clone();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(runs)
    }

    async fn get_paginated_task_runs_for_task_name(
        &self,
        name: &str,
        page: usize,
        size: usize,
    ) -> SchedulerResult<Vec<TaskRun>> {
        let page = page.max(1);
        let mut runs: Vec<TaskRun> = self
            .lock_runs()
            .iter()
            .filter(|r| r.task_name == name)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(runs.into_iter().skip((page - 1) * size).take(size).collect())
    }

    async fn get_task_runs_count_for_task_name(&self, name: &str) -> SchedulerResult<usize> {
        Ok(self
            .lock_runs()
            .iter()
            .filter(|r| r.task_name == name)
            .count())
    }

    async fn save_task_run_log(&self, entry: &mut TaskRunLog) -> SchedulerResult<()> {
        if self.fail_next_save_log.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::storage_error("injected log save failure"));
        }
        entry.id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        self.lock_logs().push(entry.clone());
        Ok(())
    }

    async fn get_task_run_logs(&self, task_run_id: i64) -> SchedulerResult<Vec<TaskRunLog>> {
        Ok(self
            .lock_logs()
            .iter()
            .filter(|l| l.task_run_id == task_run_id)
            .cloned()
            .collect())
    }

    async fn get_paginated_task_run_logs(
        &self,
        task_run_id: i64,
        level: LevelFilter,
        page: usize,
        size: usize,
    ) -> SchedulerResult<(Vec<TaskRunLog>, usize)> {
        let page = page.max(1);
        let filtered: Vec<TaskRunLog> = self
            .lock_logs()
            .iter()
            .filter(|l| l.task_run_id == task_run_id && level.matches(l.level))
            .cloned()
            .collect();
        let total = filtered.len();
        let rows = filtered
            .into_iter()
            .skip((page - 1) * size)
            .take(size)
            .collect();
        Ok((rows, total))
    }

    async fn close(&self) -> SchedulerResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
