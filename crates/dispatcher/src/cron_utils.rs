use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use taskforge_errors::{SchedulerError, SchedulerResult};

/// 解析后的调度规格
#[derive(Debug, Clone)]
enum CronSpec {
    /// 固定CRON表达式
    Cron(Schedule),
    /// `@every <间隔>` 形式的固定间隔
    Every(StdDuration),
}

/// CRON表达式解析和调度工具
///
/// 接受五字段标准CRON表达式（内部补齐为 `cron` crate 的带秒格式），
/// 以及 `@every <时长>` 间隔写法（`30s`、`1m`、`2h`、`168h` 等）。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expr: String,
    spec: CronSpec,
}

impl CronScheduler {
    /// 解析调度表达式
    pub fn new(expr: &str) -> SchedulerResult<Self> {
        let trimmed = expr.trim();

        if let Some(rest) = trimmed.strip_prefix("@every") {
            let duration = humantime::parse_duration(rest.trim()).map_err(|e| {
                SchedulerError::InvalidCron {
                    expr: expr.to_string(),
                    message: e.to_string(),
                }
            })?;
            if duration.is_zero() {
                return Err(SchedulerError::InvalidCron {
                    expr: expr.to_string(),
                    message: "间隔必须大于零".to_string(),
                });
            }
            return Ok(Self {
                expr: expr.to_string(),
                spec: CronSpec::Every(duration),
            });
        }

        let schedule = Schedule::from_str(trimmed)
            .or_else(|_| {
                // cron crate 需要带秒（可带年）的字段格式，五字段表达式
                // 补上秒位与年位
                Schedule::from_str(&format!("0 {trimmed} *"))
            })
            .map_err(|e| SchedulerError::InvalidCron {
                expr: expr.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            expr: expr.to_string(),
            spec: CronSpec::Cron(schedule),
        })
    }

    /// 校验表达式是否有效
    pub fn validate_expression(expr: &str) -> SchedulerResult<()> {
        Self::new(expr).map(|_| ())
    }

    /// 原始表达式
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// 是否为 `@every` 间隔调度
    pub fn is_interval(&self) -> bool {
        matches!(self.spec, CronSpec::Every(_))
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.spec {
            CronSpec::Cron(schedule) => schedule.after(&from).next(),
            CronSpec::Every(interval) => {
                let interval = Duration::from_std(*interval).ok()?;
                from.checked_add_signed(interval)
            }
        }
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        match &self.spec {
            CronSpec::Cron(schedule) => schedule.after(&from).take(count).collect(),
            CronSpec::Every(_) => {
                let mut times = Vec::with_capacity(count);
                let mut cursor = from;
                for _ in 0..count {
                    match self.next_execution_time(cursor) {
                        Some(next) => {
                            times.push(next);
                            cursor = next;
                        }
                        None => break,
                    }
                }
                times
            }
        }
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }
}
