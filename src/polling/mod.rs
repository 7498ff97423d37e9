// src/polling/mod.rs

pub mod fetcher;
pub mod state;

use self::fetcher::TaskFetcher;
use crate::{config::PollingConfig, error::AppResult, models::Task};
use log::debug;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Short,
    LongPoll,
}

/// 一轮抓取的结果。任务列表要等整轮结束才交给调用方，中途不修改任何共享状态。
#[derive(Debug)]
pub struct CycleOutcome {
    pub mode: FetchMode,
    pub result: AppResult<Vec<Task>>,
}

impl CycleOutcome {
    pub fn task_count(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }
}

/// 短轮询拿到空列表之后是否需要改用长轮询
pub fn should_long_poll(short_count: usize, recently_completed: bool, initial: bool) -> bool {
    short_count == 0 && !recently_completed && !initial
}

/// 根据本轮结果决定下一次轮询的延迟
pub fn next_delay(
    failed: bool,
    mode: FetchMode,
    task_count: usize,
    recently_completed: bool,
    config: &PollingConfig,
) -> Duration {
    let ms = if failed {
        config.error_retry_ms
    } else {
        match mode {
            FetchMode::LongPoll if task_count > 0 => config.long_poll_hit_ms,
            FetchMode::LongPoll => config.long_poll_empty_ms,
            FetchMode::Short if task_count > 0 => config.base_interval_ms,
            FetchMode::Short if recently_completed => config.base_interval_ms,
            FetchMode::Short => config.idle_interval_ms,
        }
    };
    Duration::from_millis(ms)
}

/// 执行一轮抓取: 先短轮询，必要时再长轮询。
///
/// "刚完成" 在短轮询返回之后才判定，所以这里拿到的是完成时间而不是判定结果。
pub async fn run_cycle(
    fetcher: Arc<dyn TaskFetcher>,
    initial: bool,
    last_completion: Option<Instant>,
    window: Duration,
) -> CycleOutcome {
    let quick = match fetcher.fetch_short().await {
        Ok(tasks) => tasks,
        Err(e) => {
            return CycleOutcome {
                mode: FetchMode::Short,
                result: Err(e),
            };
        }
    };

    let recently_completed = last_completion
        .is_some_and(|t| Instant::now().saturating_duration_since(t) < window);
    if !should_long_poll(quick.len(), recently_completed, initial) {
        return CycleOutcome {
            mode: FetchMode::Short,
            result: Ok(quick),
        };
    }

    debug!("任务队列为空且不在完成窗口内，切换为长轮询");
    // 客户端超时同样按失败处理，由调用方走错误重试间隔
    CycleOutcome {
        mode: FetchMode::LongPoll,
        result: fetcher.fetch_long_poll().await,
    }
}
