// src/polling/state.rs

use std::time::Duration;
use tokio::time::Instant;

/// 轮询调度的全部可变状态，由 `Monitor` 独占持有
#[derive(Debug, Default)]
pub struct PollingState {
    /// 暂停时既不抓取也不重新计时，需要外部调用 `resume`
    pub paused: bool,
    /// 最近一次观察到 "有任务运行 → 无任务运行" 的时间
    pub last_completion: Option<Instant>,
    pub had_running: bool,
    /// `start()` 之后的第一次抓取，从不使用长轮询
    pub initial_pending: bool,
}

impl PollingState {
    pub fn is_recently_completed(&self, now: Instant, window: Duration) -> bool {
        self.last_completion
            .is_some_and(|t| now.saturating_duration_since(t) < window)
    }

    /// 记录本轮的运行状态。命中 "运行 → 空闲 (列表非空)" 的边沿时更新完成时间并返回 true。
    pub fn observe_running(&mut self, running: usize, total: usize, now: Instant) -> bool {
        let has_running = running > 0;
        let edge = self.had_running && !has_running && total > 0;
        if edge {
            self.last_completion = Some(now);
        }
        self.had_running = has_running;
        edge
    }

    /// 提交新任务后调用，让接下来的轮询保持短间隔
    pub fn mark_submitted(&mut self, now: Instant) {
        self.last_completion = Some(now);
        self.had_running = true;
    }
}

/// 唯一的轮询定时器。重新设定会覆盖旧的截止时间，因此不会出现两个待触发的回调。
#[derive(Debug, Default)]
pub struct PollTimer {
    deadline: Option<Instant>,
}

impl PollTimer {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// 到期则清除并返回 true
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_edge_requires_non_empty_list() {
        let now = Instant::now();
        let mut state = PollingState::default();

        assert!(!state.observe_running(1, 3, now));
        assert!(state.had_running);
        // 运行中的任务消失且列表为空: 不算完成
        assert!(!state.observe_running(0, 0, now));
        assert!(state.last_completion.is_none());

        state.observe_running(2, 2, now);
        assert!(state.observe_running(0, 2, now));
        assert_eq!(state.last_completion, Some(now));
        assert!(!state.had_running);
    }

    #[test]
    fn test_recently_completed_window() {
        let start = Instant::now();
        let mut state = PollingState::default();
        let window = Duration::from_millis(10_000);
        assert!(!state.is_recently_completed(start, window));

        state.mark_submitted(start);
        assert!(state.had_running);
        assert!(state.is_recently_completed(start + Duration::from_millis(9_999), window));
        assert!(!state.is_recently_completed(start + Duration::from_millis(10_000), window));
    }

    #[test]
    fn test_timer_rearm_replaces_deadline() {
        let now = Instant::now();
        let mut timer = PollTimer::default();
        timer.arm(now, Duration::from_secs(5));
        timer.arm(now, Duration::from_secs(1));
        assert_eq!(timer.deadline(), Some(now + Duration::from_secs(1)));

        assert!(!timer.fire_if_due(now));
        assert!(timer.fire_if_due(now + Duration::from_secs(1)));
        assert!(!timer.is_armed());
        assert!(!timer.fire_if_due(now + Duration::from_secs(2)));
    }
}
