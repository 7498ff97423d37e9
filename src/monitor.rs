// src/monitor.rs

//! 监视器: 把轮询、合并、队列渲染和详情渲染串在一个事件循环里。
//!
//! 所有处理函数都是同步的，只有 `run` 的 `select!` 在等待；因此一次抓取结果从合并到
//! 界面更新之间不会插入任何其他事件。

use crate::{
    artwork::{ArtworkImage, ArtworkLoader},
    config::{AppConfig, PollingConfig},
    error::{AppError, AppResult},
    polling::{self, CycleOutcome, fetcher::TaskFetcher, state::PollTimer},
    reconcile::{self, AggregateStatus, DetailAction},
    state::AppState,
    url_params::{self, MonitorParams, ParamBackupStore, ParamCheck},
    view::{
        DetailSurface, QueueView,
        detail::{self, MISSING_TASK_TEXT, ProgressiveRenderer, RenderMode},
        queue::{self, ArtworkRequest},
    },
};
use chrono::Utc;
use futures::{StreamExt, stream::FuturesUnordered};
use log::{debug, info, trace, warn};
use std::{
    collections::{HashSet, VecDeque},
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tokio::{sync::mpsc, time::Instant};

type FetchFuture = Pin<Box<dyn Future<Output = CycleOutcome> + Send>>;
type ArtworkFuture = Pin<Box<dyn Future<Output = (ArtworkRequest, AppResult<ArtworkImage>)> + Send>>;

/// 用户或后台任务发给监视器的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Open(String),
    /// 按队列中的位置打开，从 1 开始
    OpenIndex(usize),
    OpenMostRelevant,
    Close,
    Pause,
    Resume,
    ClearArtworkCache,
    Session { logged_in: bool },
    /// 新任务提交成功
    Submitted,
    /// 进程即将退出
    Unload,
    Quit,
}

impl UiEvent {
    /// 解析交互命令: `open <n|id>` `close` `pause` `resume` `clear-cache` `quit`
    pub fn parse(line: &str) -> AppResult<Self> {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();
        let event = match (cmd.as_str(), arg) {
            ("open" | "o", Some(target)) => match target.parse::<usize>() {
                Ok(n) => UiEvent::OpenIndex(n),
                Err(_) => UiEvent::Open(target.to_string()),
            },
            ("open" | "o", None) => UiEvent::OpenMostRelevant,
            ("close" | "c", _) => UiEvent::Close,
            ("pause" | "p", _) => UiEvent::Pause,
            ("resume" | "r", _) => UiEvent::Resume,
            ("clear-cache", _) => UiEvent::ClearArtworkCache,
            ("quit" | "q" | "exit", _) => UiEvent::Quit,
            _ => {
                return Err(AppError::UserInputError(format!(
                    "未知命令: '{}'。可用命令: open <序号|uuid>, close, pause, resume, clear-cache, submit <链接...>, quit",
                    line.trim()
                )));
            }
        };
        Ok(event)
    }
}

/// 每轮事件循环结束后调用，用来把视图内容输出到终端
pub trait Presenter<Q, D> {
    fn present(&mut self, monitor: &Monitor<Q, D>);
}

// 下一帧执行的详情刷新
#[derive(Debug, Clone)]
struct Frame {
    task_id: String,
    generation: u64,
}

pub struct Monitor<Q, D> {
    state: AppState,
    polling: PollingConfig,
    renderer: ProgressiveRenderer,
    queue: Q,
    detail: D,
    fetcher: Arc<dyn TaskFetcher>,
    loader: Arc<dyn ArtworkLoader>,
    timer: PollTimer,
    in_flight: Option<FetchFuture>,
    frames: VecDeque<Frame>,
    artwork_loads: FuturesUnordered<ArtworkFuture>,
    loading_urls: HashSet<String>,
    status: AggregateStatus,
    backups: Option<ParamBackupStore>,
    auto_open_pending: bool,
}

impl<Q: QueueView, D: DetailSurface> Monitor<Q, D> {
    pub fn new(
        config: &AppConfig,
        queue: Q,
        detail: D,
        fetcher: Arc<dyn TaskFetcher>,
        loader: Arc<dyn ArtworkLoader>,
    ) -> Self {
        Self {
            state: AppState::default(),
            polling: config.polling,
            renderer: ProgressiveRenderer::new(config.render, config.narrow_layout),
            queue,
            detail,
            fetcher,
            loader,
            timer: PollTimer::default(),
            in_flight: None,
            frames: VecDeque::new(),
            artwork_loads: FuturesUnordered::new(),
            loading_urls: HashSet::new(),
            status: AggregateStatus::Ready { clickable: false },
            backups: config.data_dir.as_ref().map(ParamBackupStore::new),
            auto_open_pending: false,
        }
    }

    /// 设置启动参数。没有给出参数时尝试恢复上次被保护下来的备份。
    pub fn with_params(mut self, params: MonitorParams) -> Self {
        let params = if params.is_empty() {
            self.restore_backup().unwrap_or(params)
        } else {
            params
        };
        self.auto_open_pending = params.should_auto_open();
        self.state.params = params;
        self
    }

    fn restore_backup(&self) -> Option<MonitorParams> {
        let store = self.backups.as_ref()?;
        match store.take_fresh(Utc::now().timestamp_millis()) {
            Ok(Some(backup)) => {
                info!("从备份恢复监视参数: {:?}", backup);
                Some(backup.into_params()).filter(|p| !p.is_empty())
            }
            Ok(None) => None,
            Err(e) => {
                warn!("读取监视参数备份失败: {}", e);
                None
            }
        }
    }

    // --- 访问器 ---

    pub fn status(&self) -> &AggregateStatus {
        &self.status
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn detail(&self) -> &D {
        &self.detail
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.polling.paused
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn next_poll_at(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.state.logged_in = logged_in;
    }

    // --- 轮询 ---

    /// 取消定时器和进行中的抓取，立即开始新一轮 (首轮不使用长轮询)
    pub fn start(&mut self) {
        self.timer.cancel();
        if self.in_flight.take().is_some() {
            debug!("丢弃进行中的抓取，重新开始轮询");
        }
        self.state.polling.initial_pending = true;
        self.begin_fetch();
    }

    /// 定时器到期时调用。暂停状态下不抓取也不重新计时。
    pub fn tick(&mut self) {
        if self.state.polling.paused {
            debug!("轮询已暂停，不再计时");
            return;
        }
        if self.in_flight.is_some() {
            return;
        }
        self.begin_fetch();
    }

    pub fn pause(&mut self) {
        if !self.state.polling.paused {
            info!("轮询已暂停");
        }
        self.state.polling.paused = true;
        self.timer.cancel();
    }

    pub fn resume(&mut self) {
        if !self.state.polling.paused {
            return;
        }
        info!("轮询已恢复");
        self.state.polling.paused = false;
        if self.in_flight.is_none() {
            self.start();
        }
    }

    fn begin_fetch(&mut self) {
        self.timer.cancel();
        let initial = std::mem::take(&mut self.state.polling.initial_pending);
        let fut = polling::run_cycle(
            Arc::clone(&self.fetcher),
            initial,
            self.state.polling.last_completion,
            self.polling.recent_completion_window(),
        );
        self.in_flight = Some(Box::pin(fut));
    }

    fn on_cycle_complete(&mut self, outcome: CycleOutcome, now: Instant) {
        self.in_flight = None;
        let failed = outcome.result.is_err();
        let count = outcome.task_count();
        let mode = outcome.mode;

        match outcome.result {
            Ok(tasks) => self.apply_tasks(tasks, now),
            Err(e) => {
                warn!("轮询失败: {}", e);
                self.status = AggregateStatus::Error(e.to_string());
            }
        }

        let recently = self
            .state
            .polling
            .is_recently_completed(now, self.polling.recent_completion_window());
        let delay = polling::next_delay(failed, mode, count, recently, &self.polling);
        if self.state.polling.paused {
            debug!("轮询已暂停，本轮结束后不再计时");
            return;
        }
        trace!("{:?} 抓取到 {} 个任务，{:?} 后再次轮询", mode, count, delay);
        self.timer.arm(now, delay);
    }

    fn apply_tasks(&mut self, tasks: Vec<crate::models::Task>, now: Instant) {
        let result = reconcile::reconcile(&mut self.state, tasks, now);
        self.status = result.status;
        if result.params == ParamCheck::Guarded {
            self.backup_params("poll");
        }
        match result.detail {
            DetailAction::Refresh {
                task_id,
                generation,
            } => self.frames.push_back(Frame {
                task_id,
                generation,
            }),
            DetailAction::FocusLost { .. } | DetailAction::Idle => {}
        }

        let requests = queue::render_queue(
            &mut self.queue,
            self.state.store.tasks(),
            &self.state.owners,
            &mut self.state.artwork,
        );
        for req in requests {
            self.request_artwork(req);
        }

        if std::mem::take(&mut self.auto_open_pending) {
            self.auto_open(now);
        }
    }

    // 首次拿到任务列表后按启动参数打开详情。uuid 已不存在时参数在合并阶段已被清除。
    fn auto_open(&mut self, now: Instant) {
        match self.state.params.uuid().map(str::to_string) {
            Some(id) if self.state.store.contains(&id) => {
                info!("自动打开任务 {} 的详情", id);
                self.open_detail_at(Some(id), now);
            }
            Some(id) => debug!("任务 {} 不存在，不自动打开", id),
            None if self.state.params.monitor => self.open_most_relevant_at(now),
            None => {}
        }
    }

    /// 提交新任务之后尽快轮询一次
    pub fn on_submitted(&mut self, now: Instant) {
        self.state.polling.mark_submitted(now);
        if self.in_flight.is_none() && !self.state.polling.paused {
            self.timer.arm(
                now,
                Duration::from_millis(crate::constants::POST_SUBMIT_POLL_DELAY_MS),
            );
        }
    }

    // --- 详情视图 ---

    pub fn open_detail(&mut self, task_id: Option<String>) {
        self.open_detail_at(task_id, Instant::now());
    }

    fn open_detail_at(&mut self, task_id: Option<String>, now: Instant) {
        if self.state.focus.modal_active() {
            self.renderer.cleanup(&mut self.detail);
        }
        let generation = self.state.focus.open(task_id.clone());
        self.state.params.set_open(task_id.as_deref());

        let Some(id) = task_id else {
            self.detail.show_no_task();
            return;
        };
        let mut request = None;
        match self.state.store.get(&id) {
            Some(task) => {
                let owner = self.state.owners.get(&id);
                request = detail::update_info(&mut self.detail, Some(task), owner, &mut self.state.artwork);
                self.renderer
                    .render(&mut self.detail, Some(task), owner, RenderMode::Fast, generation, now);
            }
            None => {
                warn!("任务 {} 不在当前列表中", id);
                self.detail.show_no_task();
                self.detail.show_invalid(MISSING_TASK_TEXT);
            }
        }
        if let Some(req) = request {
            self.request_artwork(req);
        }
    }

    pub fn open_most_relevant(&mut self) {
        self.open_most_relevant_at(Instant::now());
    }

    fn open_most_relevant_at(&mut self, now: Instant) {
        let id = self.state.store.pick_most_relevant().map(|t| t.id.clone());
        debug!("打开最相关的任务: {:?}", id);
        self.open_detail_at(id, now);
    }

    pub fn close_detail(&mut self) {
        self.renderer.cleanup(&mut self.detail);
        self.state.focus.close();
        self.frames.clear();
        match url_params::safely_clear(&mut self.state.params, &self.state.page, "关闭详情") {
            ParamCheck::Guarded => self.backup_params("close"),
            ParamCheck::Cleared => {
                if let Some(store) = &self.backups
                    && let Err(e) = store.remove()
                {
                    warn!("删除监视参数备份失败: {}", e);
                }
            }
            ParamCheck::Keep => {}
        }
    }

    pub fn clear_artwork_cache(&mut self) {
        info!("清空封面缓存 ({} 项)", self.state.artwork.len());
        self.state.artwork.clear();
    }

    fn backup_params(&self, source: &str) {
        let Some(store) = &self.backups else {
            return;
        };
        if let Err(e) = store.save(&self.state.params.to_backup(source)) {
            warn!("备份监视参数失败: {}", e);
        }
    }

    /// 执行排队的详情刷新。执行前重新确认焦点，过期的直接丢弃。
    pub fn flush_frames(&mut self) {
        let now = Instant::now();
        let mut requests = Vec::new();
        while let Some(frame) = self.frames.pop_front() {
            if !self.state.focus.still_focused(&frame.task_id, frame.generation) {
                trace!("焦点已变化，丢弃任务 {} 的刷新", frame.task_id);
                continue;
            }
            let Some(task) = self.state.store.get(&frame.task_id) else {
                continue;
            };
            let owner = self.state.owners.get(&frame.task_id);
            if let Some(req) =
                detail::update_info(&mut self.detail, Some(task), owner, &mut self.state.artwork)
            {
                requests.push(req);
            }
            if !self.renderer.is_progressive_for(&frame.task_id) {
                self.renderer
                    .render(&mut self.detail, Some(task), owner, RenderMode::Full, frame.generation, now);
            }
        }
        for req in requests {
            self.request_artwork(req);
        }
    }

    pub fn run_due_continuation(&mut self) -> detail::ContinuationStep {
        self.renderer.run_continuation(
            &mut self.detail,
            &self.state.store,
            &self.state.focus,
            Instant::now(),
        )
    }

    // --- 封面 ---

    fn request_artwork(&mut self, req: ArtworkRequest) {
        if !self.loading_urls.insert(req.url.clone()) {
            return;
        }
        let loader = Arc::clone(&self.loader);
        self.artwork_loads.push(Box::pin(async move {
            let result = loader.load(&req.url).await;
            (req, result)
        }));
    }

    fn on_artwork_done(&mut self, req: ArtworkRequest, result: AppResult<ArtworkImage>) {
        self.loading_urls.remove(&req.url);
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                warn!("封面加载失败 ({}): {}", req.url, e);
                return;
            }
        };
        queue::on_artwork_loaded(&mut self.queue, &mut self.state.artwork, &req.task_id, image);
        if self.state.focus.active_task() == Some(req.task_id.as_str())
            && let Some(task) = self.state.store.get(&req.task_id)
        {
            let owner = self.state.owners.get(&req.task_id);
            detail::update_info(&mut self.detail, Some(task), owner, &mut self.state.artwork);
        }
    }

    /// 等待所有进行中的封面加载完成
    pub async fn settle_artwork(&mut self) {
        while let Some((req, result)) = self.artwork_loads.next().await {
            self.on_artwork_done(req, result);
        }
    }

    // --- 事件 ---

    /// 处理一个事件，返回 false 表示应当退出
    pub fn handle_event(&mut self, event: UiEvent) -> bool {
        let now = Instant::now();
        match event {
            UiEvent::Open(id) => self.open_detail_at(Some(id), now),
            UiEvent::OpenIndex(n) => {
                let id = n.checked_sub(1).and_then(|i| self.queue.keys().get(i).cloned());
                match id {
                    Some(id) => self.open_detail_at(Some(id), now),
                    None => warn!("队列中没有第 {} 个任务", n),
                }
            }
            UiEvent::OpenMostRelevant => self.open_most_relevant_at(now),
            UiEvent::Close => self.close_detail(),
            UiEvent::Pause => self.pause(),
            UiEvent::Resume => self.resume(),
            UiEvent::ClearArtworkCache => self.clear_artwork_cache(),
            UiEvent::Session { logged_in } => {
                let was = self.state.logged_in;
                self.state.logged_in = logged_in;
                if logged_in && !was {
                    info!("检测到登录，恢复轮询");
                    self.resume();
                }
            }
            UiEvent::Submitted => self.on_submitted(now),
            UiEvent::Unload => {
                // 退出前留下参数备份，下次启动监视时恢复
                self.state.page.unloading = true;
                if !self.state.params.is_empty() {
                    self.backup_params("unload");
                }
                return false;
            }
            UiEvent::Quit => return false,
        }
        true
    }

    /// 完成当前 (或新开始的) 一轮抓取并处理结果
    pub async fn poll_now(&mut self) {
        if self.in_flight.is_none() {
            self.tick();
        }
        if let Some(fut) = self.in_flight.take() {
            let outcome = fut.await;
            self.on_cycle_complete(outcome, Instant::now());
        }
    }

    /// 事件循环。定时器、进行中的抓取、分批渲染、封面加载和用户事件是仅有的唤醒来源。
    pub async fn run<P: Presenter<Q, D>>(
        &mut self,
        mut events: mpsc::Receiver<UiEvent>,
        presenter: &mut P,
    ) {
        if !self.state.polling.paused {
            self.start();
        }
        let mut events_open = true;

        loop {
            self.flush_frames();
            presenter.present(self);

            let poll_at = self.timer.deadline();
            let continue_at = self.renderer.next_due();
            let has_loads = !self.artwork_loads.is_empty();
            let in_flight = &mut self.in_flight;
            let loads = &mut self.artwork_loads;

            tokio::select! {
                outcome = next_outcome(in_flight) => {
                    self.on_cycle_complete(outcome, Instant::now());
                }
                _ = sleep_until(poll_at) => {
                    self.timer.cancel();
                    self.tick();
                }
                _ = sleep_until(continue_at) => {
                    self.run_due_continuation();
                }
                Some((req, result)) = loads.next(), if has_loads => {
                    self.on_artwork_done(req, result);
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if !self.handle_event(event) {
                            break;
                        }
                    }
                    None => events_open = false,
                },
            }
        }
        presenter.present(self);
        info!("监视器退出");
    }
}

async fn next_outcome(slot: &mut Option<FetchFuture>) -> CycleOutcome {
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Task, TaskMetadata, TaskStatus, Track},
        polling::{
            FetchMode,
            fetcher::scripted::{Reply, ScriptedFetcher},
        },
        view::memory::{MemoryDetail, MemoryQueue},
    };
    use async_trait::async_trait;

    struct StubLoader;

    #[async_trait]
    impl ArtworkLoader for StubLoader {
        async fn load(&self, url: &str) -> AppResult<ArtworkImage> {
            Ok(ArtworkImage {
                url: url.to_string(),
                bytes: 1,
            })
        }
    }

    fn task(id: &str, status: TaskStatus, tracks: u32) -> Task {
        Task {
            id: id.to_string(),
            status,
            metadata: Some(TaskMetadata {
                name: Some(format!("Album {}", id)),
                artwork_url: Some("https://img/{w}x{h}.{f}".into()),
                tracks: Some(
                    (1..=tracks)
                        .map(|n| Track {
                            track_number: Some(n),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn monitor(fetcher: &Arc<ScriptedFetcher>) -> Monitor<MemoryQueue, MemoryDetail> {
        let config = AppConfig::for_server("http://127.0.0.1:1").unwrap();
        Monitor::new(
            &config,
            MemoryQueue::default(),
            MemoryDetail::default(),
            fetcher.clone(),
            Arc::new(StubLoader),
        )
    }

    fn delay_of(m: &Monitor<MemoryQueue, MemoryDetail>) -> Duration {
        m.next_poll_at().unwrap() - Instant::now()
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_keeps_single_poll() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut m = monitor(&fetcher);
        m.start();
        m.start();
        m.start();
        assert!(m.is_fetching());
        assert!(m.next_poll_at().is_none());

        m.poll_now().await;
        // 被丢弃的抓取从未执行
        assert_eq!(fetcher.calls(), vec![FetchMode::Short]);
        assert!(!m.is_fetching());
        assert!(m.next_poll_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_monitor_goes_dormant() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut m = monitor(&fetcher);
        m.start();
        m.pause();
        m.poll_now().await;
        // 暂停期间完成的抓取不再计时
        assert!(m.next_poll_at().is_none());

        m.tick();
        assert!(!m.is_fetching());
        assert_eq!(fetcher.calls().len(), 1);

        m.resume();
        assert!(m.is_fetching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_right_after_completion_stays_short() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 0)]))
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Finish, 0)]))
            .push_short(Reply::Tasks(vec![]));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        m.poll_now().await;
        assert_eq!(m.status(), &AggregateStatus::QueueComplete);

        tokio::time::advance(Duration::from_secs(2)).await;
        m.poll_now().await;
        assert_eq!(fetcher.calls(), vec![FetchMode::Short; 3]);
        assert_eq!(delay_of(&m), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_empty_list_switches_to_long_poll() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        // 首轮只做短轮询，空列表且不在完成窗口内
        assert_eq!(fetcher.calls(), vec![FetchMode::Short]);
        assert_eq!(delay_of(&m), Duration::from_millis(5000));

        tokio::time::advance(Duration::from_secs(15)).await;
        m.poll_now().await;
        assert_eq!(
            fetcher.calls(),
            vec![FetchMode::Short, FetchMode::Short, FetchMode::LongPoll]
        );
        assert_eq!(delay_of(&m), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_sets_error_and_retry_delay() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_short(Reply::Fail("获取任务列表失败 (500)"));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        assert_eq!(
            m.status(),
            &AggregateStatus::Error("获取任务列表失败 (500)".into())
        );
        assert_eq!(delay_of(&m), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_poll_timeout_sets_error_and_retry_delay() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_long(Reply::TimedOut(Duration::from_secs(60)));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;

        tokio::time::advance(Duration::from_secs(15)).await;
        m.poll_now().await;
        assert_eq!(
            fetcher.calls(),
            vec![FetchMode::Short, FetchMode::Short, FetchMode::LongPoll]
        );
        assert_eq!(m.status(), &AggregateStatus::Error("长轮询请求超时".into()));
        assert_eq!(delay_of(&m), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ids_show_same_record_in_queue_and_store() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_short(Reply::Tasks(vec![
            task("a", TaskStatus::Running, 1),
            task("a", TaskStatus::Error, 1),
        ]));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;

        assert_eq!(m.queue().nodes().len(), 1);
        assert_eq!(m.queue().nodes()[0].summary.status, TaskStatus::Running);
        assert_eq!(
            m.state().store.get("a").map(|t| t.status),
            Some(TaskStatus::Running)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_focused_task_vanishing_keeps_detail_content() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher
            .push_short(Reply::Tasks(vec![task("x", TaskStatus::Running, 2)]))
            .push_short(Reply::Tasks(vec![task("y", TaskStatus::Ready, 0)]));
        let mut m = monitor(&fetcher).with_params(MonitorParams::new(true, Some("x".into())));
        m.start();
        m.poll_now().await;
        // 参数指向的任务存在，自动打开
        assert_eq!(m.state().focus.active_task(), Some("x"));
        assert_eq!(m.detail().rows().len(), 2);
        m.flush_frames();

        let before = m.detail().mutations();
        m.poll_now().await;
        m.flush_frames();
        assert_eq!(m.detail().mutations(), before);
        assert_eq!(m.detail().rows().len(), 2);
        assert!(m.state().params.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_uuid_param_is_cleared_without_opening() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 1)]));
        let mut m = monitor(&fetcher).with_params(MonitorParams::new(true, Some("gone".into())));
        m.start();
        m.poll_now().await;
        assert!(m.state().params.is_empty());
        assert!(!m.state().focus.modal_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_flag_opens_most_relevant_task() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_short(Reply::Tasks(vec![
            task("done", TaskStatus::Finish, 1),
            task("busy", TaskStatus::Running, 1),
        ]));
        let mut m = monitor(&fetcher).with_params(MonitorParams::new(true, None));
        m.start();
        m.poll_now().await;
        assert_eq!(m.state().focus.active_task(), Some("busy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_frame_is_dropped_after_close() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 1)]))
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Finish, 1)]));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        m.open_detail(Some("a".into()));

        m.poll_now().await;
        m.close_detail();
        let before = m.detail().mutations();
        m.flush_frames();
        assert_eq!(m.detail().mutations(), before);
        assert!(m.detail().rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_skips_full_render_during_progressive_fill() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 10)]))
            .push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 10)]));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        m.open_detail(Some("a".into()));
        assert_eq!(m.detail().rows().len(), 3);

        m.poll_now().await;
        m.flush_frames();
        assert_eq!(m.detail().rows().len(), 3);

        tokio::time::advance(Duration::from_millis(200)).await;
        m.run_due_continuation();
        tokio::time::advance(Duration::from_millis(100)).await;
        m.run_due_continuation();
        assert_eq!(m.detail().rows().len(), 10);
        assert!(m.detail().loading.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_artwork_loads_fill_queue_and_detail() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 1)]));
        let mut m = monitor(&fetcher);
        m.start();
        m.poll_now().await;
        m.open_detail(Some("a".into()));
        m.settle_artwork().await;

        let wanted = crate::artwork::high_res_url("https://img/{w}x{h}.{f}", Default::default());
        assert_eq!(m.queue().image_src("a"), Some(wanted.clone()));
        assert_eq!(m.detail().cover.as_deref(), Some(wanted.as_str()));

        m.clear_artwork_cache();
        assert!(m.state().artwork.is_empty());
    }

    #[tokio::test]
    async fn test_unload_backup_is_restored_on_next_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_server("http://127.0.0.1:1").unwrap();
        config.data_dir = Some(dir.path().to_path_buf());
        let build = |config: &AppConfig| {
            Monitor::new(
                config,
                MemoryQueue::default(),
                MemoryDetail::default(),
                Arc::new(ScriptedFetcher::new()),
                Arc::new(StubLoader),
            )
        };

        let mut first = build(&config).with_params(MonitorParams::new(true, Some("t-9".into())));
        assert!(!first.handle_event(UiEvent::Unload));

        let second = build(&config).with_params(MonitorParams::default());
        assert_eq!(second.state().params.uuid(), Some("t-9"));
        // 备份只恢复一次
        let third = build(&config).with_params(MonitorParams::default());
        assert!(third.state().params.is_empty());
    }

    struct CountingPresenter(usize);

    impl Presenter<MemoryQueue, MemoryDetail> for CountingPresenter {
        fn present(&mut self, _monitor: &Monitor<MemoryQueue, MemoryDetail>) {
            self.0 += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_polls_until_quit() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        for _ in 0..3 {
            fetcher.push_short(Reply::Tasks(vec![task("a", TaskStatus::Running, 1)]));
        }
        let mut m = monitor(&fetcher);
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let _ = tx.send(UiEvent::Quit).await;
        });

        let mut presenter = CountingPresenter(0);
        m.run(rx, &mut presenter).await;
        // 0ms 和 1000ms、2000ms 各一次短轮询
        assert_eq!(fetcher.calls(), vec![FetchMode::Short; 3]);
        assert!(presenter.0 > 3);
        assert_eq!(m.queue().keys(), vec!["a"]);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(UiEvent::parse("open 2").unwrap(), UiEvent::OpenIndex(2));
        assert_eq!(UiEvent::parse("o abc-1").unwrap(), UiEvent::Open("abc-1".into()));
        assert_eq!(UiEvent::parse("open").unwrap(), UiEvent::OpenMostRelevant);
        assert_eq!(UiEvent::parse(" quit ").unwrap(), UiEvent::Quit);
        assert!(matches!(UiEvent::parse("dance"), Err(AppError::UserInputError(_))));
    }
}
