// src/view/detail.rs

//! 详情视图的渐进式渲染。
//!
//! 打开详情时先渲染前几首，剩余的按批次在之后的循环轮次里补齐；轮询带来的刷新
//! 走完整渲染，并用指纹跳过没有变化的数据。所有写入都经过 [`DetailSurface`]，
//! 由实现方负责 "只在内容不同时才改动"。

use super::{DetailLayout, DetailSurface, StageIcon, StatusBar, TrackRow, queue::ArtworkRequest};
use crate::{
    artwork::{self, ArtworkCache},
    config::RenderConfig,
    models::{EffectiveStatus, LinkKind, StageDisplay, Task, TaskStatus, Track},
    state::FocusState,
    store::TaskSnapshotStore,
};
use log::{debug, trace};
use std::{
    collections::{HashMap, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
    time::Duration,
};
use tokio::time::Instant;

pub const INVALID_TASK_TEXT: &str = "任务数据无效或丢失。";
pub const MISSING_TASK_TEXT: &str = "任务数据无法加载或已不存在。";
pub const LOADING_TRACKS_TEXT: &str = "正在加载音轨列表...";
pub const NO_TRACKS_TEXT: &str = "未找到音轨信息。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// 一次渲染全部音轨，带重复渲染检查
    Full,
    /// 只渲染前几首，剩余部分交给后续批次
    Fast,
    /// 从给定位置开始渲染一批
    Batch { start: usize },
}

impl RenderMode {
    fn start(self) -> usize {
        match self {
            RenderMode::Batch { start } => start,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// 数据无效，内容区已清空
    Invalid,
    /// 与上次渲染的数据相同
    Skipped,
    Rendered { rows: usize, pending: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationStep {
    Idle,
    NotDue,
    /// 详情已关闭、焦点已切换或任务已消失
    Aborted,
    Continued,
    Finished,
}

#[derive(Debug, Clone)]
struct RenderProgress {
    task_id: String,
    rendered: usize,
    total: usize,
    in_progress: bool,
}

#[derive(Debug, Clone)]
struct Continuation {
    task_id: String,
    generation: u64,
    due: Instant,
}

pub struct ProgressiveRenderer {
    config: RenderConfig,
    compact: bool,
    progress: Option<RenderProgress>,
    fingerprint: Option<(String, u64)>,
    continuation: Option<Continuation>,
}

impl ProgressiveRenderer {
    pub fn new(config: RenderConfig, compact: bool) -> Self {
        Self {
            config,
            compact,
            progress: None,
            fingerprint: None,
            continuation: None,
        }
    }

    /// 该任务是否还有未完成的分批渲染
    pub fn is_progressive_for(&self, task_id: &str) -> bool {
        self.progress
            .as_ref()
            .is_some_and(|p| p.in_progress && p.task_id == task_id)
    }

    /// 下一批的到期时间
    pub fn next_due(&self) -> Option<Instant> {
        self.continuation.as_ref().map(|c| c.due)
    }

    /// `owner` 为缓存中的用户名，只用于视频任务的头部
    pub fn render<D: DetailSurface>(
        &mut self,
        surface: &mut D,
        task: Option<&Task>,
        owner: Option<&str>,
        mode: RenderMode,
        generation: u64,
        now: Instant,
    ) -> RenderOutcome {
        let Some(task) = task.filter(|t| !t.id.is_empty()) else {
            surface.show_invalid(INVALID_TASK_TEXT);
            self.reset();
            return RenderOutcome::Invalid;
        };

        if mode == RenderMode::Full {
            let print = fingerprint(task);
            if self
                .fingerprint
                .as_ref()
                .is_some_and(|(id, fp)| *id == task.id && *fp == print)
            {
                trace!("任务 {} 数据未变化，跳过渲染", task.id);
                return RenderOutcome::Skipped;
            }
            self.fingerprint = Some((task.id.clone(), print));
        }

        let mut at_bottom = surface
            .scroll_metrics()
            .is_none_or(|m| m.near_bottom(self.config.scroll_bottom_threshold));
        if surface.ensure_structure() {
            at_bottom = true;
        }

        let start = mode.start();
        if start == 0 {
            surface.set_status_bar(status_bar(task));
            surface.set_header(&header_lines(task, owner));
            if task.link_kind().is_video() {
                surface.set_layout(DetailLayout::Video);
                surface.set_loading_indicator(None);
                self.progress = None;
                self.continuation = None;
                return RenderOutcome::Rendered {
                    rows: 0,
                    pending: false,
                };
            }
            surface.set_layout(DetailLayout::TwoRegion {
                compact: self.compact,
            });
        }

        let mut sorted: Vec<&Track> = task.tracks().unwrap_or_default().iter().collect();
        sorted.sort_by_key(|t| t.sort_value());
        let total = sorted.len();

        if start == 0 {
            self.progress = Some(RenderProgress {
                task_id: task.id.clone(),
                rendered: 0,
                total,
                in_progress: false,
            });
        }

        let end = match mode {
            RenderMode::Full => total,
            RenderMode::Fast => self.config.fast_render_count.min(total),
            RenderMode::Batch { start } => (start + self.config.batch_size).min(total),
        };
        let slice = sorted.get(start.min(end)..end).unwrap_or_default();

        let mut pending = false;
        if !slice.is_empty() {
            let disc_counts = disc_track_counts(&sorted);
            for track in slice {
                let Some(key) = track.key() else {
                    continue;
                };
                let count = disc_counts.get(&key.disc).copied().unwrap_or(total);
                let row = build_row(track, count);
                if surface.has_row(key) {
                    surface.update_row(&row);
                } else {
                    let anchor = key.previous().filter(|prev| surface.has_row(*prev));
                    surface.insert_row(anchor, &row);
                }
            }

            if let Some(progress) = self.progress.as_mut() {
                progress.rendered = end;
                progress.total = total;
                match mode {
                    RenderMode::Fast => {
                        progress.in_progress = total > self.config.fast_render_count;
                        pending = progress.in_progress;
                    }
                    RenderMode::Full => progress.in_progress = false,
                    RenderMode::Batch { .. } => pending = end < total,
                }
            }

            if mode == RenderMode::Fast && pending {
                surface.set_loading_indicator(Some(&loading_text(total - end)));
                self.continuation = Some(Continuation {
                    task_id: task.id.clone(),
                    generation,
                    due: now + Duration::from_millis(self.config.first_continuation_delay_ms),
                });
                debug!("任务 {} 先渲染 {}/{} 首，剩余分批补齐", task.id, end, total);
            } else if !matches!(mode, RenderMode::Batch { .. }) {
                surface.set_loading_indicator(None);
                self.continuation = None;
            }
        } else if start == 0 {
            let text = match task.status {
                TaskStatus::Running | TaskStatus::Ready => LOADING_TRACKS_TEXT,
                _ => NO_TRACKS_TEXT,
            };
            surface.show_message(text);
            surface.set_loading_indicator(None);
            self.continuation = None;
        }

        if at_bottom {
            surface.scroll_to_bottom();
        }

        RenderOutcome::Rendered {
            rows: slice.len(),
            pending,
        }
    }

    /// 到期时渲染下一批。每批开始前都重新确认详情仍打开且焦点未变，并使用快照里最新的任务数据。
    pub fn run_continuation<D: DetailSurface>(
        &mut self,
        surface: &mut D,
        store: &TaskSnapshotStore,
        focus: &FocusState,
        now: Instant,
    ) -> ContinuationStep {
        let Some(cont) = self.continuation.take() else {
            return ContinuationStep::Idle;
        };
        if cont.due > now {
            self.continuation = Some(cont);
            return ContinuationStep::NotDue;
        }
        if !focus.still_focused(&cont.task_id, cont.generation)
            || !self.is_progressive_for(&cont.task_id)
        {
            debug!("任务 {} 的分批渲染已取消", cont.task_id);
            self.stop_progressive();
            return ContinuationStep::Aborted;
        }
        let Some(task) = store.get(&cont.task_id) else {
            debug!("任务 {} 已不在快照中，停止分批渲染", cont.task_id);
            self.stop_progressive();
            return ContinuationStep::Aborted;
        };

        let rendered = self.progress.as_ref().map_or(0, |p| p.rendered);
        let total = task.tracks().map_or(0, <[Track]>::len);
        if rendered >= total {
            self.finish(surface);
            return ContinuationStep::Finished;
        }

        self.render(
            surface,
            Some(task),
            None,
            RenderMode::Batch { start: rendered },
            cont.generation,
            now,
        );

        let rendered = self.progress.as_ref().map_or(total, |p| p.rendered);
        if rendered < total {
            surface.set_loading_indicator(Some(&loading_text(total - rendered)));
            self.continuation = Some(Continuation {
                due: now + Duration::from_millis(self.config.batch_spacing_ms),
                ..cont
            });
            ContinuationStep::Continued
        } else {
            self.finish(surface);
            ContinuationStep::Finished
        }
    }

    /// 关闭详情: 停止分批渲染，清空全部记录和内容；共享的封面缓存不受影响
    pub fn cleanup<D: DetailSurface>(&mut self, surface: &mut D) {
        self.reset();
        surface.set_loading_indicator(None);
        surface.clear();
    }

    fn finish<D: DetailSurface>(&mut self, surface: &mut D) {
        if let Some(progress) = self.progress.as_mut() {
            debug!("任务 {} 的 {} 首音轨已全部渲染", progress.task_id, progress.total);
        }
        self.stop_progressive();
        surface.set_loading_indicator(None);
    }

    fn stop_progressive(&mut self) {
        if let Some(progress) = self.progress.as_mut() {
            progress.in_progress = false;
        }
        self.continuation = None;
    }

    fn reset(&mut self) {
        self.progress = None;
        self.fingerprint = None;
        self.continuation = None;
    }
}

fn loading_text(remaining: usize) -> String {
    format!("正在加载剩余 {} 个音轨...", remaining)
}

fn fingerprint(task: &Task) -> u64 {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(task.tracks().unwrap_or_default())
        .unwrap_or_default()
        .hash(&mut hasher);
    task.status.hash(&mut hasher);
    task.checking.hash(&mut hasher);
    hasher.finish()
}

fn disc_track_counts(tracks: &[&Track]) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for track in tracks {
        *counts.entry(track.disc_number).or_insert(0) += 1;
    }
    counts
}

pub fn status_bar(task: &Task) -> StatusBar {
    if task.checking {
        return StatusBar {
            text: "任务校验中",
            class: "status-bg-blue",
        };
    }
    match task.status {
        TaskStatus::Finish => StatusBar {
            text: "任务成功完成",
            class: "status-bg-success",
        },
        TaskStatus::Error => StatusBar {
            text: "任务失败",
            class: "status-bg-error",
        },
        TaskStatus::Running => StatusBar {
            text: "任务执行中",
            class: "status-bg-blue",
        },
        _ => StatusBar {
            text: "任务未执行",
            class: "status-bg-gray",
        },
    }
}

/// 头部信息行。视频任务额外显示下载用户，`owner` 为空时使用任务自带的值。
pub fn header_lines(task: &Task, owner: Option<&str>) -> Vec<String> {
    let meta = task.metadata.as_ref();
    let album = meta
        .and_then(|m| m.name.as_deref())
        .unwrap_or("未知专辑/播放列表");
    let mut lines = Vec::new();

    match task.link_kind() {
        LinkKind::Playlist => {
            if let Some(curator) = meta
                .and_then(|m| m.curator_name.as_deref())
                .filter(|c| !c.is_empty())
            {
                lines.push(format!("创建者： {}", curator));
            }
            lines.push(format!("播放列表： {}", album));
        }
        _ => {
            let artist = meta
                .and_then(|m| m.artist_name.as_deref())
                .unwrap_or("未知歌手");
            lines.push(format!("歌手： {}", artist));
            lines.push(format!("标题： {}", album));
            if let Some((w, h)) = meta.and_then(|m| m.width.zip(m.height))
                && w > 0
                && h > 0
            {
                lines.push(format!("分辨率： {}×{}", w, h));
            }
        }
    }

    if task.link_kind().is_video() {
        let user = owner
            .or_else(|| task.owner.as_deref())
            .filter(|u| !u.is_empty())
            .unwrap_or("未知用户");
        lines.push(format!("下载用户： {}", user));
    }
    lines
}

fn stage_icon(stage: StageDisplay) -> StageIcon {
    match stage {
        StageDisplay::Success => StageIcon::Success,
        StageDisplay::Failed => StageIcon::Failed,
        StageDisplay::Exists => StageIcon::Exists,
        StageDisplay::Waiting | StageDisplay::InProgress => StageIcon::Waiting,
    }
}

/// 由一条音轨记录计算整行的显示内容。`disc_count` 为该碟的音轨总数。
pub fn build_row(track: &Track, disc_count: usize) -> TrackRow {
    let state = track.state();
    let effective = state.effective;
    let track_no = track.track_number.unwrap_or(0);
    let disc_total = track.disc_total.unwrap_or(1);

    let title = if disc_total <= 1 {
        format!("[{}/{}] {}", track_no, disc_count, track.display_name())
    } else {
        format!(
            "[{}/{} - {}/{}] {}",
            track.disc_number,
            disc_total,
            track_no,
            disc_count,
            track.display_name()
        )
    };

    let quality = match effective {
        EffectiveStatus::Exists => "已存在".to_string(),
        EffectiveStatus::Failed => "无法获取".to_string(),
        _ => match (track.bit_depth, track.sample_rate) {
            (Some(b), Some(r)) if b > 0 && r > 0 => format!("{}bit / {}Hz", b, r),
            _ if effective == EffectiveStatus::Completed => "信息缺失".to_string(),
            _ => "等待中...".to_string(),
        },
    };

    let lyrics = track
        .has_lyrics
        .map(|has| if has { "有歌词" } else { "无歌词" });

    let progress = track.download_progress.as_ref();
    let mut percent = progress.and_then(|p| p.percent).unwrap_or(0.0);
    let progress_class = if effective.is_active() {
        "bg-primary"
    } else if effective.is_done() {
        percent = 100.0;
        "bg-success"
    } else {
        "bg-light"
    };

    let decrypt_icon = match effective {
        EffectiveStatus::Decrypting => StageIcon::Spinner,
        EffectiveStatus::Completed | EffectiveStatus::Exists => stage_icon(state.decryption),
        _ => StageIcon::Blank,
    };

    let percent_text = (effective.is_active() || effective.is_done())
        .then(|| format!("{:.1}%", percent));

    let size_text = if effective == EffectiveStatus::Exists {
        "已存在".to_string()
    } else if effective == EffectiveStatus::Failed {
        "失败".to_string()
    } else if track.check_success == Some(true) {
        "校验成功".to_string()
    } else {
        match progress.and_then(|p| p.byte_counts()) {
            Some((current, total)) => format!(
                "{}MB / {}MB",
                crate::utils::format_megabytes(current),
                crate::utils::format_megabytes(total)
            ),
            None => "等待中...".to_string(),
        }
    };

    TrackRow {
        key: track.key().unwrap_or_default(),
        status: effective,
        title,
        quality,
        lyrics,
        progress_class,
        percent,
        connect_icon: stage_icon(state.connection),
        decrypt_icon,
        percent_text,
        size_text,
        error: track
            .error_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(|m| format!("错误： {}", m)),
        song_id: track.song_id.clone().filter(|s| !s.is_empty()),
    }
}

/// 更新详情左侧的信息栏 (用户、封面)。高清封面未缓存时返回加载请求，当前图片保持不变。
pub fn update_info<D: DetailSurface>(
    surface: &mut D,
    task: Option<&Task>,
    owner: Option<&str>,
    cache: &mut ArtworkCache,
) -> Option<ArtworkRequest> {
    let Some(task) = task else {
        surface.show_no_task();
        return None;
    };

    if task.link_kind().is_video() {
        surface.set_owner_line(None);
    } else {
        let user = owner
            .or_else(|| task.owner.as_deref())
            .filter(|u| !u.is_empty())
            .unwrap_or("未知用户");
        surface.set_owner_line(Some(&format!("下载用户：{}", user)));
    }

    let alt = task.title().unwrap_or("专辑封面").to_string();
    let template = task
        .metadata
        .as_ref()
        .and_then(|m| m.artwork_url.as_deref())
        .filter(|t| !t.is_empty());
    let Some(template) = template else {
        surface.set_cover(None, &alt);
        return None;
    };

    let url = artwork::high_res_url(template, task.link_kind());
    let current = surface.cover_src();
    if current.as_deref() == Some(url.as_str()) {
        surface.set_cover(Some(&url), &alt);
        return None;
    }
    if cache.get_variant(&task.id, &url).is_some() {
        surface.set_cover(Some(&url), &alt);
        return None;
    }
    surface.set_cover(current.as_deref(), &alt);
    Some(ArtworkRequest {
        task_id: task.id.clone(),
        url,
    })
}
