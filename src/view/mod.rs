// src/view/mod.rs

//! 视图层接口。渲染逻辑只通过这两个 trait 操作界面，测试和终端输出各自提供实现。

pub mod detail;
pub mod memory;
pub mod queue;

use crate::models::{EffectiveStatus, TaskStatus, TrackKey};

/// 队列中一个任务封面的全部显示内容
#[derive(Debug, Clone, PartialEq)]
pub struct CoverSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub status_class: &'static str,
    pub title: String,
    pub owner: String,
    pub tooltip: String,
    pub alt: String,
    pub preview_url: Option<String>,
    pub high_res_url: Option<String>,
}

pub trait QueueView {
    /// 当前界面上的元素 id，按显示顺序
    fn keys(&self) -> Vec<String>;
    fn create(&mut self, summary: &CoverSummary, image_src: Option<&str>);
    /// 原地更新，只改动实际变化的字段
    fn update(&mut self, summary: &CoverSummary);
    fn image_src(&self, task_id: &str) -> Option<String>;
    /// 元素已不存在时返回 false
    fn set_image(&mut self, task_id: &str, src: &str) -> bool;
    fn remove(&mut self, task_id: &str);
    /// 按给定顺序重新排列全部元素
    fn reorder(&mut self, order: &[String]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLayout {
    /// 只显示头部信息，宽屏封面
    Video,
    /// 头部 + 音轨列表；`compact` 为窄屏模式，高度自适应且没有内部滚动
    TwoRegion { compact: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBar {
    pub text: &'static str,
    pub class: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub offset: usize,
    pub max_offset: usize,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, threshold: usize) -> bool {
        self.max_offset <= self.offset + threshold
    }
}

/// 阶段图标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageIcon {
    Waiting,
    Success,
    Failed,
    Exists,
    Spinner,
    Blank,
}

impl StageIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            StageIcon::Waiting => "🔄",
            StageIcon::Success => "✅",
            StageIcon::Failed => "❌",
            StageIcon::Exists => "⚠️",
            StageIcon::Spinner => "⏳",
            StageIcon::Blank => "",
        }
    }
}

/// 一行音轨的全部显示字段
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub key: TrackKey,
    pub status: EffectiveStatus,
    pub title: String,
    pub quality: String,
    pub lyrics: Option<&'static str>,
    pub progress_class: &'static str,
    pub percent: f64,
    pub connect_icon: StageIcon,
    pub decrypt_icon: StageIcon,
    pub percent_text: Option<String>,
    pub size_text: String,
    pub error: Option<String>,
    pub song_id: Option<String>,
}

pub trait DetailSurface {
    // --- 信息栏 ---
    fn show_no_task(&mut self);
    /// `None` 时隐藏 (视频任务的用户显示在头部)
    fn set_owner_line(&mut self, text: Option<&str>);
    fn set_cover(&mut self, src: Option<&str>, alt: &str);
    fn cover_src(&self) -> Option<String>;

    // --- 内容区 ---
    /// 确保头部和音轨区存在，新建时返回 true
    fn ensure_structure(&mut self) -> bool;
    fn set_status_bar(&mut self, bar: StatusBar);
    fn set_header(&mut self, lines: &[String]);
    fn set_layout(&mut self, layout: DetailLayout);
    /// 用一条提示替换音轨区
    fn show_message(&mut self, text: &str);
    /// 清空整个内容区，只显示一条提示
    fn show_invalid(&mut self, text: &str);
    fn has_row(&self, key: TrackKey) -> bool;
    /// 插入到 `after` 对应行之后，`None` 或找不到时追加到末尾
    fn insert_row(&mut self, after: Option<TrackKey>, row: &TrackRow);
    fn update_row(&mut self, row: &TrackRow);
    fn set_loading_indicator(&mut self, text: Option<&str>);
    /// 没有可滚动区域时返回 `None`
    fn scroll_metrics(&self) -> Option<ScrollMetrics>;
    fn scroll_to_bottom(&mut self);
    /// 关闭时释放全部内容
    fn clear(&mut self);
}
