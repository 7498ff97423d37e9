// src/view/memory.rs

//! 内存中的保留式视图。终端界面从这里读取内容绘制；每次实际改动都会计数，
//! 用来确认重复渲染不会产生多余的改动。

use super::{
    CoverSummary, DetailLayout, DetailSurface, QueueView, ScrollMetrics, StatusBar, TrackRow,
};
use crate::models::TrackKey;

/// 详情区每行音轨的视觉高度，与视口高度配合计算滚动位置
pub const ROW_HEIGHT: usize = 96;
pub const VIEWPORT_HEIGHT: usize = 400;

#[derive(Debug, Clone, PartialEq)]
pub struct CoverNode {
    pub summary: CoverSummary,
    pub image_src: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    nodes: Vec<CoverNode>,
    mutations: usize,
    created: usize,
}

impl MemoryQueue {
    pub fn nodes(&self) -> &[CoverNode] {
        &self.nodes
    }

    pub fn node(&self, task_id: &str) -> Option<&CoverNode> {
        self.nodes.iter().find(|n| n.summary.task_id == task_id)
    }

    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// 累计新建的元素数，用于确认元素被复用而不是重建
    pub fn created(&self) -> usize {
        self.created
    }

    fn position(&self, task_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.summary.task_id == task_id)
    }
}

impl QueueView for MemoryQueue {
    fn keys(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.summary.task_id.clone()).collect()
    }

    fn create(&mut self, summary: &CoverSummary, image_src: Option<&str>) {
        self.nodes.push(CoverNode {
            summary: summary.clone(),
            image_src: image_src.map(str::to_string),
        });
        self.created += 1;
        self.mutations += 1;
    }

    fn update(&mut self, summary: &CoverSummary) {
        let Some(idx) = self.position(&summary.task_id) else {
            return;
        };
        let node = &mut self.nodes[idx];
        if node.summary != *summary {
            node.summary = summary.clone();
            self.mutations += 1;
        }
    }

    fn image_src(&self, task_id: &str) -> Option<String> {
        self.node(task_id).and_then(|n| n.image_src.clone())
    }

    fn set_image(&mut self, task_id: &str, src: &str) -> bool {
        let Some(idx) = self.position(task_id) else {
            return false;
        };
        let node = &mut self.nodes[idx];
        if node.image_src.as_deref() != Some(src) {
            node.image_src = Some(src.to_string());
            self.mutations += 1;
        }
        true
    }

    fn remove(&mut self, task_id: &str) {
        if let Some(idx) = self.position(task_id) {
            self.nodes.remove(idx);
            self.mutations += 1;
        }
    }

    fn reorder(&mut self, order: &[String]) {
        if self.keys() == order {
            return;
        }
        let mut rest = std::mem::take(&mut self.nodes);
        for id in order {
            if let Some(idx) = rest.iter().position(|n| &n.summary.task_id == id) {
                self.nodes.push(rest.remove(idx));
            }
        }
        self.nodes.extend(rest);
        self.mutations += 1;
    }
}

/// 详情视图的内容区
#[derive(Debug, Clone, PartialEq)]
pub enum DetailBody {
    Empty,
    NoTask,
    /// 整个内容区只有一条提示
    Invalid(String),
    Structured {
        status: Option<StatusBar>,
        header: Vec<String>,
        layout: Option<DetailLayout>,
        message: Option<String>,
        rows: Vec<TrackRow>,
    },
}

#[derive(Debug)]
pub struct MemoryDetail {
    pub owner_line: Option<String>,
    pub cover: Option<String>,
    pub cover_alt: String,
    pub body: DetailBody,
    pub loading: Option<String>,
    scroll_offset: usize,
    mutations: usize,
}

impl Default for MemoryDetail {
    fn default() -> Self {
        Self {
            owner_line: None,
            cover: None,
            cover_alt: String::new(),
            body: DetailBody::Empty,
            loading: None,
            scroll_offset: 0,
            mutations: 0,
        }
    }
}

impl MemoryDetail {
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn rows(&self) -> &[TrackRow] {
        match &self.body {
            DetailBody::Structured { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn row_keys(&self) -> Vec<TrackKey> {
        self.rows().iter().map(|r| r.key).collect()
    }

    pub fn header(&self) -> &[String] {
        match &self.body {
            DetailBody::Structured { header, .. } => header,
            _ => &[],
        }
    }

    pub fn status_bar(&self) -> Option<StatusBar> {
        match &self.body {
            DetailBody::Structured { status, .. } => *status,
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<DetailLayout> {
        match &self.body {
            DetailBody::Structured { layout, .. } => *layout,
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.body {
            DetailBody::Structured { message, .. } => message.as_deref(),
            DetailBody::Invalid(text) => Some(text),
            _ => None,
        }
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// 模拟用户滚动
    pub fn scroll_to(&mut self, offset: usize) {
        if let Some(metrics) = self.scroll_metrics() {
            self.scroll_offset = offset.min(metrics.max_offset);
        }
    }

    fn content_height(&self) -> usize {
        self.rows().len() * ROW_HEIGHT
    }

    fn structured(
        &mut self,
    ) -> Option<(
        &mut Option<StatusBar>,
        &mut Vec<String>,
        &mut Option<DetailLayout>,
        &mut Option<String>,
        &mut Vec<TrackRow>,
    )> {
        match &mut self.body {
            DetailBody::Structured {
                status,
                header,
                layout,
                message,
                rows,
            } => Some((status, header, layout, message, rows)),
            _ => None,
        }
    }
}

impl DetailSurface for MemoryDetail {
    fn show_no_task(&mut self) {
        if self.body != DetailBody::NoTask || self.owner_line.is_some() || self.cover.is_some() {
            self.body = DetailBody::NoTask;
            self.owner_line = None;
            self.cover = None;
            self.cover_alt.clear();
            self.mutations += 1;
        }
    }

    fn set_owner_line(&mut self, text: Option<&str>) {
        if self.owner_line.as_deref() != text {
            self.owner_line = text.map(str::to_string);
            self.mutations += 1;
        }
    }

    fn set_cover(&mut self, src: Option<&str>, alt: &str) {
        if self.cover.as_deref() != src || self.cover_alt != alt {
            self.cover = src.map(str::to_string);
            self.cover_alt = alt.to_string();
            self.mutations += 1;
        }
    }

    fn cover_src(&self) -> Option<String> {
        self.cover.clone()
    }

    fn ensure_structure(&mut self) -> bool {
        if matches!(self.body, DetailBody::Structured { .. }) {
            return false;
        }
        self.body = DetailBody::Structured {
            status: None,
            header: Vec::new(),
            layout: None,
            message: None,
            rows: Vec::new(),
        };
        self.scroll_offset = 0;
        self.mutations += 1;
        true
    }

    fn set_status_bar(&mut self, bar: StatusBar) {
        let mut changed = false;
        if let Some((status, ..)) = self.structured()
            && *status != Some(bar)
        {
            *status = Some(bar);
            changed = true;
        }
        if changed {
            self.mutations += 1;
        }
    }

    fn set_header(&mut self, lines: &[String]) {
        let mut changed = false;
        if let Some((_, header, ..)) = self.structured()
            && header.as_slice() != lines
        {
            *header = lines.to_vec();
            changed = true;
        }
        if changed {
            self.mutations += 1;
        }
    }

    fn set_layout(&mut self, next: DetailLayout) {
        let mut changed = false;
        if let Some((_, _, layout, message, rows)) = self.structured() {
            if *layout != Some(next) {
                *layout = Some(next);
                changed = true;
            }
            // 视频布局不显示音轨区
            if next == DetailLayout::Video && (!rows.is_empty() || message.is_some()) {
                rows.clear();
                *message = None;
                changed = true;
            }
        }
        if changed {
            self.mutations += 1;
            if next == DetailLayout::Video {
                self.scroll_offset = 0;
            }
        }
    }

    fn show_message(&mut self, text: &str) {
        let mut changed = false;
        if let Some((_, _, _, message, rows)) = self.structured()
            && (message.as_deref() != Some(text) || !rows.is_empty())
        {
            rows.clear();
            *message = Some(text.to_string());
            changed = true;
        }
        if changed {
            self.scroll_offset = 0;
            self.mutations += 1;
        }
    }

    fn show_invalid(&mut self, text: &str) {
        let next = DetailBody::Invalid(text.to_string());
        if self.body != next {
            self.body = next;
            self.scroll_offset = 0;
            self.mutations += 1;
        }
    }

    fn has_row(&self, key: TrackKey) -> bool {
        self.rows().iter().any(|r| r.key == key)
    }

    fn insert_row(&mut self, after: Option<TrackKey>, row: &TrackRow) {
        let mut inserted = false;
        if let Some((_, _, _, message, rows)) = self.structured() {
            // 第一行出现时占位提示随之消失
            *message = None;
            let idx = after
                .and_then(|k| rows.iter().position(|r| r.key == k))
                .map(|i| i + 1)
                .unwrap_or(rows.len());
            rows.insert(idx, row.clone());
            inserted = true;
        }
        if inserted {
            self.mutations += 1;
        }
    }

    fn update_row(&mut self, row: &TrackRow) {
        let mut changed = false;
        if let Some((.., rows)) = self.structured()
            && let Some(existing) = rows.iter_mut().find(|r| r.key == row.key)
            && existing != row
        {
            *existing = row.clone();
            changed = true;
        }
        if changed {
            self.mutations += 1;
        }
    }

    fn set_loading_indicator(&mut self, text: Option<&str>) {
        if self.loading.as_deref() != text {
            self.loading = text.map(str::to_string);
            self.mutations += 1;
        }
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        match self.layout() {
            Some(DetailLayout::TwoRegion { compact: false }) => Some(ScrollMetrics {
                offset: self.scroll_offset,
                max_offset: self.content_height().saturating_sub(VIEWPORT_HEIGHT),
            }),
            _ => None,
        }
    }

    fn scroll_to_bottom(&mut self) {
        if let Some(metrics) = self.scroll_metrics()
            && self.scroll_offset != metrics.max_offset
        {
            self.scroll_offset = metrics.max_offset;
            self.mutations += 1;
        }
    }

    fn clear(&mut self) {
        let was_empty = self.body == DetailBody::Empty
            && self.owner_line.is_none()
            && self.cover.is_none()
            && self.loading.is_none();
        self.body = DetailBody::Empty;
        self.owner_line = None;
        self.cover = None;
        self.cover_alt.clear();
        self.loading = None;
        self.scroll_offset = 0;
        if !was_empty {
            self.mutations += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EffectiveStatus, TaskStatus};
    use crate::view::StageIcon;

    fn summary(id: &str) -> CoverSummary {
        CoverSummary {
            task_id: id.to_string(),
            status: TaskStatus::Ready,
            status_class: TaskStatus::Ready.css_class(),
            title: id.to_string(),
            owner: "u".into(),
            tooltip: String::new(),
            alt: String::new(),
            preview_url: None,
            high_res_url: None,
        }
    }

    fn row(disc: u32, track: u32) -> TrackRow {
        TrackRow {
            key: TrackKey { disc, track },
            status: EffectiveStatus::Waiting,
            title: format!("[{}] t", track),
            quality: "等待中...".into(),
            lyrics: None,
            progress_class: "bg-light",
            percent: 0.0,
            connect_icon: StageIcon::Waiting,
            decrypt_icon: StageIcon::Blank,
            percent_text: None,
            size_text: "等待中...".into(),
            error: None,
            song_id: None,
        }
    }

    #[test]
    fn test_queue_reorder_counts_only_real_moves() {
        let mut q = MemoryQueue::default();
        q.create(&summary("a"), None);
        q.create(&summary("b"), None);
        let before = q.mutations();
        q.reorder(&["a".into(), "b".into()]);
        assert_eq!(q.mutations(), before);
        q.reorder(&["b".into(), "a".into()]);
        assert_eq!(q.keys(), vec!["b", "a"]);
        assert_eq!(q.mutations(), before + 1);
    }

    #[test]
    fn test_insert_after_missing_anchor_appends() {
        let mut d = MemoryDetail::default();
        d.ensure_structure();
        d.insert_row(None, &row(1, 3));
        d.insert_row(Some(TrackKey { disc: 1, track: 1 }), &row(1, 2));
        d.insert_row(Some(TrackKey { disc: 1, track: 3 }), &row(1, 4));
        assert_eq!(
            d.row_keys(),
            vec![
                TrackKey { disc: 1, track: 3 },
                TrackKey { disc: 1, track: 4 },
                TrackKey { disc: 1, track: 2 },
            ]
        );
    }

    #[test]
    fn test_compact_layout_has_no_scroll_region() {
        let mut d = MemoryDetail::default();
        d.ensure_structure();
        d.set_layout(DetailLayout::TwoRegion { compact: true });
        assert!(d.scroll_metrics().is_none());
        d.set_layout(DetailLayout::TwoRegion { compact: false });
        assert_eq!(d.scroll_metrics(), Some(ScrollMetrics::default()));
    }
}
