// src/view/queue.rs

use super::{CoverSummary, QueueView};
use crate::{
    artwork::{self, ArtworkCache, ArtworkImage},
    models::Task,
    store::OwnerCache,
};
use log::debug;
use std::collections::HashSet;

/// 对队列视图的一次改动
#[derive(Debug, Clone, PartialEq)]
pub enum QueueOp {
    Create(CoverSummary),
    Update(CoverSummary),
    Remove(String),
    /// 最终顺序，总是最后一个操作
    Reorder(Vec<String>),
}

/// 需要异步加载的高清封面
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtworkRequest {
    pub task_id: String,
    pub url: String,
}

pub fn build_summary(task: &Task, owners: &OwnerCache) -> CoverSummary {
    let meta = task.metadata.as_ref();
    let title = task
        .title()
        .filter(|t| !t.is_empty())
        .unwrap_or("处理中或信息缺失")
        .to_string();
    let curator = meta
        .and_then(|m| m.curator_name.as_deref())
        .filter(|c| !c.is_empty());
    let owner = owners.display_owner(task).to_string();
    let status_text = task.status.label();

    let mut tooltip = title.clone();
    if let Some(curator) = curator {
        tooltip.push_str(&format!("\n创建者: {}", curator));
    }
    tooltip.push_str(&format!("\n状态: {}", status_text));
    let owner_text = if owner.is_empty() { "未知" } else { owner.as_str() };
    tooltip.push_str(&format!("\n用户: {}", owner_text));

    let alt = match curator {
        Some(curator) => format!("{} - {} ({})", title, curator, status_text),
        None => format!("{} ({})", title, status_text),
    };

    let template = meta
        .and_then(|m| m.artwork_url.as_deref())
        .filter(|t| !t.is_empty());

    CoverSummary {
        task_id: task.id.clone(),
        status: task.status,
        status_class: task.status.css_class(),
        title,
        owner,
        tooltip,
        alt,
        preview_url: template.map(artwork::preview_url),
        high_res_url: template.map(|t| artwork::high_res_url(t, task.link_kind())),
    }
}

/// 由现有元素和新列表计算改动: 先创建或更新，再删除未出现的元素，最后整体排序
pub fn plan_queue_ops(existing: &[String], summaries: Vec<CoverSummary>) -> Vec<QueueOp> {
    let existing_set: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(summaries.len());
    let mut ops = Vec::with_capacity(summaries.len() + 1);

    for summary in summaries {
        // 同一 id 重复出现时只保留第一次
        if !visited.insert(summary.task_id.clone()) {
            continue;
        }
        order.push(summary.task_id.clone());
        if existing_set.contains(summary.task_id.as_str()) {
            ops.push(QueueOp::Update(summary));
        } else {
            ops.push(QueueOp::Create(summary));
        }
    }

    ops.extend(
        existing
            .iter()
            .filter(|id| !visited.contains(*id))
            .map(|id| QueueOp::Remove(id.clone())),
    );
    ops.push(QueueOp::Reorder(order));
    ops
}

/// 把任务列表同步到队列视图，返回需要加载的高清封面
pub fn render_queue<Q: QueueView>(
    view: &mut Q,
    tasks: &[Task],
    owners: &OwnerCache,
    artwork: &mut ArtworkCache,
) -> Vec<ArtworkRequest> {
    let summaries = tasks.iter().map(|t| build_summary(t, owners)).collect();
    let ops = plan_queue_ops(&view.keys(), summaries);
    let mut requests = Vec::new();

    for op in ops {
        match op {
            QueueOp::Create(summary) => {
                let cached = summary
                    .high_res_url
                    .as_deref()
                    .and_then(|url| artwork.get_variant(&summary.task_id, url))
                    .map(|img| img.url.clone());
                let src = cached.clone().or_else(|| summary.preview_url.clone());
                view.create(&summary, src.as_deref());
                if cached.is_none()
                    && let Some(url) = &summary.high_res_url
                {
                    requests.push(ArtworkRequest {
                        task_id: summary.task_id.clone(),
                        url: url.clone(),
                    });
                }
            }
            QueueOp::Update(summary) => {
                view.update(&summary);
                if let Some(req) = refresh_image(view, &summary, artwork) {
                    requests.push(req);
                }
            }
            QueueOp::Remove(id) => view.remove(&id),
            QueueOp::Reorder(order) => view.reorder(&order),
        }
    }
    requests
}

// 当前图片既不是预览也不是所需的高清版本时 (封面模板或类型变了) 重新换图
fn refresh_image<Q: QueueView>(
    view: &mut Q,
    summary: &CoverSummary,
    artwork: &mut ArtworkCache,
) -> Option<ArtworkRequest> {
    let current = view.image_src(&summary.task_id);
    let current = current.as_deref();
    if current.is_some()
        && (current == summary.preview_url.as_deref() || current == summary.high_res_url.as_deref())
    {
        return None;
    }
    let Some(preview) = summary.preview_url.as_deref() else {
        return None;
    };
    view.set_image(&summary.task_id, preview);

    let url = summary.high_res_url.as_deref()?;
    if let Some(img) = artwork.get_variant(&summary.task_id, url) {
        let src = img.url.clone();
        view.set_image(&summary.task_id, &src);
        return None;
    }
    Some(ArtworkRequest {
        task_id: summary.task_id.clone(),
        url: url.to_string(),
    })
}

/// 高清封面加载完成: 写入缓存，元素仍存在时换上
pub fn on_artwork_loaded<Q: QueueView>(
    view: &mut Q,
    artwork: &mut ArtworkCache,
    task_id: &str,
    image: ArtworkImage,
) -> bool {
    let src = image.url.clone();
    artwork.insert(task_id, image);
    let applied = view.set_image(task_id, &src);
    if !applied {
        debug!("任务 {} 的封面元素已移除，只写入缓存", task_id);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkInfo, LinkKind, TaskMetadata, TaskStatus};
    use crate::view::memory::MemoryQueue;

    const TEMPLATE: &str = "https://img.example/{w}x{h}{c}.{f}";

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            status: TaskStatus::Running,
            owner: Some("alice".into()),
            metadata: Some(TaskMetadata {
                name: Some(format!("Album {}", id)),
                artwork_url: Some(TEMPLATE.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn render(view: &mut MemoryQueue, tasks: &[Task], artwork: &mut ArtworkCache) -> Vec<ArtworkRequest> {
        let mut owners = OwnerCache::default();
        for t in tasks {
            owners.observe(t);
        }
        render_queue(view, tasks, &owners, artwork)
    }

    #[test]
    fn test_reused_node_removed_node_and_final_order() {
        let mut view = MemoryQueue::default();
        let mut artwork = ArtworkCache::default();
        render(&mut view, &[task("a"), task("b")], &mut artwork);
        assert_eq!(view.created(), 2);

        render(&mut view, &[task("b"), task("c")], &mut artwork);
        assert_eq!(view.keys(), vec!["b", "c"]);
        assert!(view.node("a").is_none());
        // b 被复用，只新建了 c
        assert_eq!(view.created(), 3);
    }

    #[test]
    fn test_final_order_ignores_previous_order() {
        let lists: [&[&str]; 4] = [&["a", "b", "c"], &["c", "a"], &["d", "c", "b", "a"], &["b"]];
        for first in lists {
            for second in lists {
                let mut view = MemoryQueue::default();
                let mut artwork = ArtworkCache::default();
                let t1: Vec<_> = first.iter().map(|id| task(id)).collect();
                let t2: Vec<_> = second.iter().map(|id| task(id)).collect();
                render(&mut view, &t1, &mut artwork);
                render(&mut view, &t2, &mut artwork);
                assert_eq!(view.keys(), second.to_vec(), "{:?} -> {:?}", first, second);
            }
        }
    }

    #[test]
    fn test_plan_emits_remove_then_reorder() {
        let owners = OwnerCache::default();
        let summaries = vec![build_summary(&task("b"), &owners), build_summary(&task("c"), &owners)];
        let ops = plan_queue_ops(&["a".into(), "b".into()], summaries);
        assert!(matches!(&ops[0], QueueOp::Update(s) if s.task_id == "b"));
        assert!(matches!(&ops[1], QueueOp::Create(s) if s.task_id == "c"));
        assert_eq!(ops[2], QueueOp::Remove("a".into()));
        assert_eq!(ops[3], QueueOp::Reorder(vec!["b".into(), "c".into()]));
    }

    #[test]
    fn test_unchanged_list_causes_no_mutations() {
        let mut view = MemoryQueue::default();
        let mut artwork = ArtworkCache::default();
        let tasks = [task("a"), task("b")];
        render(&mut view, &tasks, &mut artwork);
        let before = view.mutations();
        render(&mut view, &tasks, &mut artwork);
        assert_eq!(view.mutations(), before);
    }

    #[test]
    fn test_summary_texts() {
        let mut t = task("p");
        t.status = TaskStatus::Finish;
        if let Some(meta) = t.metadata.as_mut() {
            meta.curator_name = Some("Curator".into());
        }
        let s = build_summary(&t, &OwnerCache::default());
        assert_eq!(s.tooltip, "Album p\n创建者: Curator\n状态: 已完成\n用户: alice");
        assert_eq!(s.alt, "Album p - Curator (已完成)");
        assert_eq!(s.status_class, "status-finish");

        let bare = Task {
            id: "x".into(),
            ..Default::default()
        };
        let s = build_summary(&bare, &OwnerCache::default());
        assert_eq!(s.title, "处理中或信息缺失");
        assert!(s.preview_url.is_none());
    }

    #[test]
    fn test_artwork_uses_preview_then_cached_high_res() {
        let mut view = MemoryQueue::default();
        let mut artwork = ArtworkCache::default();
        let requests = render(&mut view, &[task("a")], &mut artwork);
        let preview = artwork::preview_url(TEMPLATE);
        assert_eq!(view.image_src("a").as_deref(), Some(preview.as_str()));
        assert_eq!(requests.len(), 1);

        let image = ArtworkImage {
            url: requests[0].url.clone(),
            bytes: 42,
        };
        assert!(on_artwork_loaded(&mut view, &mut artwork, "a", image));
        assert_eq!(view.image_src("a"), Some(requests[0].url.clone()));

        // 重新创建的元素直接使用缓存
        let mut fresh = MemoryQueue::default();
        let requests = render(&mut fresh, &[task("a")], &mut artwork);
        assert!(requests.is_empty());
        assert_ne!(fresh.image_src("a").as_deref(), Some(preview.as_str()));
    }

    #[test]
    fn test_link_kind_change_requests_new_variant() {
        let mut view = MemoryQueue::default();
        let mut artwork = ArtworkCache::default();
        let requests = render(&mut view, &[task("a")], &mut artwork);
        let image = ArtworkImage {
            url: requests[0].url.clone(),
            bytes: 1,
        };
        on_artwork_loaded(&mut view, &mut artwork, "a", image);

        let mut video = task("a");
        video.link_info = Some(LinkInfo {
            kind: LinkKind::MusicVideo,
            ..Default::default()
        });
        let requests = render(&mut view, &[video], &mut artwork);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, artwork::high_res_url(TEMPLATE, LinkKind::MusicVideo));
        assert_eq!(view.image_src("a"), Some(artwork::preview_url(TEMPLATE)));
    }

    #[test]
    fn test_loaded_artwork_for_removed_node_only_fills_cache() {
        let mut view = MemoryQueue::default();
        let mut artwork = ArtworkCache::default();
        let image = ArtworkImage {
            url: "u".into(),
            bytes: 1,
        };
        assert!(!on_artwork_loaded(&mut view, &mut artwork, "gone", image));
        assert_eq!(artwork.len(), 1);
    }
}
