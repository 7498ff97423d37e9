// src/store.rs

use crate::models::{Task, TaskStatus};
use std::collections::HashMap;

/// 最近一次轮询得到的完整任务列表，保留后端给出的顺序，并按 id 建立索引。
#[derive(Debug, Default)]
pub struct TaskSnapshotStore {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换。列表中重复的 id 只保留第一次出现的，与队列视图一致。
    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.index = HashMap::with_capacity(tasks.len());
        self.tasks = Vec::with_capacity(tasks.len());
        for task in tasks {
            if self.index.contains_key(&task.id) {
                log::debug!("忽略重复的任务 {}", task.id);
                continue;
            }
            self.index.insert(task.id.clone(), self.tasks.len());
            self.tasks.push(task);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// 自动打开详情时选择的任务: 运行中的优先，其次最新的出错任务，再次最新完成的任务。
    pub fn pick_most_relevant(&self) -> Option<&Task> {
        if let Some(running) = self.tasks.iter().find(|t| t.status == TaskStatus::Running) {
            return Some(running);
        }
        let newest = |status: TaskStatus| {
            self.tasks
                .iter()
                .filter(|t| t.status == status)
                .max_by(|a, b| {
                    let a = a.added_at.unwrap_or(0.0);
                    let b = b.added_at.unwrap_or(0.0);
                    a.total_cmp(&b)
                })
        };
        newest(TaskStatus::Error).or_else(|| newest(TaskStatus::Finish))
    }
}

/// 按任务 id 缓存解析出的用户名，一旦写入不再覆盖。
#[derive(Debug, Default)]
pub struct OwnerCache {
    owners: HashMap<String, String>,
}

impl OwnerCache {
    pub fn observe(&mut self, task: &Task) {
        if let Some(owner) = task.resolved_owner() {
            self.owners
                .entry(task.id.clone())
                .or_insert_with(|| owner.to_string());
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.owners.get(id).map(String::as_str)
    }

    /// 优先使用缓存，其次任务自身携带的值
    pub fn display_owner<'a>(&'a self, task: &'a Task) -> &'a str {
        self.get(&task.id)
            .or_else(|| task.owner.as_deref())
            .unwrap_or(crate::constants::UNKNOWN_OWNER)
    }
}
