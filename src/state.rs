// src/state.rs

use crate::{
    artwork::ArtworkCache,
    polling::state::PollingState,
    store::{OwnerCache, TaskSnapshotStore},
    url_params::{MonitorParams, PageState},
};

/// 详情视图的关注状态。每次切换或关闭都会递增代数，延迟执行的更新凭代数判断是否过期。
#[derive(Debug, Default)]
pub struct FocusState {
    task_id: Option<String>,
    modal_active: bool,
    generation: u64,
}

impl FocusState {
    /// 打开详情并关注给定任务，返回新的代数
    pub fn open(&mut self, task_id: Option<String>) -> u64 {
        self.task_id = task_id;
        self.modal_active = true;
        self.generation += 1;
        self.generation
    }

    pub fn close(&mut self) {
        self.task_id = None;
        self.modal_active = false;
        self.generation += 1;
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn modal_active(&self) -> bool {
        self.modal_active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 只有详情可见且确实关注着某个任务时才允许改动详情视图
    pub fn active_task(&self) -> Option<&str> {
        if self.modal_active { self.task_id() } else { None }
    }

    /// 代数未变且仍关注同一任务
    pub fn still_focused(&self, task_id: &str, generation: u64) -> bool {
        self.generation == generation && self.active_task() == Some(task_id)
    }
}

/// 进程内唯一的一份应用状态，由 `Monitor` 持有并以引用传给各组件
#[derive(Default)]
pub struct AppState {
    pub store: TaskSnapshotStore,
    pub owners: OwnerCache,
    pub polling: PollingState,
    pub focus: FocusState,
    pub artwork: ArtworkCache,
    pub params: MonitorParams,
    pub page: PageState,
    /// 当前是否有已登录用户
    pub logged_in: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_invalidates_deferred_work() {
        let mut focus = FocusState::default();
        let gen_a = focus.open(Some("a".into()));
        assert!(focus.still_focused("a", gen_a));

        let gen_b = focus.open(Some("b".into()));
        assert!(!focus.still_focused("a", gen_a));
        assert!(focus.still_focused("b", gen_b));

        focus.close();
        assert!(!focus.still_focused("b", gen_b));
        assert_eq!(focus.active_task(), None);
    }
}
