// src/reconcile.rs

use crate::{
    models::{Task, TaskStatus},
    state::AppState,
    url_params::{self, ParamCheck},
};
use log::{debug, warn};
use tokio::time::Instant;

/// 状态徽标的聚合状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateStatus {
    /// 列表非空且全部结束
    QueueComplete,
    /// 列表为空；`clickable` 表示已登录，可以跳转
    Ready { clickable: bool },
    Active(usize),
    Error(String),
}

impl AggregateStatus {
    pub fn label(&self) -> String {
        match self {
            AggregateStatus::QueueComplete => "队列处理完毕".to_string(),
            AggregateStatus::Ready { .. } => "准备就绪".to_string(),
            AggregateStatus::Active(n) => format!("活动任务: {}", n),
            AggregateStatus::Error(msg) => msg.clone(),
        }
    }
}

/// 对详情视图的后续处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailAction {
    Idle,
    /// 在下一帧刷新；执行前需确认代数未变
    Refresh { task_id: String, generation: u64 },
    /// 关注的任务从快照中消失，保留最后一次的内容
    FocusLost { task_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub status: AggregateStatus,
    pub detail: DetailAction,
    pub params: ParamCheck,
    pub completion_edge: bool,
}

pub fn aggregate_status(tasks: &[Task], logged_in: bool) -> AggregateStatus {
    let active = tasks.iter().filter(|t| t.status == TaskStatus::Running).count();
    let all_done = !tasks.is_empty() && tasks.iter().all(|t| t.status.is_terminal());
    if all_done {
        AggregateStatus::QueueComplete
    } else if active == 0 && tasks.is_empty() {
        AggregateStatus::Ready {
            clickable: logged_in,
        }
    } else {
        AggregateStatus::Active(active)
    }
}

/// 把新抓取的任务列表合并进应用状态。
///
/// 整个过程同步完成，不做任何 I/O；队列渲染由调用方在此之后进行。
pub fn reconcile(state: &mut AppState, tasks: Vec<Task>, now: Instant) -> Reconciliation {
    // 先去重，之后的统计和视图都基于同一份快照
    state.store.replace(tasks);
    let status = aggregate_status(state.store.tasks(), state.logged_in);
    let running = state.store.running_count();
    let completion_edge = state.polling.observe_running(running, state.store.len(), now);
    if completion_edge {
        debug!("检测到任务完成，进入短轮询窗口");
    }

    for task in state.store.tasks() {
        state.owners.observe(task);
    }

    let mut params = url_params::validate(&mut state.params, &state.page, |id| {
        state.store.contains(id)
    });

    let focused = state.focus.active_task().map(str::to_string);
    let detail = match focused {
        Some(task_id) if state.store.contains(&task_id) => DetailAction::Refresh {
            task_id,
            generation: state.focus.generation(),
        },
        Some(task_id) => {
            warn!("关注的任务 {} 不在最新快照中，保留详情内容", task_id);
            if state.params.uuid() == Some(task_id.as_str()) {
                params = url_params::safely_clear(&mut state.params, &state.page, "任务不存在");
            }
            DetailAction::FocusLost { task_id }
        }
        None => DetailAction::Idle,
    };

    Reconciliation {
        status,
        detail,
        params,
        completion_edge,
    }
}
