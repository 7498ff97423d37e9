// src/models/mod.rs

pub mod api;

use crate::constants;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// 后端偶尔会把字段写成 null，与缺省等价处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_disc_number() -> u32 {
    1
}

fn disc_number_or_one<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?
        .filter(|n| *n > 0)
        .unwrap_or(1))
}

// 1. 任务整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Ready,
    Running,
    Finish,
    Error,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Finish | TaskStatus::Error)
    }

    /// 封面上使用的状态类名
    pub fn css_class(self) -> &'static str {
        match self {
            TaskStatus::Ready => "status-ready",
            TaskStatus::Running => "status-running",
            TaskStatus::Finish => "status-finish",
            TaskStatus::Error => "status-error",
            TaskStatus::Unknown => "status-unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Ready => "等待中",
            TaskStatus::Running => "运行中",
            TaskStatus::Finish => "已完成",
            TaskStatus::Error => "错误",
            TaskStatus::Unknown => "未知状态",
        }
    }
}

// 2. 链接类型，决定布局和封面比例
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    Song,
    Album,
    Playlist,
    MusicVideo,
    #[default]
    #[serde(other)]
    Unknown,
}

impl LinkKind {
    pub fn is_video(self) -> bool {
        self == LinkKind::MusicVideo
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkInfo {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: LinkKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub storefront: Option<String>,
}

// 3. 单个音轨流水线阶段的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failed,
    Exists,
    /// 未知取值也按等待处理，必须放在最后
    #[default]
    #[serde(other)]
    Waiting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DownloadProgress {
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub percent: Option<f64>,
}

impl DownloadProgress {
    /// 仅当两个字节计数都存在且非零时才返回
    pub fn byte_counts(&self) -> Option<(u64, u64)> {
        match (self.current, self.total) {
            (Some(c), Some(t)) if c > 0 && t > 0 => Some((c, t)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default = "default_disc_number", deserialize_with = "disc_number_or_one")]
    pub disc_number: u32,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub disc_total: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "hasLyrics", default)]
    pub has_lyrics: Option<bool>,
    #[serde(default)]
    pub bit_depth: Option<u32>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connection_status: StageStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_status: StageStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub decryption_status: StageStatus,
    #[serde(default)]
    pub download_progress: Option<DownloadProgress>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub check_success: Option<bool>,
    #[serde(default)]
    pub song_id: Option<String>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            disc_number: 1,
            track_number: None,
            disc_total: None,
            name: None,
            has_lyrics: None,
            bit_depth: None,
            sample_rate: None,
            connection_status: StageStatus::Waiting,
            download_status: StageStatus::Waiting,
            decryption_status: StageStatus::Waiting,
            download_progress: None,
            error_message: None,
            check_success: None,
            song_id: None,
        }
    }
}

/// 音轨在一个任务内的唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TrackKey {
    pub disc: u32,
    pub track: u32,
}

impl TrackKey {
    pub fn sort_value(&self) -> u64 {
        self.disc as u64 * 1000 + self.track as u64
    }

    /// 同一张碟上的前一首，用于定位插入位置
    pub fn previous(&self) -> Option<TrackKey> {
        self.track.checked_sub(1).map(|track| TrackKey {
            disc: self.disc,
            track,
        })
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.disc, self.track)
    }
}

impl Track {
    /// 没有曲目编号的条目无法定位，渲染时跳过
    pub fn key(&self) -> Option<TrackKey> {
        self.track_number.map(|track| TrackKey {
            disc: self.disc_number,
            track,
        })
    }

    pub fn sort_value(&self) -> u64 {
        self.disc_number as u64 * 1000 + self.track_number.unwrap_or(0) as u64
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("未知曲目")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "artistName", default)]
    pub artist_name: Option<String>,
    #[serde(rename = "curatorName", default)]
    pub curator_name: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub tracks: Option<Vec<Track>>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Task {
    #[serde(rename = "uuid", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checking: bool,
    #[serde(rename = "user", default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_info: Option<LinkInfo>,
    #[serde(default)]
    pub metadata: Option<TaskMetadata>,
    #[serde(rename = "added_timestamp", default)]
    pub added_at: Option<f64>,
}

impl Task {
    pub fn link_kind(&self) -> LinkKind {
        self.link_info
            .as_ref()
            .map(|info| info.kind)
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.name.as_deref())
    }

    pub fn tracks(&self) -> Option<&[Track]> {
        self.metadata
            .as_ref()
            .and_then(|m| m.tracks.as_deref())
    }

    /// 已解析出的真实用户名，`unknown` 视为未解析
    pub fn resolved_owner(&self) -> Option<&str> {
        self.owner
            .as_deref()
            .filter(|u| !u.is_empty() && *u != constants::UNKNOWN_OWNER)
    }
}

// 4. 音轨的有效状态 (由三个阶段状态折叠而来)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveStatus {
    Waiting,
    Downloading,
    Decrypting,
    Completed,
    Exists,
    Failed,
}

impl EffectiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EffectiveStatus::Waiting => "waiting",
            EffectiveStatus::Downloading => "downloading",
            EffectiveStatus::Decrypting => "decrypting",
            EffectiveStatus::Completed => "completed",
            EffectiveStatus::Exists => "exists",
            EffectiveStatus::Failed => "failed",
        }
    }

    /// 是否已经结束 (成功、已存在)
    pub fn is_done(self) -> bool {
        matches!(self, EffectiveStatus::Completed | EffectiveStatus::Exists)
    }

    pub fn is_active(self) -> bool {
        matches!(self, EffectiveStatus::Downloading | EffectiveStatus::Decrypting)
    }
}

/// 仅用于展示的阶段状态，比 [`StageStatus`] 多一个 "进行中"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageDisplay {
    Waiting,
    Success,
    Failed,
    Exists,
    InProgress,
}

impl From<StageStatus> for StageDisplay {
    fn from(status: StageStatus) -> Self {
        match status {
            StageStatus::Waiting => StageDisplay::Waiting,
            StageStatus::Success => StageDisplay::Success,
            StageStatus::Failed => StageDisplay::Failed,
            StageStatus::Exists => StageDisplay::Exists,
        }
    }
}

/// 折叠结果: 有效状态 + 三个阶段在界面上的显示值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackState {
    pub effective: EffectiveStatus,
    pub connection: StageDisplay,
    pub download: StageDisplay,
    pub decryption: StageDisplay,
}

/// 按固定优先级折叠三个阶段状态，先命中者为准。
///
/// "已连接" 分支会把下载/解密的 *显示值* 改写为成功/进行中，
/// 原始记录保持不变。
pub fn derive_track_state(
    connection: StageStatus,
    download: StageStatus,
    decryption: StageStatus,
    has_error: bool,
    check_success: bool,
) -> TrackState {
    let mut state = TrackState {
        effective: EffectiveStatus::Waiting,
        connection: connection.into(),
        download: download.into(),
        decryption: decryption.into(),
    };

    state.effective = if download == StageStatus::Exists || decryption == StageStatus::Exists {
        EffectiveStatus::Exists
    } else if has_error
        || download == StageStatus::Failed
        || decryption == StageStatus::Failed
        || connection == StageStatus::Failed
    {
        EffectiveStatus::Failed
    } else if decryption == StageStatus::Success || check_success {
        EffectiveStatus::Completed
    } else if download == StageStatus::Success {
        EffectiveStatus::Decrypting
    } else if connection == StageStatus::Success {
        state.download = StageDisplay::Success;
        state.decryption = StageDisplay::InProgress;
        EffectiveStatus::Downloading
    } else {
        EffectiveStatus::Waiting
    };
    state
}

impl Track {
    pub fn state(&self) -> TrackState {
        derive_track_state(
            self.connection_status,
            self.download_status,
            self.decryption_status,
            self.error_message.as_deref().is_some_and(|m| !m.is_empty()),
            self.check_success == Some(true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGES: [StageStatus; 4] = [
        StageStatus::Waiting,
        StageStatus::Success,
        StageStatus::Failed,
        StageStatus::Exists,
    ];

    // 参照表: 直接按优先级逐条书写，与实现互相独立
    fn expected(c: StageStatus, d: StageStatus, x: StageStatus, err: bool, chk: bool) -> EffectiveStatus {
        use StageStatus::*;
        if d == Exists || x == Exists {
            return EffectiveStatus::Exists;
        }
        if err || d == Failed || x == Failed || c == Failed {
            return EffectiveStatus::Failed;
        }
        if x == Success || chk {
            return EffectiveStatus::Completed;
        }
        if d == Success {
            return EffectiveStatus::Decrypting;
        }
        if c == Success {
            return EffectiveStatus::Downloading;
        }
        EffectiveStatus::Waiting
    }

    #[test]
    fn test_effective_status_matches_precedence_for_all_combinations() {
        let mut checked = 0;
        for c in STAGES {
            for d in STAGES {
                for x in STAGES {
                    for err in [false, true] {
                        for chk in [false, true] {
                            let got = derive_track_state(c, d, x, err, chk);
                            assert_eq!(
                                got.effective,
                                expected(c, d, x, err, chk),
                                "conn={:?} dl={:?} dec={:?} err={} chk={}",
                                c, d, x, err, chk
                            );
                            checked += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(checked, 4 * 4 * 4 * 2 * 2);
    }

    #[test]
    fn test_connected_track_is_downloading_with_display_overrides() {
        let track = Track {
            track_number: Some(1),
            connection_status: StageStatus::Success,
            ..Default::default()
        };
        let state = track.state();
        assert_eq!(state.effective, EffectiveStatus::Downloading);
        assert_eq!(state.download, StageDisplay::Success);
        assert_eq!(state.decryption, StageDisplay::InProgress);
        // 原始记录不被改写
        assert_eq!(track.download_status, StageStatus::Waiting);
        assert_eq!(track.decryption_status, StageStatus::Waiting);
    }

    #[test]
    fn test_display_values_untouched_outside_connected_branch() {
        let state = derive_track_state(
            StageStatus::Success,
            StageStatus::Success,
            StageStatus::Waiting,
            false,
            false,
        );
        assert_eq!(state.effective, EffectiveStatus::Decrypting);
        assert_eq!(state.decryption, StageDisplay::Waiting);
    }

    #[test]
    fn test_task_deserializes_backend_shape_with_nulls() {
        let json = r#"{
            "uuid": "t-1",
            "status": "running",
            "checking": null,
            "user": "unknown",
            "link_info": {"type": "music-video", "id": "123"},
            "added_timestamp": 1700000000.5,
            "metadata": {
                "name": "Album",
                "artistName": "Artist",
                "artwork_url": "https://img/{w}x{h}bb.{f}",
                "tracks": [
                    {"track_number": 2, "disc_number": null, "name": "B",
                     "connection_status": "success", "download_status": null,
                     "decryption_status": "decrypting", "hasLyrics": true}
                ]
            }
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "t-1");
        assert_eq!(task.status, TaskStatus::Running);
        assert!(!task.checking);
        assert_eq!(task.resolved_owner(), None);
        assert_eq!(task.link_kind(), LinkKind::MusicVideo);
        let track = &task.tracks().unwrap()[0];
        assert_eq!(track.disc_number, 1);
        assert_eq!(track.download_status, StageStatus::Waiting);
        // 未知阶段值按 waiting 处理
        assert_eq!(track.decryption_status, StageStatus::Waiting);
        assert_eq!(track.key(), Some(TrackKey { disc: 1, track: 2 }));
    }

    #[test]
    fn test_stage_status_values() {
        let parse = |raw: &str| serde_json::from_str::<StageStatus>(raw).unwrap();
        assert_eq!(parse(r#""success""#), StageStatus::Success);
        assert_eq!(parse(r#""failed""#), StageStatus::Failed);
        assert_eq!(parse(r#""exists""#), StageStatus::Exists);
        assert_eq!(parse(r#""waiting""#), StageStatus::Waiting);
        assert_eq!(parse(r#""downloading""#), StageStatus::Waiting);
        assert_eq!(serde_json::to_string(&StageStatus::Waiting).unwrap(), r#""waiting""#);
        assert_eq!(StageStatus::default(), StageStatus::Waiting);
    }

    #[test]
    fn test_unknown_status_and_link_kind_fall_back() {
        let task: Task =
            serde_json::from_str(r#"{"uuid":"x","status":"paused","link_info":{"type":"station"}}"#)
                .unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(task.link_kind(), LinkKind::Unknown);
    }
}
