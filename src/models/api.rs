// src/models/api.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- 任务提交 ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmitItem {
    pub link: String,
    pub skip_check: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Success,
    PartialSuccess,
    Failure,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SubmitResponse {
    pub status: Option<SubmitStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub accepted_count: Option<u32>,
    #[serde(default)]
    pub failed_count: Option<u32>,
    #[serde(default)]
    pub failure_summary: Option<BTreeMap<String, u32>>,
}

// --- 专辑搜索 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub results: SearchResults,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SearchResults {
    #[serde(default)]
    pub albums: Option<AlbumPage>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AlbumPage {
    #[serde(default)]
    pub data: Vec<AlbumItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AlbumItem {
    pub id: String,
    #[serde(default)]
    pub attributes: Option<AlbumAttributes>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlbumAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
}

// --- 封面识别 ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RecognitionCandidate {
    pub album_title: String,
    pub artist_name: String,
}

// --- 会话与头像 ---

#[derive(Deserialize, Debug, Clone)]
pub struct UserInfo {
    pub user: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AvatarResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub standard_username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// --- 通知 (SSE) ---

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    Connected,
    TaskCompleted {
        #[serde(rename = "type")]
        kind: NoticeKind,
        #[serde(default)]
        uuid: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        task_name: Option<String>,
        #[serde(default)]
        task_type: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
    },
}
