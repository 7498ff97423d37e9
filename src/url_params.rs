// src/url_params.rs

//! `--monitor` / `--uuid` 参数的运行时状态，以及被页面状态保护拦下时写入的本地备份。

use crate::{constants, error::AppResult};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorParams {
    pub monitor: bool,
    pub uuid: Option<String>,
}

impl MonitorParams {
    pub fn new(monitor: bool, uuid: Option<String>) -> Self {
        Self {
            monitor,
            uuid: uuid.filter(|u| !u.trim().is_empty()),
        }
    }

    /// 指定了 uuid 或显式要求监视时自动打开详情
    pub fn should_auto_open(&self) -> bool {
        self.monitor || self.uuid.is_some()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        !self.monitor && self.uuid.is_none()
    }

    /// 打开详情时记录监视状态；未给出 uuid 时保留原值
    pub fn set_open(&mut self, uuid: Option<&str>) {
        self.monitor = true;
        if let Some(uuid) = uuid {
            self.uuid = Some(uuid.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.monitor = false;
        self.uuid = None;
    }

    pub fn to_backup(&self, source: &str) -> ParamBackup {
        ParamBackup {
            monitor: self.monitor.then(|| "true".to_string()),
            uuid: self.uuid.clone(),
            timestamp: Utc::now().timestamp_millis(),
            source: Some(source.to_string()),
        }
    }
}

/// 页面可见性与卸载状态。任一为真时不允许清除监视参数。
#[derive(Debug, Clone, Copy, Default)]
pub struct PageState {
    pub hidden: bool,
    pub unloading: bool,
}

impl PageState {
    pub fn is_guarded(&self) -> bool {
        self.hidden || self.unloading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamCheck {
    /// 参数有效或本来就没有
    Keep,
    Cleared,
    /// 应当清除，但页面处于保护状态，需要写备份
    Guarded,
}

/// 受页面状态保护的清除
pub fn safely_clear(params: &mut MonitorParams, page: &PageState, reason: &str) -> ParamCheck {
    if params.is_empty() {
        return ParamCheck::Keep;
    }
    if page.is_guarded() {
        info!("跳过监视参数清除 (页面状态保护): {}", reason);
        return ParamCheck::Guarded;
    }
    info!("清除监视参数: {}", reason);
    params.clear();
    ParamCheck::Cleared
}

/// 参数中的 uuid 在最新任务列表里不存在时尝试清除；只有 monitor 时视为有效
pub fn validate(
    params: &mut MonitorParams,
    page: &PageState,
    exists: impl Fn(&str) -> bool,
) -> ParamCheck {
    match params.uuid() {
        Some(uuid) if !exists(uuid) => {
            debug!("监视参数中的任务 {} 已不存在", uuid);
            safely_clear(params, page, "任务UUID不存在")
        }
        _ => ParamCheck::Keep,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamBackup {
    #[serde(default)]
    pub monitor: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    /// 毫秒时间戳
    pub timestamp: i64,
    #[serde(default)]
    pub source: Option<String>,
}

impl ParamBackup {
    pub fn into_params(self) -> MonitorParams {
        let monitor = matches!(self.monitor.as_deref(), Some("true") | Some("1"));
        MonitorParams::new(monitor, self.uuid)
    }
}

pub struct ParamBackupStore {
    path: PathBuf,
    ttl_ms: i64,
}

impl ParamBackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(constants::MONITOR_PARAMS_FILE_NAME),
            ttl_ms: constants::PARAM_BACKUP_TTL_SECS * 1000,
        }
    }

    pub fn save(&self, backup: &ParamBackup) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(backup)?)?;
        info!("已备份监视参数到 {}", self.path.display());
        Ok(())
    }

    /// 读出并删除备份。超过有效期或无法解析的备份同样删除，但不返回。
    pub fn take_fresh(&self, now_ms: i64) -> AppResult<Option<ParamBackup>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        self.remove()?;
        let backup: ParamBackup = match serde_json::from_str(&content) {
            Ok(b) => b,
            Err(e) => {
                warn!("监视参数备份无法解析，已丢弃: {}", e);
                return Ok(None);
            }
        };
        if now_ms - backup.timestamp > self.ttl_ms {
            debug!("监视参数备份已过期，已丢弃");
            return Ok(None);
        }
        Ok(Some(backup))
    }

    pub fn remove(&self) -> AppResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_clears_missing_uuid_unless_guarded() {
        let mut params = MonitorParams::new(true, Some("x".into()));
        let guarded = PageState {
            hidden: true,
            unloading: false,
        };
        assert_eq!(validate(&mut params, &guarded, |_| false), ParamCheck::Guarded);
        assert_eq!(params.uuid(), Some("x"));

        assert_eq!(validate(&mut params, &PageState::default(), |id| id == "x"), ParamCheck::Keep);
        assert_eq!(validate(&mut params, &PageState::default(), |_| false), ParamCheck::Cleared);
        assert!(params.is_empty());
    }

    #[test]
    fn test_monitor_without_uuid_is_valid() {
        let mut params = MonitorParams::new(true, None);
        assert!(params.should_auto_open());
        assert_eq!(validate(&mut params, &PageState::default(), |_| false), ParamCheck::Keep);
    }

    #[test]
    fn test_backup_roundtrip_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParamBackupStore::new(dir.path());
        let params = MonitorParams::new(true, Some("abc".into()));
        let backup = params.to_backup("unload");
        store.save(&backup).unwrap();

        let restored = store.take_fresh(backup.timestamp + 1_000).unwrap().unwrap();
        assert_eq!(restored.into_params(), params);
        // 读取后即删除
        assert!(store.take_fresh(backup.timestamp).unwrap().is_none());

        store.save(&backup).unwrap();
        assert!(store.take_fresh(backup.timestamp + 300_001).unwrap().is_none());
        assert!(!dir.path().join(constants::MONITOR_PARAMS_FILE_NAME).exists());
    }
}
