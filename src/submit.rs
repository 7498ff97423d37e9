// src/submit.rs

use crate::{
    client::{self, RobustClient},
    constants::{self, api},
    error::{AppError, AppResult},
    models::api::{SubmitItem, SubmitResponse, SubmitStatus},
    session::SessionClient,
};
use log::{debug, info, warn};
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n\s,;，；]+").unwrap());

/// 拆分后的输入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSplit {
    pub valid: Vec<String>,
    pub ignored: Vec<String>,
}

/// 按空白、中英文逗号和分号拆分，只接受 Apple Music 链接
pub fn split_links(raw: &str) -> LinkSplit {
    let (valid, ignored) = SEPARATOR_RE
        .split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .partition(|s| s.starts_with(constants::VALID_LINK_PREFIX));
    LinkSplit { valid, ignored }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub partial: bool,
    pub message: String,
    pub accepted: u32,
    pub failed: u32,
    pub failure_reasons: BTreeMap<String, u32>,
    /// 本地就被忽略的非 Apple Music 输入
    pub ignored: usize,
}

impl SubmissionSummary {
    fn from_response(res: SubmitResponse, ignored: usize) -> Self {
        Self {
            partial: res.status == Some(SubmitStatus::PartialSuccess),
            message: res.message.unwrap_or_else(|| "处理完成。".to_string()),
            accepted: res.accepted_count.unwrap_or(0),
            failed: res.failed_count.unwrap_or(0),
            failure_reasons: res.failure_summary.unwrap_or_default(),
            ignored,
        }
    }

    fn write_reasons(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed > 0 && !self.failure_reasons.is_empty() {
            writeln!(f, "失败原因统计:")?;
            for (reason, count) in &self.failure_reasons {
                writeln!(f, "- {}: {} 次", reason, count)?;
            }
        }
        Ok(())
    }

    /// 被服务端整体拒绝时的说明文字
    pub fn failure_text(&self) -> String {
        struct Failure<'a>(&'a SubmissionSummary);
        impl fmt::Display for Failure<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = self.0;
                writeln!(f, "后端消息: {}", s.message)?;
                writeln!(f, "接受任务: {} 个, 失败任务: {} 个。", s.accepted, s.failed)?;
                s.write_reasons(f)
            }
        }
        Failure(self).to_string().trim_end().to_string()
    }
}

impl fmt::Display for SubmissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "后端消息: {}", self.message)?;
        // 后端消息里已经带了计数时不再重复
        if !self.message.contains("接受") && !self.message.contains("失败") {
            writeln!(f, "接受任务: {} 个, 失败任务: {} 个。", self.accepted, self.failed)?;
        }
        if self.failed > 0 && self.failure_reasons.is_empty() {
            writeln!(f, "(未能获取详细失败原因统计)")?;
        }
        self.write_reasons(f)?;
        if self.ignored > 0 {
            write!(f, "(另有 {} 个非 Apple Music 输入被忽略)", self.ignored)?;
        }
        Ok(())
    }
}

/// 未登录时暂存的原始输入，登录后可以恢复
pub struct PendingInputStore {
    path: PathBuf,
}

impl PendingInputStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(constants::PENDING_INPUT_FILE_NAME),
        }
    }

    pub fn save(&self, raw: &str) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, raw)?;
        debug!("已暂存未提交的输入到 {:?}", self.path);
        Ok(())
    }

    pub fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn remove(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct Submitter {
    client: Arc<RobustClient>,
    session: SessionClient,
    pending: Option<PendingInputStore>,
}

impl Submitter {
    pub fn new(client: Arc<RobustClient>, pending: Option<PendingInputStore>) -> Self {
        Self {
            session: SessionClient::new(client.clone()),
            client,
            pending,
        }
    }

    pub async fn submit(&self, raw: &str, skip_check: bool) -> AppResult<SubmissionSummary> {
        let split = split_links(raw);
        if !split.ignored.is_empty() {
            warn!("忽略了 {} 个无效输入: {:?}", split.ignored.len(), split.ignored);
        }
        if split.valid.is_empty() {
            let msg = if split.ignored.is_empty() {
                "未检测到有效的 Apple Music 链接。"
            } else {
                "输入内容均不是有效的 Apple Music 链接！"
            };
            return Err(AppError::UserInputError(msg.to_string()));
        }

        if self.session.current_user().await?.is_none() {
            if let Some(store) = &self.pending
                && let Err(e) = store.save(raw)
            {
                warn!("暂存输入失败: {}", e);
            }
            return Err(AppError::NotAuthenticated);
        }

        let items: Vec<SubmitItem> = split
            .valid
            .iter()
            .map(|link| SubmitItem {
                link: link.clone(),
                skip_check,
            })
            .collect();
        info!("提交 {} 个链接 (skip_check={})", items.len(), skip_check);

        // 提交不是幂等操作，不走重试中间件
        let url = self.client.url(api::TASK)?;
        let res = self.client.raw.post(url.clone()).json(&items).send().await?;
        let res = client::ensure_success(res, |status| format!("请求失败 ({})", status.as_u16())).await?;
        let text = res.text().await?;
        let body: SubmitResponse = serde_json::from_str(&text).map_err(|source| {
            AppError::ApiParseFailed {
                url: url.to_string(),
                source,
            }
        })?;

        let status = body.status;
        let summary = SubmissionSummary::from_response(body, split.ignored.len());
        match status {
            Some(SubmitStatus::Success | SubmitStatus::PartialSuccess) => {
                if let Some(store) = &self.pending
                    && let Err(e) = store.remove()
                {
                    warn!("清除暂存输入失败: {}", e);
                }
                Ok(summary)
            }
            _ => Err(AppError::SubmissionRejected(summary.failure_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_links_on_mixed_separators() {
        let raw = "https://music.apple.com/a,https://music.apple.com/b；foo\n\n https://music.apple.com/c；；bar,";
        let split = split_links(raw);
        assert_eq!(
            split.valid,
            vec![
                "https://music.apple.com/a",
                "https://music.apple.com/b",
                "https://music.apple.com/c"
            ]
        );
        assert_eq!(split.ignored, vec!["foo", "bar"]);
        assert_eq!(split_links("  \n ,;"), LinkSplit::default());
    }

    fn summary(message: &str, failed: u32, reasons: &[(&str, u32)], ignored: usize) -> SubmissionSummary {
        SubmissionSummary {
            partial: failed > 0,
            message: message.into(),
            accepted: 2,
            failed,
            failure_reasons: reasons.iter().map(|(r, c)| (r.to_string(), *c)).collect(),
            ignored,
        }
    }

    #[test]
    fn test_summary_text() {
        let s = summary("已加入队列", 1, &[("重复任务", 1)], 2);
        assert_eq!(
            s.to_string(),
            "后端消息: 已加入队列\n接受任务: 2 个, 失败任务: 1 个。\n失败原因统计:\n- 重复任务: 1 次\n(另有 2 个非 Apple Music 输入被忽略)"
        );
        // 消息自带计数时不重复
        let s = summary("接受 2 个", 0, &[], 0);
        assert_eq!(s.to_string(), "后端消息: 接受 2 个\n");
        let s = summary("ok", 3, &[], 0);
        assert!(s.to_string().contains("(未能获取详细失败原因统计)"));
    }

    #[test]
    fn test_failure_text() {
        let s = summary("全部失败", 2, &[("链接无效", 2)], 0);
        assert_eq!(
            s.failure_text(),
            "后端消息: 全部失败\n接受任务: 2 个, 失败任务: 2 个。\n失败原因统计:\n- 链接无效: 2 次"
        );
    }

    #[test]
    fn test_pending_input_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingInputStore::new(dir.path());
        assert!(store.load().is_none());
        store.save("https://music.apple.com/x").unwrap();
        assert_eq!(store.load().as_deref(), Some("https://music.apple.com/x"));
        store.remove().unwrap();
        store.remove().unwrap();
        assert!(store.load().is_none());
    }
}
