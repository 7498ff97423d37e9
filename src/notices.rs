// src/notices.rs

//! 任务完成通知 (SSE)。断线后等待固定时间重连，直到被取消。

use crate::{
    client::{self, RobustClient},
    constants::{self, api},
    error::AppResult,
    models::api::{Notice, NoticeKind},
};
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 增量解析 SSE 字节流，按空行切分事件，返回每个事件的 `data` 内容
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            // 注释行
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            if field == "data" {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        events
    }
}

pub fn parse_notice(data: &str) -> Option<Notice> {
    match serde_json::from_str::<Notice>(data) {
        Ok(notice) => Some(notice),
        Err(e) => {
            warn!("解析通知数据失败: {} ({})", e, data);
            None
        }
    }
}

/// 一条通知在界面上的展示方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeDisplay {
    pub success: bool,
    pub title: &'static str,
    pub message: String,
    pub task_type: Option<String>,
    pub duration: Duration,
}

impl NoticeDisplay {
    /// 握手消息不需要展示
    pub fn from_notice(notice: &Notice) -> Option<Self> {
        let Notice::TaskCompleted {
            kind,
            message,
            task_name,
            task_type,
            ..
        } = notice
        else {
            return None;
        };
        let success = *kind == NoticeKind::Success;
        let message = message
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| task_name.clone())
            .unwrap_or_default();
        Some(Self {
            success,
            title: if success { "任务完成" } else { "任务失败" },
            message,
            task_type: task_type.clone().filter(|t| !t.is_empty()),
            duration: Duration::from_millis(if success {
                constants::NOTICE_SUCCESS_DISPLAY_MS
            } else {
                constants::NOTICE_ERROR_DISPLAY_MS
            }),
        })
    }
}

async fn stream_once(
    client: &RobustClient,
    tx: &mpsc::Sender<Notice>,
    token: &CancellationToken,
) -> AppResult<()> {
    let url = client.url(api::NOTICE)?;
    debug!("连接通知流: {}", url);
    let res = client
        .stream
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    let res = client::ensure_success(res, |status| format!("通知连接失败 ({})", status.as_u16())).await?;
    info!("通知连接已建立");

    let mut parser = SseParser::new();
    let mut body = res.bytes_stream();
    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else {
            debug!("通知流被服务端关闭");
            return Ok(());
        };
        for data in parser.push(&chunk?) {
            let Some(notice) = parse_notice(&data) else {
                continue;
            };
            if notice == Notice::Connected {
                debug!("通知流握手成功");
                continue;
            }
            if tx.send(notice).await.is_err() {
                token.cancel();
                return Ok(());
            }
        }
    }
}

/// 持续接收通知直到取消或接收端关闭
pub async fn listen(client: Arc<RobustClient>, tx: mpsc::Sender<Notice>, token: CancellationToken) {
    let delay = Duration::from_millis(constants::NOTICE_RECONNECT_DELAY_MS);
    while !token.is_cancelled() {
        if let Err(e) = stream_once(&client, &tx, &token).await {
            warn!("通知连接出错: {}", e);
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => debug!("重试通知连接"),
        }
    }
    debug!("通知监听已停止");
}
