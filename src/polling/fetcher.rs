// src/polling/fetcher.rs

use crate::{
    client::{self, RobustClient},
    constants::api,
    error::{AppError, AppResult},
    models::Task,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Response;
use serde_json::Value;
use std::sync::Arc;

/// 任务列表的读取端。两个方法都是只读且幂等的。
#[async_trait]
pub trait TaskFetcher: Send + Sync {
    async fn fetch_short(&self) -> AppResult<Vec<Task>>;
    async fn fetch_long_poll(&self) -> AppResult<Vec<Task>>;
}

pub struct HttpTaskFetcher {
    client: Arc<RobustClient>,
}

impl HttpTaskFetcher {
    pub fn new(client: Arc<RobustClient>) -> Self {
        Self { client }
    }

    async fn read_tasks(
        &self,
        res: Response,
        status_msg: &str,
        shape_msg: &str,
    ) -> AppResult<Vec<Task>> {
        let url = res.url().to_string();
        let res = client::ensure_success(res, |status| {
            format!("{} ({})", status_msg, status.as_u16())
        })
        .await?;
        let text = res.text().await?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|source| AppError::ApiParseFailed { url: url.clone(), source })?;
        let items = client::expect_array(value, shape_msg)?;
        let tasks: Vec<Task> = serde_json::from_value(Value::Array(items))
            .map_err(|source| AppError::ApiParseFailed { url, source })?;

        // 没有 uuid 的条目无法建立索引，直接丢弃
        let total = tasks.len();
        let tasks: Vec<Task> = tasks.into_iter().filter(|t| !t.id.is_empty()).collect();
        if tasks.len() != total {
            warn!("任务列表中有 {} 个条目缺少 uuid，已忽略", total - tasks.len());
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskFetcher for HttpTaskFetcher {
    async fn fetch_short(&self) -> AppResult<Vec<Task>> {
        let url = self.client.url(api::TASK)?;
        debug!("短轮询: GET {}", url);
        // 轮询自带重试节奏，这里不走重试中间件
        let res = self.client.raw.get(url).send().await?;
        self.read_tasks(res, "获取任务列表失败", "无效的任务列表响应格式 (非数组)")
            .await
    }

    async fn fetch_long_poll(&self) -> AppResult<Vec<Task>> {
        let polling = self.client.config().polling;
        let mut url = self.client.url(api::TASK)?;
        url.query_pairs_mut()
            .append_pair("wait", "true")
            .append_pair("timeout", &polling.long_poll_server_wait_secs.to_string());
        debug!("长轮询: GET {}", url);
        let res = self
            .client
            .raw
            .get(url)
            .timeout(polling.long_poll_client_timeout())
            .send()
            .await?;
        self.read_tasks(res, "长轮询请求失败", "无效的长轮询响应格式 (非数组)")
            .await
    }
}
