// src/client.rs

use crate::{config::AppConfig, error::*};
use reqwest::{
    Response, StatusCode,
    header::{COOKIE, HeaderMap, HeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// 带重试的用于一次性请求，不带重试的用于轮询这种需要快速失败的场景；
/// `stream` 没有整体超时，只用于通知这类长连接。
#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
    pub raw: reqwest::Client,
    pub stream: reqwest::Client,
    config: Arc<AppConfig>,
}

impl RobustClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| AppError::Config(format!("会话 Cookie 含有非法字符: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let raw = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;
        let stream = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(raw.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            raw,
            stream,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> AppResult<Url> {
        self.config.endpoint(path)
    }

    /// 带重试的 GET，返回已确认成功的响应
    pub async fn get(&self, url: Url) -> AppResult<Response> {
        let res = self.client.get(url).send().await?;
        if res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::FORBIDDEN {
            return Err(AppError::NotAuthenticated);
        }
        ensure_success(res, |status| format!("请求失败 ({})", status.as_u16())).await
    }

    pub async fn fetch_json(&self, url: Url) -> AppResult<Value> {
        let url_str = url.to_string();
        let text = self.get(url).await?.text().await?;
        serde_json::from_str(&text).map_err(|source| AppError::ApiParseFailed {
            url: url_str,
            source,
        })
    }
}

/// 从错误响应体中提取服务器给出的说明，依次尝试 `error` 和 `message` 字段
pub fn server_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
}

/// 非 2xx 时转换为 [`AppError::Http`]，优先使用服务器给出的错误信息
pub async fn ensure_success(
    res: Response,
    fallback: impl FnOnce(StatusCode) -> String,
) -> AppResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = server_error_message(&body).unwrap_or_else(|| fallback(status));
    log::warn!("服务器返回 {}: {}", status, message);
    Err(AppError::Http {
        status: status.as_u16(),
        message,
    })
}

/// 把 JSON 值校验为数组，否则返回给定的错误描述
pub fn expect_array(value: Value, what: &str) -> AppResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => {
            log::warn!("{}: {}", what, other);
            Err(AppError::InvalidResponse(what.to_string()))
        }
    }
}
