// src/config.rs

pub mod session;

use self::session::load_or_create_external_config;
use crate::{
    cli::Cli,
    constants::{self, polling, render},
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// 轮询节奏，所有时间均可在配置文件中覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub base_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub error_retry_ms: u64,
    pub long_poll_hit_ms: u64,
    pub long_poll_empty_ms: u64,
    pub recent_completion_window_ms: u64,
    pub long_poll_server_wait_secs: u64,
    pub long_poll_client_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: polling::BASE_INTERVAL_MS,
            idle_interval_ms: polling::IDLE_INTERVAL_MS,
            error_retry_ms: polling::ERROR_RETRY_MS,
            long_poll_hit_ms: polling::LONG_POLL_HIT_MS,
            long_poll_empty_ms: polling::LONG_POLL_EMPTY_MS,
            recent_completion_window_ms: polling::RECENT_COMPLETION_WINDOW_MS,
            long_poll_server_wait_secs: polling::LONG_POLL_SERVER_WAIT_SECS,
            long_poll_client_timeout_secs: polling::LONG_POLL_CLIENT_TIMEOUT_SECS,
        }
    }
}

impl PollingConfig {
    /// 客户端超时必须严格大于服务端等待时间，保证总能先收到服务端的超时响应
    pub fn validate(&self) -> AppResult<()> {
        if self.long_poll_client_timeout_secs <= self.long_poll_server_wait_secs {
            return Err(AppError::Config(format!(
                "长轮询客户端超时 ({}s) 必须大于服务端等待时间 ({}s)",
                self.long_poll_client_timeout_secs, self.long_poll_server_wait_secs
            )));
        }
        if self.base_interval_ms == 0 {
            return Err(AppError::Config("轮询基础间隔不能为 0".to_string()));
        }
        Ok(())
    }

    pub fn recent_completion_window(&self) -> Duration {
        Duration::from_millis(self.recent_completion_window_ms)
    }

    pub fn long_poll_client_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_client_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub fast_render_count: usize,
    pub batch_size: usize,
    pub first_continuation_delay_ms: u64,
    pub batch_spacing_ms: u64,
    pub scroll_bottom_threshold: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fast_render_count: render::FAST_RENDER_COUNT,
            batch_size: render::BATCH_SIZE,
            first_continuation_delay_ms: render::FIRST_CONTINUATION_DELAY_MS,
            batch_spacing_ms: render::BATCH_SPACING_MS,
            scroll_bottom_threshold: render::SCROLL_BOTTOM_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        let network_config = NetworkConfig {
            connect_timeout_secs: Some(10),
            timeout_secs: Some(30),
            max_retries: Some(3),
        };

        Self {
            server_url: Some(constants::DEFAULT_SERVER_URL.to_string()),
            session_cookie: None,
            network: network_config,
            polling: PollingConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: Url,
    pub session_cookie: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub polling: PollingConfig,
    pub render: RenderConfig,
    /// 窄屏布局: 详情视图不使用内部滚动
    pub narrow_layout: bool,
    pub skip_check: bool,
    pub search_limit: u32,
    /// 本地备份文件所在目录，`None` 表示不落盘
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;

        let (server, source) =
            session::resolve_server(args.server.as_deref(), external_config.server_url.as_deref());
        log::info!("使用来自 {} 的服务器地址: {}", source, server);
        let (session_cookie, cookie_source) = session::resolve_cookie(
            args.cookie.as_deref(),
            external_config.session_cookie.as_deref(),
        );
        log::debug!("会话 Cookie 来源: {}", cookie_source);

        external_config.polling.validate()?;

        Ok(Self {
            server_url: parse_server_url(&server)?,
            session_cookie,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(
                external_config.network.connect_timeout_secs.unwrap_or(10),
            ),
            timeout: Duration::from_secs(external_config.network.timeout_secs.unwrap_or(30)),
            max_retries: external_config.network.max_retries.unwrap_or(3),
            polling: external_config.polling,
            render: external_config.render,
            narrow_layout: args.narrow,
            skip_check: args.skip_check,
            search_limit: args.limit.unwrap_or(constants::DEFAULT_SEARCH_LIMIT),
            data_dir: session::get_config_dir().ok(),
        })
    }

    /// 不读写任何文件，直接指向给定服务器
    pub fn for_server(server: &str) -> AppResult<Self> {
        Ok(Self {
            server_url: parse_server_url(server)?,
            session_cookie: None,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 0,
            polling: PollingConfig::default(),
            render: RenderConfig::default(),
            narrow_layout: false,
            skip_check: false,
            search_limit: constants::DEFAULT_SEARCH_LIMIT,
            data_dir: None,
        })
    }

    /// 拼接 API 路径，保留服务器地址上可能存在的子路径
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        Ok(self.server_url.join(path.trim_start_matches('/'))?)
    }
}

fn parse_server_url(raw: &str) -> AppResult<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!("不支持的服务器地址协议: {}", url.scheme())));
    }
    Ok(url)
}
