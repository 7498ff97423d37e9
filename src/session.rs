// src/session.rs

//! 登录会话: 当前用户、头像，以及监视模式下的周期性登录检查。

use crate::{
    client::RobustClient,
    constants::{self, api},
    error::{AppError, AppResult},
    models::api::{AvatarResponse, UserInfo},
    monitor::UiEvent,
};
use log::{debug, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user: String,
    /// 服务端规范化后的用户名，没有时与 `user` 相同
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct SessionClient {
    client: Arc<RobustClient>,
}

impl SessionClient {
    pub fn new(client: Arc<RobustClient>) -> Self {
        Self { client }
    }

    /// 当前登录的用户名；未登录 (401/403) 时返回 `None`
    pub async fn current_user(&self) -> AppResult<Option<String>> {
        let url = self.client.url(api::USERINFO)?;
        let value = match self.client.fetch_json(url).await {
            Ok(value) => value,
            Err(AppError::NotAuthenticated) => {
                debug!("会话未登录");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let info: UserInfo = serde_json::from_value(value)
            .map_err(|_| AppError::InvalidResponse("无法从响应中获取有效的用户信息。".into()))?;
        if info.user.trim().is_empty() {
            return Err(AppError::InvalidResponse("无法从响应中获取有效的用户信息。".into()));
        }
        Ok(Some(info.user))
    }

    pub async fn avatar(&self, username: &str) -> AppResult<AvatarResponse> {
        let mut url = self.client.url(api::AVATAR)?;
        url.query_pairs_mut().append_pair("username", username);
        let value = self.client.fetch_json(url).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 用户名加头像。头像获取失败不影响结果。
    pub async fn profile(&self) -> AppResult<Option<Profile>> {
        let Some(user) = self.current_user().await? else {
            return Ok(None);
        };
        let avatar = match self.avatar(&user).await {
            Ok(avatar) if avatar.status.as_deref() == Some("success") => Some(avatar),
            Ok(_) => None,
            Err(e) => {
                warn!("获取用户 {} 的头像失败: {}", user, e);
                None
            }
        };
        let display_name = avatar
            .as_ref()
            .and_then(|a| a.standard_username.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user.clone());
        Ok(Some(Profile {
            user,
            display_name,
            avatar_url: avatar.and_then(|a| a.avatar_url),
        }))
    }
}

/// 周期性检查登录状态，变化时通知监视器。取消或接收端关闭时退出。
pub async fn watch_session(
    session: SessionClient,
    mut logged_in: bool,
    events: mpsc::Sender<UiEvent>,
    token: CancellationToken,
) {
    let interval = Duration::from_millis(constants::SESSION_RECHECK_INTERVAL_MS);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        let now = match session.current_user().await {
            Ok(user) => user.is_some(),
            Err(e) => {
                debug!("登录状态检查失败: {}", e);
                continue;
            }
        };
        if now == logged_in {
            continue;
        }
        info!("登录状态变化: {} -> {}", logged_in, now);
        logged_in = now;
        if events.send(UiEvent::Session { logged_in }).await.is_err() {
            return;
        }
    }
}
