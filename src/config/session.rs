// src/config/session.rs

use crate::{
    config::ExternalConfig,
    constants,
    error::{AppError, AppResult},
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use std::{fs, path::PathBuf};

pub const SERVER_ENV: &str = "AMDL_SERVER";
pub const COOKIE_ENV: &str = "AMDL_COOKIE";

pub fn get_config_dir() -> AppResult<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME);
    Ok(dir)
}

pub(super) fn get_config_path() -> AppResult<PathBuf> {
    Ok(get_config_dir()?.join(constants::CONFIG_FILE_NAME))
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_path()?;
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))
            .map_err(AppError::from)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json_content = serde_json::to_string_pretty(&config)?;
        fs::write(&config_path, json_content)?;

        Ok(config)
    }
}

/// 按 命令行 → 环境变量 → 配置文件 的顺序查找，返回值和来源描述
fn resolve_setting(
    cli_value: Option<&str>,
    env_name: &str,
    file_value: Option<&str>,
) -> (Option<String>, String) {
    if let Some(value) = cli_value && !value.is_empty() {
        debug!("使用来自命令行参数的 {}", env_name);
        return (Some(value.to_string()), "命令行参数".to_string());
    }
    if let Ok(value) = std::env::var(env_name) && !value.is_empty() {
        debug!("使用来自环境变量 {} 的值", env_name);
        return (Some(value), format!("环境变量 ({})", env_name));
    }
    if let Some(value) = file_value && !value.is_empty() {
        debug!("使用来自本地配置文件的 {}", env_name);
        return (Some(value.to_string()), "本地配置文件".to_string());
    }
    (None, "未找到".to_string())
}

pub fn resolve_server(cli_server: Option<&str>, file_server: Option<&str>) -> (String, String) {
    match resolve_setting(cli_server, SERVER_ENV, file_server) {
        (Some(server), source) => (server, source),
        (None, _) => {
            debug!("未配置服务器地址，使用默认值");
            (constants::DEFAULT_SERVER_URL.to_string(), "默认值".to_string())
        }
    }
}

pub fn resolve_cookie(cli_cookie: Option<&str>, file_cookie: Option<&str>) -> (Option<String>, String) {
    resolve_setting(cli_cookie, COOKIE_ENV, file_cookie)
}
