// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const TITLE_TRUNCATE_LENGTH: usize = 48;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "amdl-monitor.log";
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const PENDING_INPUT_FILE_NAME: &str = "pending_input.txt";
pub const MONITOR_PARAMS_FILE_NAME: &str = "monitor_params.json";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const USER_AGENT: &str = concat!(clap::crate_name!(), "/", clap::crate_version!());

/// 任务提交只接受该前缀的链接
pub const VALID_LINK_PREFIX: &str = "https://music.apple.com/";
/// 尚未解析出用户时后端填充的占位用户名
pub const UNKNOWN_OWNER: &str = "unknown";

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const SEARCH_CACHE_TTL_SECS: u64 = 300;
pub const SEARCH_CACHE_CAPACITY: usize = 64;
/// 搜索结果最多浏览到这里
pub const MAX_SEARCH_RESULTS: u32 = 48;
pub const ARTWORK_CACHE_CAPACITY: usize = 256;
pub const PARAM_BACKUP_TTL_SECS: i64 = 300;

pub const NOTICE_RECONNECT_DELAY_MS: u64 = 3000;
pub const NOTICE_SUCCESS_DISPLAY_MS: u64 = 5000;
pub const NOTICE_ERROR_DISPLAY_MS: u64 = 8000;
pub const SESSION_RECHECK_INTERVAL_MS: u64 = 5000;
/// 提交成功后延迟多久触发一次轮询
pub const POST_SUBMIT_POLL_DELAY_MS: u64 = 200;

pub mod api {
    pub const TASK: &str = "/api/task";
    pub const SEARCH: &str = "/api/search";
    pub const RECOGNIZE: &str = "/api/gemini";
    pub const AVATAR: &str = "/api/user/avatar";
    pub const NOTICE: &str = "/api/progress/notice";
    pub const USERINFO: &str = "/oauth2/userinfo";
}

pub mod polling {
    pub const BASE_INTERVAL_MS: u64 = 1000;
    pub const IDLE_INTERVAL_MS: u64 = 5000;
    pub const ERROR_RETRY_MS: u64 = 2000;
    pub const LONG_POLL_HIT_MS: u64 = 1000;
    pub const LONG_POLL_EMPTY_MS: u64 = 3000;
    pub const RECENT_COMPLETION_WINDOW_MS: u64 = 10_000;
    pub const LONG_POLL_SERVER_WAIT_SECS: u64 = 30;
    pub const LONG_POLL_CLIENT_TIMEOUT_SECS: u64 = 60;
}

pub mod render {
    pub const FAST_RENDER_COUNT: usize = 3;
    pub const BATCH_SIZE: usize = 5;
    pub const FIRST_CONTINUATION_DELAY_MS: u64 = 200;
    pub const BATCH_SPACING_MS: u64 = 100;
    /// 距离底部多少 (像素) 以内视为 "停留在底部"
    pub const SCROLL_BOTTOM_THRESHOLD: usize = 30;
}

pub mod artwork {
    pub const PREVIEW_SIZE: (u32, u32) = (150, 150);
    pub const SQUARE_SIZE: (u32, u32) = (1200, 1200);
    pub const WIDE_SIZE: (u32, u32) = (1920, 1080);
    pub const FORMAT: &str = "jpg";
    pub const CROP: &str = "bf";
    pub const QUALITY: &str = "90";
}
