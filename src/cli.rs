// src/cli.rs

use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .args(&["watch", "submit", "batch_file", "search", "recognize", "notices", "whoami"]),
))]
pub struct Cli {
    // --- 运行模式 (Mode) ---
    /// 监视任务队列 (交互命令: open <序号|uuid>, close, pause, resume, clear-cache, submit <链接...>, quit)
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub watch: bool,
    /// 提交一个或多个 Apple Music 链接；不带参数时从标准输入读取
    #[arg(short, long, value_name = "LINK", num_args = 0.., help_heading = "Mode")]
    pub submit: Option<Vec<String>>,
    /// 从文本文件批量提交链接 (空白、逗号或分号分隔)
    #[arg(short, long, value_name = "FILE", help_heading = "Mode")]
    pub batch_file: Option<PathBuf>,
    /// 按关键词搜索专辑，可分页浏览并选择提交
    #[arg(long, value_name = "TERM", help_heading = "Mode")]
    pub search: Option<String>,
    /// 上传封面图片识别专辑，并以第一个候选结果搜索
    #[arg(long, value_name = "IMAGE", help_heading = "Mode")]
    pub recognize: Option<PathBuf>,
    /// 持续接收任务完成通知
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub notices: bool,
    /// 显示当前会话的用户信息
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub whoami: bool,

    // --- 选项 (Options) ---
    /// 后端服务器地址，优先级最高
    #[arg(long, value_name = "URL", help_heading = "Options")]
    pub server: Option<String>,
    /// 会话 Cookie (例如 'session=...')，优先级最高
    #[arg(long, help_heading = "Options")]
    pub cookie: Option<String>,
    /// [监视模式] 启动后自动打开该任务的详情
    #[arg(long, value_name = "UUID", help_heading = "Options")]
    pub uuid: Option<String>,
    /// [监视模式] 启动后打开最相关任务的详情
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub monitor: bool,
    /// [提交模式] 跳过服务端的存在性检查
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub skip_check: bool,
    /// [搜索模式] 每页结果数
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50), help_heading = "Options")]
    pub limit: Option<u32>,
    /// 窄屏布局: 详情视图不使用内部滚动
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub narrow: bool,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
