// src/main.rs

use amdl_monitor::{
    cli::{Cli, LogLevel},
    constants,
    error::AppError,
    run_from_cli,
};
use clap::{CommandFactory, FromArgMatches};
use colored::*;
use log::warn;
use std::{env, sync::Arc, time::Duration};

fn setup_logging(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }

    let filter = match level {
        LogLevel::Off => log::LevelFilter::Off,
        LogLevel::Error => log::LevelFilter::Error,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Trace => log::LevelFilter::Trace,
    };
    let app_name = clap::crate_name!();

    let log_file_path = match dirs::home_dir() {
        Some(home) => home
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::LOG_FILE_NAME),
        None => {
            eprintln!("警告: 无法获取用户主目录，日志将写入临时目录。");
            env::temp_dir().join(app_name).join(constants::LOG_FILE_NAME)
        }
    };
    if let Some(dir) = log_file_path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("警告: 无法创建日志目录 {:?}: {}", dir, e);
    }

    let file_appender = match fern::log_file(&log_file_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "警告: 无法打开日志文件 {:?} : {}。将尝试使用备用日志文件。",
                log_file_path, e
            );
            let fallback_path = env::temp_dir().join(format!(
                "{}-{}",
                app_name,
                constants::LOG_FALLBACK_FILE_NAME
            ));
            match fern::log_file(&fallback_path) {
                Ok(file) => {
                    warn!("日志将写入备用文件: {:?}", fallback_path);
                    file
                }
                Err(e) => {
                    eprintln!("错误: 无法创建备用日志文件 {:?}: {}", fallback_path, e);
                    return;
                }
            }
        }
    };

    let result = fern::Dispatch::new()
        .level(filter)
        // 第三方库的连接细节太吵
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("rustls", log::LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file_appender)
        .apply();
    if let Err(e) = result {
        eprintln!("警告: 日志系统初始化失败: {}", e);
    }
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "amdl-monitor".to_string());
    let after_help = format!(
        "示例:\n  # 监视任务队列，并打开正在运行的任务\n  {bin} -w --monitor\n\n  # 提交链接\n  {bin} -s \"https://music.apple.com/...\"\n\n  # 从文件批量提交\n  {bin} -b my_links.txt\n\n  # 搜索专辑并选择提交\n  {bin} --search \"1989\"\n\n  # 识别封面图片\n  {bin} --recognize cover.jpg",
        bin = bin_name
    );
    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };
    setup_logging(args.log_level);

    // 监视模式自己处理 Ctrl+C，以便保存监视参数
    if !args.watch {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n{} 用户强制中断程序。", "[!]".yellow());
                tokio::time::sleep(Duration::from_millis(100)).await;
                std::process::exit(130);
            }
        });
    }

    match run_from_cli(args).await {
        Ok(()) => {}
        Err(AppError::UserInterrupt) => {
            println!("\n{} 用户中断。", "[!]".yellow());
            std::process::exit(130);
        }
        Err(AppError::UserInputError(msg)) => {
            eprintln!("\n{} {}", "[X]".red(), msg.red());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
            std::process::exit(1);
        }
    }
}
