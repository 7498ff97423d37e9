// src/symbols.rs

use crate::models::TaskStatus;
use colored::{ColoredString, Colorize};
use std::sync::LazyLock;

pub static OK: LazyLock<ColoredString> = LazyLock::new(|| "[OK]".green());
pub static ERROR: LazyLock<ColoredString> = LazyLock::new(|| "[X]".red());
pub static INFO: LazyLock<ColoredString> = LazyLock::new(|| "[i]".cyan());
pub static WARN: LazyLock<ColoredString> = LazyLock::new(|| "[!]".yellow());
pub static CTRL_C: LazyLock<ColoredString> = LazyLock::new(|| "Ctrl+C".yellow());

/// 队列列表中每个任务前的状态标记
pub fn task_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Ready => "[..]".dimmed(),
        TaskStatus::Running => "[>>]".blue(),
        TaskStatus::Finish => "[OK]".green(),
        TaskStatus::Error => "[X]".red(),
        TaskStatus::Unknown => "[??]".yellow(),
    }
}
