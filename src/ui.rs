// src/ui.rs

use crate::{
    constants,
    monitor::{Monitor, Presenter},
    reconcile::AggregateStatus,
    symbols,
    utils,
    view::{
        DetailLayout, TrackRow,
        memory::{DetailBody, MemoryDetail, MemoryQueue},
    },
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    io::{self, Write},
    time::Duration,
};

pub fn print_header(title: &str) {
    println!("\n{}", "═".repeat(constants::UI_WIDTH));
    println!(" {}", title.cyan().bold());
    println!("{}", "═".repeat(constants::UI_WIDTH));
}

pub fn print_sub_header(title: &str) {
    println!("\n--- {} ---", title.bold());
}

pub fn box_message(title: &str, content: &[&str], color_func: fn(ColoredString) -> ColoredString) {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", color_func(title.bold()));
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    for line in content {
        println!("  {}", line);
    }
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));
}

pub fn prompt(message: &str, default: Option<&str>) -> io::Result<String> {
    let default_str = default.map_or("".to_string(), |d| format!(" (默认: {})", d));
    print!("\n>>> {}{}: ", message, default_str);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();
    if input.is_empty() {
        Ok(default.unwrap_or("").to_string())
    } else {
        Ok(input)
    }
}

pub fn confirm(question: &str, default_yes: bool) -> bool {
    let options = if default_yes { "(Y/n)" } else { "(y/N)" };
    loop {
        match prompt(
            &format!("{} {} (按 {} 取消)", question, options, *symbols::CTRL_C),
            None,
        ) {
            Ok(choice) => {
                let choice = choice.to_lowercase();
                if choice == "y" {
                    return true;
                }
                if choice == "n" {
                    return false;
                }
                if choice.is_empty() {
                    return default_yes;
                }
                println!("{}", "无效输入，请输入 'y' 或 'n'。".red());
            }
            Err(_) => return false,
        }
    }
}

pub fn selection_menu(
    options: &[String],
    title: &str,
    instructions: &str,
    default_choice: &str,
) -> String {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", title.cyan().bold());
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));

    let pad = options.len().to_string().len();
    for (i, option) in options.iter().enumerate() {
        println!(
            "  [{}] {}",
            format!("{:<pad$}", i + 1, pad = pad).yellow(),
            option
        );
    }

    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {} (按 {} 可取消)", instructions, *symbols::CTRL_C);
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));

    prompt("请输入你的选择", Some(default_choice)).unwrap_or_default()
}

/// 返回被选中项的索引
pub fn get_user_choices_from_menu(
    options: &[String],
    title: &str,
    default_choice: &str,
) -> Vec<usize> {
    if options.is_empty() {
        return vec![];
    }
    let user_input = selection_menu(options, title, "支持格式: 1, 3, 2-4, all", default_choice);
    utils::parse_selection_indices(&user_input, options.len())
}

/// 等待网络请求时显示的转圈提示，调用方负责 `finish_and_clear`
pub fn new_spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn status_badge(status: &AggregateStatus) -> ColoredString {
    let label = format!("[{}]", status.label());
    match status {
        AggregateStatus::QueueComplete => label.green().bold(),
        AggregateStatus::Ready { clickable: true } => label.cyan().underline(),
        AggregateStatus::Ready { clickable: false } => label.cyan(),
        AggregateStatus::Active(_) => label.blue().bold(),
        AggregateStatus::Error(_) => label.red().bold(),
    }
}

/// 队列列表: 序号、状态、标题、用户
pub fn queue_lines(queue: &MemoryQueue) -> Vec<String> {
    if queue.nodes().is_empty() {
        return vec![format!("  {}", "(队列为空)".dimmed())];
    }
    queue
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let s = &node.summary;
            format!(
                "  {:>2}. {} {}  {}",
                i + 1,
                symbols::task_status(s.status),
                utils::truncate_text(&s.title, constants::TITLE_TRUNCATE_LENGTH),
                format!("@{}", if s.owner.is_empty() { "未知" } else { s.owner.as_str() }).dimmed()
            )
        })
        .collect()
}

fn row_line(row: &TrackRow) -> String {
    let mut line = format!(
        "  {} {}",
        utils::truncate_text(&row.title, constants::TITLE_TRUNCATE_LENGTH),
        row.quality.dimmed()
    );
    if let Some(lyrics) = row.lyrics {
        line.push_str(&format!(" {}", lyrics.dimmed()));
    }
    line.push_str(&format!(
        "  连接{} 解密{}",
        row.connect_icon.glyph(),
        row.decrypt_icon.glyph()
    ));
    if let Some(percent) = &row.percent_text {
        line.push_str(&format!(" {}", percent));
    }
    line.push_str(&format!(" {}", row.size_text));
    if let Some(err) = &row.error {
        line.push_str(&format!("\n      {}", err.red()));
    }
    line
}

/// 详情视图的全部文本行
pub fn detail_lines(detail: &MemoryDetail) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(owner) = &detail.owner_line {
        lines.push(format!("  {}", owner));
    }
    match &detail.body {
        DetailBody::Empty => {}
        DetailBody::NoTask => lines.push(format!("  {}", "请选择一个任务查看详情。".dimmed())),
        DetailBody::Invalid(text) => lines.push(format!("  {}", text.red())),
        DetailBody::Structured {
            status,
            header,
            layout,
            message,
            rows,
        } => {
            if let Some(bar) = status {
                lines.push(format!("  {}", bar.text.bold()));
            }
            lines.extend(header.iter().map(|h| format!("  {}", h)));
            if *layout == Some(DetailLayout::Video) {
                return lines;
            }
            if let Some(msg) = message {
                lines.push(format!("  {}", msg.dimmed()));
            }
            lines.extend(rows.iter().map(row_line));
        }
    }
    if let Some(loading) = &detail.loading {
        lines.push(format!("  {}", loading.dimmed()));
    }
    lines
}

/// 只在视图或徽标实际变化时重绘
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    last: Option<(usize, usize, String, bool)>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presenter<MemoryQueue, MemoryDetail> for TerminalPresenter {
    fn present(&mut self, monitor: &Monitor<MemoryQueue, MemoryDetail>) {
        let key = (
            monitor.queue().mutations(),
            monitor.detail().mutations(),
            monitor.status().label(),
            monitor.is_paused(),
        );
        if self.last.as_ref() == Some(&key) {
            return;
        }
        self.last = Some(key);

        let mut badge = status_badge(monitor.status()).to_string();
        if monitor.is_paused() {
            badge.push_str(&format!(" {}", "(已暂停)".yellow()));
        }
        print_header(&format!("任务队列 {}", badge));
        for line in queue_lines(monitor.queue()) {
            println!("{}", line);
        }
        if let Some(id) = monitor.state().focus.active_task() {
            print_sub_header(&format!("任务详情 {}", id));
            for line in detail_lines(monitor.detail()) {
                println!("{}", line);
            }
        }
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{CoverSummary, QueueView};

    #[test]
    fn test_queue_lines_number_entries() {
        colored::control::set_override(false);
        let mut queue = MemoryQueue::default();
        queue.create(
            &CoverSummary {
                task_id: "a".into(),
                status: crate::models::TaskStatus::Running,
                status_class: "status-running",
                title: "Album".into(),
                owner: "alice".into(),
                tooltip: String::new(),
                alt: String::new(),
                preview_url: None,
                high_res_url: None,
            },
            None,
        );
        let lines = queue_lines(&queue);
        assert_eq!(lines, vec!["   1. [>>] Album  @alice".to_string()]);
        assert!(queue_lines(&MemoryQueue::default())[0].contains("队列为空"));
    }

    #[test]
    fn test_detail_lines_show_invalid_text() {
        colored::control::set_override(false);
        let mut detail = MemoryDetail::default();
        detail.body = DetailBody::Invalid("任务数据无效或丢失。".into());
        assert_eq!(detail_lines(&detail), vec!["  任务数据无效或丢失。".to_string()]);
    }
}
