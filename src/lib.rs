// src/lib.rs

pub mod artwork;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notices;
pub mod polling;
pub mod recognize;
pub mod reconcile;
pub mod search;
pub mod session;
pub mod state;
pub mod store;
pub mod submit;
pub mod symbols;
pub mod ui;
pub mod url_params;
pub mod utils;
pub mod view;

use crate::{
    artwork::HttpArtworkLoader,
    cli::Cli,
    client::RobustClient,
    config::AppConfig,
    error::{AppError, AppResult},
    models::api::Notice,
    monitor::{Monitor, UiEvent},
    notices::NoticeDisplay,
    polling::fetcher::HttpTaskFetcher,
    search::SearchClient,
    session::SessionClient,
    submit::{PendingInputStore, SubmissionSummary, Submitter},
    ui::TerminalPresenter,
    url_params::MonitorParams,
    view::memory::{MemoryDetail, MemoryQueue},
};
use colored::*;
use log::{debug, info, warn};
use std::{path::Path, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);

    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);
    let client = Arc::new(RobustClient::new(config.clone())?);

    if args.watch {
        run_watch(&args, config, client).await
    } else if let Some(links) = &args.submit {
        let raw = if links.is_empty() {
            read_links_interactively(&config)?
        } else {
            links.join("\n")
        };
        submit_and_report(&config, client, &raw).await.map(drop)
    } else if let Some(batch_file) = &args.batch_file {
        let raw = read_batch_file(batch_file)?;
        submit_and_report(&config, client, &raw).await.map(drop)
    } else if let Some(term) = &args.search {
        run_search(&config, client, term).await
    } else if let Some(image) = &args.recognize {
        run_recognize(&config, client, image).await
    } else if args.notices {
        run_notices(client).await
    } else if args.whoami {
        run_whoami(client).await
    } else {
        Ok(())
    }
}

fn pending_store(config: &AppConfig) -> Option<PendingInputStore> {
    config.data_dir.as_ref().map(PendingInputStore::new)
}

fn read_batch_file(batch_file: &Path) -> AppResult<String> {
    let content = std::fs::read_to_string(batch_file).map_err(|e| {
        log::error!("读取批量文件 '{}' 失败: {}", batch_file.display(), e);
        AppError::from(e)
    })?;
    if content.trim().is_empty() {
        return Err(AppError::UserInputError(format!(
            "批量文件 '{}' 为空。",
            batch_file.display()
        )));
    }
    Ok(content)
}

/// 没有给出链接时: 先询问是否恢复上次暂存的输入，否则逐行读取直到空行
fn read_links_interactively(config: &AppConfig) -> AppResult<String> {
    if let Some(pending) = pending_store(config).and_then(|s| s.load()) {
        println!(
            "\n{} 发现上次未提交的输入 ({} 个字符)。",
            *symbols::INFO,
            pending.chars().count()
        );
        if ui::confirm("是否恢复并提交?", true) {
            return Ok(pending);
        }
    }

    println!("{} 请逐行输入链接，空行结束。", *symbols::INFO);
    let mut lines = Vec::new();
    loop {
        match ui::prompt("链接", None) {
            Ok(line) if !line.is_empty() => lines.push(line),
            Ok(_) => break,
            Err(_) => return Err(AppError::UserInterrupt),
        }
    }
    Ok(lines.join("\n"))
}

async fn submit_and_report(
    config: &AppConfig,
    client: Arc<RobustClient>,
    raw: &str,
) -> AppResult<SubmissionSummary> {
    let submitter = Submitter::new(client, pending_store(config));
    let spinner = ui::new_spinner("正在提交任务...");
    let result = submitter.submit(raw, config.skip_check).await;
    spinner.finish_and_clear();

    match &result {
        Ok(summary) => {
            let text = summary.to_string();
            let lines: Vec<&str> = text.lines().collect();
            let title = if summary.partial { "任务部分提交成功" } else { "任务提交成功" };
            ui::box_message(title, &lines, |s| s.green());
        }
        Err(AppError::NotAuthenticated) => {
            println!(
                "\n{} 未登录，输入内容已暂存，登录后再次运行 --submit 即可恢复。",
                *symbols::WARN
            );
        }
        Err(_) => {}
    }
    result
}

async fn run_search(config: &AppConfig, client: Arc<RobustClient>, term: &str) -> AppResult<()> {
    let searcher = SearchClient::new(client.clone(), config.search_limit);
    let mut offset = 0;

    loop {
        let spinner = ui::new_spinner(&format!("正在搜索 '{}'...", term));
        let page = searcher.page(term, offset).await;
        spinner.finish_and_clear();
        let page = page?;

        if page.albums.is_empty() {
            println!("\n{} 没有找到与 '{}' 相关的专辑。", *symbols::INFO, term);
            return Ok(());
        }
        searcher.prefetch(term, &page);

        let options: Vec<String> = page.albums.iter().map(search::album_label).collect();
        let more = page
            .next_offset
            .filter(|next| *next < constants::MAX_SEARCH_RESULTS);
        let instructions = if more.is_some() {
            "输入序号提交 (支持 1, 3, 2-4, all)，输入 n 查看下一页，直接回车退出"
        } else {
            "输入序号提交 (支持 1, 3, 2-4, all)，直接回车退出"
        };
        let title = format!("搜索结果: {} (第 {} 项起)", term, page.offset + 1);
        let choice = ui::selection_menu(&options, &title, instructions, "");
        let choice = choice.trim();

        if choice.is_empty() {
            return Ok(());
        }
        if choice.eq_ignore_ascii_case("n") {
            match more {
                Some(next) => offset = next,
                None => println!("{} 已经是最后一页。", *symbols::INFO),
            }
            continue;
        }

        let links: Vec<String> = utils::parse_selection_indices(choice, page.albums.len())
            .into_iter()
            .filter_map(|i| page.albums[i].attributes.as_ref()?.url.clone())
            .collect();
        if links.is_empty() {
            println!("{} 无效的选择 '{}'。", *symbols::WARN, choice);
            continue;
        }
        return submit_and_report(config, client, &links.join("\n")).await.map(drop);
    }
}

async fn run_recognize(config: &AppConfig, client: Arc<RobustClient>, image: &Path) -> AppResult<()> {
    let spinner = ui::new_spinner("正在识别封面...");
    let candidates = recognize::recognize_cover(&client, image).await;
    spinner.finish_and_clear();
    let candidates = candidates?;

    if candidates.is_empty() {
        println!("\n{} 识别完成，但未找到相关专辑信息。", *symbols::INFO);
        return Ok(());
    }
    // 只有一个候选时直接搜索
    let chosen = if candidates.len() == 1 {
        &candidates[0]
    } else {
        let options: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} - {}", c.album_title, c.artist_name))
            .collect();
        let picked = ui::get_user_choices_from_menu(&options, "识别结果", "1");
        match picked.first() {
            Some(&i) => &candidates[i],
            None => return Ok(()),
        }
    };
    let term = recognize::search_term(chosen);
    println!("\n{} 使用 '{}' 进行搜索。", *symbols::INFO, term);
    run_search(config, client, &term).await
}

fn print_notice(notice: &Notice) {
    let Some(display) = NoticeDisplay::from_notice(notice) else {
        return;
    };
    let symbol = if display.success { &*symbols::OK } else { &*symbols::ERROR };
    let task_type = display
        .task_type
        .as_deref()
        .map(|t| format!(" [{}]", t))
        .unwrap_or_default();
    println!("{} {}{}: {}", symbol, display.title.bold(), task_type, display.message);
}

async fn run_notices(client: Arc<RobustClient>) -> AppResult<()> {
    ui::print_header(&format!("任务完成通知 (按 {} 退出)", *symbols::CTRL_C));
    let (tx, mut rx) = mpsc::channel(16);
    let token = CancellationToken::new();
    let listener = tokio::spawn(notices::listen(client, tx, token.clone()));
    while let Some(notice) = rx.recv().await {
        print_notice(&notice);
    }
    token.cancel();
    let _ = listener.await;
    Ok(())
}

async fn run_whoami(client: Arc<RobustClient>) -> AppResult<()> {
    let session = SessionClient::new(client);
    let profile = session.profile().await?.ok_or(AppError::NotAuthenticated)?;
    let user_line = format!("用户: {}", profile.display_name);
    let avatar_line = format!(
        "头像: {}",
        profile.avatar_url.as_deref().unwrap_or("(未设置)")
    );
    ui::box_message("当前会话", &[user_line.as_str(), avatar_line.as_str()], |s| s.cyan());
    Ok(())
}

async fn run_watch(args: &Cli, config: Arc<AppConfig>, client: Arc<RobustClient>) -> AppResult<()> {
    let session = SessionClient::new(client.clone());
    let logged_in = match session.current_user().await {
        Ok(Some(user)) => {
            info!("当前用户: {}", user);
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("检查登录状态失败: {}", e);
            false
        }
    };

    let mut monitor = Monitor::new(
        &config,
        MemoryQueue::default(),
        MemoryDetail::default(),
        Arc::new(HttpTaskFetcher::new(client.clone())),
        Arc::new(HttpArtworkLoader::new(client.clone())),
    )
    .with_params(MonitorParams::new(args.monitor, args.uuid.clone()));
    monitor.set_logged_in(logged_in);
    if !logged_in {
        println!(
            "\n{} 未登录，轮询已暂停；登录后会自动恢复。",
            *symbols::WARN
        );
        monitor.pause();
    }

    let (tx, rx) = mpsc::channel(32);
    let token = CancellationToken::new();

    let submitter = Arc::new(Submitter::new(client.clone(), pending_store(&config)));
    tokio::spawn(read_commands(tx.clone(), token.clone(), submitter, config.skip_check));
    tokio::spawn(session::watch_session(session, logged_in, tx.clone(), token.clone()));
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(UiEvent::Unload).await;
            }
        });
    }
    let (notice_tx, mut notice_rx) = mpsc::channel(16);
    tokio::spawn(notices::listen(client, notice_tx, token.clone()));
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            print_notice(&notice);
        }
    });
    drop(tx);

    println!(
        "{} 命令: open <序号|uuid>, close, pause, resume, clear-cache, submit <链接...>, quit",
        *symbols::INFO
    );
    let mut presenter = TerminalPresenter::new();
    monitor.run(rx, &mut presenter).await;
    token.cancel();

    if monitor.state().page.unloading {
        return Err(AppError::UserInterrupt);
    }
    Ok(())
}

async fn read_commands(
    tx: mpsc::Sender<UiEvent>,
    token: CancellationToken,
    submitter: Arc<Submitter>,
    skip_check: bool,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => return,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!("读取命令失败: {}", e);
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(raw) = line.strip_prefix("submit ") {
            tokio::spawn(submit_in_background(submitter.clone(), raw.to_string(), skip_check, tx.clone()));
            continue;
        }
        match UiEvent::parse(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(e) => println!("{} {}", *symbols::WARN, e),
        }
    }
}

/// 监视模式下的提交: 成功后通知监视器尽快轮询
async fn submit_in_background(
    submitter: Arc<Submitter>,
    raw: String,
    skip_check: bool,
    tx: mpsc::Sender<UiEvent>,
) {
    match submitter.submit(&raw, skip_check).await {
        Ok(summary) => {
            println!("{} {}", *symbols::OK, summary.to_string().replace('\n', " "));
            let _ = tx.send(UiEvent::Submitted).await;
        }
        Err(e) => println!("{} 链接提交遇到问题: {}", *symbols::ERROR, e),
    }
}
