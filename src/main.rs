use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use av_finder::{rank, Config, Scraper};

mod util;

#[derive(Parser, Debug)]
#[command(
    name = "av",
    version,
    about = "AV CLI: 按番号检索详情与磁力链接",
    long_about = None
)]
struct Cli {
    /// 统一输出为 JSON
    #[arg(long, global = true)]
    json: bool,

    /// 输出调试日志
    #[arg(long, global = true)]
    debug: bool,

    /// 只显示无码资源
    #[arg(long = "uncen", short = 'u', alias = "nomo", global = true)]
    uncen: bool,

    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 不使用 curl-impersonate，只用内置 HTTP 客户端
    #[arg(long, global = true)]
    no_impersonate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 获取该番号对应的磁力链接（按权重排序）
    #[command(visible_alias = "install")]
    Get { code: String },

    /// 展示详细信息（番号或详情页 URL）
    Detail { target: String },

    /// 列出搜索结果
    Search { query: String },

    /// 检查站点是否可达
    Health,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("av_finder=debug,av=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn not_found(code: &str, json: bool) -> Result<()> {
    if json {
        util::print_output(&Option::<()>::None, true);
    } else {
        println!("{} {}", "未找到".red().bold(), code);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = Config::load(cli.config.as_deref()).context("读取配置失败")?;
    if cli.no_impersonate {
        config.use_impersonate = false;
    }
    let mut scraper = Scraper::new(config).context("初始化失败")?;

    let cancel = scraper.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match cli.command {
        Commands::Get { code } => {
            let Some(mut detail) = scraper.search(&code).await? else {
                return not_found(&code, cli.json);
            };
            if cli.uncen {
                detail.torrents.retain(rank::effective_uncensored);
            }
            if cli.json {
                util::print_output(&detail.torrents, true);
            } else {
                println!("番号: {} - {}", detail.jav_id.bold(), detail.title);
                util::print_items(&detail.torrents);
            }
            Ok(())
        }
        Commands::Detail { target } => {
            let found = if target.starts_with("http://") || target.starts_with("https://") {
                Some(scraper.get_detail(&target).await?)
            } else {
                scraper.search(&target).await?
            };
            let Some(mut detail) = found else {
                return not_found(&target, cli.json);
            };
            if cli.uncen {
                detail.torrents.retain(rank::effective_uncensored);
            }
            if cli.json {
                util::print_output(&detail, true);
            } else {
                util::print_detail_human(&detail);
            }
            Ok(())
        }
        Commands::Search { query } => {
            let items = scraper.search_candidates(&query).await?;
            if cli.json {
                util::print_output(&items, true);
            } else {
                util::print_candidates_table(&items);
            }
            Ok(())
        }
        Commands::Health => {
            let health = scraper.check_health().await;
            if cli.json {
                util::print_output(&health, true);
            } else {
                util::print_health(&health);
            }
            if !health.healthy {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
