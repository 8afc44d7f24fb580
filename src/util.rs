use colored::*;
use serde::Serialize;

use av_finder::rank;
use av_finder::types::{CandidateRecord, DetailRecord, DownloadItem, Health};

pub fn print_output<T: Serialize + std::fmt::Debug>(value: &T, json: bool) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(_) => println!("{:?}", value),
        }
    } else {
        println!("{:?}", value);
    }
}

/// Human-readable size in 1024 multiples.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "-".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn flags(item: &DownloadItem) -> String {
    let mut tags = Vec::new();
    if rank::effective_uncensored(item) {
        tags.push("无码".red().to_string());
    }
    if rank::effective_subtitle(item) {
        tags.push("字幕".yellow().to_string());
    }
    if item.has_hd {
        tags.push("高清".green().to_string());
    }
    tags.join(" ")
}

pub fn print_candidates_table(items: &[CandidateRecord]) {
    println!("{} {}", "共".bold(), items.len());

    let index_header = "#";
    let code_header = "番号";
    let title_header = "标题";

    let index_width = std::cmp::max(index_header.len(), format!("{}", items.len()).len());
    let code_width = std::cmp::max(
        code_header.len(),
        items.iter().map(|i| i.jav_id.len()).max().unwrap_or(0),
    );

    println!(
        "{:<iw$}  {:<cw$}  {}",
        index_header.bold(),
        code_header.bold(),
        title_header.bold(),
        iw = index_width,
        cw = code_width
    );
    println!(
        "{:<iw$}  {:<cw$}  {}",
        "-".repeat(index_width),
        "-".repeat(code_width),
        "-".repeat(10),
        iw = index_width,
        cw = code_width
    );

    for (idx, item) in items.iter().enumerate() {
        println!(
            "{:<iw$}  {:<cw$}  {}",
            idx + 1,
            item.jav_id,
            item.title,
            iw = index_width,
            cw = code_width
        );
    }
}

pub fn print_items(items: &[DownloadItem]) {
    if items.is_empty() {
        println!("{}", "未找到可用的磁力链接".red().bold());
        return;
    }
    println!("\n{}", "可用磁力链接:".green().bold());
    for (i, m) in items.iter().enumerate() {
        let mut info = format!(" | {}", format_size(m.size_bytes));
        info.push_str(&format!(" | 权重 {}", m.weight_score));
        let tags = flags(m);
        if !tags.is_empty() {
            info.push_str(&format!(" | {}", tags));
        }
        println!("{}. {}{}", i + 1, m.title.bold(), info);
        println!("   {}", m.locator.cyan());
    }
}

pub fn print_detail_human(detail: &DetailRecord) {
    println!("番号： {}", detail.jav_id.bold());
    println!("标题： {}", detail.title);
    if !detail.actors.is_empty() {
        println!("演员： {}", detail.actors.join(", "));
    }
    if let Some(date) = &detail.release_date {
        println!("发行： {}", date);
    }
    if let Some(cover) = &detail.cover_url {
        println!("封面： {}", cover);
    }
    if let Some(mins) = detail.duration_minutes {
        println!("时长： {} 分钟", mins);
    }
    if let Some(dir) = &detail.director {
        println!("导演： {}", dir);
    }
    if let Some(maker) = &detail.maker {
        println!("片商： {}", maker);
    }
    if let Some(publisher) = &detail.publisher {
        println!("发行商： {}", publisher);
    }
    if let Some(series) = &detail.series {
        println!("系列： {}", series);
    }
    if !detail.categories.is_empty() {
        println!("类别： {}", detail.categories.join(", "));
    }
    println!("详情： {}", detail.detail_url);
    if !detail.torrents.is_empty() {
        println!("磁力： 共{}条", detail.torrents.len());
        for (i, m) in detail.torrents.iter().take(5).enumerate() {
            let mut line = format!("  {}. {}", i + 1, m.locator);
            line.push_str(&format!("\n     {} | {}", m.title, format_size(m.size_bytes)));
            let tags = flags(m);
            if !tags.is_empty() {
                line.push_str(&format!(" | {}", tags));
            }
            println!("{}", line);
        }
    }
}

pub fn print_health(health: &Health) {
    if health.healthy {
        println!("{} {} ({})", "可用".green().bold(), health.url, health.message);
    } else {
        println!("{} {}\n  {}", "不可用".red().bold(), health.url, health.message);
    }
}
