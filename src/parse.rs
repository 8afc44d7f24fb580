//! HTML extraction for search-results and detail pages.
//!
//! Parsing never fails: a missing node yields an empty string, `None` or an
//! empty list.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::ident::{self, UncensoredKind};
use crate::types::{CandidateRecord, DetailRecord, DownloadItem};

fn css(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

static ITEM_BLOCK: Lazy<Selector> = Lazy::new(|| css(".movie-list .item, .movie-list .grid-item"));
static DETAIL_LINK: Lazy<Selector> = Lazy::new(|| css("a[href*='/v/'], a.box"));
static VIDEO_TITLE: Lazy<Selector> = Lazy::new(|| css(".video-title"));
static VIDEO_ID: Lazy<Selector> = Lazy::new(|| css(".video-title strong, .uid"));
static IMG: Lazy<Selector> = Lazy::new(|| css("img"));

static DETAIL_MARKER: Lazy<Selector> = Lazy::new(|| css(".video-meta-panel, .movie-panel-info"));
static DETAIL_TITLE: Lazy<Selector> = Lazy::new(|| css("h2.title .current-title"));
static DETAIL_TITLE_FALLBACK: Lazy<Selector> = Lazy::new(|| css("h2.title, .video-detail .title"));
static DETAIL_TITLE_ID: Lazy<Selector> = Lazy::new(|| css("h2.title strong"));
static PAGE_TITLE: Lazy<Selector> = Lazy::new(|| css("title"));
static COVER: Lazy<Selector> =
    Lazy::new(|| css("img.video-cover, .video-cover img, .column-video-cover img"));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| css("meta[property='og:image']"));
static PANEL_BLOCK: Lazy<Selector> =
    Lazy::new(|| css(".movie-panel-info .panel-block, nav.panel .panel-block"));
static PANEL_LABEL: Lazy<Selector> = Lazy::new(|| css("strong"));
static PANEL_VALUE: Lazy<Selector> = Lazy::new(|| css(".value"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| css("a"));

static MAGNET_BLOCK: Lazy<Selector> = Lazy::new(|| css("#magnets-content .item"));
static MAGNET_ANCHOR: Lazy<Selector> = Lazy::new(|| css("a[href^='magnet:']"));
static MAGNET_NAME: Lazy<Selector> = Lazy::new(|| css(".magnet-name .name, .name"));
static MAGNET_META: Lazy<Selector> = Lazy::new(|| css(".magnet-name .meta, .meta"));
static MAGNET_TAG: Lazy<Selector> = Lazy::new(|| css(".tags .tag"));

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid regex"));
static SIZE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*([KMGT]i?B)").expect("valid regex"));
static BTIH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)urn:btih:([a-z0-9]+)").expect("valid regex"));
static SUBTITLE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d-C(?:[^A-Za-z0-9]|$)").expect("valid regex"));
static HD_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\b(?:hd|fhd|uhd|1080p|2160p|4k)\b|高清)").expect("valid regex")
});

const SUBTITLE_VOCAB: &[&str] = &["字幕", "中字", "中文", "subtitle"];
const UNCENSORED_VOCAB: &[&str] = &[
    "無碼",
    "无码",
    "無修正",
    "无修正",
    "uncensored",
    "破解",
    "流出",
];
const HD_VOCAB: &[&str] = &["高清", "hd", "1080p", "2160p", "4k"];
const PLACEHOLDERS: &[&str] = &["", "n/a", "-", "--", "暫無", "暂无", "なし", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Released,
    Duration,
    Director,
    Maker,
    Publisher,
    Series,
    Actors,
    Categories,
}

const FIELD_LABELS: &[(Field, &[&str])] = &[
    (Field::Id, &["id", "番號", "番号", "品番", "識別碼", "识别码"]),
    (
        Field::Released,
        &[
            "released date",
            "release date",
            "released",
            "日期",
            "發行日期",
            "发行日期",
            "発売日",
            "配信開始日",
        ],
    ),
    (
        Field::Duration,
        &["duration", "length", "時長", "时长", "長度", "长度", "収録時間"],
    ),
    (Field::Director, &["director", "導演", "导演", "監督"]),
    (Field::Maker, &["maker", "studio", "片商", "製作商", "制作商", "メーカー"]),
    (
        Field::Publisher,
        &["publisher", "label", "發行", "发行", "發行商", "发行商", "レーベル"],
    ),
    (Field::Series, &["series", "系列", "シリーズ"]),
    (Field::Actors, &["actor(s)", "actors", "actor", "演員", "演员", "出演者", "女優"]),
    (Field::Categories, &["tags", "tag", "genre", "genres", "類別", "类别", "ジャンル"]),
];

impl Field {
    fn from_label(raw: &str) -> Option<Field> {
        let key = raw
            .trim()
            .trim_end_matches([':', '：'])
            .trim()
            .to_lowercase();
        FIELD_LABELS
            .iter()
            .find(|(_, synonyms)| synonyms.iter().any(|s| *s == key))
            .map(|(f, _)| *f)
    }
}

/// Concatenated text of an element with whitespace runs collapsed.
fn text_of(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn attr(el: ElementRef, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn image_src(img: ElementRef) -> Option<String> {
    attr(img, "data-src").or_else(|| attr(img, "src"))
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector).next().map(text_of).and_then(non_empty)
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.trim().to_lowercase().as_str())
}

/// Absolute form of `href` relative to `base`.
pub fn qualify(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// `true` when the markup is a detail page rather than a results list.
pub fn looks_like_detail_page(html: &str) -> bool {
    Html::parse_document(html).select(&DETAIL_MARKER).next().is_some()
}

/// Candidate rows of a search-results page, de-duplicated in document order.
pub fn parse_search_results(html: &str, base: &Url) -> Vec<CandidateRecord> {
    let doc = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for block in doc.select(&ITEM_BLOCK) {
        let Some(link) = block.select(&DETAIL_LINK).next() else {
            continue;
        };
        let detail_url = link
            .value()
            .attr("href")
            .map(|h| qualify(base, h))
            .unwrap_or_default();
        let title_text = block.select(&VIDEO_TITLE).next().map(text_of).unwrap_or_default();

        let mut title = attr(link, "title")
            .or_else(|| non_empty(title_text.clone()))
            .or_else(|| non_empty(text_of(link)))
            .unwrap_or_default();
        let jav_id = block
            .select(&VIDEO_ID)
            .next()
            .map(text_of)
            .and_then(non_empty)
            .map(|s| s.to_uppercase())
            .or_else(|| ident::extract_from_title(&title_text))
            .or_else(|| ident::extract_from_title(&title))
            .unwrap_or_default();
        if title.is_empty() {
            title = jav_id.clone();
        }
        let cover_url = block
            .select(&IMG)
            .next()
            .and_then(image_src)
            .map(|src| qualify(base, &src));

        let key = if detail_url.is_empty() {
            format!("{}|{}", title, jav_id)
        } else {
            detail_url.clone()
        };
        if !seen.insert(key) {
            continue;
        }
        out.push(CandidateRecord {
            jav_id,
            title,
            cover_url,
            detail_url,
        });
    }
    out
}

/// Everything the detail page at `page_url` exposes, items in document order.
pub fn parse_detail(html: &str, page_url: &Url) -> DetailRecord {
    let doc = Html::parse_document(html);
    let title = first_text(&doc, &DETAIL_TITLE)
        .or_else(|| first_text(&doc, &DETAIL_TITLE_FALLBACK))
        .or_else(|| first_text(&doc, &PAGE_TITLE))
        .unwrap_or_default();

    let mut record = DetailRecord {
        title,
        detail_url: page_url.to_string(),
        ..DetailRecord::default()
    };

    let mut id: Option<String> = None;
    let mut duration: Option<String> = None;
    for block in doc.select(&PANEL_BLOCK) {
        let Some(field) = block
            .select(&PANEL_LABEL)
            .next()
            .map(text_of)
            .and_then(|label| Field::from_label(&label))
        else {
            continue;
        };
        let value_node = block.select(&PANEL_VALUE).next();
        if matches!(field, Field::Actors | Field::Categories) {
            let scope = value_node.unwrap_or(block);
            let list = if field == Field::Actors {
                &mut record.actors
            } else {
                &mut record.categories
            };
            for name in scope.select(&ANCHOR).map(text_of) {
                if !name.is_empty() && !list.contains(&name) {
                    list.push(name);
                }
            }
            continue;
        }

        let value = value_node.map(text_of).unwrap_or_default();
        if is_placeholder(&value) {
            continue;
        }
        let slot = match field {
            Field::Id => &mut id,
            Field::Released => &mut record.release_date,
            Field::Duration => &mut duration,
            Field::Director => &mut record.director,
            Field::Maker => &mut record.maker,
            Field::Publisher => &mut record.publisher,
            Field::Series => &mut record.series,
            Field::Actors | Field::Categories => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    record.jav_id = id
        .map(|s| s.to_uppercase())
        .or_else(|| ident::extract_from_title(&record.title))
        .or_else(|| first_text(&doc, &DETAIL_TITLE_ID).and_then(|t| ident::extract_from_title(&t)))
        .unwrap_or_default();
    record.duration_minutes = duration
        .as_deref()
        .and_then(|d| DIGITS.captures(d))
        .and_then(|c| c[1].parse::<u32>().ok());
    record.cover_url = doc
        .select(&COVER)
        .next()
        .and_then(image_src)
        .or_else(|| doc.select(&OG_IMAGE).next().and_then(|m| attr(m, "content")))
        .map(|src| qualify(page_url, &src));
    record.torrents = parse_download_items(&doc);
    record
}

/// Download items of a parsed detail page, first occurrence per content hash.
pub fn parse_download_items(doc: &Html) -> Vec<DownloadItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    let blocks: Vec<ElementRef> = doc.select(&MAGNET_BLOCK).collect();
    let pairs: Vec<(ElementRef, ElementRef)> = if blocks.is_empty() {
        doc.select(&MAGNET_ANCHOR).map(|a| (a, a)).collect()
    } else {
        blocks
            .into_iter()
            .filter_map(|b| b.select(&MAGNET_ANCHOR).next().map(|a| (a, b)))
            .collect()
    };

    for (anchor, scope) in pairs {
        let Some(locator) = attr(anchor, "href") else {
            continue;
        };
        let key = content_hash(&locator).unwrap_or_else(|| locator.clone());
        if !seen.insert(key) {
            continue;
        }
        items.push(build_item(locator, anchor, scope));
    }
    items
}

fn build_item(locator: String, anchor: ElementRef, scope: ElementRef) -> DownloadItem {
    let title = scope
        .select(&MAGNET_NAME)
        .next()
        .map(text_of)
        .and_then(non_empty)
        .or_else(|| attr(anchor, "title"))
        .or_else(|| non_empty(text_of(anchor)))
        .or_else(|| magnet_display_name(&locator))
        .unwrap_or_default();
    let annotation = scope.select(&MAGNET_META).next().map(text_of).unwrap_or_default();
    let tags: Vec<String> = scope.select(&MAGNET_TAG).map(text_of).collect();

    let size_bytes = size_from_locator(&locator)
        .or_else(|| parse_size_to_bytes(&annotation))
        .or_else(|| parse_size_to_bytes(&title))
        .unwrap_or(0);
    let flags = infer_flags(&title, &tags);

    DownloadItem {
        title,
        locator,
        size_bytes,
        has_subtitle: flags.subtitle,
        has_uncensored: flags.uncensored,
        uncensored_kind: flags.kind,
        has_hd: flags.hd,
        weight_score: 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFlags {
    pub subtitle: bool,
    pub uncensored: bool,
    pub kind: UncensoredKind,
    pub hd: bool,
}

/// Flags from the tag vocabulary, backed up by checks on the item title.
///
/// The title only decides HD when no tag did.
pub fn infer_flags(title: &str, tags: &[String]) -> ItemFlags {
    let lowered_tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    let tag_has = |vocab: &[&str]| lowered_tags.iter().any(|t| vocab.iter().any(|v| t.contains(v)));
    let lower = title.to_lowercase();
    let kind = ident::uncensored_marker(title);

    let subtitle = tag_has(SUBTITLE_VOCAB)
        || SUBTITLE_VOCAB.iter().any(|v| lower.contains(v))
        || SUBTITLE_SUFFIX.is_match(title)
        || kind == UncensoredKind::UC;
    let uncensored = tag_has(UNCENSORED_VOCAB)
        || kind != UncensoredKind::None
        || UNCENSORED_VOCAB.iter().any(|v| lower.contains(v));
    let hd = if tag_has(HD_VOCAB) {
        true
    } else {
        HD_TITLE.is_match(title)
    };

    ItemFlags {
        subtitle,
        uncensored,
        kind,
        hd,
    }
}

fn magnet_param<'a>(locator: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = locator.split_once('?')?;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Lowercased BitTorrent info hash of a magnet URI.
pub fn content_hash(locator: &str) -> Option<String> {
    BTIH.captures(locator).map(|c| c[1].to_lowercase())
}

/// Exact length from the magnet `xl` parameter.
pub fn size_from_locator(locator: &str) -> Option<u64> {
    magnet_param(locator, "xl")
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|n| *n > 0)
}

fn magnet_display_name(locator: &str) -> Option<String> {
    let raw = magnet_param(locator, "dn")?.replace('+', " ");
    let decoded = urlencoding::decode(&raw).map(|s| s.into_owned()).unwrap_or(raw);
    non_empty(decoded.trim().to_string())
}

/// Parses `4.5GB`, `700 MiB` and similar; every unit is a power of 1024.
pub fn parse_size_to_bytes(s: &str) -> Option<u64> {
    let caps = SIZE_TEXT.captures(s)?;
    let num: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_uppercase();
    let mult = match unit.as_str() {
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0_f64.powi(2),
        "GB" | "GIB" => 1024.0_f64.powi(3),
        "TB" | "TIB" => 1024.0_f64.powi(4),
        _ => return None,
    };
    Some((num * mult) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://javdb.com").unwrap()
    }

    const SEARCH_PAGE: &str = r#"
        <html><body>
        <div class="movie-list">
          <div class="item">
            <a href="/v/abc12" class="box" title="First title">
              <div class="cover"><img data-src="https://img.example/a.jpg" src="/placeholder.png"></div>
              <div class="video-title"><strong>SSIS-001</strong> First title</div>
            </a>
          </div>
          <div class="item">
            <a href="https://javdb.com/v/def34" class="box">
              <div class="cover"><img src="/covers/b.jpg"></div>
              <div class="video-title">ssis-002 second title</div>
            </a>
          </div>
          <div class="item">
            <a href="/v/abc12" class="box" title="Duplicate">
              <div class="video-title"><strong>SSIS-001</strong> Duplicate</div>
            </a>
          </div>
          <div class="item"><span>no link here</span></div>
        </div>
        </body></html>"#;

    #[test]
    fn test_search_results_parse() {
        let rows = parse_search_results(SEARCH_PAGE, &base());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].jav_id, "SSIS-001");
        assert_eq!(rows[0].title, "First title");
        assert_eq!(rows[0].detail_url, "https://javdb.com/v/abc12");
        assert_eq!(rows[0].cover_url.as_deref(), Some("https://img.example/a.jpg"));

        assert_eq!(rows[1].jav_id, "SSIS-002");
        assert_eq!(rows[1].title, "ssis-002 second title");
        assert_eq!(rows[1].cover_url.as_deref(), Some("https://javdb.com/covers/b.jpg"));
    }

    #[test]
    fn test_candidate_dedup_keeps_first_seen() {
        let rows = parse_search_results(SEARCH_PAGE, &base());
        let urls: Vec<&str> = rows.iter().map(|r| r.detail_url.as_str()).collect();
        assert_eq!(urls, vec!["https://javdb.com/v/abc12", "https://javdb.com/v/def34"]);
        assert_eq!(rows[0].title, "First title");
    }

    #[test]
    fn test_candidate_dedup_without_url_uses_title_and_id() {
        let html = r#"<div class="movie-list">
            <div class="item"><a class="box" title="Same"><div class="video-title"><strong>ABC-1</strong></div></a></div>
            <div class="item"><a class="box" title="Same"><div class="video-title"><strong>ABC-1</strong></div></a></div>
            <div class="item"><a class="box" title="Same"><div class="video-title"><strong>ABC-2</strong></div></a></div>
        </div>"#;
        let rows = parse_search_results(html, &base());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.detail_url.is_empty()));
    }

    #[test]
    fn test_empty_search_page() {
        let html = "<html><body><div class='empty-message'>暫無內容</div></body></html>";
        assert!(parse_search_results(html, &base()).is_empty());
        assert!(parse_search_results("", &base()).is_empty());
    }

    const DETAIL_PAGE: &str = r#"
        <html><head><title>SSIS-001 page | JavDB</title>
        <meta property="og:image" content="https://img.example/og.jpg"></head>
        <body>
        <div class="video-detail">
          <h2 class="title is-4"><strong>SSIS-001 </strong><strong class="current-title">A detail title</strong></h2>
          <div class="video-meta-panel">
            <div class="column column-video-cover"><img class="video-cover" data-src="https://img.example/cover.jpg" src="/lazy.png"></div>
            <nav class="panel movie-panel-info">
              <div class="panel-block"><strong>番號:</strong> <span class="value"><a href="/video_codes/SSIS">SSIS</a>-001</span></div>
              <div class="panel-block"><strong>日期:</strong> <span class="value">2021-02-19</span></div>
              <div class="panel-block"><strong>時長:</strong> <span class="value">120 分鍾</span></div>
              <div class="panel-block"><strong>導演:</strong> <span class="value">N/A</span></div>
              <div class="panel-block"><strong>Director:</strong> <span class="value"><a href="/directors/x">Someone</a></span></div>
              <div class="panel-block"><strong>片商:</strong> <span class="value"><a href="/makers/s1">S1</a></span></div>
              <div class="panel-block"><strong>發行:</strong> <span class="value"><a href="/publishers/p">S1 NO.1 STYLE</a></span></div>
              <div class="panel-block"><strong>系列:</strong> <span class="value">-</span></div>
              <div class="panel-block"><strong>類別:</strong> <span class="value"><a href="/tags?c1=1">Drama</a>, <a href="/tags?c1=2">Solo</a>, <a href="/tags?c1=1">Drama</a></span></div>
              <div class="panel-block"><strong>演員:</strong> <span class="value"><a href="/actors/a1">Actor One</a><strong class="symbol female">♀</strong> <a href="/actors/a2">Actor Two</a></span></div>
            </nav>
          </div>
        </div>
        <div id="magnets-content">
          <div class="item columns is-desktop">
            <div class="magnet-name column is-four-fifths">
              <a href="magnet:?xt=urn:btih:AAAA1111&amp;dn=SSIS-001&amp;xl=3221225472">
                <span class="name">SSIS-001-C</span><br>
                <span class="meta">4.52GB, 1個文件</span><br>
                <div class="tags"><span class="tag is-primary is-small is-light">高清</span><span class="tag is-warning is-small is-light">字幕</span></div>
              </a>
            </div>
          </div>
          <div class="item columns is-desktop">
            <div class="magnet-name column is-four-fifths">
              <a href="magnet:?xt=urn:btih:aaaa1111&amp;dn=dup">
                <span class="name">Duplicate by hash</span>
              </a>
            </div>
          </div>
          <div class="item columns is-desktop">
            <div class="magnet-name column is-four-fifths">
              <a href="magnet:?xt=urn:btih:BBBB2222">
                <span class="name">SSIS-001-UC</span>
                <span class="meta">1.5 GiB</span>
              </a>
            </div>
          </div>
        </div>
        </body></html>"#;

    fn detail_url() -> Url {
        Url::parse("https://javdb.com/v/abc12").unwrap()
    }

    #[test]
    fn test_detail_fields() {
        let d = parse_detail(DETAIL_PAGE, &detail_url());
        assert_eq!(d.title, "A detail title");
        assert_eq!(d.jav_id, "SSIS-001");
        assert_eq!(d.detail_url, "https://javdb.com/v/abc12");
        assert_eq!(d.cover_url.as_deref(), Some("https://img.example/cover.jpg"));
        assert_eq!(d.release_date.as_deref(), Some("2021-02-19"));
        assert_eq!(d.duration_minutes, Some(120));
        assert_eq!(d.director.as_deref(), Some("Someone"));
        assert_eq!(d.maker.as_deref(), Some("S1"));
        assert_eq!(d.publisher.as_deref(), Some("S1 NO.1 STYLE"));
        assert_eq!(d.series, None);
        assert_eq!(d.categories, vec!["Drama", "Solo"]);
        assert_eq!(d.actors, vec!["Actor One", "Actor Two"]);
    }

    #[test]
    fn test_detail_items_dedup_by_hash() {
        let d = parse_detail(DETAIL_PAGE, &detail_url());
        assert_eq!(d.torrents.len(), 2);
        let first = &d.torrents[0];
        assert_eq!(first.title, "SSIS-001-C");
        assert_eq!(first.size_bytes, 3_221_225_472);
        assert!(first.has_hd);
        assert!(first.has_subtitle);
        assert!(!first.has_uncensored);

        let second = &d.torrents[1];
        assert_eq!(second.title, "SSIS-001-UC");
        assert_eq!(second.size_bytes, (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert!(second.has_uncensored);
        assert_eq!(second.uncensored_kind, UncensoredKind::UC);
        assert!(second.has_subtitle);
        assert!(!second.has_hd);
    }

    #[test]
    fn test_detail_page_degrades_gracefully() {
        let d = parse_detail(
            "<html><head><title>ABP-123 something</title></head></html>",
            &detail_url(),
        );
        assert_eq!(d.title, "ABP-123 something");
        assert_eq!(d.jav_id, "ABP-123");
        assert!(d.cover_url.is_none());
        assert!(d.actors.is_empty());
        assert!(d.torrents.is_empty());
    }

    #[test]
    fn test_detail_cover_falls_back_to_og_image() {
        let html = r#"<html><head><meta property="og:image" content="https://img.example/og.jpg"></head><body></body></html>"#;
        let d = parse_detail(html, &detail_url());
        assert_eq!(d.cover_url.as_deref(), Some("https://img.example/og.jpg"));
    }

    #[test]
    fn test_bare_magnet_anchors_dedup() {
        let html = r#"<html><body>
            <a href="magnet:?xt=urn:btih:CCCC&dn=ABC-123+HD">one</a>
            <a href="magnet:?xt=urn:btih:cccc&dn=other">two</a>
        </body></html>"#;
        let items = parse_download_items(&Html::parse_document(html));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "one");
    }

    #[test]
    fn test_item_name_falls_back_to_dn() {
        let html = r#"<a href="magnet:?xt=urn:btih:DDDD&dn=ABC-123%20FHD"></a>"#;
        let items = parse_download_items(&Html::parse_document(html));
        assert_eq!(items[0].title, "ABC-123 FHD");
        assert!(items[0].has_hd);
    }

    #[test]
    fn test_explicit_size_beats_annotation() {
        let html = r#"<div id="magnets-content"><div class="item">
            <a href="magnet:?xt=urn:btih:EEEE&xl=1000"><span class="name">x</span><span class="meta">9.9GB</span></a>
        </div></div>"#;
        let items = parse_download_items(&Html::parse_document(html));
        assert_eq!(items[0].size_bytes, 1000);
    }

    #[test]
    fn test_infer_flags_title_hd_only_without_tag() {
        let f = infer_flags("ABC-123 1080p", &[]);
        assert!(f.hd);
        let f = infer_flags("ABC-123", &["HD".to_string()]);
        assert!(f.hd);
        let f = infer_flags("SHDX-123", &[]);
        assert!(!f.hd);
    }

    #[test]
    fn test_infer_flags_uncensored_words() {
        let f = infer_flags("ABC-123 無碼流出", &[]);
        assert!(f.uncensored);
        assert_eq!(f.kind, UncensoredKind::None);
        let f = infer_flags("ABC-123-U", &[]);
        assert!(f.uncensored);
        assert!(!f.subtitle);
        assert_eq!(f.kind, UncensoredKind::U);
    }

    #[test]
    fn test_size_parsing() {
        assert_eq!(parse_size_to_bytes("700MB"), Some(700 * 1024 * 1024));
        assert_eq!(parse_size_to_bytes("1.00 GiB, 2 files"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size_to_bytes("4.52gb"), Some((4.52 * 1024f64.powi(3)) as u64));
        assert_eq!(parse_size_to_bytes("unknown"), None);
    }

    #[test]
    fn test_content_hash_and_xl() {
        let m = "magnet:?xt=urn:btih:ABCDEF0123&dn=x&xl=42";
        assert_eq!(content_hash(m).as_deref(), Some("abcdef0123"));
        assert_eq!(size_from_locator(m), Some(42));
        assert_eq!(size_from_locator("magnet:?xt=urn:btih:ABC"), None);
    }

    #[test]
    fn test_looks_like_detail_page() {
        assert!(looks_like_detail_page(DETAIL_PAGE));
        assert!(!looks_like_detail_page(SEARCH_PAGE));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(&base(), "/v/x"), "https://javdb.com/v/x");
        assert_eq!(qualify(&base(), "https://other/v/x"), "https://other/v/x");
    }
}
