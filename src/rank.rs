//! Best-candidate selection and download-item ranking.

use std::cmp::Ordering;

use crate::ident::{self, UncensoredKind};
use crate::types::{CandidateRecord, DownloadItem};

pub const UNCENSORED_WEIGHT: u32 = 5;
pub const SUBTITLE_WEIGHT: u32 = 3;
pub const HD_WEIGHT: u32 = 1;

/// Picks the candidate that best matches `query`.
///
/// Returns `None` only for an empty list.
pub fn select_best<'a>(
    candidates: &'a [CandidateRecord],
    query: &str,
) -> Option<&'a CandidateRecord> {
    if candidates.len() <= 1 {
        return candidates.first();
    }
    let wanted = ident::normalize(query);

    candidates
        .iter()
        .find(|c| !c.jav_id.is_empty() && ident::normalize(&c.jav_id).eq_ignore_ascii_case(&wanted))
        .or_else(|| {
            candidates.iter().find(|c| {
                ident::extract_from_title(&c.title)
                    .map(|id| ident::normalize(&id) == wanted)
                    .unwrap_or(false)
            })
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|c| !wanted.is_empty() && c.title.to_uppercase().contains(&wanted))
        })
        .or_else(|| candidates.first())
}

/// Uncensored flag after considering the title marker.
pub fn effective_uncensored(item: &DownloadItem) -> bool {
    item.has_uncensored
        || item.uncensored_kind != UncensoredKind::None
        || ident::uncensored_marker(&item.title) != UncensoredKind::None
}

/// Subtitle flag after considering a `-UC` title marker.
pub fn effective_subtitle(item: &DownloadItem) -> bool {
    item.has_subtitle
        || item.uncensored_kind == UncensoredKind::UC
        || ident::uncensored_marker(&item.title) == UncensoredKind::UC
}

/// Weight of one item. Pure; ignores any stored `weight_score`.
pub fn score(item: &DownloadItem) -> u32 {
    let mut s = 0;
    if effective_uncensored(item) {
        s += UNCENSORED_WEIGHT;
    }
    if effective_subtitle(item) {
        s += SUBTITLE_WEIGHT;
    }
    if item.has_hd {
        s += HD_WEIGHT;
    }
    s
}

fn compare(a: &DownloadItem, b: &DownloadItem) -> Ordering {
    b.weight_score
        .cmp(&a.weight_score)
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
        .then_with(|| a.title.cmp(&b.title))
}

/// Recomputes every `weight_score` and sorts best-first.
///
/// Ties fall back to larger size, then title in byte order.
pub fn rank_items(items: &mut [DownloadItem]) {
    for item in items.iter_mut() {
        item.weight_score = score(item);
    }
    items.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, url: &str) -> CandidateRecord {
        CandidateRecord {
            jav_id: id.to_string(),
            title: title.to_string(),
            cover_url: None,
            detail_url: url.to_string(),
        }
    }

    fn item(title: &str, size: u64) -> DownloadItem {
        DownloadItem {
            size_bytes: size,
            ..DownloadItem::new(title, format!("magnet:?xt=urn:btih:{}", title.len()))
        }
    }

    #[test]
    fn test_select_single_candidate() {
        let list = vec![candidate("XYZ-999", "unrelated", "/v/1")];
        assert_eq!(select_best(&list, "ssis_001").unwrap().detail_url, "/v/1");
        assert!(select_best(&[], "ssis-001").is_none());
    }

    #[test]
    fn test_select_exact_id_match() {
        let list = vec![
            candidate("SSIS-0011", "near miss", "/v/1"),
            candidate("ssis-001", "target", "/v/2"),
        ];
        assert_eq!(select_best(&list, "SSIS_001").unwrap().detail_url, "/v/2");
    }

    #[test]
    fn test_select_id_from_title() {
        let list = vec![
            candidate("", "ABP-100 other", "/v/1"),
            candidate("", "abp-123 wanted", "/v/2"),
        ];
        assert_eq!(select_best(&list, "abp 123").unwrap().detail_url, "/v/2");
    }

    #[test]
    fn test_select_title_substring() {
        let list = vec![
            candidate("", "nothing", "/v/1"),
            candidate("", "ABC-999 bonus disc ssis-001", "/v/2"),
        ];
        assert_eq!(select_best(&list, "ssis-001").unwrap().detail_url, "/v/2");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let list = vec![candidate("A-1", "a", "/v/1"), candidate("B-2", "b", "/v/2")];
        assert_eq!(select_best(&list, "zzz-999").unwrap().detail_url, "/v/1");
    }

    #[test]
    fn test_score_weights() {
        let mut i = item("ABC-123", 0);
        assert_eq!(score(&i), 0);
        i.has_hd = true;
        assert_eq!(score(&i), 1);
        i.has_subtitle = true;
        assert_eq!(score(&i), 4);
        i.has_uncensored = true;
        assert_eq!(score(&i), 9);
    }

    #[test]
    fn test_uc_marker_scores_uncensored_and_subtitle() {
        let i = item("SSIS-001-UC", 0);
        assert_eq!(score(&i), 8);
        let mut hd = item("SSIS-001-UC", 0);
        hd.has_hd = true;
        assert_eq!(score(&hd), 9);
        assert_eq!(score(&item("SSIS-001-U", 0)), 5);
        assert_eq!(score(&item("SSIS-001-UNCUT", 0)), 0);
    }

    #[test]
    fn test_rank_order_and_tie_breaks() {
        let mut hd_small = item("b-hd", 100);
        hd_small.has_hd = true;
        let mut hd_big = item("c-hd", 500);
        hd_big.has_hd = true;
        let mut hd_same_size = item("a-hd", 100);
        hd_same_size.has_hd = true;
        let plain = item("plain", 9_999);
        let uc = item("SSIS-001-UC", 1);

        let mut items = vec![plain, hd_small, uc, hd_same_size, hd_big];
        rank_items(&mut items);
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["SSIS-001-UC", "c-hd", "a-hd", "b-hd", "plain"]);
        assert_eq!(items[0].weight_score, 8);
    }

    #[test]
    fn test_title_tie_break_is_case_sensitive() {
        let mut items = vec![item("abc", 1), item("ABC", 1), item("Abc", 1)];
        rank_items(&mut items);
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["ABC", "Abc", "abc"]);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let mut a = item("x-1", 10);
        a.has_subtitle = true;
        let mut b = item("y-2", 20);
        b.has_hd = true;
        b.weight_score = 99;
        let mut items = vec![a, b, item("SSIS-002-U", 5), item("z", 30)];

        rank_items(&mut items);
        let first = items.clone();
        rank_items(&mut items);
        assert_eq!(items, first);
        assert!(items.iter().all(|i| i.weight_score == score(i)));
    }
}
