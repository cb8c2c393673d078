//! Wiki markdown conventions.
//!
//! The index page links each year page with a `###[label](/r/<sub>/wiki/<page>)`
//! heading. Year pages hold one entry per anime, each starting with `###`. An
//! entry names its anime with a MyAnimeList link and lists themes as table
//! rows of the form `OP1 "Title"|[Webm](https://…/video/<stem>.webm)|…`.

use once_cell::sync::Lazy;
use regex::Regex;
use shared::Theme;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"###\[.*?\]\(/r/[^/]+/wiki/(.*?)\)").expect("valid year regex"));

static THEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(.*?) "(.*?)"\|\[.*?\]\((https?://[^)\s]+/video/[^)\s]+?\.webm)\)"#)
        .expect("valid theme regex")
});

static MAL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[.*?\]\(https?://(?:www\.)?myanimelist\.net/anime/(\d+).*?\)")
        .expect("valid anime id regex")
});

/// Delimiter between entries on a year page
const ENTRY_DELIMITER: &str = "###";

/// Page names linked from the index page, in order
pub fn year_pages(index: &str) -> Vec<String> {
    YEAR_RE
        .captures_iter(index)
        .map(|caps| caps[1].trim().to_string())
        .filter(|page| !page.is_empty())
        .collect()
}

/// Split a year page into entry blocks
pub fn split_entries(page: &str) -> Vec<String> {
    page.split(ENTRY_DELIMITER)
        .map(str::to_string)
        .collect()
}

/// MyAnimeList id of the first anime linked in an entry
pub fn anime_id(entry: &str) -> Option<u32> {
    MAL_ID_RE
        .captures(entry)
        .and_then(|caps| caps[1].parse().ok())
}

/// Themes listed in an entry; empty when the entry has no anime id
pub fn extract_themes(entry: &str) -> Vec<Theme> {
    let Some(mal_id) = anime_id(entry) else {
        return Vec::new();
    };

    THEME_RE
        .captures_iter(entry)
        .map(|caps| Theme {
            url: caps[3].to_string(),
            mal_id,
            theme_type: caps[1].trim().trim_start_matches('|').trim().to_lowercase(),
            title: caps[2].to_string(),
        })
        .collect()
}
