//! Full cycles against fake services and a local media origin.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Anime, Catalog, Database, DiskSpaceGuard, FreeSpaceProbe, StoragePaths};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use theme_scraper::api::{AnimeInfoService, AnimeLookup, WikiSource};
use theme_scraper::{
    Downloader, Extractor, LookupError, Pipeline, Processor, Reconciler, TranscodeError,
    Transcoder,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Ordered record of what the fakes were asked to do
#[derive(Clone, Default)]
struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

struct StaticWiki {
    pages: HashMap<String, String>,
    timeline: Timeline,
}

#[async_trait]
impl WikiSource for StaticWiki {
    async fn fetch_page(&self, name: &str) -> Result<String> {
        self.timeline.push(format!("fetch {}", name));
        self.pages
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page {}", name))
    }
}

struct StaticAnimeInfo {
    timeline: Timeline,
}

#[async_trait]
impl AnimeInfoService for StaticAnimeInfo {
    async fn lookup(&self, mal_id: u32) -> Result<AnimeLookup, LookupError> {
        self.timeline.push(format!("lookup {}", mal_id));
        Ok(AnimeLookup {
            anime: Anime {
                mal_id,
                title: format!("Anime {}", mal_id),
                rank: None,
                popularity: None,
            },
            request_cached: false,
        })
    }
}

struct PlentyOfSpace;

impl FreeSpaceProbe for PlentyOfSpace {
    fn free_bytes(&self, _path: &Path) -> Result<u64> {
        Ok(u64::MAX)
    }
}

/// Records start and end of every transcode, taking a little time in between
struct RecordingTranscoder {
    timeline: Timeline,
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        self.timeline.push(format!("transcode {} start", stem));

        tokio::fs::metadata(input).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::fs::write(output, b"ID3").await?;

        self.timeline.push(format!("transcode {} end", stem));
        Ok(())
    }
}

fn row(kind: &str, stem: &str, url: &str) -> String {
    format!("{} \"{}\"|[Webm]({})|1-12|\r\n", kind, stem, url)
}

/// Anime 1 with themes a and b, anime 2 with theme c, all on the origin
fn year_page(server: &MockServer) -> String {
    let url = |stem: &str| format!("{}/video/{}.webm", server.uri(), stem);
    format!(
        "Intro\r\n###[First](https://myanimelist.net/anime/1/)\r\n{}{}###[Second](https://myanimelist.net/anime/2/)\r\n{}",
        row("OP1", "a", &url("a")),
        row("ED1", "b", &url("b")),
        row("OP1", "c", &url("c")),
    )
}

struct Harness {
    _dir: TempDir,
    server: MockServer,
    catalog: Catalog,
    paths: StoragePaths,
    timeline: Timeline,
    pipeline: Pipeline,
}

async fn harness() -> Harness {
    harness_with(year_page).await
}

async fn harness_with(page: impl FnOnce(&MockServer) -> String) -> Harness {
    let server = MockServer::start().await;
    for stem in ["a", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/video/{}.webm", stem)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 128]))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/video/b.webm"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let paths = StoragePaths::new(dir.path().join("cache"), dir.path().join("themes"));
    paths.create_dirs().unwrap();
    let catalog = Catalog::new(Database::open(dir.path().join("catalog.db")).unwrap());
    let timeline = Timeline::default();
    let media_base_url = format!("{}/video", server.uri());

    let mut pages = HashMap::new();
    pages.insert(
        "year_index".to_string(),
        "###[2020](/r/AnimeThemes/wiki/2020)".to_string(),
    );
    pages.insert("2020".to_string(), page(&server));

    let reconciler = Reconciler::new(catalog.clone(), paths.clone(), &media_base_url);
    let extractor = Extractor::new(
        catalog.clone(),
        Box::new(StaticWiki {
            pages,
            timeline: timeline.clone(),
        }),
        Box::new(StaticAnimeInfo {
            timeline: timeline.clone(),
        }),
        "year_index",
        &media_base_url,
        Duration::from_millis(10),
    );
    let processor = Processor::new(
        catalog.clone(),
        paths.clone(),
        DiskSpaceGuard::with_probe(
            paths.themes_dir(),
            2_500_000,
            Duration::from_secs(10800),
            PlentyOfSpace,
        ),
        Downloader::new("Mozilla/5.0", Duration::from_secs(5), Duration::from_secs(1)).unwrap(),
        Box::new(RecordingTranscoder {
            timeline: timeline.clone(),
        }),
        Duration::from_secs(60),
    );

    Harness {
        _dir: dir,
        server,
        catalog,
        paths,
        timeline,
        pipeline: Pipeline::new(reconciler, extractor, processor),
    }
}

fn url(h: &Harness, stem: &str) -> String {
    format!("{}/video/{}.webm", h.server.uri(), stem)
}

#[tokio::test]
async fn test_first_cycle_persists_downloadable_themes() -> Result<()> {
    let mut h = harness().await;

    let stats = h.pipeline.run_cycle().await?;

    assert_eq!(stats.extracted, 3);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.skipped, 1);
    assert!(!stats.extraction_aborted);
    assert_eq!(stats.extraction.pages_fetched, 1);
    assert_eq!(stats.extraction.lookups, 2);

    let urls: Vec<_> = h.catalog.themes()?.into_iter().map(|t| t.url).collect();
    assert_eq!(urls, vec![url(&h, "a"), url(&h, "c")]);
    let ids: Vec<_> = h.catalog.anime()?.into_iter().map(|a| a.mal_id).collect();
    assert_eq!(ids, vec![1, 2]);

    let stems: Vec<_> = h.paths.theme_stems()?.into_keys().collect();
    assert_eq!(stems, vec!["a", "c"]);
    assert!(h.paths.cache_entries()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_extraction_waits_for_each_theme_to_be_processed() -> Result<()> {
    let mut h = harness().await;

    h.pipeline.run_cycle().await?;

    // Each theme is fully processed before the extractor does any more work:
    // anime 2 is looked up only once theme a is done, and b's download
    // failure happens between them without a transcode.
    assert_eq!(
        h.timeline.take(),
        vec![
            "fetch year_index",
            "fetch 2020",
            "lookup 1",
            "transcode a start",
            "transcode a end",
            "lookup 2",
            "transcode c start",
            "transcode c end",
        ]
    );

    let requests: Vec<String> = h
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requests, vec!["/video/a.webm", "/video/b.webm", "/video/c.webm"]);

    Ok(())
}

#[tokio::test]
async fn test_second_cycle_only_retries_missing_themes() -> Result<()> {
    let mut h = harness().await;
    h.pipeline.run_cycle().await?;

    let stats = h.pipeline.run_cycle().await?;

    assert_eq!(stats.cleanup.total(), 0);
    assert_eq!(stats.extraction.duplicates_skipped, 2);
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.persisted, 0);
    assert_eq!(h.catalog.stats()?.themes, 2);

    Ok(())
}

#[tokio::test]
async fn test_themes_off_the_origin_never_enter_the_catalog() -> Result<()> {
    let mut h = harness_with(|server| {
        let mut page = year_page(server);
        // Same stem as an origin theme, different host and scheme
        page.push_str(&row("ED1", "mirror", "https://mirror.example/video/c.webm"));
        page.push_str(&row(
            "ED2",
            "plain",
            &format!("{}/video/a.webm", server.uri()).replacen("http://", "https://", 1),
        ));
        page
    })
    .await;

    let first = h.pipeline.run_cycle().await?;
    let second = h.pipeline.run_cycle().await?;

    assert_eq!(first.persisted, 2);
    assert_eq!(first.extraction.foreign_skipped, 2);
    assert_eq!(second.cleanup.total(), 0);
    assert_eq!(second.persisted, 0);

    let urls: Vec<_> = h.catalog.themes()?.into_iter().map(|t| t.url).collect();
    assert_eq!(urls, vec![url(&h, "a"), url(&h, "c")]);

    Ok(())
}

#[tokio::test]
async fn test_lost_audio_file_is_healed_next_cycle() -> Result<()> {
    let mut h = harness().await;
    h.pipeline.run_cycle().await?;

    std::fs::remove_file(h.paths.theme_file("c"))?;
    let stats = h.pipeline.run_cycle().await?;

    assert_eq!(stats.cleanup.themes_deleted, 1);
    assert_eq!(stats.cleanup.anime_deleted, 1);
    assert_eq!(stats.extracted, 2);
    assert_eq!(stats.persisted, 1);

    assert!(h.paths.theme_file("c").exists());
    assert!(h.catalog.theme_exists(&url(&h, "c"))?);
    assert!(h.catalog.get_anime(2)?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_unreachable_index_ends_cycle_without_error() -> Result<()> {
    let mut h = harness_with(|_| String::new()).await;
    let media_base_url = format!("{}/video", h.server.uri());
    let extractor = Extractor::new(
        h.catalog.clone(),
        Box::new(StaticWiki {
            pages: HashMap::new(),
            timeline: h.timeline.clone(),
        }),
        Box::new(StaticAnimeInfo {
            timeline: h.timeline.clone(),
        }),
        "year_index",
        &media_base_url,
        Duration::from_millis(10),
    );
    let processor = Processor::new(
        h.catalog.clone(),
        h.paths.clone(),
        DiskSpaceGuard::with_probe(h.paths.themes_dir(), 0, Duration::from_secs(1), PlentyOfSpace),
        Downloader::new("Mozilla/5.0", Duration::from_secs(5), Duration::from_secs(1)).unwrap(),
        Box::new(RecordingTranscoder {
            timeline: h.timeline.clone(),
        }),
        Duration::from_secs(60),
    );
    let reconciler = Reconciler::new(h.catalog.clone(), h.paths.clone(), &media_base_url);
    h.pipeline = Pipeline::new(reconciler, extractor, processor);

    let stats = h.pipeline.run_cycle().await?;

    assert!(stats.extraction_aborted);
    assert_eq!(stats.extracted, 0);
    assert_eq!(h.timeline.take(), vec!["fetch year_index"]);

    Ok(())
}

#[tokio::test]
async fn test_missing_theme_directory_fails_cycle() {
    let mut h = harness().await;
    std::fs::remove_dir_all(h.paths.themes_dir()).unwrap();

    assert!(h.pipeline.run_cycle().await.is_err());
}
