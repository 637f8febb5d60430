//! The three passes of a run, wired to a renderer and the CSV store.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::collector::UrlCollector;
use crate::config::Config;
use crate::diagnostics;
use crate::error::CrawlResult;
use crate::extractor::FieldExtractor;
use crate::models::{HostRecord, ListingRecord};
use crate::profile::ProfileExtractor;
use crate::reconcile::{host_urls, merge, MergeStats};
use crate::renderer::Renderer;
use crate::store;

/// Open the search page, collect item URLs and extract each one.
///
/// Fails only when the search page cannot be opened.
pub async fn harvest_listings(renderer: &dyn Renderer, config: &Config) -> CrawlResult<Vec<ListingRecord>> {
    let collector = UrlCollector::new(renderer, &config.timing);
    collector.open(&config.start_url).await?;
    let urls = collector
        .collect(config.max_listings, config.max_duration)
        .await;

    let extractor = FieldExtractor::new(renderer, &config.timing);
    let mut records = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, urls.len(), url);
        let extraction = extractor.extract(url).await;
        diagnostics::report(url, &extraction.events);
        records.push(extraction.record);
        if i + 1 < urls.len() {
            renderer.settle(config.timing.page_settle).await;
        }
    }
    Ok(records)
}

/// Visit the host profile of every listing, once per distinct profile.
pub async fn harvest_hosts(
    renderer: &dyn Renderer,
    config: &Config,
    listings: &[ListingRecord],
) -> Vec<HostRecord> {
    let urls = host_urls(listings);
    info!(profiles = urls.len(), "Starting profile pass");
    let mut extractor = ProfileExtractor::new(renderer, &config.timing);
    if config.debug_snapshots {
        extractor = extractor.with_snapshots(config.debug_dir());
    }
    extractor.extract_all(&urls).await
}

#[derive(Debug, Default)]
pub struct MergeSummary {
    pub stats: MergeStats,
    pub unreadable: Vec<PathBuf>,
}

/// Read listing and host files, reconcile them and write the merged file.
pub fn merge_files<P: AsRef<Path>>(listing_files: &[P], host_files: &[P], out: &Path) -> CrawlResult<MergeSummary> {
    let (listings, mut unreadable) = store::read_listings(listing_files);
    let (hosts, unreadable_hosts) = store::read_hosts(host_files);
    unreadable.extend(unreadable_hosts);
    info!(listings = listings.len(), hosts = hosts.len(), "Merging");

    let reconciliation = merge(&listings, &hosts);
    store::write_merged(out, &reconciliation.rows)?;
    Ok(MergeSummary {
        stats: reconciliation.stats,
        unreadable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::error::CrawlError;
    use crate::models::MERGED_COLUMNS;
    use crate::testing::FakeRenderer;
    use std::time::Duration;
    use tempfile::tempdir;

    const SEARCH: &str = "https://fr.airbnb.com/s/Dubai/homes";

    fn room(id: u32, host: Option<(u32, &str)>) -> String {
        let host = host
            .map(|(hid, name)| {
                format!(
                    r#"<section><h2>Faites connaissance avec votre hôte</h2>
                    <a href="/users/show/{hid}">{name}</a><span>4,9 ★</span></section>"#
                )
            })
            .unwrap_or_default();
        format!(r#"<html><body><h1>Room {id}</h1><p>Permit DXB-ABC-{id}000</p>{host}</body></html>"#)
    }

    fn config() -> Config {
        Config {
            start_url: SEARCH.to_string(),
            max_listings: 10,
            max_duration: Duration::from_secs(60),
            timing: Timing::default(),
            ..Default::default()
        }
    }

    fn site() -> FakeRenderer {
        FakeRenderer::new()
            .with_page(
                SEARCH,
                r#"<html><body>
                <a href="/rooms/1?x=1">1</a><a href="/rooms/2">2</a>
                <a href="/rooms/1">1 again</a><a href="/rooms/3">3</a>
                </body></html>"#,
            )
            .with_page("https://fr.airbnb.com/rooms/1", &room(1, Some((7, "Amira"))))
            .with_page("https://fr.airbnb.com/rooms/2", &room(2, Some((7, "Amira"))))
            .with_page("https://fr.airbnb.com/rooms/3", &room(3, Some((8, "Sam"))))
            .with_page(
                "https://fr.airbnb.com/users/show/7",
                "<html><body><h1>Amira</h1><p>Member since 2018</p><p>4 listings</p><p>4.95 ★</p></body></html>",
            )
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let renderer = site();
        let config = config();

        let listings = harvest_listings(&renderer, &config).await.unwrap();
        let urls: Vec<_> = listings.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://fr.airbnb.com/rooms/1",
                "https://fr.airbnb.com/rooms/2",
                "https://fr.airbnb.com/rooms/3",
            ]
        );
        assert_eq!(listings[0].license_code, "DXB-ABC-1000");
        assert_eq!(listings[2].host_name, "Sam");

        // Profile 8 does not exist: its record carries the error instead.
        let hosts = harvest_hosts(&renderer, &config, &listings).await;
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].name, "Amira");
        assert_eq!(hosts[0].joined_year, "2018");
        assert!(hosts[1].notes.starts_with("error: "));

        let dir = tempdir().unwrap();
        let listings_path = dir.path().join("listings.csv");
        let hosts_path = dir.path().join("hosts.csv");
        let merged_path = dir.path().join("merged.csv");
        store::write_listings(&listings_path, &listings).unwrap();
        store::write_hosts(&hosts_path, &hosts).unwrap();

        let summary = merge_files(&[&listings_path], &[&hosts_path], &merged_path).unwrap();
        assert_eq!(summary.stats.total, 3);
        assert_eq!(summary.stats.matched, 3);
        assert!(summary.unreadable.is_empty());

        let (rows, _) = store::read_table(&merged_path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["host_name_detailed"], "Amira");
        assert!(!rows[0]["host_years_active"].is_empty());
        assert_eq!(rows[2]["host_name_from_listing"], "Sam");
        assert!(rows[2]["host_scrape_notes"].starts_with("error: "));
        assert!(MERGED_COLUMNS.iter().all(|c| rows[0].contains_key(*c)));
    }

    #[tokio::test]
    async fn test_failed_item_page_still_yields_a_record() {
        let renderer = FakeRenderer::new()
            .with_page(
                SEARCH,
                r#"<html><body><a href="/rooms/1">1</a><a href="/rooms/404">gone</a></body></html>"#,
            )
            .with_page("https://fr.airbnb.com/rooms/1", &room(1, None));

        let listings = harvest_listings(&renderer, &config()).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[1].url, "https://fr.airbnb.com/rooms/404");
        assert_eq!(listings[1].title, "");
        assert_eq!(listings[1].license_code, "");
    }

    #[tokio::test]
    async fn test_debug_snapshots_land_under_output_dir() {
        let renderer = site();
        let dir = tempdir().unwrap();
        let config = Config {
            output_dir: dir.path().to_path_buf(),
            debug_snapshots: true,
            ..config()
        };

        let listings = harvest_listings(&renderer, &config).await.unwrap();
        let hosts = harvest_hosts(&renderer, &config, &listings).await;
        assert!(config.debug_dir().join("profile_7.html").exists());
        assert!(!config.debug_dir().join("profile_8.html").exists());
        assert!(hosts[0].notes.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_search_page_is_fatal() {
        let renderer = FakeRenderer::new();
        let err = harvest_listings(&renderer, &config()).await.unwrap_err();
        assert!(matches!(err, CrawlError::Navigation { .. }));
    }

    #[test]
    fn test_merge_with_missing_host_file() {
        let dir = tempdir().unwrap();
        let listings_path = dir.path().join("listings.csv");
        let merged_path = dir.path().join("merged.csv");
        let listing = ListingRecord {
            url: "https://fr.airbnb.com/rooms/1".into(),
            host_profile_url: "https://fr.airbnb.com/users/show/7".into(),
            ..Default::default()
        };
        store::write_listings(&listings_path, &[listing]).unwrap();

        let missing = dir.path().join("hosts.csv");
        let summary = merge_files(&[&listings_path], &[&missing], &merged_path).unwrap();
        assert_eq!(summary.stats.unmatched, 1);
        assert_eq!(summary.unreadable, vec![missing]);
    }
}
