//! Search results page to a list of item URLs.

use indexmap::IndexSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::error::{CrawlError, CrawlResult, RenderError};
use crate::fallback::first_success;
use crate::renderer::Renderer;
use crate::urls::{canonicalize, navigation_variants};

pub const ITEM_LINK: &str = r#"a[href^="/rooms/"]"#;

const ATTEMPTS_PER_VARIANT: usize = 2;

const CONSENT_LABELS: &[&str] = &["Accepter", "I agree", "OK"];

pub struct UrlCollector<'a> {
    renderer: &'a dyn Renderer,
    timing: &'a Timing,
}

impl<'a> UrlCollector<'a> {
    pub fn new(renderer: &'a dyn Renderer, timing: &'a Timing) -> Self {
        Self { renderer, timing }
    }

    /// Bring the search page for `start_url` to a state where item links are
    /// present.
    ///
    /// Each variant from [`navigation_variants`] gets two attempts. This is
    /// the one fatal step of a run: when every attempt fails the last error
    /// is returned.
    pub async fn open(&self, start_url: &str) -> CrawlResult<()> {
        let mut last_error = RenderError::Browser("no navigation attempted".into());

        for url in navigation_variants(start_url) {
            for attempt in 1..=ATTEMPTS_PER_VARIANT {
                info!(%url, attempt, "Opening search page");
                match self.try_open(&url).await {
                    Ok(()) => {
                        info!(%url, "Search page ready");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(%url, attempt, error = %e, "Search page not ready");
                        last_error = e;
                    }
                }
            }
        }

        Err(CrawlError::Navigation {
            url: start_url.to_string(),
            source: last_error,
        })
    }

    async fn try_open(&self, url: &str) -> Result<(), RenderError> {
        self.renderer.goto(url, self.timing.navigation).await?;

        let renderer = self.renderer;
        let timeout = self.timing.consent_click;
        let dismissed = first_success(CONSENT_LABELS.iter().copied(), |label| async move {
            renderer
                .click_text("button", label, timeout)
                .await
                .ok()
                .filter(|clicked| *clicked)
                .map(|_| label)
        })
        .await;
        if let Some(label) = dismissed {
            debug!(label, "Consent dismissed");
        }

        self.renderer.wait_for(ITEM_LINK, self.timing.readiness).await
    }

    /// Scroll the open search page and gather up to `max_items` item URLs in
    /// discovery order.
    ///
    /// Stops at the cap, when `max_duration` has elapsed (checked once per
    /// round), or when a scroll no longer grows the page. Never fails.
    pub async fn collect(&self, max_items: usize, max_duration: Duration) -> Vec<String> {
        let started = Instant::now();
        let mut seen: IndexSet<String> = IndexSet::new();

        while seen.len() < max_items && started.elapsed() < max_duration {
            let base = self.renderer.current_url();
            match self.renderer.attributes(ITEM_LINK, "href").await {
                Ok(hrefs) => {
                    for href in hrefs {
                        if seen.len() >= max_items {
                            break;
                        }
                        if let Some(url) = item_url(&base, &href) {
                            seen.insert(url);
                        }
                    }
                }
                Err(e) => debug!(error = %e, "Item link scan failed"),
            }
            debug!(found = seen.len(), "Scan round done");

            if seen.len() >= max_items {
                break;
            }

            let before = self.renderer.page_height().await.unwrap_or(0);
            if let Err(e) = self.renderer.scroll_to(1.0).await {
                debug!(error = %e, "Scroll failed");
            }
            self.renderer.settle(self.timing.scroll_settle).await;
            let after = self.renderer.page_height().await.unwrap_or(0);
            if after == before {
                debug!(height = after, "Page stopped growing");
                break;
            }
        }

        let urls: Vec<String> = seen.into_iter().take(max_items).collect();
        info!(count = urls.len(), elapsed = ?started.elapsed(), "Collected item URLs");
        urls
    }
}

/// Canonical item URL for an anchor href, or `None` for anything that is not
/// a stay (experiences share the `/rooms/` prefix on some pages).
pub fn item_url(base: &str, href: &str) -> Option<String> {
    if href.trim().is_empty() || href.contains("experiences") {
        return None;
    }
    canonicalize(base, href).filter(|url| url.contains("/rooms/"))
}
