//! In-memory Renderer for tests.
//!
//! Pages are static HTML answered with `scraper`. A page can grow in stages
//! (each scroll to the bottom reveals the next one), swap to another document
//! after a click, or fail its first few loads.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::RenderError;
use crate::renderer::{Link, Region, RegionLocator, Renderer};

const STAGE_HEIGHT: u64 = 1000;

#[derive(Default, Clone)]
struct FakePage {
    stages: Vec<String>,
    after_click: Option<(String, String)>,
    failures_left: usize,
}

#[derive(Default)]
struct State {
    current: Option<String>,
    stage: usize,
    clicked: bool,
}

#[derive(Default)]
pub struct FakeRenderer {
    pages: Mutex<HashMap<String, FakePage>>,
    state: Mutex<State>,
    visits: Mutex<Vec<String>>,
    scrolls: Mutex<Vec<i64>>,
    blocking: Mutex<Vec<bool>>,
    settle_delay: Option<Duration>,
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Result<Selector, RenderError> {
    Selector::parse(css).map_err(|_| RenderError::ElementNotFound(format!("unsupported selector {css}")))
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_stages(url, &[html])
    }

    /// A page whose content grows with each scroll to the bottom.
    pub fn with_stages(self, url: &str, stages: &[&str]) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            FakePage {
                stages: stages.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    /// Clicking an element containing `label` on `url` swaps in `html`.
    pub fn with_click(self, url: &str, label: &str, html: &str) -> Self {
        if let Some(page) = self.pages.lock().unwrap().get_mut(url) {
            page.after_click = Some((label.to_string(), html.to_string()));
        }
        self
    }

    /// The first `n` loads of `url` fail.
    pub fn failing(self, url: &str, n: usize) -> Self {
        if let Some(page) = self.pages.lock().unwrap().get_mut(url) {
            page.failures_left = n;
        }
        self
    }

    /// `settle` sleeps for real instead of returning at once.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Every `block_heavy_resources` call, in order.
    pub fn blocking(&self) -> Vec<bool> {
        self.blocking.lock().unwrap().clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<i64> {
        self.scrolls.lock().unwrap().clone()
    }

    fn html(&self) -> Result<String, RenderError> {
        let state = self.state.lock().unwrap();
        let url = state
            .current
            .as_ref()
            .ok_or_else(|| RenderError::Browser("no page loaded".into()))?;
        let pages = self.pages.lock().unwrap();
        let page = &pages[url];
        if state.clicked {
            if let Some((_, html)) = &page.after_click {
                return Ok(html.clone());
            }
        }
        Ok(page.stages[state.stage.min(page.stages.len() - 1)].clone())
    }

    fn last_stage(&self) -> usize {
        let state = self.state.lock().unwrap();
        let pages = self.pages.lock().unwrap();
        state
            .current
            .as_ref()
            .and_then(|u| pages.get(u))
            .map(|p| p.stages.len().saturating_sub(1))
            .unwrap_or(0)
    }

    fn query_first(&self, css: &str) -> Result<Option<(String, HashMap<String, String>)>, RenderError> {
        let html = Html::parse_document(&self.html()?);
        let sel = selector(css)?;
        Ok(html.select(&sel).next().map(|el| {
            let attrs = el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (text_of(el), attrs)
        }))
    }

    fn find_region(&self, locator: &RegionLocator, link_css: &str) -> Result<Option<Region>, RenderError> {
        let html = Html::parse_document(&self.html()?);
        let links = selector(link_css)?;
        let found = match locator {
            RegionLocator::Heading {
                container,
                heading,
                text,
            } => {
                let heading = selector(heading)?;
                let wanted = text.to_lowercase();
                html.select(&selector(container)?).find(|c| {
                    c.select(&heading)
                        .any(|h| text_of(h).to_lowercase().contains(&wanted))
                })
            }
            RegionLocator::Containing {
                container,
                selector: inner,
            } => {
                let inner = selector(inner)?;
                html.select(&selector(container)?)
                    .find(|c| c.select(&inner).next().is_some())
            }
            RegionLocator::Matching { selector: css } => html.select(&selector(css)?).next(),
        };
        Ok(found.map(|el| Region {
            text: text_of(el),
            links: el
                .select(&links)
                .map(|a| Link {
                    href: a.value().attr("href").unwrap_or_default().to_string(),
                    text: text_of(a),
                })
                .collect(),
        }))
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), RenderError> {
        self.visits.lock().unwrap().push(url.to_string());
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .get_mut(url)
            .ok_or_else(|| RenderError::Browser(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        if page.failures_left > 0 {
            page.failures_left -= 1;
            return Err(RenderError::Browser(format!("net::ERR_TIMED_OUT at {url}")));
        }
        *self.state.lock().unwrap() = State {
            current: Some(url.to_string()),
            stage: 0,
            clicked: false,
        };
        Ok(())
    }

    fn current_url(&self) -> String {
        self.state
            .lock()
            .unwrap()
            .current
            .clone()
            .unwrap_or_else(|| "about:blank".to_string())
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), RenderError> {
        match self.query_first(css)? {
            Some(_) => Ok(()),
            None => Err(RenderError::timeout(css, timeout)),
        }
    }

    async fn click_text(&self, css: &str, label: &str, _timeout: Duration) -> Result<bool, RenderError> {
        let html = Html::parse_document(&self.html()?);
        let wanted = label.to_lowercase();
        let present = html
            .select(&selector(css)?)
            .any(|el| text_of(el).to_lowercase().contains(&wanted));
        if !present {
            return Ok(false);
        }
        let url = self.current_url();
        let swaps = self
            .pages
            .lock()
            .unwrap()
            .get(&url)
            .and_then(|p| p.after_click.as_ref())
            .is_some_and(|(l, _)| l.eq_ignore_ascii_case(label));
        if swaps {
            self.state.lock().unwrap().clicked = true;
        }
        Ok(true)
    }

    async fn attribute(&self, css: &str, attr: &str) -> Result<Option<String>, RenderError> {
        Ok(self
            .query_first(css)?
            .and_then(|(_, attrs)| attrs.get(attr).cloned()))
    }

    async fn attributes(&self, css: &str, attr: &str) -> Result<Vec<String>, RenderError> {
        let html = Html::parse_document(&self.html()?);
        Ok(html
            .select(&selector(css)?)
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect())
    }

    async fn inner_text(&self, css: &str, timeout: Duration) -> Result<String, RenderError> {
        self.query_first(css)?
            .map(|(text, _)| text)
            .ok_or_else(|| RenderError::timeout(css, timeout))
    }

    async fn region(
        &self,
        locator: &RegionLocator,
        link_selector: &str,
    ) -> Result<Option<Region>, RenderError> {
        self.find_region(locator, link_selector)
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), RenderError> {
        self.scrolls.lock().unwrap().push(delta_y);
        Ok(())
    }

    async fn scroll_to(&self, fraction_of_height: f64) -> Result<(), RenderError> {
        if fraction_of_height >= 1.0 {
            let last = self.last_stage();
            let mut state = self.state.lock().unwrap();
            state.stage = (state.stage + 1).min(last);
        }
        Ok(())
    }

    async fn page_height(&self) -> Result<u64, RenderError> {
        Ok((self.state.lock().unwrap().stage as u64 + 1) * STAGE_HEIGHT)
    }

    async fn content(&self) -> Result<String, RenderError> {
        self.html()
    }

    async fn block_heavy_resources(&self, blocked: bool) -> Result<(), RenderError> {
        self.blocking.lock().unwrap().push(blocked);
        Ok(())
    }

    async fn settle(&self, _delay: Duration) {
        if let Some(delay) = self.settle_delay {
            tokio::time::sleep(delay).await;
        }
    }
}
