//! The page-automation seam.
//!
//! Extraction logic only talks to pages through [`Renderer`]. The Chrome
//! implementation lives in [`crate::browser`]; tests use an in-memory one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RenderError;

/// How to recognise a page region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionLocator {
    /// A `container` holding a `heading` whose text contains `text`
    /// (case-insensitive).
    Heading {
        container: &'static str,
        heading: &'static str,
        text: &'static str,
    },
    /// A `container` with at least one descendant matching `selector`.
    Containing {
        container: &'static str,
        selector: &'static str,
    },
    /// Any element matching `selector`.
    Matching { selector: &'static str },
}

impl RegionLocator {
    pub fn describe(&self) -> String {
        match self {
            RegionLocator::Heading { text, .. } => format!("heading \"{text}\""),
            RegionLocator::Containing { selector, .. } => format!("container of {selector}"),
            RegionLocator::Matching { selector } => selector.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// Snapshot of a located region: its rendered text and the links inside it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Region {
    pub text: String,
    pub links: Vec<Link>,
}

/// DOM primitives a browsing context has to offer.
///
/// Waits are bounded by the timeout passed in; nothing blocks indefinitely.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url` and wait for the DOM to be ready.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// URL of the document currently loaded.
    fn current_url(&self) -> String;

    /// Wait until at least one element matches `selector`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Click the first visible element matching `selector` whose text contains
    /// `label`. `Ok(false)` when nothing like it shows up within `timeout`.
    async fn click_text(
        &self,
        selector: &str,
        label: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError>;

    /// Attribute of the first element matching `selector`.
    async fn attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, RenderError>;

    /// Attribute of every element matching `selector`, in document order.
    /// Elements without the attribute are skipped.
    async fn attributes(&self, selector: &str, attr: &str) -> Result<Vec<String>, RenderError>;

    /// Rendered text of the first element matching `selector`.
    async fn inner_text(&self, selector: &str, timeout: Duration) -> Result<String, RenderError>;

    /// First visible region matching `locator`, with the links matching
    /// `link_selector` inside it.
    async fn region(
        &self,
        locator: &RegionLocator,
        link_selector: &str,
    ) -> Result<Option<Region>, RenderError>;

    async fn scroll_by(&self, delta_y: i64) -> Result<(), RenderError>;

    async fn scroll_to(&self, fraction_of_height: f64) -> Result<(), RenderError>;

    async fn page_height(&self) -> Result<u64, RenderError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, RenderError>;

    /// Refuse image, font and media requests while `blocked` is set.
    async fn block_heavy_resources(&self, blocked: bool) -> Result<(), RenderError>;

    /// Fixed settle delay after an action that triggers loading.
    async fn settle(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_serializes_for_page_scripts() {
        let locator = RegionLocator::Heading {
            container: "section",
            heading: "h2",
            text: "Meet your Host",
        };
        let json = serde_json::to_value(&locator).unwrap();
        assert_eq!(json["kind"], "heading");
        assert_eq!(json["text"], "Meet your Host");
    }
}
