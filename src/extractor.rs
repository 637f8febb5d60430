//! Item page to [`ListingRecord`].

use tracing::debug;

use crate::config::Timing;
use crate::diagnostics::{Field, FieldEvent};
use crate::fallback::first_success;
use crate::host_section;
use crate::models::ListingRecord;
use crate::patterns;
use crate::renderer::Renderer;

#[derive(Debug, Clone, Copy)]
enum TitleSource {
    Attribute(&'static str, &'static str),
    Text(&'static str),
}

const TITLE_SOURCES: &[TitleSource] = &[
    TitleSource::Attribute(r#"meta[property="og:title"]"#, "content"),
    TitleSource::Text(r#"h1[data-testid="title"]"#),
    TitleSource::Text("h1"),
];

/// "Read more" controls that open the full description, as (selector, label).
const REVEAL_CONTROLS: &[(&str, &str)] = &[
    ("button", "Lire la suite"),
    ("span", "Lire la suite"),
    ("button", "Afficher plus"),
    ("button", "Read more"),
    ("button", "Show more"),
];

const DIALOG: &str = r#"[role="dialog"], [aria-modal="true"]"#;

/// A record plus what happened while building it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ListingRecord,
    pub events: Vec<FieldEvent>,
}

pub struct FieldExtractor<'a> {
    renderer: &'a dyn Renderer,
    timing: &'a Timing,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(renderer: &'a dyn Renderer, timing: &'a Timing) -> Self {
        Self { renderer, timing }
    }

    /// Load `url` and read every field it offers. Never fails: a page that
    /// does not load gives a record with only `url` and `scraped_at`.
    pub async fn extract(&self, url: &str) -> Extraction {
        let mut record = ListingRecord::new(url);
        let mut events = Vec::new();

        if let Err(e) = self.renderer.goto(url, self.timing.navigation).await {
            events.push(FieldEvent::failed(Field::Page, &e));
            return Extraction { record, events };
        }
        self.renderer.settle(self.timing.page_settle).await;

        let title = self.title().await;
        events.push(FieldEvent::from_source(Field::Title, title.as_ref().map(|(_, via)| *via)));
        record.title = title.map(|(t, _)| t).unwrap_or_default();

        let host = host_section::locate(self.renderer, url, self.timing).await;
        record.host_profile_url = host.fields.profile_url;
        record.host_name = host.fields.name;
        record.host_overall_rating = host.fields.rating;
        record.host_joined = host.fields.joined;
        events.extend(host.events);

        match self.license_text().await {
            Some(text) => {
                let hit = patterns::license_code(&text);
                events.push(FieldEvent::from_source(
                    Field::LicenseCode,
                    hit.as_ref().map(|h| h.pattern),
                ));
                record.license_code = hit.map(|h| h.value).unwrap_or_default();
            }
            None => events.push(FieldEvent::missing(Field::LicenseCode)),
        }

        Extraction { record, events }
    }

    async fn title(&self) -> Option<(String, &'static str)> {
        let renderer = self.renderer;
        let timeout = self.timing.text_read;
        first_success(TITLE_SOURCES.iter().copied(), |source| async move {
            let (value, via) = match source {
                TitleSource::Attribute(selector, attr) => {
                    (renderer.attribute(selector, attr).await.ok().flatten(), selector)
                }
                TitleSource::Text(selector) => (renderer.inner_text(selector, timeout).await.ok(), selector),
            };
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (v, via))
        })
        .await
    }

    /// Text to search for the license code: the description dialog when a
    /// reveal control opens one, else the whole body.
    async fn license_text(&self) -> Option<String> {
        let renderer = self.renderer;
        let timing = self.timing;
        let opened = first_success(REVEAL_CONTROLS.iter().copied(), |(selector, label)| async move {
            renderer
                .click_text(selector, label, timing.reveal_click)
                .await
                .ok()
                .filter(|clicked| *clicked)
        })
        .await
        .is_some();

        if opened {
            let dialog = match renderer.wait_for(DIALOG, timing.dialog_wait).await {
                Ok(()) => renderer.inner_text(DIALOG, timing.dialog_wait).await.ok(),
                Err(_) => None,
            };
            if let Some(text) = dialog.filter(|t| !t.trim().is_empty()) {
                return Some(text);
            }
            debug!("description control clicked but no dialog text, reading body");
        }

        renderer
            .inner_text("body", timing.body_read)
            .await
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
