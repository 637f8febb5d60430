//! Host block on an item page.
//!
//! The block is found by its heading in one of the supported locales, then by
//! structural markers. When no block can be found the whole page is searched,
//! and whatever comes out of that is reported as low confidence.

use tracing::debug;

use crate::config::Timing;
use crate::diagnostics::{Field, FieldEvent};
use crate::fallback::{first_success, PatternHit};
use crate::patterns;
use crate::renderer::{Region, RegionLocator, Renderer};
use crate::urls::canonicalize;

pub const PROFILE_LINK: &str = r#"a[href^="/users/show/"]"#;

/// Names this long or longer are page chrome, not a host name.
const MAX_NAME_CHARS: usize = 60;

const PAGE_WIDE: &str = "page-wide";

/// Candidate host regions, tried in order.
pub static HOST_REGIONS: &[RegionLocator] = &[
    RegionLocator::Heading {
        container: "section",
        heading: "h2",
        text: "Faites connaissance avec votre hôte",
    },
    RegionLocator::Heading {
        container: "section",
        heading: "h2",
        text: "Meet your Host",
    },
    RegionLocator::Heading {
        container: "section",
        heading: "h2",
        text: "Get to know your host",
    },
    RegionLocator::Heading {
        container: "section",
        heading: "h2",
        text: "Conoce a tu anfitri",
    },
    RegionLocator::Heading {
        container: "section",
        heading: "h2",
        text: "Erfahre mehr über deinen Gastgeber",
    },
    RegionLocator::Matching {
        selector: r#"[data-section-id*="HOST"]"#,
    },
    RegionLocator::Containing {
        container: "section",
        selector: PROFILE_LINK,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFields {
    pub profile_url: String,
    pub name: String,
    pub rating: String,
    pub joined: String,
}

#[derive(Debug, Clone, Default)]
pub struct HostSection {
    pub fields: HostFields,
    pub events: Vec<FieldEvent>,
}

/// Find the host block on the loaded page and read the host fields from it.
///
/// Never fails; fields that cannot be read stay empty.
pub async fn locate(renderer: &dyn Renderer, page_url: &str, timing: &Timing) -> HostSection {
    for _ in 0..timing.host_scroll_steps {
        if let Err(e) = renderer.scroll_by(timing.host_scroll_step).await {
            debug!(url = %page_url, error = %e, "scroll failed");
        }
        renderer.settle(timing.host_scroll_settle).await;
    }

    let mut found = find_region(renderer).await;
    if found.is_none() {
        if let Err(e) = renderer.scroll_to(1.0).await {
            debug!(url = %page_url, error = %e, "scroll to bottom failed");
        }
        renderer.settle(timing.scroll_settle).await;
        found = find_region(renderer).await;
    }

    match found {
        Some((locator, region)) => {
            debug!(url = %page_url, via = %locator.describe(), "host region found");
            from_region(page_url, &region, &locator.describe())
        }
        None => page_wide(renderer, page_url, timing).await,
    }
}

async fn find_region(renderer: &dyn Renderer) -> Option<(&'static RegionLocator, Region)> {
    first_success(HOST_REGIONS.iter(), |locator| async move {
        match renderer.region(locator, PROFILE_LINK).await {
            Ok(region) => region.map(|r| (locator, r)),
            Err(e) => {
                debug!(locator = %locator.describe(), error = %e, "region lookup failed");
                None
            }
        }
    })
    .await
}

/// Host fields from a located region. Pure.
pub fn from_region(page_url: &str, region: &Region, via: &str) -> HostSection {
    let mut fields = HostFields::default();
    let mut events = Vec::with_capacity(4);

    let link = region.links.first();
    match link.and_then(|l| canonicalize(page_url, &l.href)) {
        Some(url) => {
            fields.profile_url = url;
            events.push(FieldEvent::found(Field::HostProfileUrl, via));
        }
        None => events.push(FieldEvent::missing(Field::HostProfileUrl)),
    }

    let name = link.map(|l| l.text.trim()).unwrap_or_default();
    if !name.is_empty() && name.chars().count() < MAX_NAME_CHARS {
        fields.name = name.to_string();
        events.push(FieldEvent::found(Field::HostName, via));
    } else {
        events.push(FieldEvent::missing(Field::HostName));
    }

    let (rating, joined) = text_fields(&region.text);
    fields.rating = value(&rating);
    fields.joined = value(&joined);
    events.push(FieldEvent::from_source(Field::HostRating, rating.as_ref().map(|h| h.pattern)));
    events.push(FieldEvent::from_source(Field::HostJoined, joined.as_ref().map(|h| h.pattern)));

    HostSection { fields, events }
}

async fn page_wide(renderer: &dyn Renderer, page_url: &str, timing: &Timing) -> HostSection {
    debug!(url = %page_url, "no host region, searching the whole page");
    let mut fields = HostFields::default();
    let mut events = vec![FieldEvent::missing(Field::HostName)];

    // First profile link on the page; the host's is usually but not always first.
    let link = match renderer.attributes(PROFILE_LINK, "href").await {
        Ok(hrefs) => hrefs.iter().find_map(|h| canonicalize(page_url, h)),
        Err(e) => {
            events.push(FieldEvent::failed(Field::HostProfileUrl, &e));
            None
        }
    };
    match link {
        Some(url) => {
            fields.profile_url = url;
            events.push(FieldEvent::low_confidence(Field::HostProfileUrl, PAGE_WIDE));
        }
        None => events.push(FieldEvent::missing(Field::HostProfileUrl)),
    }

    match renderer.inner_text("body", timing.body_read).await {
        Ok(body) => {
            let (rating, joined) = text_fields(&body);
            fields.rating = value(&rating);
            fields.joined = value(&joined);
            events.push(low_confidence_or_missing(Field::HostRating, &rating));
            events.push(low_confidence_or_missing(Field::HostJoined, &joined));
        }
        Err(e) => {
            events.push(FieldEvent::failed(Field::HostRating, &e));
            events.push(FieldEvent::failed(Field::HostJoined, &e));
        }
    }

    HostSection { fields, events }
}

fn text_fields(text: &str) -> (Option<PatternHit>, Option<PatternHit>) {
    (patterns::host_rating(text), patterns::joined_year(text))
}

fn value(hit: &Option<PatternHit>) -> String {
    hit.as_ref().map(|h| h.value.clone()).unwrap_or_default()
}

fn low_confidence_or_missing(field: Field, hit: &Option<PatternHit>) -> FieldEvent {
    match hit {
        Some(hit) => FieldEvent::low_confidence(field, format!("{PAGE_WIDE} {}", hit.pattern)),
        None => FieldEvent::missing(field),
    }
}
