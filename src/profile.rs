//! Host profile pages to [`HostRecord`]s.
//!
//! The browser part only loads the page and hands back its HTML and rendered
//! text. Everything else is pure: [`ProfileSources`] pulls the interesting
//! bits out of the HTML and [`parse_profile`] turns them into a record.

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::diagnostics::{self, Field, FieldEvent};
use crate::error::RenderError;
use crate::fallback::PatternChain;
use crate::models::HostRecord;
use crate::patterns::normalize_decimal;
use crate::renderer::Renderer;

/// The marketplace opened in 2007; earlier years are noise.
const FIRST_YEAR: i32 = 2007;
const MAX_NAME_CHARS: usize = 80;
const MAX_JSON_DEPTH: usize = 8;
const MAX_LISTING_COUNT: u32 = 1000;

const NAME_KEYS: &[&str] = &[
    "fullName",
    "displayName",
    "hostName",
    "publicName",
    "smartName",
    "name",
    "userName",
    "firstName",
];

const PROFILE_HEADING: &str = r#"[data-testid*="profile"][data-testid*="heading"], [data-testid="user-profile__heading"], [data-testid="user-profile-heading"]"#;

static NAME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Quelques informations sur|Profil de|À propos de|About)\s+")
        .expect("valid regex")
});
static SITE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–—]\s*Airbnb.*$").expect("valid regex"));
static SITE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Airbnb\s*:|locations de vacances").expect("valid regex")
});

/// "Profil de X | Airbnb" and friends, inside a single candidate string.
static NAME_FORMS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("about_fr", r"(?i)Quelques informations sur\s+([^|–—\-•\n]+)", 1),
        ("profile_fr", r"(?i)Profil de\s+([^|–—\-•\n]+)", 1),
        ("about", r"(?i)(?:À propos de|About)\s+([^|–—\-•\n]+)", 1),
    ])
});

/// The same forms, looser, over raw HTML.
static HTML_NAME_FORMS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("about_fr", r"(?i)Quelques informations sur\s*([^<|–—\-]+)", 1),
        ("profile_fr", r"(?i)Profil de\s*([^<|–—\-]+)", 1),
        ("about", r"(?i)(?:À propos de|About)\s*([^<|–—\-]+)", 1),
    ])
});

static TEXT_NAME_FORMS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[(
        "body_text",
        r"(?i)(?:Quelques informations sur|Profil de)\s+([^\n|]+)",
        1,
    )])
});

static RATING_FORMS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("overall_label", r"(?i)Note\s+globale\s+([0-9]+[.,][0-9]+)", 1),
        ("average", r"(?i)Moyenne\s+de\s+([0-9]+[.,][0-9]+)", 1),
        ("review_label", r"(?i)([0-9]+[.,][0-9]+)\s*(?:évaluations|reviews|rating)", 1),
        ("star", r"([0-9]+[.,][0-9]+)\s*[★*]", 1),
    ])
});

static JOINED_FORMS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("member_fr", r"(?i)Membre\s+depuis\s+(?:\p{L}+\s+)?(\d{4})", 1),
        ("since_fr", r"(?i)Depuis\s+(?:\p{L}+\s+)?(\d{4})", 1),
        ("registered_fr", r"(?i)Inscrit[ e]*\s+(?:en|depuis)\s+(?:\p{L}+\s+)?(\d{4})", 1),
        ("joined", r"(?i)Joined\s+in\s+(?:[A-Za-z]+\s+)?(\d{4})", 1),
        ("member_since", r"(?i)Member\s+since\s+(?:[A-Za-z]+\s+)?(\d{4})", 1),
        ("on_airbnb_since", r"(?i)On\s+Airbnb\s+since\s+(?:[A-Za-z]+\s+)?(\d{4})", 1),
        ("near_keyword", r"(?i)(?:membre|since|joined|inscrit)[^0-9]{0,20}((?:19|20)\d{2})", 1),
    ])
});

static JOIN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(membersince|since|createdat|created_at|joindate|join_date)").expect("valid regex")
});
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").expect("valid regex"));

static LISTING_COUNTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(\d{1,4})\s+(?:annonces|hébergements)",
        r"(?i)\b(\d{1,4})\s+listings?\b",
    ]
    .iter()
    .map(|src| Regex::new(src).expect("valid regex"))
    .collect()
});

// ============================================================================
// Pure extraction
// ============================================================================

/// Raw material read from one profile page.
#[derive(Debug, Clone, Default)]
pub struct ProfileSources {
    pub h1: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub ld_json: Vec<String>,
    pub next_data: Option<String>,
    pub html: String,
    pub text: String,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

impl ProfileSources {
    pub fn from_html(html: &str, text: &str) -> Self {
        let doc = Html::parse_document(html);
        let first_text = |css: &str| {
            selector(css)
                .and_then(|sel| doc.select(&sel).next().map(|el| el.text().collect::<String>()))
                .and_then(non_empty)
        };
        let attr = |css: &str, name: &str| {
            selector(css)
                .and_then(|sel| {
                    doc.select(&sel)
                        .next()
                        .and_then(|el| el.value().attr(name).map(str::to_string))
                })
                .and_then(non_empty)
        };

        let ld_json: Vec<String> = selector(r#"script[type="application/ld+json"]"#)
            .map(|sel| doc.select(&sel).map(|el| el.text().collect::<String>()).collect())
            .unwrap_or_default();

        Self {
            h1: first_text("h1").or_else(|| first_text(PROFILE_HEADING)),
            meta_title: attr(r#"meta[property="og:title"]"#, "content")
                .or_else(|| attr(r#"meta[name="twitter:title"]"#, "content")),
            meta_description: attr(r#"meta[name="description"]"#, "content"),
            ld_json,
            next_data: first_text("#__NEXT_DATA__"),
            html: html.to_string(),
            text: text.to_string(),
        }
    }
}

/// Strip site branding from a name candidate; `None` when nothing usable is
/// left or the candidate is a generic site title.
pub fn clean_name(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || SITE_TITLE.is_match(s) {
        return None;
    }
    let s = NAME_PREFIX.replace(s, "");
    let s = SITE_SUFFIX.replace(&s, "");
    let s = s.split(['|', '•']).next().unwrap_or_default().trim();
    let s: String = s.chars().take(MAX_NAME_CHARS).collect();
    non_empty(s)
}

/// First name-like string value in a JSON tree, at most eight levels down.
pub fn find_name_in_json(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_JSON_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            let direct = map.iter().find_map(|(k, v)| match v {
                Value::String(s) if NAME_KEYS.contains(&k.as_str()) => {
                    clean_name(s).filter(|c| !c.to_lowercase().contains("airbnb"))
                }
                _ => None,
            });
            direct.or_else(|| map.values().find_map(|v| find_name_in_json(v, depth + 1)))
        }
        Value::Array(items) => items.iter().find_map(|v| find_name_in_json(v, depth + 1)),
        _ => None,
    }
}

fn pick_name(src: &ProfileSources) -> Option<(String, &'static str)> {
    if let Some(name) = src
        .next_data
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|json| find_name_in_json(&json, 0))
    {
        return Some((name, "__NEXT_DATA__"));
    }

    let from_html = HTML_NAME_FORMS.find(&src.html).map(|h| h.value);
    let candidates = [
        (src.h1.as_deref(), "h1"),
        (src.meta_title.as_deref(), "meta title"),
        (src.meta_description.as_deref(), "meta description"),
        (from_html.as_deref(), "html"),
    ];
    for (candidate, via) in candidates {
        let Some(candidate) = candidate else { continue };
        let cleaned = NAME_FORMS
            .hits(candidate)
            .find_map(|hit| clean_name(&hit.value))
            .or_else(|| clean_name(candidate));
        if let Some(name) = cleaned {
            return Some((name, via));
        }
    }

    TEXT_NAME_FORMS
        .find(&src.text)
        .and_then(|hit| clean_name(&hit.value))
        .map(|name| (name, "body text"))
}

/// Dot-decimal text of `raw` as written on the page ("5,0" stays "5.0"),
/// provided it is a finite number.
fn decimal(raw: &str) -> Option<String> {
    let text = normalize_decimal(raw);
    let valid = text.parse::<f64>().is_ok_and(f64::is_finite);
    valid.then_some(text)
}

fn pick_rating(src: &ProfileSources) -> Option<(String, &'static str)> {
    for raw in &src.ld_json {
        let Ok(json) = serde_json::from_str::<Value>(raw) else { continue };
        let items = match json {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in &items {
            let value = match item.pointer("/aggregateRating/ratingValue") {
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(Value::String(s)) => decimal(s),
                _ => None,
            };
            if let Some(value) = value {
                return Some((value, "ld+json"));
            }
        }
    }

    let pool = format!("{}\n{}", src.text, src.html);
    // Bound to a local so the iterator is dropped before `pool`.
    let found = RATING_FORMS
        .hits(&pool)
        .find_map(|hit| decimal(&hit.value).map(|v| (v, hit.pattern)));
    found
}

fn valid_year(year: i32, current_year: i32) -> Option<i32> {
    (FIRST_YEAR..=current_year).contains(&year).then_some(year)
}

/// Year out of a timestamp (seconds or milliseconds) or a date-like string.
pub fn year_from_value(value: &Value, current_year: i32) -> Option<i32> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let millis = if raw > 1e12 { raw } else { raw * 1000.0 };
            let date = DateTime::<Utc>::from_timestamp_millis(millis as i64)?;
            valid_year(date.year(), current_year)
        }
        Value::String(s) => {
            let year = YEAR.find(s)?.as_str().parse().ok()?;
            valid_year(year, current_year)
        }
        _ => None,
    }
}

/// Breadth-first search for a join-date-looking key.
fn joined_year_in_json(json: &Value, current_year: i32) -> Option<i32> {
    let mut queue = VecDeque::from([json]);
    let nested = |v: &&Value| v.is_object() || v.is_array();
    while let Some(node) = queue.pop_front() {
        match node {
            Value::Object(map) => {
                for (key, value) in map {
                    if nested(&value) {
                        queue.push_back(value);
                    }
                    if JOIN_KEY.is_match(&key.to_lowercase()) {
                        if let Some(year) = year_from_value(value, current_year) {
                            return Some(year);
                        }
                    }
                }
            }
            Value::Array(items) => queue.extend(items.iter().filter(nested)),
            _ => {}
        }
    }
    None
}

fn pick_joined_year(src: &ProfileSources, current_year: i32) -> Option<(i32, &'static str)> {
    if let Some(year) = src
        .next_data
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|json| joined_year_in_json(&json, current_year))
    {
        return Some((year, "__NEXT_DATA__"));
    }

    let pool = format!("{}\n{}", src.text, src.html);
    let found = JOINED_FORMS.hits(&pool).find_map(|hit| {
        hit.value
            .parse()
            .ok()
            .and_then(|y| valid_year(y, current_year))
            .map(|y| (y, hit.pattern))
    });
    found
}

/// Largest plausible "N listings" count on the page.
pub fn listing_count(text: &str, html: &str) -> Option<u32> {
    LISTING_COUNTS
        .iter()
        .flat_map(|re| [text, html].into_iter().flat_map(move |t| re.captures_iter(t)))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|n| (1..=MAX_LISTING_COUNT).contains(n))
        .max()
}

#[derive(Debug, Clone)]
pub struct ProfileExtraction {
    pub record: HostRecord,
    pub events: Vec<FieldEvent>,
}

/// Build the host record for `url` from what was read off its page.
pub fn parse_profile(url: &str, src: &ProfileSources, current_year: i32) -> ProfileExtraction {
    let mut record = HostRecord::new(url);
    let mut events = Vec::with_capacity(4);
    let mut missing = Vec::new();

    let name = pick_name(src);
    events.push(FieldEvent::from_source(Field::HostName, name.as_ref().map(|(_, via)| *via)));
    match name {
        Some((name, _)) => record.name = name,
        None => missing.push("name"),
    }

    let rating = pick_rating(src);
    events.push(FieldEvent::from_source(Field::HostRating, rating.as_ref().map(|(_, via)| *via)));
    match rating {
        Some((rating, _)) => record.rating = rating,
        None => missing.push("rating"),
    }

    let joined = pick_joined_year(src, current_year);
    events.push(FieldEvent::from_source(Field::HostJoined, joined.map(|(_, via)| via)));
    match joined {
        Some((year, _)) => {
            record.joined_year = year.to_string();
            record.years_active = (current_year - year).to_string();
        }
        None => missing.push("joined_year"),
    }

    match listing_count(&src.text, &src.html) {
        Some(count) => {
            record.listing_count = count.to_string();
            events.push(FieldEvent::found(Field::ListingCount, "count label"));
        }
        None => {
            missing.push("listing_count");
            events.push(FieldEvent::missing(Field::ListingCount));
        }
    }

    if !missing.is_empty() {
        record.notes = format!("missing fields: {}", missing.join(", "));
    }

    ProfileExtraction { record, events }
}

// ============================================================================
// Browser pass
// ============================================================================

pub struct ProfileExtractor<'a> {
    renderer: &'a dyn Renderer,
    timing: &'a Timing,
    snapshots: Option<PathBuf>,
}

impl<'a> ProfileExtractor<'a> {
    pub fn new(renderer: &'a dyn Renderer, timing: &'a Timing) -> Self {
        Self {
            renderer,
            timing,
            snapshots: None,
        }
    }

    /// Save the HTML of every loaded profile page under `dir`.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshots = Some(dir.into());
        self
    }

    /// Visit every profile in order and return one record per URL.
    ///
    /// Images, fonts and media are blocked for the duration of the pass.
    pub async fn extract_all(&self, urls: &[String]) -> Vec<HostRecord> {
        if let Err(e) = self.renderer.block_heavy_resources(true).await {
            warn!(error = %e, "Could not block heavy resources");
        }

        let mut records = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let record = self.extract(url).await;
            info!(
                "[{}/{}] {} => {} | rating {} | listings {} | joined {}",
                i + 1,
                urls.len(),
                url,
                or_unknown(&record.name),
                or_unknown(&record.rating),
                or_unknown(&record.listing_count),
                or_unknown(&record.joined_year),
            );
            records.push(record);
            if i + 1 < urls.len() {
                self.renderer.settle(self.timing.between_profiles).await;
            }
        }

        if let Err(e) = self.renderer.block_heavy_resources(false).await {
            warn!(error = %e, "Could not lift resource blocking");
        }
        records
    }

    /// One profile. Never fails: a page that cannot be loaded gives a record
    /// whose `notes` carry the error. A navigation timeout is retried once.
    pub async fn extract(&self, url: &str) -> HostRecord {
        let first = match self.attempt(url).await {
            Err(e) if e.is_timeout() => {
                warn!(%url, error = %e, "Profile page timed out, retrying once");
                self.renderer.settle(self.timing.profile_retry_pause).await;
                self.attempt(url).await
            }
            other => other,
        };
        match first {
            Ok(extraction) => {
                diagnostics::report(url, &extraction.events);
                extraction.record
            }
            Err(e) => {
                warn!(%url, error = %e, "Profile page failed");
                HostRecord {
                    notes: format!("error: {e}"),
                    ..HostRecord::new(url)
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<ProfileExtraction, RenderError> {
        let r = self.renderer;
        r.goto(url, self.timing.navigation).await?;
        r.wait_for("body", self.timing.profile_body_wait).await?;

        for fraction in [0.5, 1.0, 0.0] {
            r.scroll_to(fraction).await?;
            r.settle(self.timing.scroll_settle).await;
        }

        let html = r.content().await?;
        let text = r.inner_text("body", self.timing.body_read).await.unwrap_or_default();
        let sources = ProfileSources::from_html(&html, &text);
        let mut extraction = parse_profile(url, &sources, Utc::now().year());

        if let Some(dir) = &self.snapshots {
            match save_snapshot(dir, url, &html) {
                Ok(path) => {
                    debug!(%url, path = %path.display(), "Snapshot saved");
                    if !extraction.record.notes.is_empty() {
                        extraction.record.notes.push_str(&format!("; see {}", path.display()));
                    }
                }
                Err(e) => warn!(%url, error = %e, "Could not save snapshot"),
            }
        }
        Ok(extraction)
    }
}

/// File name for the snapshot of `url`: the profile id when there is one.
pub fn snapshot_name(url: &str) -> String {
    let id: String = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        "profile_page.html".to_string()
    } else {
        format!("profile_{id}.html")
    }
}

fn save_snapshot(dir: &Path, url: &str, html: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_name(url));
    fs::write(&path, html)?;
    Ok(path)
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "?"
    } else {
        value
    }
}
