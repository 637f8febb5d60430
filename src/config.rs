//! Run configuration, built once at process entry and passed down.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_START_URL: &str = "https://www.airbnb.com/s/Dubai/homes";
pub const DEFAULT_MAX_LISTINGS: usize = 20;
pub const DEFAULT_MAX_MINUTES: f64 = 5.0;

pub const LISTINGS_FILE: &str = "listings.csv";
pub const HOSTS_FILE: &str = "hosts.csv";
pub const MERGED_FILE: &str = "merged.csv";
pub const DEBUG_DIR: &str = "debug";

#[derive(Debug, Clone)]
pub struct Config {
    pub start_url: String,
    pub max_listings: usize,
    pub max_duration: Duration,
    /// Outbound proxy, in any form [`crate::proxy::Proxy::parse`] accepts.
    pub proxy: Option<String>,
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Keep the HTML of every profile page under [`Config::debug_dir`].
    pub debug_snapshots: bool,
    pub browser: BrowserProfile,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            max_listings: DEFAULT_MAX_LISTINGS,
            max_duration: minutes(DEFAULT_MAX_MINUTES),
            proxy: None,
            output_dir: PathBuf::from("output"),
            headless: true,
            debug_snapshots: false,
            browser: BrowserProfile::default(),
            timing: Timing::default(),
        }
    }
}

impl Config {
    pub fn listings_path(&self) -> PathBuf {
        self.output_dir.join(LISTINGS_FILE)
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.output_dir.join(HOSTS_FILE)
    }

    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(MERGED_FILE)
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.output_dir.join(DEBUG_DIR)
    }
}

/// Converts a possibly fractional, possibly negative minute count.
pub fn minutes(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value * 60.0)
    } else {
        Duration::ZERO
    }
}

/// Locale and viewport the browser presents.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub locale: String,
    pub timezone: String,
    pub window_size: (u32, u32),
}

impl Default for BrowserProfile {
    fn default() -> Self {
        Self {
            locale: "fr-FR".to_string(),
            timezone: "Europe/Paris".to_string(),
            window_size: (1280, 1600),
        }
    }
}

/// Every wait bound and settle delay used while driving pages.
#[derive(Debug, Clone)]
pub struct Timing {
    pub navigation: Duration,
    pub consent_click: Duration,
    pub readiness: Duration,
    pub scroll_settle: Duration,
    pub page_settle: Duration,
    pub text_read: Duration,
    pub body_read: Duration,
    pub reveal_click: Duration,
    pub dialog_wait: Duration,
    pub host_scroll_step: i64,
    pub host_scroll_steps: usize,
    pub host_scroll_settle: Duration,
    pub profile_body_wait: Duration,
    pub profile_retry_pause: Duration,
    pub between_profiles: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            consent_click: Duration::from_millis(4000),
            readiness: Duration::from_secs(30),
            scroll_settle: Duration::from_millis(700),
            page_settle: Duration::from_millis(600),
            text_read: Duration::from_millis(2500),
            body_read: Duration::from_millis(6000),
            reveal_click: Duration::from_millis(3000),
            dialog_wait: Duration::from_millis(3000),
            host_scroll_step: 1400,
            host_scroll_steps: 6,
            host_scroll_settle: Duration::from_millis(250),
            profile_body_wait: Duration::from_secs(15),
            profile_retry_pause: Duration::from_millis(1200),
            between_profiles: Duration::from_millis(600),
        }
    }
}
