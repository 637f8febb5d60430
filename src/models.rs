use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Column layouts
// ============================================================================

pub const LISTING_COLUMNS: [&str; 8] = [
    "url",
    "title",
    "license_code",
    "host_name",
    "host_overall_rating",
    "host_profile_url",
    "host_joined",
    "scraped_at",
];

pub const HOST_COLUMNS: [&str; 7] = [
    "url",
    "name",
    "rating",
    "joined_year",
    "years_active",
    "listing_count",
    "notes",
];

pub const MERGED_COLUMNS: [&str; 14] = [
    "url_annonce",
    "titre",
    "licence",
    "host_url",
    "host_name_from_listing",
    "host_name_detailed",
    "host_rating_from_listing",
    "host_rating_detailed",
    "host_joined_from_listing",
    "host_joined_year",
    "host_years_active",
    "host_listing_count",
    "host_scrape_notes",
    "scraped_at",
];

/// A row as read from a tabular file: header name to cell.
pub type Row = HashMap<String, String>;

fn cell(row: &Row, key: &str) -> String {
    row.get(key).cloned().unwrap_or_default()
}

// ============================================================================
// Records
// ============================================================================

/// One item page, as seen during the listings pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListingRecord {
    pub url: String,
    pub title: String,
    pub license_code: String,
    pub host_profile_url: String,
    pub host_name: String,
    pub host_overall_rating: String,
    pub host_joined: String,
    pub scraped_at: String,
}

impl ListingRecord {
    /// Empty record stamped with the current time.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scraped_at: now_rfc3339(),
            ..Default::default()
        }
    }

    pub fn to_row(&self) -> [&str; 8] {
        [
            &self.url,
            &self.title,
            &self.license_code,
            &self.host_name,
            &self.host_overall_rating,
            &self.host_profile_url,
            &self.host_joined,
            &self.scraped_at,
        ]
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            url: cell(row, "url"),
            title: cell(row, "title"),
            license_code: cell(row, "license_code"),
            host_profile_url: cell(row, "host_profile_url"),
            host_name: cell(row, "host_name"),
            host_overall_rating: cell(row, "host_overall_rating"),
            host_joined: cell(row, "host_joined"),
            scraped_at: cell(row, "scraped_at"),
        }
    }
}

/// One host profile page, as seen during the profile pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostRecord {
    pub url: String,
    pub name: String,
    pub rating: String,
    pub joined_year: String,
    pub years_active: String,
    pub listing_count: String,
    pub notes: String,
}

impl HostRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn to_row(&self) -> [&str; 7] {
        [
            &self.url,
            &self.name,
            &self.rating,
            &self.joined_year,
            &self.years_active,
            &self.listing_count,
            &self.notes,
        ]
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            url: cell(row, "url"),
            name: cell(row, "name"),
            rating: cell(row, "rating"),
            joined_year: cell(row, "joined_year"),
            years_active: cell(row, "years_active"),
            listing_count: cell(row, "listing_count"),
            notes: cell(row, "notes"),
        }
    }
}

/// Outcome of looking a listing's host up in the profile dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Matched,
    Unmatched { reason: String },
}

impl MatchStatus {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchStatus::Matched)
    }
}

/// Listing-side and host-side fields side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub listing: ListingRecord,
    /// Host-side fields; every field is empty when unmatched.
    pub host: HostRecord,
    pub status: MatchStatus,
}

impl MergedRecord {
    pub fn matched(&self) -> bool {
        self.status.is_matched()
    }

    pub fn host_scrape_notes(&self) -> &str {
        match &self.status {
            MatchStatus::Matched => &self.host.notes,
            MatchStatus::Unmatched { reason } => reason,
        }
    }

    pub fn to_row(&self) -> [&str; 14] {
        [
            &self.listing.url,
            &self.listing.title,
            &self.listing.license_code,
            &self.listing.host_profile_url,
            &self.listing.host_name,
            &self.host.name,
            &self.listing.host_overall_rating,
            &self.host.rating,
            &self.listing.host_joined,
            &self.host.joined_year,
            &self.host.years_active,
            &self.host.listing_count,
            self.host_scrape_notes(),
            &self.listing.scraped_at,
        ]
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
