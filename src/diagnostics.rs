//! Structured extraction outcomes, kept apart from logging.
//!
//! Extractors return [`FieldEvent`]s alongside the record they built;
//! [`report`] is the only place they are turned into log lines.

use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Page,
    Title,
    LicenseCode,
    HostProfileUrl,
    HostName,
    HostRating,
    HostJoined,
    ListingCount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Page => "page",
            Field::Title => "title",
            Field::LicenseCode => "license_code",
            Field::HostProfileUrl => "host_profile_url",
            Field::HostName => "host_name",
            Field::HostRating => "host_rating",
            Field::HostJoined => "host_joined",
            Field::ListingCount => "listing_count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Value obtained; `via` names the strategy that produced it.
    Found { via: String },
    /// Obtained only from the page-wide fallback, not from the host region.
    LowConfidence { via: String },
    Missing,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    pub field: Field,
    pub outcome: Outcome,
}

impl FieldEvent {
    pub fn found(field: Field, via: impl Into<String>) -> Self {
        Self {
            field,
            outcome: Outcome::Found { via: via.into() },
        }
    }

    pub fn low_confidence(field: Field, via: impl Into<String>) -> Self {
        Self {
            field,
            outcome: Outcome::LowConfidence { via: via.into() },
        }
    }

    pub fn missing(field: Field) -> Self {
        Self {
            field,
            outcome: Outcome::Missing,
        }
    }

    pub fn failed(field: Field, error: impl fmt::Display) -> Self {
        Self {
            field,
            outcome: Outcome::Failed {
                error: error.to_string(),
            },
        }
    }

    /// `found` or `missing` depending on whether a strategy produced a value.
    pub fn from_source(field: Field, via: Option<&str>) -> Self {
        match via {
            Some(via) => Self::found(field, via),
            None => Self::missing(field),
        }
    }
}

/// Which fields of one item ended up with a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSummary {
    pub found: Vec<Field>,
    pub missing: Vec<Field>,
}

impl ItemSummary {
    /// Fallback values count as found; failed steps count as missing.
    pub fn from_events(events: &[FieldEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            match event.outcome {
                Outcome::Found { .. } | Outcome::LowConfidence { .. } => summary.found.push(event.field),
                Outcome::Missing | Outcome::Failed { .. } => summary.missing.push(event.field),
            }
        }
        summary
    }
}

fn join(fields: &[Field]) -> String {
    if fields.is_empty() {
        return "-".to_string();
    }
    fields.iter().map(Field::to_string).collect::<Vec<_>>().join(",")
}

impl fmt::Display for ItemSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "found={} missing={}", join(&self.found), join(&self.missing))
    }
}

/// Log the events of one extracted page: one summary line per item, plus
/// detail for fallbacks and failed steps.
pub fn report(url: &str, events: &[FieldEvent]) -> ItemSummary {
    for event in events {
        match &event.outcome {
            Outcome::Found { via } => debug!(%url, field = %event.field, %via, "field extracted"),
            Outcome::LowConfidence { via } => {
                info!(%url, field = %event.field, %via, "field taken from page-wide fallback")
            }
            Outcome::Failed { error } => warn!(%url, field = %event.field, %error, "extraction step failed"),
            Outcome::Missing => {}
        }
    }

    let summary = ItemSummary::from_events(events);
    info!(
        %url,
        found = %join(&summary.found),
        missing = %join(&summary.missing),
        "Item fields"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source_maps_presence() {
        assert_eq!(
            FieldEvent::from_source(Field::Title, Some("og:title")).outcome,
            Outcome::Found {
                via: "og:title".into()
            }
        );
        assert_eq!(FieldEvent::from_source(Field::Title, None).outcome, Outcome::Missing);
    }

    #[test]
    fn test_field_names_match_columns() {
        assert_eq!(Field::LicenseCode.to_string(), "license_code");
        assert_eq!(Field::HostProfileUrl.to_string(), "host_profile_url");
    }

    #[test]
    fn test_report_lists_found_and_missing_fields() {
        let summary = report(
            "https://www.airbnb.com/rooms/1",
            &[
                FieldEvent::found(Field::Title, "h1"),
                FieldEvent::low_confidence(Field::HostRating, "page-wide"),
                FieldEvent::missing(Field::LicenseCode),
                FieldEvent::failed(Field::HostName, "net::ERR_TIMED_OUT"),
            ],
        );
        assert_eq!(summary.found, vec![Field::Title, Field::HostRating]);
        assert_eq!(summary.missing, vec![Field::LicenseCode, Field::HostName]);
        assert_eq!(
            summary.to_string(),
            "found=title,host_rating missing=license_code,host_name"
        );
    }

    #[test]
    fn test_summary_of_empty_item() {
        let summary = ItemSummary::from_events(&[]);
        assert_eq!(summary.to_string(), "found=- missing=-");
    }
}
