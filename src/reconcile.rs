//! Join the listings dataset with the host profiles dataset.

use std::collections::HashMap;
use std::fmt;

use crate::models::{HostRecord, ListingRecord, MatchStatus, MergedRecord};

pub const HOST_NOT_COLLECTED: &str = "host not collected in second pass";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} listings with host details ({} without)",
            self.matched, self.total, self.unmatched
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub rows: Vec<MergedRecord>,
    pub stats: MergeStats,
}

/// Hosts keyed by trimmed profile URL. Rows without a URL are skipped; on a
/// duplicate URL the later row replaces the earlier one.
pub fn index_hosts(hosts: &[HostRecord]) -> HashMap<&str, &HostRecord> {
    let mut index = HashMap::with_capacity(hosts.len());
    for host in hosts {
        let key = host.url.trim();
        if !key.is_empty() {
            index.insert(key, host);
        }
    }
    index
}

/// One output row per listing, in listing order.
pub fn merge(listings: &[ListingRecord], hosts: &[HostRecord]) -> Reconciliation {
    let index = index_hosts(hosts);
    let mut stats = MergeStats {
        total: listings.len(),
        ..Default::default()
    };

    let rows = listings
        .iter()
        .map(|listing| {
            let key = listing.host_profile_url.trim();
            let found = (!key.is_empty()).then(|| index.get(key)).flatten();
            match found {
                Some(host) => {
                    stats.matched += 1;
                    MergedRecord {
                        listing: listing.clone(),
                        host: (*host).clone(),
                        status: MatchStatus::Matched,
                    }
                }
                None => {
                    stats.unmatched += 1;
                    MergedRecord {
                        listing: listing.clone(),
                        host: HostRecord::default(),
                        status: MatchStatus::Unmatched {
                            reason: HOST_NOT_COLLECTED.to_string(),
                        },
                    }
                }
            }
        })
        .collect();

    Reconciliation { rows, stats }
}

/// Host profile URLs to visit in the profile pass: non-empty, unique, in
/// first-seen order.
pub fn host_urls(listings: &[ListingRecord]) -> Vec<String> {
    let mut seen = indexmap::IndexSet::new();
    for listing in listings {
        let url = listing.host_profile_url.trim();
        if !url.is_empty() {
            seen.insert(url.to_string());
        }
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MERGED_COLUMNS;

    fn listing(url: &str, host: &str) -> ListingRecord {
        ListingRecord {
            url: url.into(),
            host_profile_url: host.into(),
            scraped_at: "2024-05-01T10:00:00Z".into(),
            ..Default::default()
        }
    }

    fn host(url: &str, name: &str) -> HostRecord {
        HostRecord {
            url: url.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn column<'a>(row: &'a MergedRecord, name: &str) -> &'a str {
        let i = MERGED_COLUMNS.iter().position(|c| *c == name).unwrap();
        row.to_row()[i]
    }

    #[test]
    fn test_matched_and_unmatched_rows() {
        let listings = vec![listing("L1", "H1"), listing("L2", "H2")];
        let hosts = vec![HostRecord {
            rating: "4.9".into(),
            notes: "missing fields: listing_count".into(),
            ..host("H1", "Ann")
        }];

        let result = merge(&listings, &hosts);
        assert_eq!(result.stats, MergeStats { total: 2, matched: 1, unmatched: 1 });

        let first = &result.rows[0];
        assert!(first.matched());
        assert_eq!(column(first, "url_annonce"), "L1");
        assert_eq!(column(first, "host_name_detailed"), "Ann");
        assert_eq!(column(first, "host_rating_detailed"), "4.9");
        assert_eq!(column(first, "host_scrape_notes"), "missing fields: listing_count");

        let second = &result.rows[1];
        assert!(!second.matched());
        assert_eq!(column(second, "host_url"), "H2");
        assert_eq!(column(second, "host_name_detailed"), "");
        assert_eq!(column(second, "host_scrape_notes"), HOST_NOT_COLLECTED);
    }

    #[test]
    fn test_single_listing_examples() {
        let matched = merge(
            &[listing("/rooms/1", "/users/show/9")],
            &[HostRecord {
                rating: "4.9".into(),
                ..host("/users/show/9", "Alex")
            }],
        );
        assert!(matched.rows[0].matched());
        assert_eq!(column(&matched.rows[0], "host_name_detailed"), "Alex");

        let unmatched = merge(&[listing("/rooms/2", "")], &[]);
        let row = &unmatched.rows[0];
        assert_eq!(
            row.status,
            MatchStatus::Unmatched {
                reason: HOST_NOT_COLLECTED.into()
            }
        );
        assert_eq!(row.host, HostRecord::default());
    }

    #[test]
    fn test_keys_are_trimmed_and_empty_urls_skipped() {
        let listings = vec![listing("L1", " H1 "), listing("L2", "")];
        let hosts = vec![host("H1\t", "Ann"), host("", "Ghost")];

        let result = merge(&listings, &hosts);
        assert!(result.rows[0].matched());
        assert!(!result.rows[1].matched());
        assert_eq!(result.rows[1].host.name, "");
    }

    #[test]
    fn test_last_duplicate_host_wins() {
        let listings = vec![listing("L1", "H1")];
        let hosts = vec![host("H1", "Old"), host("H1", "New")];
        assert_eq!(merge(&listings, &hosts).rows[0].host.name, "New");
    }

    #[test]
    fn test_output_follows_listing_order_and_count() {
        let listings: Vec<_> = (0..5)
            .map(|i| listing(&format!("L{i}"), &format!("H{}", i % 2)))
            .collect();
        let hosts = vec![host("H1", "One")];

        let result = merge(&listings, &hosts);
        assert_eq!(result.rows.len(), listings.len());
        let urls: Vec<_> = result.rows.iter().map(|r| r.listing.url.as_str()).collect();
        assert_eq!(urls, vec!["L0", "L1", "L2", "L3", "L4"]);
        assert_eq!(result.stats.matched + result.stats.unmatched, result.stats.total);
        assert_eq!(result.stats.matched, 2);
    }

    #[test]
    fn test_listing_fields_are_never_overwritten() {
        let mut l = listing("L1", "H1");
        l.host_name = "From listing".into();
        l.host_overall_rating = "4.5".into();
        let h = HostRecord {
            rating: "4.8".into(),
            ..host("H1", "From profile")
        };

        let result = merge(&[l], &[h]);
        let row = &result.rows[0];
        assert_eq!(column(row, "host_name_from_listing"), "From listing");
        assert_eq!(column(row, "host_name_detailed"), "From profile");
        assert_eq!(column(row, "host_rating_from_listing"), "4.5");
        assert_eq!(column(row, "host_rating_detailed"), "4.8");
        assert_eq!(column(row, "scraped_at"), "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_matched_bounded_by_distinct_hosts() {
        let listings = vec![listing("L1", "H1"), listing("L2", "H2"), listing("L3", "H3")];
        let hosts = vec![host("H1", "A"), host("H3", "C")];
        let result = merge(&listings, &hosts);
        assert!(result.stats.matched <= listings.len().min(hosts.len()));
    }

    #[test]
    fn test_empty_inputs() {
        let result = merge(&[], &[host("H1", "A")]);
        assert!(result.rows.is_empty());
        assert_eq!(result.stats, MergeStats::default());
    }

    #[test]
    fn test_host_urls_unique_in_first_seen_order() {
        let listings = vec![
            listing("L1", "H2"),
            listing("L2", " "),
            listing("L3", "H1"),
            listing("L4", "H2 "),
        ];
        assert_eq!(host_urls(&listings), vec!["H2".to_string(), "H1".to_string()]);
    }
}
