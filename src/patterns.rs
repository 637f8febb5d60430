//! Text-level extraction shared by the listing and profile passes.

use once_cell::sync::Lazy;

use crate::fallback::{PatternChain, PatternHit};

/// Size of the window kept after a registration label.
pub const LICENSE_WINDOW_CHARS: usize = 800;

/// Registration labels across locales, most specific first.
pub static LICENSE_LABELS: &[&str] = &[
    "Infos d'enregistrement",
    "Détails de l'enregistrement",
    "Registration details",
    "Número de registro",
    "Registrierungsnummer",
    "License",
    "Licence",
    "Permit",
];

static LICENSE_PATTERNS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("hyphenated", r"\b([A-Z]{3}-[A-Z]{3}-[A-Z0-9]{4,6})\b", 1),
        ("numeric", r"\b([0-9]{5,8})\b", 1),
        ("token", r"\b([A-Z0-9]{5,})\b", 1),
    ])
});

static RATING_PATTERNS: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        ("star", r"([0-9]+(?:[.,][0-9]+)?)\s*[★*]", 1),
        (
            "overall_label",
            r"(?i)(?:note globale|overall rating)\s*:?\s*([0-9]+(?:[.,][0-9]+)?)",
            1,
        ),
        (
            "review_count",
            r"(?i)([0-9]+(?:[.,][0-9]+)?)\s*[•·]\s*(?:[0-9]+\s*)?(?:avis|reviews?)",
            1,
        ),
    ])
});

static JOINED_PATTERNS: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[("since", r"(?i)\b(?:depuis|since)\s+(?:\w+\s+)?(\d{4})\b", 1)]));

/// Cut `text` down to the window that follows the first registration label
/// present, or return it whole.
pub fn narrow_to_license_label(text: &str) -> &str {
    for label in LICENSE_LABELS {
        if let Some(start) = text.find(label) {
            let tail = &text[start..];
            let end = tail
                .char_indices()
                .nth(LICENSE_WINDOW_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(tail.len());
            return &tail[..end];
        }
    }
    text
}

/// License code from a block of page text, narrowed around a registration
/// label when one is present.
pub fn license_code(text: &str) -> Option<PatternHit> {
    LICENSE_PATTERNS.find(narrow_to_license_label(text))
}

/// Host rating with the decimal comma normalised to a dot.
pub fn host_rating(text: &str) -> Option<PatternHit> {
    RATING_PATTERNS.find(text).map(|hit| PatternHit {
        value: normalize_decimal(&hit.value),
        ..hit
    })
}

/// Four-digit year following "since"/"depuis".
pub fn joined_year(text: &str) -> Option<PatternHit> {
    JOINED_PATTERNS.find(text)
}

pub fn normalize_decimal(raw: &str) -> String {
    raw.trim().replace(',', ".")
}

/// Collapse runs of whitespace to single spaces.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
